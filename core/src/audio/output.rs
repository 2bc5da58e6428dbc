//! Audio output using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error};

use super::{AudioBackend, AudioNode, AudioRenderer};
use crate::error::AudioError;
use crate::handshake::Signal;

/// Default cpal output device, opened once per process.
pub struct CpalBackend {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    sample_rate: u32,
}

impl CpalBackend {
    /// Open the default output device.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or_else(|| {
            AudioError::DeviceUnavailable("No audio output device available".to_string())
        })?;

        let config = device.default_output_config().map_err(|e| {
            AudioError::DeviceUnavailable(format!("Failed to get default output config: {}", e))
        })?;

        let sample_rate = config.sample_rate().0;

        Ok(Self {
            device,
            config,
            sample_rate,
        })
    }
}

impl AudioBackend for CpalBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(
        &mut self,
        mut renderer: AudioRenderer,
        ready: Signal<()>,
    ) -> Result<Box<dyn AudioNode>, AudioError> {
        let channels = self.config.channels() as usize;
        let mut ready = Some(ready);
        let stream_config: cpal::StreamConfig = self.config.clone().into();

        // Build the stream based on sample format. The renderer fills silence
        // itself when starved, so the callbacks never wait on the producer.
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self
                .device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if let Some(signal) = ready.take() {
                            signal.send(());
                        }
                        renderer.render_interleaved(data, channels);
                    },
                    |err| error!("Audio stream error: {}", err),
                    None,
                )
                .map_err(|e| AudioError::Stream(format!("Failed to build audio stream: {}", e)))?,
            cpal::SampleFormat::I16 => {
                // Pre-allocate buffer for batch reads
                let mut temp_buffer: Vec<f32> = vec![0.0; 4096];
                self.device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            if let Some(signal) = ready.take() {
                                signal.send(());
                            }
                            if temp_buffer.len() < data.len() {
                                temp_buffer.resize(data.len(), 0.0);
                            }
                            let buf = &mut temp_buffer[..data.len()];
                            renderer.render_interleaved(buf, channels);
                            for (out, &f) in data.iter_mut().zip(buf.iter()) {
                                *out = (f * 32767.0).clamp(-32768.0, 32767.0) as i16;
                            }
                        },
                        |err| error!("Audio stream error: {}", err),
                        None,
                    )
                    .map_err(|e| {
                        AudioError::Stream(format!("Failed to build audio stream: {}", e))
                    })?
            }
            cpal::SampleFormat::U16 => {
                let mut temp_buffer: Vec<f32> = vec![0.0; 4096];
                self.device
                    .build_output_stream(
                        &stream_config,
                        move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                            if let Some(signal) = ready.take() {
                                signal.send(());
                            }
                            if temp_buffer.len() < data.len() {
                                temp_buffer.resize(data.len(), 0.0);
                            }
                            let buf = &mut temp_buffer[..data.len()];
                            renderer.render_interleaved(buf, channels);
                            // 0x8000 is silence for u16 audio
                            for (out, &f) in data.iter_mut().zip(buf.iter()) {
                                *out = (f * 32767.0 + 32768.0).clamp(0.0, 65535.0) as u16;
                            }
                        },
                        |err| error!("Audio stream error: {}", err),
                        None,
                    )
                    .map_err(|e| {
                        AudioError::Stream(format!("Failed to build audio stream: {}", e))
                    })?
            }
            other => {
                return Err(AudioError::UnsupportedFormat(format!("{:?}", other)));
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::Stream(format!("Failed to play audio stream: {}", e)))?;

        debug!(
            "Audio node connected ({} channels at {}Hz)",
            channels, self.sample_rate
        );

        Ok(Box::new(CpalNode {
            stream: Some(stream),
        }))
    }
}

/// A playing cpal stream for one session.
pub struct CpalNode {
    stream: Option<cpal::Stream>,
}

impl AudioNode for CpalNode {
    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause audio stream on disconnect: {}", e);
            }
            debug!("Audio node disconnected");
        }
    }
}

impl Drop for CpalNode {
    fn drop(&mut self) {
        self.disconnect();
    }
}
