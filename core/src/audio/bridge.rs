//! Producer/consumer sample channel between the core and the audio callback
//!
//! ```text
//! Core Worker Thread                       Audio Device Thread
//!     │                                          │
//! [run_frame]                                    │
//!     │                                          │
//! [AudioSink::push_*]─────────(ring)──────►[AudioRenderer::render_*]
//!                                                │
//!                                     (silence when starved)
//! ```
//!
//! Samples travel as interleaved stereo `f32` pairs. The renderer never
//! blocks: a callback that finds less than one quantum buffered emits
//! silence and counts an underrun instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use tracing::trace;

use super::GainStage;

/// Whether the stream is still producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Keep the output node running
    Active,
    /// The producer closed the stream; the host may tear the node down
    Inactive,
}

#[derive(Debug)]
struct BridgeShared {
    active: AtomicBool,
    underruns: AtomicU64,
    frames_rendered: AtomicU64,
    samples_dropped: AtomicU64,
}

/// Create a bridge holding up to `capacity` mono values (rounded up to whole
/// stereo pairs).
pub fn audio_bridge(capacity: usize, gain: GainStage) -> (AudioSink, AudioRenderer) {
    let capacity = (capacity.max(2) + 1) & !1;
    let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
    let shared = Arc::new(BridgeShared {
        active: AtomicBool::new(true),
        underruns: AtomicU64::new(0),
        frames_rendered: AtomicU64::new(0),
        samples_dropped: AtomicU64::new(0),
    });

    let sink = AudioSink {
        producer,
        shared: shared.clone(),
        scratch: Vec::new(),
    };
    let renderer = AudioRenderer {
        consumer,
        shared,
        gain,
        scratch: Vec::new(),
    };
    (sink, renderer)
}

/// Writable end of the bridge, handed to the emulation core.
pub struct AudioSink {
    producer: HeapProd<f32>,
    shared: Arc<BridgeShared>,
    /// Interleave buffer for planar pushes
    scratch: Vec<f32>,
}

impl AudioSink {
    /// Push interleaved stereo samples (left, right, left, right, ...).
    ///
    /// A trailing unpaired value is ignored. Samples that do not fit are
    /// dropped; the core keeps running and audio recovers once the consumer
    /// catches up. Returns the number of values accepted.
    pub fn push_interleaved(&mut self, samples: &[f32]) -> usize {
        let paired = samples.len() & !1;
        let room = self.producer.vacant_len() & !1;
        let n = paired.min(room);
        let pushed = self.producer.push_slice(&samples[..n]);
        if pushed < paired {
            let dropped = (paired - pushed) as u64;
            self.shared.samples_dropped.fetch_add(dropped, Ordering::Relaxed);
            trace!("Audio bridge full: dropped {} samples", dropped);
        }
        pushed
    }

    /// Push planar stereo samples. Extra samples on the longer side are ignored.
    pub fn push_planar(&mut self, left: &[f32], right: &[f32]) -> usize {
        let frames = left.len().min(right.len());
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.reserve(frames * 2);
        for (l, r) in left.iter().zip(right.iter()) {
            scratch.push(*l);
            scratch.push(*r);
        }
        let pushed = self.push_interleaved(&scratch);
        self.scratch = scratch;
        pushed
    }

    /// Mark end of stream. The renderer reports [`RenderStatus::Inactive`] from now on.
    pub fn close(&self) {
        self.shared.active.store(false, Ordering::Release);
    }

    /// Counters shared with the renderer.
    pub fn stats(&self) -> AudioBridgeStats {
        AudioBridgeStats {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer end of the bridge, driven by the audio device callback.
pub struct AudioRenderer {
    consumer: HeapCons<f32>,
    shared: Arc<BridgeShared>,
    gain: GainStage,
    /// Pre-allocated pop buffer (grows only when the quantum grows)
    scratch: Vec<f32>,
}

impl AudioRenderer {
    /// Number of buffered mono values.
    pub fn buffered(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Pop one quantum of stereo frames into `scratch`, or return `None` and
    /// count an underrun when less than a full quantum is buffered.
    fn pop_quantum(&mut self, frames: usize) -> Option<&[f32]> {
        let needed = frames * 2;
        if self.scratch.len() < needed {
            self.scratch.resize(needed, 0.0);
        }
        if self.consumer.occupied_len() < needed {
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let popped = self.consumer.pop_slice(&mut self.scratch[..needed]);
        debug_assert_eq!(popped, needed);
        self.shared
            .frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);
        Some(&self.scratch[..needed])
    }

    /// Fill an interleaved output buffer with `channels` channels.
    ///
    /// Mono output mixes both sides; channels past the second are silent.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) -> RenderStatus {
        if !self.shared.active.load(Ordering::Acquire) {
            out.fill(0.0);
            return RenderStatus::Inactive;
        }
        if channels == 0 {
            out.fill(0.0);
            return RenderStatus::Active;
        }

        let frames = out.len() / channels;
        let gain = self.gain.get();
        let Some(stereo) = self.pop_quantum(frames) else {
            out.fill(0.0);
            return RenderStatus::Active;
        };

        for (frame, pair) in out.chunks_mut(channels).zip(stereo.chunks_exact(2)) {
            let (l, r) = (pair[0] * gain, pair[1] * gain);
            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [left, right, rest @ ..] => {
                    *left = l;
                    *right = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
        // Trailing partial frame
        out[frames * channels..].fill(0.0);
        RenderStatus::Active
    }

    /// Fill separate left/right output buffers, keeping channel order.
    pub fn render_planar(&mut self, left: &mut [f32], right: &mut [f32]) -> RenderStatus {
        if !self.shared.active.load(Ordering::Acquire) {
            left.fill(0.0);
            right.fill(0.0);
            return RenderStatus::Inactive;
        }

        let frames = left.len().min(right.len());
        let gain = self.gain.get();
        let Some(stereo) = self.pop_quantum(frames) else {
            left.fill(0.0);
            right.fill(0.0);
            return RenderStatus::Active;
        };

        for (i, pair) in stereo.chunks_exact(2).enumerate() {
            left[i] = pair[0] * gain;
            right[i] = pair[1] * gain;
        }
        left[frames..].fill(0.0);
        right[frames..].fill(0.0);
        RenderStatus::Active
    }

    /// Counters shared with the sink.
    pub fn stats(&self) -> AudioBridgeStats {
        AudioBridgeStats {
            shared: self.shared.clone(),
        }
    }
}

/// Read-only view of bridge health counters.
#[derive(Debug, Clone)]
pub struct AudioBridgeStats {
    shared: Arc<BridgeShared>,
}

impl AudioBridgeStats {
    /// Callbacks that found less than one quantum buffered and emitted silence.
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }

    /// Stereo frames delivered to the device.
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }

    /// Mono values the sink had to discard because the ring was full.
    pub fn samples_dropped(&self) -> u64 {
        self.shared.samples_dropped.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }
}
