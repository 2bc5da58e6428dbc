//! Core worker thread
//!
//! The emulation core lives on its own thread for its whole lifetime. The
//! session talks to it through a command channel; the worker interleaves
//! those commands with paced frames:
//!
//! ```text
//! loop {
//!     if running and a frame is due -> run_frame, reschedule
//!     else wait for a command until the next frame is due
//! }
//! ```

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use retroshell_shared::KeyMask;

use crate::emulator::{CoreFactory, CoreHandle, CoreInit, Frame, RenderTarget};
use crate::error::{CoreError, SessionError};
use crate::handshake::{CancelToken, Signal, Waiter, handshake};
use crate::pacer::FramePacer;
use crate::session::{SessionStatus, SharedStatus};

pub(crate) enum Command {
    /// Create the core from the install payload and apply the mute flag
    Install(Box<CoreInit>, bool, Signal<Result<(), CoreError>>),
    /// Start (or restart) the frame loop
    Play,
    /// Stop the frame loop; acknowledged once no frame will run
    Pause(Signal<()>),
    KeyState(KeyMask),
    /// Acknowledged once the core has the new value
    Mute(bool, Signal<()>),
    TakeSnapshot(Signal<Result<Vec<u8>, CoreError>>),
    RestoreSnapshot(Vec<u8>, Signal<Result<(), CoreError>>),
    SuspendCartridge(Signal<Option<Vec<u8>>>),
    /// Copy of the last presented frame
    Capture(Signal<Option<Frame>>),
    /// Free the core and exit
    Shutdown,
}

/// Control-side handle to a running worker. Dropping it shuts the worker down.
pub(crate) struct WorkerHandle {
    tx: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn the worker. The returned waiter resolves once the thread is up.
    pub fn spawn(
        factory: Arc<dyn CoreFactory>,
        pacer: FramePacer,
        status: SharedStatus,
    ) -> Result<(Self, Waiter<()>), SessionError> {
        let (tx, rx) = mpsc::channel();
        let (ready, waiter) = handshake("core worker");

        // The core itself is not Send; everything else moves in and the
        // worker is assembled on its own thread
        let thread = thread::Builder::new()
            .name("retroshell-core".to_string())
            .spawn(move || {
                let _guard = PanicGuard(status.clone());
                let worker = CoreWorker {
                    factory,
                    rx,
                    pacer,
                    status,
                    core: None,
                    render_target: None,
                    running: false,
                };
                worker.run(ready)
            })
            .map_err(|e| {
                error!("Failed to spawn core worker: {}", e);
                SessionError::WorkerGone
            })?;

        Ok((
            Self {
                tx,
                thread: Some(thread),
            },
            waiter,
        ))
    }

    /// Fire-and-forget command.
    pub fn send(&self, command: Command) -> Result<(), SessionError> {
        self.tx.send(command).map_err(|_| SessionError::WorkerGone)
    }

    /// Command with a one-shot reply.
    pub fn request<T>(
        &self,
        what: &'static str,
        command: impl FnOnce(Signal<T>) -> Command,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<T, SessionError> {
        let (signal, waiter) = handshake(what);
        self.send(command(signal))?;
        Ok(waiter.wait(timeout, cancel)?)
    }

    /// Free the core and join the thread. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The worker may already be gone; joining is enough then
        let _ = self.tx.send(Command::Shutdown);
        if thread.join().is_err() {
            warn!("Core worker panicked");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pauses the session if the worker thread unwinds, so a dead worker is not
/// reported as playing.
struct PanicGuard(SharedStatus);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Core worker panicked, pausing");
            self.0
                .transition(SessionStatus::Playing, SessionStatus::Paused);
        }
    }
}

struct CoreWorker {
    factory: Arc<dyn CoreFactory>,
    rx: Receiver<Command>,
    pacer: FramePacer,
    status: SharedStatus,
    core: Option<Box<dyn CoreHandle>>,
    render_target: Option<RenderTarget>,
    running: bool,
}

impl CoreWorker {
    fn run(mut self, ready: Signal<()>) {
        debug!("Core worker started");
        ready.send(());

        loop {
            let now = Instant::now();
            if self.running && self.pacer.is_due(now) {
                self.frame();
                continue;
            }

            let command = if self.running {
                match self.rx.recv_timeout(self.pacer.wait(now)) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                }
            };

            if !self.handle(command) {
                break;
            }
        }

        if self.core.take().is_some() {
            debug!("Core instance freed after {} frames", self.pacer.frames());
        }
        debug!("Core worker stopped");
    }

    fn frame(&mut self) {
        // The session may have left Playing since this frame was scheduled
        if self.status.load() != SessionStatus::Playing {
            self.stop();
            return;
        }
        let Some(core) = self.core.as_mut() else {
            self.stop();
            return;
        };

        let start = Instant::now();
        match core.run_frame() {
            Ok(()) => {
                self.pacer.tick(start);
            }
            Err(e) => {
                error!("Frame failed, pausing: {}", e);
                self.status
                    .transition(SessionStatus::Playing, SessionStatus::Paused);
                self.stop();
            }
        }
    }

    fn stop(&mut self) {
        self.running = false;
        self.pacer.reset();
    }

    fn with_core<T>(
        &mut self,
        f: impl FnOnce(&mut dyn CoreHandle) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        match self.core.as_deref_mut() {
            Some(core) => f(core),
            None => Err(CoreError::Internal("core instance not created".to_string())),
        }
    }

    /// Returns false when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Install(init, muted, reply) => {
                let result = if self.core.is_some() {
                    Err(CoreError::Internal("core instance already exists".to_string()))
                } else {
                    let target = init.render_target.clone();
                    self.factory.create(*init).map(|mut core| {
                        core.mute(muted);
                        self.core = Some(core);
                        self.render_target = Some(target);
                        info!("Core instance created");
                    })
                };
                if !reply.send(result) {
                    // Install was abandoned; the core is freed on shutdown
                    debug!("Install reply not delivered");
                }
            }
            Command::Play => {
                if self.core.is_some() {
                    self.pacer.reset();
                    self.running = true;
                } else {
                    warn!("Play requested before the core was created");
                }
            }
            Command::Pause(ack) => {
                self.stop();
                ack.send(());
            }
            Command::KeyState(mask) => {
                if let Some(core) = self.core.as_mut() {
                    core.change_key_state(mask);
                }
            }
            Command::Mute(muted, ack) => {
                if let Some(core) = self.core.as_mut() {
                    core.mute(muted);
                }
                ack.send(());
            }
            Command::TakeSnapshot(reply) => {
                reply.send(self.with_core(|core| core.take_snapshot()));
            }
            Command::RestoreSnapshot(data, reply) => {
                reply.send(self.with_core(|core| core.restore_snapshot(&data)));
            }
            Command::SuspendCartridge(reply) => {
                let sav = self.core.as_mut().and_then(|core| core.suspend_cartridge());
                reply.send(sav);
            }
            Command::Capture(reply) => {
                reply.send(self.render_target.as_ref().and_then(RenderTarget::capture));
            }
            Command::Shutdown => return false,
        }
        true
    }
}
