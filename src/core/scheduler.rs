//! Real-time driver for a session.
//!
//! A worker thread ticks the session at a fixed cadence until the story
//! turns terminal or the scheduler is stopped. A reset after the ending
//! starts it again. Reader commands go through the same mutex as ticks, so
//! the two never interleave.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::config::{ensure, ensure_range, ConfigError};
use crate::core::session::{Session, Step};
use crate::core::story::Story;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock interval between ticks, in milliseconds.
    pub cadence_ms: u64,
    /// Simulated time units per tick.
    pub dt: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 1000,
            dt: 1.0,
        }
    }
}

impl SchedulerConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.cadence_ms > 0, "scheduler cadence must be positive")?;
        ensure_range("scheduler dt", self.dt, f64::MIN_POSITIVE, 3600.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scheduled steps kept for a reader that falls behind. When the buffer is
/// full the oldest step is dropped.
pub const UPDATE_BUFFER: usize = 64;

struct Worker<S: Story> {
    session: Arc<Mutex<Session<S>>>,
    stop_rx: Receiver<()>,
    update_tx: Sender<Step<S>>,
    backlog: Receiver<Step<S>>,
    cadence: Duration,
    dt: f64,
}

impl<S> Worker<S>
where
    S: Story + Send + 'static,
    S::State: Send + Sync,
    S::Notice: Send,
    S::Event: Send,
{
    /// Tick until stopped or terminal, then hand the worker back so it can
    /// be respawned after a reset.
    fn spawn(self) -> JoinHandle<Worker<S>> {
        thread::spawn(move || {
            tracing::info!(story = S::NAME, cadence_ms = self.cadence.as_millis() as u64, "scheduler started");
            loop {
                match self.stop_rx.recv_timeout(self.cadence) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let (step, terminal) = {
                    let mut session = lock(&self.session);
                    if session.is_terminal() {
                        break;
                    }
                    let step = session.tick(self.dt);
                    (step, session.is_terminal())
                };
                self.publish(step);
                if terminal {
                    break;
                }
            }
            tracing::info!(story = S::NAME, "scheduler stopped");
            self
        })
    }

    fn publish(&self, step: Step<S>) {
        let step = match self.update_tx.try_send(step) {
            Ok(()) => return,
            Err(TrySendError::Disconnected(_)) => return,
            Err(TrySendError::Full(step)) => step,
        };
        if self.backlog.try_recv().is_ok() {
            tracing::debug!(story = S::NAME, "update buffer full, dropped oldest step");
        }
        if self.update_tx.try_send(step).is_err() {
            tracing::debug!(story = S::NAME, "update dropped");
        }
    }
}

pub struct Scheduler<S: Story> {
    session: Arc<Mutex<Session<S>>>,
    stop_tx: Sender<()>,
    updates: Receiver<Step<S>>,
    worker: Option<JoinHandle<Worker<S>>>,
}

impl<S> Scheduler<S>
where
    S: Story + Send + 'static,
    S::State: Send + Sync,
    S::Notice: Send,
    S::Event: Send,
{
    /// Spawn the worker thread. The first tick happens one cadence after
    /// start.
    pub fn start(session: Session<S>, config: &SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = Arc::new(Mutex::new(session));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (update_tx, updates) = bounded(UPDATE_BUFFER);

        let worker = Worker {
            session: Arc::clone(&session),
            stop_rx,
            update_tx,
            backlog: updates.clone(),
            cadence: config.cadence(),
            dt: config.dt,
        };

        Ok(Self {
            session,
            stop_tx,
            updates,
            worker: Some(worker.spawn()),
        })
    }

    /// Steps produced by scheduled ticks, in order. Holds at most
    /// [`UPDATE_BUFFER`] steps.
    pub fn updates(&self) -> &Receiver<Step<S>> {
        &self.updates
    }

    pub fn submit(&self, input: &str) -> Step<S> {
        lock(&self.session).submit(input)
    }

    pub fn command(&self, command: &S::Command) -> Step<S> {
        lock(&self.session).command(command)
    }

    pub fn snapshot(&self) -> Arc<S::State> {
        lock(&self.session).snapshot()
    }

    pub fn is_terminal(&self) -> bool {
        lock(&self.session).is_terminal()
    }

    /// Reset the underlying session and keep ticking from the new snapshot.
    /// A worker that exited on terminal is started again; a scheduler that
    /// was stopped stays stopped.
    pub fn reset(&mut self) -> Step<S> {
        let step = lock(&self.session).reset();
        if !self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            return step;
        }
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(worker) => self.worker = Some(worker.spawn()),
                Err(_) => tracing::warn!(story = S::NAME, "scheduler worker panicked"),
            }
        }
        step
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stop ticking and wait for the worker to exit. The worker's sender is
    /// dropped with it, so readers of [`Scheduler::updates`] see the channel
    /// close once drained.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.stop_tx.try_send(());
            if worker.join().is_err() {
                tracing::warn!(story = S::NAME, "scheduler worker panicked");
            }
        }
    }
}

impl<S: Story> Drop for Scheduler<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.stop_tx.try_send(());
            let _ = worker.join();
        }
    }
}
