use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use flume::Sender;
use rfscan_messages::{ConnectionState, Event, ReconnectPolicy};

/// Exponential backoff driven by a [`ReconnectPolicy`].
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    base: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            base: policy.initial_delay,
            policy,
            attempt: 0,
        }
    }

    /// Replace the base delay, as the server does with a `retry:` field.
    pub fn set_base(&mut self, base: Duration) {
        self.base = base;
    }

    /// Forget failed attempts after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of failed attempts since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let factor = self.policy.multiplier.max(1).saturating_pow(self.attempt);
        let cap = self.policy.max_delay.max(self.base);
        let delay = self.base.saturating_mul(factor).min(cap);
        self.attempt += 1;
        Some(delay)
    }
}

/// Shared stop flag between the engine and a source worker.
///
/// Worker output goes through [`CancelToken::unless_cancelled`]; once
/// [`CancelToken::cancel`] has returned, nothing more gets through.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    gate: Mutex<()>,
}

const SLEEP_SLICE: Duration = Duration::from_millis(50);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag, waiting for any `unless_cancelled` call in progress.
    pub fn cancel(&self) {
        let _gate = self.lock_gate();
        self.0.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Run `f` unless the token is cancelled.
    pub fn unless_cancelled<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let _gate = self.lock_gate();
        if self.is_cancelled() {
            None
        } else {
            Some(f())
        }
    }

    /// Sleep for `duration`, waking early on cancellation.
    /// Returns `false` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.0.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Why a source worker stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    Cancelled,
    /// Nobody is listening for events anymore.
    ReceiverGone,
}

/// Event sender of a source worker, shut by its cancel token.
#[derive(Debug, Clone)]
pub(crate) struct Outlet {
    event_tx: Sender<Event>,
    cancel: CancelToken,
}

impl Outlet {
    pub fn new(event_tx: Sender<Event>, cancel: CancelToken) -> Self {
        Self { event_tx, cancel }
    }

    pub fn send(&self, event: Event) -> Result<(), Halt> {
        match self.cancel.unless_cancelled(|| self.event_tx.send(event)) {
            None => Err(Halt::Cancelled),
            Some(Err(_)) => Err(Halt::ReceiverGone),
            Some(Ok(())) => Ok(()),
        }
    }

    pub fn connection(&self, state: ConnectionState) -> Result<(), Halt> {
        self.send(Event::Connection(state))
    }

    pub fn ensure_open(&self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Halt> {
        if self.cancel.sleep(duration) {
            Ok(())
        } else {
            Err(Halt::Cancelled)
        }
    }
}
