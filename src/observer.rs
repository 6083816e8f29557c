// src/observer.rs

//! Build event observation
//!
//! The executor and the retry supervisor report progress through the
//! [`BuildObserver`] trait. Observation is advisory: no engine behavior
//! depends on an observer doing anything with an event.
//!
//! Implementations:
//! - `LogObserver`: logs events through tracing
//! - `SilentObserver`: no-op for scripted/quiet callers
//! - `CallbackObserver`: forwards events to a user function

use std::time::Duration;

use tracing::{info, warn};

use crate::error::Error;

/// Receiver for build lifecycle events.
pub trait BuildObserver: Send + Sync {
    /// A build is starting; `total` is the declared step count
    fn on_build_started(&self, name: &str, fingerprint: &str, total: usize);

    /// A step is about to run for the first time
    fn on_step_started(&self, description: &str, index: usize, total: usize);

    /// A step finished successfully
    fn on_step_completed(&self, description: &str, elapsed: Duration);

    /// A retry is about to happen, after sleeping `delay`
    fn on_retry(&self, description: &str, attempt: u32, max_attempts: u32, delay: Duration);

    /// A step failed for good
    fn on_step_failed(&self, description: &str, attempts: u32, error: &Error);

    /// Every step completed
    fn on_build_completed(&self, name: &str, elapsed: Duration);
}

/// No-op observer
#[derive(Debug, Default)]
pub struct SilentObserver;

impl SilentObserver {
    pub fn new() -> Self {
        Self
    }
}

impl BuildObserver for SilentObserver {
    fn on_build_started(&self, _name: &str, _fingerprint: &str, _total: usize) {}
    fn on_step_started(&self, _description: &str, _index: usize, _total: usize) {}
    fn on_step_completed(&self, _description: &str, _elapsed: Duration) {}
    fn on_retry(&self, _description: &str, _attempt: u32, _max_attempts: u32, _delay: Duration) {}
    fn on_step_failed(&self, _description: &str, _attempts: u32, _error: &Error) {}
    fn on_build_completed(&self, _name: &str, _elapsed: Duration) {}
}

/// Observer that logs events through tracing
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl BuildObserver for LogObserver {
    fn on_build_started(&self, name: &str, fingerprint: &str, total: usize) {
        info!("Building {} ({} steps, fingerprint {:.16})", name, total, fingerprint);
    }

    fn on_step_started(&self, description: &str, index: usize, total: usize) {
        info!("[{}/{}] {}", index + 1, total, description);
    }

    fn on_step_completed(&self, description: &str, elapsed: Duration) {
        info!("{}: done in {:.2}s", description, elapsed.as_secs_f64());
    }

    fn on_retry(&self, description: &str, attempt: u32, max_attempts: u32, delay: Duration) {
        warn!(
            "{}: attempt {}/{} failed, retrying in {:.1}s",
            description,
            attempt,
            max_attempts + 1,
            delay.as_secs_f64()
        );
    }

    fn on_step_failed(&self, description: &str, attempts: u32, error: &Error) {
        warn!("{}: failed after {} attempt(s): {}", description, attempts, error);
    }

    fn on_build_completed(&self, name: &str, elapsed: Duration) {
        info!("{}: build completed in {:.2}s", name, elapsed.as_secs_f64());
    }
}

/// Events emitted by [`CallbackObserver`]
#[derive(Debug, Clone)]
pub enum BuildEvent {
    BuildStarted {
        name: String,
        fingerprint: String,
        total: usize,
    },
    StepStarted {
        description: String,
        index: usize,
        total: usize,
    },
    StepCompleted {
        description: String,
        elapsed: Duration,
    },
    Retry {
        description: String,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    StepFailed {
        description: String,
        attempts: u32,
        message: String,
    },
    BuildCompleted {
        name: String,
        elapsed: Duration,
    },
}

/// Observer that forwards events to a user-provided function
pub struct CallbackObserver<F>
where
    F: Fn(BuildEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(BuildEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> BuildObserver for CallbackObserver<F>
where
    F: Fn(BuildEvent) + Send + Sync,
{
    fn on_build_started(&self, name: &str, fingerprint: &str, total: usize) {
        (self.callback)(BuildEvent::BuildStarted {
            name: name.to_string(),
            fingerprint: fingerprint.to_string(),
            total,
        });
    }

    fn on_step_started(&self, description: &str, index: usize, total: usize) {
        (self.callback)(BuildEvent::StepStarted {
            description: description.to_string(),
            index,
            total,
        });
    }

    fn on_step_completed(&self, description: &str, elapsed: Duration) {
        (self.callback)(BuildEvent::StepCompleted {
            description: description.to_string(),
            elapsed,
        });
    }

    fn on_retry(&self, description: &str, attempt: u32, max_attempts: u32, delay: Duration) {
        (self.callback)(BuildEvent::Retry {
            description: description.to_string(),
            attempt,
            max_attempts,
            delay,
        });
    }

    fn on_step_failed(&self, description: &str, attempts: u32, error: &Error) {
        (self.callback)(BuildEvent::StepFailed {
            description: description.to_string(),
            attempts,
            message: error.to_string(),
        });
    }

    fn on_build_completed(&self, name: &str, elapsed: Duration) {
        (self.callback)(BuildEvent::BuildCompleted {
            name: name.to_string(),
            elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callback_observer_forwards_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let observer = CallbackObserver::new(move |event| {
            captured.lock().unwrap().push(event);
        });

        observer.on_build_started("nginx", "abc123", 3);
        observer.on_step_started("configure", 0, 3);
        observer.on_retry("configure", 1, 3, Duration::from_secs(1));
        observer.on_step_completed("configure", Duration::from_millis(10));
        observer.on_build_completed("nginx", Duration::from_millis(20));

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(matches!(&seen[0], BuildEvent::BuildStarted { total: 3, .. }));
        assert!(matches!(
            &seen[2],
            BuildEvent::Retry { attempt: 1, max_attempts: 3, .. }
        ));
    }

    #[test]
    fn test_silent_observer_is_noop() {
        let observer = SilentObserver::new();
        observer.on_build_started("x", "y", 0);
        observer.on_build_completed("x", Duration::ZERO);
    }
}
