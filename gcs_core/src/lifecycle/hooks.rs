//! Bounded execution of plugin hooks

use crate::plugin::{Plugin, SharedPlugin};
use crossbeam::channel::{bounded, RecvTimeoutError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

/// How a hook call ended
#[derive(Debug)]
pub enum HookOutcome<T> {
    Completed(T),
    /// The hook panicked or could not be started
    Failed(String),
    /// The hook did not return in time and was left running
    TimedOut,
}

/// Runs hooks on a named thread bounded by a timeout, or inline without one
#[derive(Debug, Clone, Copy)]
pub struct HookRunner {
    timeout: Option<Duration>,
}

impl HookRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Call `hook` on the plugin object
    ///
    /// Must not be called with the registry lock held.
    pub fn run<T, F>(&self, plugin_name: &str, plugin: SharedPlugin, hook: F) -> HookOutcome<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Plugin) -> T + Send + 'static,
    {
        let call = move || {
            panic::catch_unwind(AssertUnwindSafe(|| {
                let mut guard = plugin.lock();
                hook(&mut **guard)
            }))
            .map_err(|payload| panic_message(&*payload))
        };

        let Some(timeout) = self.timeout else {
            return match call() {
                Ok(value) => HookOutcome::Completed(value),
                Err(message) => HookOutcome::Failed(format!("panicked: {}", message)),
            };
        };

        let (done_tx, done_rx) = bounded(1);
        let spawned = thread::Builder::new()
            .name(format!("gcs-hook-{}", plugin_name))
            .spawn(move || {
                let _ = done_tx.send(call());
            });
        if let Err(e) = spawned {
            return HookOutcome::Failed(format!("cannot start hook thread: {}", e));
        }

        match done_rx.recv_timeout(timeout) {
            Ok(Ok(value)) => HookOutcome::Completed(value),
            Ok(Err(message)) => HookOutcome::Failed(format!("panicked: {}", message)),
            Err(RecvTimeoutError::Timeout) => HookOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => {
                HookOutcome::Failed("hook thread exited without a result".to_string())
            }
        }
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
