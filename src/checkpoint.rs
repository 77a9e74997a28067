//! Checkpoints and waiting for them.
//!
//! A checkpoint is a marker the server places in a collection's update
//! queue. Every update sent before it is processed before it is reached.
//! [`CheckPoint::wait`] polls the server until that happens, backing off
//! between polls according to a [`WaitPolicy`].

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CheckpointConfig;
use crate::error::{Error, Result};
use crate::resource::Resource;

/// How to poll while waiting for a checkpoint.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Delay before the second poll.
    pub poll_interval: Duration,
    /// Upper bound on the delay between polls.
    pub max_interval: Duration,
    /// Factor applied to the delay after each poll (1.0 = fixed interval).
    pub backoff_multiplier: f64,
    /// Give up once this much time has been spent sleeping. `None` = never.
    pub max_wait: Option<Duration>,
    /// Set from any thread to abandon the wait at the next poll.
    pub cancel: Arc<AtomicBool>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_wait: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl WaitPolicy {
    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_wait: config.max_wait_secs.map(Duration::from_secs),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// A handle that cancels waits using this policy.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Shortest delay between polls. Shorter intervals in a policy are raised
/// to this, so every sleep counts towards `max_wait`.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Something that can pause the calling thread.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Poll `reached` until it returns true, the policy's `max_wait` is used up,
/// or the wait is cancelled.
pub fn wait_until<F>(
    checkid: &str,
    mut reached: F,
    policy: &WaitPolicy,
    sleeper: &dyn Sleeper,
) -> Result<Duration>
where
    F: FnMut() -> Result<bool>,
{
    let mut interval = policy.poll_interval.max(MIN_POLL_INTERVAL);
    let mut waited = Duration::ZERO;

    loop {
        if policy.is_cancelled() {
            warn!(checkid, ?waited, "checkpoint wait cancelled");
            return Err(Error::WaitCancelled {
                checkid: checkid.to_string(),
            });
        }

        if reached()? {
            info!(checkid, ?waited, "checkpoint reached");
            return Ok(waited);
        }

        if let Some(max_wait) = policy.max_wait {
            if waited.saturating_add(interval) > max_wait {
                warn!(checkid, ?waited, "gave up waiting for checkpoint");
                return Err(Error::CheckpointTimeout {
                    checkid: checkid.to_string(),
                    waited,
                });
            }
        }

        debug!(checkid, ?interval, "checkpoint not reached yet");
        sleeper.sleep(interval);
        waited = waited.saturating_add(interval);

        let next = (interval.as_nanos() as f64 * policy.backoff_multiplier).round() as u64;
        interval = Duration::from_nanos(next)
            .min(policy.max_interval)
            .max(MIN_POLL_INTERVAL);
    }
}

/// A checkpoint created in a collection.
#[derive(Debug, Clone)]
pub struct CheckPoint {
    resource: Resource,
    coll_path: String,
    checkid: String,
    state: Option<Value>,
}

impl CheckPoint {
    /// Wrap the reply of a checkpoint creation request (`{"checkid": ...}`).
    pub(crate) fn from_created(resource: Resource, coll_path: &str, reply: &Value) -> Result<Self> {
        let checkid = reply
            .get("checkid")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Http {
                method: "POST".to_string(),
                path: format!("{}/checkpoint", coll_path),
                status: 200,
                message: format!("reply has no checkid: {}", reply),
            })?;
        Ok(Self {
            resource,
            coll_path: coll_path.to_string(),
            checkid: checkid.to_string(),
            state: None,
        })
    }

    pub fn checkid(&self) -> &str {
        &self.checkid
    }

    /// Last state fetched from the server, if any.
    pub fn state(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    fn path(&self) -> String {
        format!("{}/checkpoint/{}", self.coll_path, self.checkid)
    }

    /// Fetch the current state from the server.
    pub fn refresh(&mut self) -> Result<&Value> {
        let state = self.resource.get(&self.path())?;
        if state.is_null() {
            return Err(Error::CheckpointExpired {
                checkid: self.checkid.clone(),
            });
        }
        Ok(self.state.insert(state))
    }

    fn ensure_state(&mut self) -> Result<&Value> {
        if self.state.is_none() {
            self.refresh()?;
        }
        self.state.as_ref().ok_or_else(|| Error::CheckpointExpired {
            checkid: self.checkid.clone(),
        })
    }

    /// Whether the checkpoint has been reached. Uses the last fetched state,
    /// fetching one first if there is none.
    pub fn reached(&mut self) -> Result<bool> {
        Ok(self
            .ensure_state()?
            .get("reached")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Errors the server recorded while processing updates before the
    /// checkpoint. May be a truncated list; see [`total_errors`](Self::total_errors).
    pub fn errors(&mut self) -> Result<Vec<Value>> {
        Ok(self
            .ensure_state()?
            .get("errors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub fn total_errors(&mut self) -> Result<u64> {
        Ok(self
            .ensure_state()?
            .get("total_errors")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Block until the checkpoint is reached.
    pub fn wait(&mut self, policy: &WaitPolicy) -> Result<Duration> {
        self.wait_with(policy, &ThreadSleeper)
    }

    pub fn wait_with(&mut self, policy: &WaitPolicy, sleeper: &dyn Sleeper) -> Result<Duration> {
        let checkid = self.checkid.clone();
        wait_until(
            &checkid,
            || {
                self.refresh()?;
                self.reached()
            },
            policy,
            sleeper,
        )
    }
}
