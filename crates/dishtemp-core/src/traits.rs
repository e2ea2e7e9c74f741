//! Trait abstractions for the collaborators around the reading state machine.
//!
//! [`TemperatureProbe`] is the probe hook (scanning, connecting, reading and
//! reporting status), and [`ResponseSink`] persists a committed reading.
//! Both are black boxes to this crate; [`crate::mock`] provides test
//! implementations.

use async_trait::async_trait;

use dishtemp_types::{ProbeStatus, RequestToken, TaskId, TemperatureReading};

use crate::error::Result;
use crate::events::EventReceiver;
use crate::machine::ActivityTag;

/// The shared temperature probe.
///
/// There is one probe per checklist; it serves one request at a time and
/// reports progress on its event channel.
///
/// # Example
///
/// ```ignore
/// use dishtemp_core::{TemperatureProbe, Result};
///
/// async fn start<P: TemperatureProbe>(probe: &P, task: &TaskId, token: RequestToken) -> Result<()> {
///     let mut events = probe.subscribe();
///     probe.request_reading(task, token).await?;
///     while let Ok(event) = events.recv().await {
///         println!("{:?}", event);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait TemperatureProbe: Send + Sync {
    /// Subscribe to status and reading events.
    fn subscribe(&self) -> EventReceiver;

    /// The most recent status.
    fn status(&self) -> ProbeStatus;

    /// The most recent reading, if any.
    fn latest_reading(&self) -> Option<TemperatureReading>;

    /// Start a reading on behalf of `task_id`.
    ///
    /// Any reading in progress for an earlier request is abandoned. Events
    /// for this request are tagged with `token`.
    async fn request_reading(&self, task_id: &TaskId, token: RequestToken) -> Result<()>;

    /// Abandon the reading in progress.
    async fn cancel_reading(&self) -> Result<()>;

    /// Report user activity so the hook can manage its idle timers.
    async fn on_user_activity(&self, tag: ActivityTag);
}

/// Persistence for committed task responses.
///
/// The value is a Celsius temperature rendered as a string.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Store `value` as the response of `task_id`.
    async fn save_response(&self, task_id: &TaskId, value: String) -> Result<()>;
}
