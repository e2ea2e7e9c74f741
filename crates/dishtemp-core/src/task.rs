//! Per-task reader bound to the shared probe.
//!
//! A [`TaskReader`] owns one task's [`ReadingMachine`] and performs the
//! effects its transitions ask for: claiming the probe through the
//! [`ReaderRegistry`], requesting or cancelling readings, and committing the
//! reading through the [`ResponseSink`].
//!
//! Probe events carry the [`RequestToken`] of the request they belong to. A
//! reader only honours tagged events for the token it claimed most recently,
//! so late updates from a superseded request cannot move it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dishtemp_types::{
    BatteryStatus, ReadingState, RequestToken, TaskId, TemperatureReading,
};

use crate::display::{self, DisplayPreferences, DisplayTemperature};
use crate::error::{Error, Result};
use crate::events::ProbeEvent;
use crate::machine::{Effect, MachineState, ReaderEvent, ReaderPolicy, ReadingMachine, Transition};
use crate::ownership::ReaderRegistry;
use crate::traits::{ResponseSink, TemperatureProbe};

/// Options for a task reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Transition rules for the probe in use.
    #[serde(default)]
    pub policy: ReaderPolicy,
    /// How temperatures are shown.
    #[serde(default)]
    pub display: DisplayPreferences,
    /// Ignore button presses.
    #[serde(default)]
    pub read_only: bool,
}

impl ReaderOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reader policy.
    #[must_use]
    pub fn policy(mut self, policy: ReaderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the display preferences.
    #[must_use]
    pub fn display(mut self, display: DisplayPreferences) -> Self {
        self.display = display;
        self
    }

    /// Make the reader read-only.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// What a host shows for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingView {
    /// The task.
    pub task_id: TaskId,
    /// Button state.
    pub state: ReadingState,
    /// Button label.
    pub label: String,
    /// Whether the shown temperature is a fresh probe reading awaiting save.
    pub from_probe: bool,
    /// Shown temperature.
    pub temperature: DisplayTemperature,
    /// Probe battery, only for a fresh reading.
    pub battery: Option<BatteryStatus>,
    /// Probe address, only for a fresh reading.
    pub device_address: Option<String>,
}

/// Binds one task to the shared probe.
pub struct TaskReader<P: TemperatureProbe> {
    task_id: TaskId,
    probe: Arc<P>,
    registry: Arc<ReaderRegistry>,
    sink: Arc<dyn ResponseSink>,
    options: ReaderOptions,
    machine: ReadingMachine,
    token: Option<RequestToken>,
    reading: Option<TemperatureReading>,
    stored_response: String,
    skipped: bool,
}

impl<P: TemperatureProbe> std::fmt::Debug for TaskReader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskReader")
            .field("task_id", &self.task_id)
            .field("state", &self.machine.current())
            .field("token", &self.token)
            .field("stored_response", &self.stored_response)
            .finish()
    }
}

impl<P: TemperatureProbe> TaskReader<P> {
    /// Create a reader in the `Read` state with no stored response.
    pub fn new(
        task_id: TaskId,
        probe: Arc<P>,
        registry: Arc<ReaderRegistry>,
        sink: Arc<dyn ResponseSink>,
        options: ReaderOptions,
    ) -> Self {
        Self {
            task_id,
            probe,
            registry,
            sink,
            machine: ReadingMachine::new(options.policy),
            options,
            token: None,
            reading: None,
            stored_response: String::new(),
            skipped: false,
        }
    }

    /// Start from the task's existing response.
    #[must_use]
    pub fn with_stored_response(mut self, response: impl Into<String>, skipped: bool) -> Self {
        self.stored_response = response.into();
        self.skipped = skipped;
        self
    }

    /// The task this reader belongs to.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Current button state.
    pub fn state(&self) -> ReadingState {
        self.machine.state()
    }

    /// Whether the current reading has been committed.
    pub fn is_saved(&self) -> bool {
        self.machine.is_saved()
    }

    /// Token of this reader's most recent request.
    pub fn latest_token(&self) -> Option<RequestToken> {
        self.token
    }

    /// The reading received for the current request, if any.
    pub fn last_reading(&self) -> Option<&TemperatureReading> {
        self.reading.as_ref()
    }

    /// The task's stored response.
    pub fn stored_response(&self) -> &str {
        &self.stored_response
    }

    /// Reader options.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    fn is_owner(&self) -> bool {
        self.registry.is_owner(&self.task_id)
    }

    /// Tagged events for any request other than our latest are stale.
    fn is_stale(&self, request: Option<RequestToken>) -> bool {
        match request {
            Some(request) => self.token != Some(request),
            None => false,
        }
    }

    /// Handle a button press.
    ///
    /// Returns the state after the press. Fails only when committing the
    /// reading fails, in which case the reader stays in `Save`.
    pub async fn press(&mut self) -> Result<ReadingState> {
        if self.options.read_only {
            debug!(task_id = %self.task_id, "Ignoring press on read-only task");
            return Ok(self.state());
        }
        debug!(task_id = %self.task_id, state = %self.state(), "Button pressed");
        let transition = self.machine.peek(self.is_owner(), ReaderEvent::Press);
        self.perform(transition).await
    }

    /// Abandon an in-flight reading.
    ///
    /// Does nothing unless a reading is in progress.
    pub async fn cancel(&mut self) -> Result<ReadingState> {
        let transition = self.machine.peek(self.is_owner(), ReaderEvent::Cancel);
        if transition.is_noop(self.machine.current()) {
            return Ok(self.state());
        }
        debug!(task_id = %self.task_id, state = %self.state(), "Cancelling reading");
        self.perform(transition).await
    }

    /// Apply a probe event.
    pub fn handle_event(&mut self, event: &ProbeEvent) -> ReadingState {
        let is_owner = self.is_owner();
        match event {
            ProbeEvent::Status { request, status } => {
                if self.is_stale(*request) {
                    debug!(
                        task_id = %self.task_id,
                        request = ?request,
                        status = %status,
                        "Ignoring stale status"
                    );
                    self.machine.apply(is_owner, ReaderEvent::OwnershipChanged);
                    return self.state();
                }
                let before = self.state();
                self.machine.apply(is_owner, ReaderEvent::Status(*status));
                if is_owner && before != self.state() {
                    debug!(
                        task_id = %self.task_id,
                        status = %status,
                        from = %before,
                        to = %self.state(),
                        "Reading state changed"
                    );
                }
            }
            ProbeEvent::Reading { request, reading } => {
                if is_owner && !self.is_stale(*request) {
                    debug!(
                        task_id = %self.task_id,
                        celsius = reading.temperature_celsius,
                        "Reading received"
                    );
                    self.reading = Some(reading.clone());
                }
            }
        }
        self.state()
    }

    /// Re-check ownership, dropping an uncommitted reading if preempted.
    pub fn sync_ownership(&mut self) -> ReadingState {
        let before = self.state();
        let owner = self.registry.owner();
        let is_owner = owner.as_ref() == Some(&self.task_id);
        self.machine.apply(is_owner, ReaderEvent::OwnershipChanged);
        if before != self.state() {
            info!(
                task_id = %self.task_id,
                owner = ?owner.as_ref().map(TaskId::as_str),
                "Another task is now reading, reverting to {}",
                self.state()
            );
        }
        self.state()
    }

    /// What a host should show for this task.
    pub fn view(&self) -> ReadingView {
        let state = self.state();
        let fresh = match (state, &self.reading) {
            (ReadingState::Save, Some(reading)) => Some(reading),
            _ => None,
        };
        let prefs = &self.options.display;
        let temperature = match fresh {
            Some(reading) => DisplayTemperature::new(Some(reading.temperature_celsius), true, prefs),
            None => DisplayTemperature::from_response(&self.stored_response, self.skipped, prefs),
        };
        ReadingView {
            task_id: self.task_id.clone(),
            state,
            label: state.label().to_string(),
            from_probe: fresh.is_some(),
            temperature,
            battery: fresh.map(|r| r.battery_status),
            device_address: fresh.map(|r| r.device_address.clone()),
        }
    }

    /// Execute a transition's effects, then adopt its state.
    async fn perform(&mut self, transition: Transition) -> Result<ReadingState> {
        let Transition { mut next, effects } = transition;
        for effect in effects {
            match effect {
                Effect::ClaimProbe => {
                    self.token = Some(self.registry.claim(&self.task_id));
                    self.reading = None;
                }
                Effect::RequestReading => {
                    let token = match self.token {
                        Some(token) => token,
                        None => {
                            let token = self.registry.claim(&self.task_id);
                            self.token = Some(token);
                            token
                        }
                    };
                    info!(task_id = %self.task_id, token = %token, "Requesting temperature reading");
                    if let Err(e) = self.probe.request_reading(&self.task_id, token).await {
                        warn!(task_id = %self.task_id, error = %e, "Reading request failed");
                        next = MachineState {
                            state: ReadingState::Error,
                            ..next
                        };
                    }
                }
                Effect::CancelReading => {
                    if let Err(e) = self.probe.cancel_reading().await {
                        warn!(task_id = %self.task_id, error = %e, "Cancel request failed");
                    }
                }
                Effect::Commit => self.commit().await?,
                Effect::UserActivity(tag) => self.probe.on_user_activity(tag).await,
            }
        }
        self.machine.adopt(next);
        Ok(self.state())
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(reading) = &self.reading else {
            debug!(task_id = %self.task_id, "No reading to save");
            return Ok(());
        };
        let value = display::temperature_to_save(reading.temperature_celsius);
        self.sink
            .save_response(&self.task_id, value.clone())
            .await
            .map_err(|e| match e {
                Error::SaveFailed { .. } => e,
                other => Error::save_failed(self.task_id.clone(), other.to_string()),
            })?;
        info!(task_id = %self.task_id, value = %value, "Temperature saved");
        self.stored_response = value;
        self.skipped = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProbe, RecordingSink};
    use dishtemp_types::{ProbeStatus, TemperatureUnit};

    struct Fixture {
        probe: Arc<MockProbe>,
        registry: Arc<ReaderRegistry>,
        sink: Arc<RecordingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                probe: Arc::new(MockProbe::builder().auto_complete(false).build()),
                registry: Arc::new(ReaderRegistry::new()),
                sink: Arc::new(RecordingSink::new()),
            }
        }

        fn reader(&self, id: &str, options: ReaderOptions) -> TaskReader<MockProbe> {
            TaskReader::new(
                TaskId::new(id),
                Arc::clone(&self.probe),
                Arc::clone(&self.registry),
                self.sink.clone(),
                options,
            )
        }
    }

    fn status(token: Option<RequestToken>, status: ProbeStatus) -> ProbeEvent {
        ProbeEvent::status(token, status)
    }

    async fn read_to_save(fx: &Fixture, reader: &mut TaskReader<MockProbe>, celsius: f32) {
        reader.press().await.unwrap();
        let token = reader.latest_token();
        fx.probe.set_temperature(celsius).await;
        for s in [ProbeStatus::Scanning, ProbeStatus::Connecting, ProbeStatus::Reading] {
            reader.handle_event(&status(token, s));
        }
        let reading = TemperatureReading::new(celsius, "AA:BB");
        reader.handle_event(&ProbeEvent::reading(token, reading));
        reader.handle_event(&status(token, ProbeStatus::Done));
    }

    #[tokio::test]
    async fn test_press_claims_and_requests() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        assert_eq!(reader.press().await.unwrap(), ReadingState::Read);

        let token = reader.latest_token().unwrap();
        assert!(fx.registry.is_owner(&TaskId::new("a")));
        assert_eq!(fx.probe.requests().await, vec![(TaskId::new("a"), token)]);
        assert_eq!(
            fx.probe.activity().await,
            vec![crate::machine::ActivityTag::ReadPressed]
        );
    }

    #[tokio::test]
    async fn test_full_reading_then_save() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        read_to_save(&fx, &mut reader, 4.46).await;
        assert_eq!(reader.state(), ReadingState::Save);

        let view = reader.view();
        assert!(view.from_probe);
        assert_eq!(view.temperature.display_value.as_deref(), Some("4.5"));
        assert_eq!(view.device_address.as_deref(), Some("AA:BB"));
        assert_eq!(view.battery, Some(BatteryStatus::Normal));

        assert_eq!(reader.press().await.unwrap(), ReadingState::Read);
        assert!(reader.is_saved());
        assert_eq!(fx.sink.saves().await, vec![(TaskId::new("a"), "4.5".to_string())]);
        assert_eq!(reader.stored_response(), "4.5");
        assert!(!reader.view().from_probe);
    }

    #[tokio::test]
    async fn test_done_after_save_stays_read() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        read_to_save(&fx, &mut reader, 3.0).await;
        reader.press().await.unwrap();

        let token = reader.latest_token();
        assert_eq!(
            reader.handle_event(&status(token, ProbeStatus::Done)),
            ReadingState::Read
        );
        assert_eq!(fx.sink.save_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_status_is_ignored() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        reader.press().await.unwrap();
        let stale = reader.latest_token();
        reader.handle_event(&status(stale, ProbeStatus::Error));
        reader.press().await.unwrap();
        assert_ne!(reader.latest_token(), stale);

        assert_eq!(
            reader.handle_event(&status(stale, ProbeStatus::Done)),
            ReadingState::Error
        );
        assert_eq!(
            reader.handle_event(&status(reader.latest_token(), ProbeStatus::Scanning)),
            ReadingState::Searching
        );
    }

    #[tokio::test]
    async fn test_untagged_status_is_honoured() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        reader.press().await.unwrap();
        reader.handle_event(&status(reader.latest_token(), ProbeStatus::Scanning));
        assert_eq!(
            reader.handle_event(&status(None, ProbeStatus::NotStarted)),
            ReadingState::Read
        );
    }

    #[tokio::test]
    async fn test_cancel_while_searching() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        reader.press().await.unwrap();
        reader.handle_event(&status(reader.latest_token(), ProbeStatus::Scanning));

        assert_eq!(reader.cancel().await.unwrap(), ReadingState::Read);
        assert_eq!(fx.probe.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_in_read_does_nothing() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        assert_eq!(reader.cancel().await.unwrap(), ReadingState::Read);
        assert_eq!(fx.probe.cancel_count(), 0);
        assert!(fx.probe.activity().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_save_state() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        read_to_save(&fx, &mut reader, 5.0).await;

        fx.sink.set_should_fail(true);
        let err = reader.press().await.unwrap_err();
        assert!(matches!(err, Error::SaveFailed { .. }));
        assert_eq!(reader.state(), ReadingState::Save);
        assert!(!reader.is_saved());

        fx.sink.set_should_fail(false);
        assert_eq!(reader.press().await.unwrap(), ReadingState::Read);
        assert_eq!(fx.sink.saves().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_request_becomes_error() {
        let fx = Fixture::new();
        fx.probe.set_reject_requests(true);
        let mut reader = fx.reader("a", ReaderOptions::new());
        assert_eq!(reader.press().await.unwrap(), ReadingState::Error);

        fx.probe.set_reject_requests(false);
        assert_eq!(reader.press().await.unwrap(), ReadingState::Error);
        assert_eq!(fx.probe.request_count(), 2);
        assert_eq!(
            reader.handle_event(&status(reader.latest_token(), ProbeStatus::Scanning)),
            ReadingState::Searching
        );
    }

    #[tokio::test]
    async fn test_preempted_reader_drops_save() {
        let fx = Fixture::new();
        let mut a = fx.reader("a", ReaderOptions::new());
        let mut b = fx.reader("b", ReaderOptions::new());
        read_to_save(&fx, &mut a, 4.0).await;

        b.press().await.unwrap();
        assert_eq!(a.sync_ownership(), ReadingState::Read);
        assert!(!a.view().from_probe);

        // B's statuses do not move A.
        assert_eq!(
            a.handle_event(&status(b.latest_token(), ProbeStatus::Done)),
            ReadingState::Read
        );
        assert_eq!(
            b.handle_event(&status(b.latest_token(), ProbeStatus::Done)),
            ReadingState::Save
        );
        assert_eq!(fx.sink.save_count(), 0);
    }

    #[tokio::test]
    async fn test_read_only_ignores_press() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new().read_only(true));
        assert_eq!(reader.press().await.unwrap(), ReadingState::Read);
        assert_eq!(fx.probe.request_count(), 0);
    }

    #[tokio::test]
    async fn test_view_uses_stored_response() {
        let fx = Fixture::new();
        let options = ReaderOptions::new()
            .display(DisplayPreferences::new(TemperatureUnit::Fahrenheit).show_both(true));
        let reader = fx.reader("a", options).with_stored_response("0", false);
        let view = reader.view();
        assert_eq!(view.label, "Read");
        assert_eq!(view.temperature.text().as_deref(), Some("32.0 °F"));
        assert_eq!(view.temperature.alt_text().as_deref(), Some("(0.0 °C)"));
        assert_eq!(view.battery, None);

        let skipped = fx.reader("b", options).with_stored_response("0", true);
        assert!(!skipped.view().temperature.has_value());
    }

    #[tokio::test]
    async fn test_save_without_reading_saves_nothing() {
        let fx = Fixture::new();
        let mut reader = fx.reader("a", ReaderOptions::new());
        reader.press().await.unwrap();
        reader.handle_event(&status(reader.latest_token(), ProbeStatus::Done));
        assert_eq!(reader.state(), ReadingState::Save);

        assert_eq!(reader.press().await.unwrap(), ReadingState::Read);
        assert!(reader.is_saved());
        assert_eq!(fx.sink.save_count(), 0);
    }
}
