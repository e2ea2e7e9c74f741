//! Mock probe and response sink for testing.
//!
//! This module provides a mock probe that can be used for unit testing and
//! simulation without Bluetooth hardware.
//!
//! [`MockProbe`] implements [`TemperatureProbe`], and [`RecordingSink`]
//! implements [`ResponseSink`], so both can stand in for the real
//! collaborators in generic code.
//!
//! # Features
//!
//! - **Automatic readings**: each request plays Scanning → Connecting →
//!   Reading → Done, tagged with the request's token. `Scanning` is published
//!   before `request_reading` returns.
//! - **Manual mode**: tests emit statuses and readings themselves
//! - **Failure injection**: end the next requests in `Error`, or fail the
//!   request call itself
//! - **Latency simulation**: delay between status steps

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dishtemp_types::{BatteryStatus, ProbeStatus, RequestToken, TaskId, TemperatureReading};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, ProbeEvent};
use crate::machine::ActivityTag;
use crate::traits::{ResponseSink, TemperatureProbe};

/// Publishes probe events and keeps the latest status and reading.
#[derive(Debug, Clone)]
struct Publisher {
    dispatcher: EventDispatcher,
    status: Arc<watch::Sender<ProbeStatus>>,
    latest: Arc<watch::Sender<Option<TemperatureReading>>>,
}

impl Publisher {
    fn new() -> Self {
        Self {
            dispatcher: EventDispatcher::default(),
            status: Arc::new(watch::channel(ProbeStatus::NotStarted).0),
            latest: Arc::new(watch::channel(None).0),
        }
    }

    // A status visible through `status()` always has its event queued already.
    fn status(&self, request: Option<RequestToken>, status: ProbeStatus) {
        self.dispatcher.send(ProbeEvent::status(request, status));
        self.status.send_replace(status);
    }

    fn reading(&self, request: Option<RequestToken>, reading: TemperatureReading) {
        self.dispatcher
            .send(ProbeEvent::reading(request, reading.clone()));
        self.latest.send_replace(Some(reading));
    }
}

/// A mock temperature probe for testing.
///
/// # Example
///
/// ```
/// use dishtemp_core::{MockProbe, ProbeEvent, TemperatureProbe};
/// use dishtemp_types::{ProbeStatus, RequestToken, TaskId};
///
/// #[tokio::main]
/// async fn main() {
///     let probe = MockProbe::builder().reading(3.5).build();
///     let mut events = probe.subscribe();
///     let token = RequestToken::new(1);
///     probe.request_reading(&TaskId::new("fridge"), token).await.unwrap();
///
///     // Scanning, Connecting, Reading, the reading itself, then Done
///     let mut last = None;
///     for _ in 0..5 {
///         last = Some(events.recv().await.unwrap());
///     }
///     assert_eq!(last, Some(ProbeEvent::status(Some(token), ProbeStatus::Done)));
/// }
/// ```
pub struct MockProbe {
    address: String,
    publisher: Publisher,
    reading_celsius: RwLock<f32>,
    battery: RwLock<BatteryStatus>,
    auto_complete: AtomicBool,
    /// Delay between status steps in milliseconds (0 = no delay).
    step_latency_ms: AtomicU64,
    /// Number of upcoming requests that end in `Error`.
    remaining_failures: AtomicU32,
    /// Make `request_reading` itself return an error.
    reject_requests: AtomicBool,
    request_count: AtomicU32,
    cancel_count: AtomicU32,
    requests: Mutex<Vec<(TaskId, RequestToken)>>,
    activity: Mutex<Vec<ActivityTag>>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for MockProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProbe")
            .field("address", &self.address)
            .field("status", &*self.publisher.status.borrow())
            .field("requests", &self.request_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        MockProbeBuilder::default().build()
    }
}

impl MockProbe {
    /// Create a builder.
    pub fn builder() -> MockProbeBuilder {
        MockProbeBuilder::new()
    }

    /// The probe's address.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn make_reading(&self) -> TemperatureReading {
        TemperatureReading::new(*self.reading_celsius.read().await, self.address.clone())
            .with_battery(*self.battery.read().await)
            .captured_now()
    }

    async fn stop_in_flight(&self) {
        if let Some(token) = self.in_flight.lock().await.take() {
            token.cancel();
        }
    }

    // --- Test control methods ---

    /// Set the temperature future readings report.
    pub async fn set_temperature(&self, celsius: f32) {
        *self.reading_celsius.write().await = celsius;
    }

    /// Set the battery status future readings report.
    pub async fn set_battery(&self, battery: BatteryStatus) {
        *self.battery.write().await = battery;
    }

    /// Enable or disable automatic status sequences.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::Relaxed);
    }

    /// Set the delay between status steps.
    pub fn set_step_latency(&self, latency: Duration) {
        self.step_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// End the next `count` requests in `Error` after scanning.
    pub fn fail_next(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Make `request_reading` return an error.
    pub fn set_reject_requests(&self, reject: bool) {
        self.reject_requests.store(reject, Ordering::Relaxed);
    }

    /// Publish a status event.
    pub fn emit_status(&self, request: Option<RequestToken>, status: ProbeStatus) {
        self.publisher.status(request, status);
    }

    /// Publish a reading event using the configured temperature and battery.
    pub async fn emit_reading(&self, request: Option<RequestToken>) {
        let reading = self.make_reading().await;
        self.publisher.reading(request, reading);
    }

    /// Publish a reading and then `Done`, as a finished request would.
    pub async fn complete(&self, request: Option<RequestToken>) {
        self.emit_reading(request).await;
        self.emit_status(request, ProbeStatus::Done);
    }

    /// Number of `request_reading` calls.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Number of `cancel_reading` calls.
    pub fn cancel_count(&self) -> u32 {
        self.cancel_count.load(Ordering::Relaxed)
    }

    /// All requests received, in order.
    pub async fn requests(&self) -> Vec<(TaskId, RequestToken)> {
        self.requests.lock().await.clone()
    }

    /// All activity tags received, in order.
    pub async fn activity(&self) -> Vec<ActivityTag> {
        self.activity.lock().await.clone()
    }
}

/// Wait one step. Returns `false` if the request was cancelled.
async fn pause(latency: Duration, cancel: &CancellationToken) -> bool {
    if latency.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(latency) => true,
    }
}

/// Play the rest of a request's status sequence after `Scanning`.
async fn play_sequence(
    publisher: Publisher,
    request: RequestToken,
    reading: TemperatureReading,
    latency: Duration,
    fail: bool,
    cancel: CancellationToken,
) {
    if !pause(latency, &cancel).await {
        return;
    }
    if fail {
        debug!(token = %request, "Mock probe failing request");
        publisher.status(Some(request), ProbeStatus::Error);
        return;
    }
    for status in [ProbeStatus::Connecting, ProbeStatus::Reading] {
        publisher.status(Some(request), status);
        if !pause(latency, &cancel).await {
            return;
        }
    }
    publisher.reading(Some(request), reading);
    publisher.status(Some(request), ProbeStatus::Done);
}

#[async_trait]
impl TemperatureProbe for MockProbe {
    fn subscribe(&self) -> EventReceiver {
        self.publisher.dispatcher.subscribe()
    }

    fn status(&self) -> ProbeStatus {
        *self.publisher.status.borrow()
    }

    fn latest_reading(&self) -> Option<TemperatureReading> {
        self.publisher.latest.borrow().clone()
    }

    async fn request_reading(&self, task_id: &TaskId, token: RequestToken) -> Result<()> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().await.push((task_id.clone(), token));

        if self.reject_requests.load(Ordering::Relaxed) {
            return Err(Error::probe("request_reading", "mock probe rejected request"));
        }

        self.stop_in_flight().await;
        if !self.auto_complete.load(Ordering::Relaxed) {
            return Ok(());
        }

        let fail = self
            .remaining_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        let cancel = CancellationToken::new();
        *self.in_flight.lock().await = Some(cancel.clone());

        let reading = self.make_reading().await;
        self.publisher.status(Some(token), ProbeStatus::Scanning);
        let latency = Duration::from_millis(self.step_latency_ms.load(Ordering::Relaxed));
        tokio::spawn(play_sequence(
            self.publisher.clone(),
            token,
            reading,
            latency,
            fail,
            cancel,
        ));
        Ok(())
    }

    async fn cancel_reading(&self) -> Result<()> {
        self.cancel_count.fetch_add(1, Ordering::Relaxed);
        self.stop_in_flight().await;
        self.publisher.status(None, ProbeStatus::NotStarted);
        Ok(())
    }

    async fn on_user_activity(&self, tag: ActivityTag) {
        self.activity.lock().await.push(tag);
    }
}

/// Builder for creating mock probes with custom settings.
#[derive(Debug)]
pub struct MockProbeBuilder {
    address: Option<String>,
    reading_celsius: f32,
    battery: BatteryStatus,
    auto_complete: bool,
    step_latency: Duration,
    failures: u32,
}

impl Default for MockProbeBuilder {
    fn default() -> Self {
        Self {
            address: None,
            reading_celsius: 4.5,
            battery: BatteryStatus::Normal,
            auto_complete: true,
            step_latency: Duration::ZERO,
            failures: 0,
        }
    }
}

impl MockProbeBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the probe address.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    /// Set the temperature readings report, in Celsius.
    #[must_use]
    pub fn reading(mut self, celsius: f32) -> Self {
        self.reading_celsius = celsius;
        self
    }

    /// Set the battery status readings report.
    #[must_use]
    pub fn battery(mut self, battery: BatteryStatus) -> Self {
        self.battery = battery;
        self
    }

    /// Play status sequences automatically (default) or leave it to the test.
    #[must_use]
    pub fn auto_complete(mut self, enabled: bool) -> Self {
        self.auto_complete = enabled;
        self
    }

    /// Delay between status steps.
    #[must_use]
    pub fn step_latency(mut self, latency: Duration) -> Self {
        self.step_latency = latency;
        self
    }

    /// End the first `count` requests in `Error`.
    #[must_use]
    pub fn fail_next(mut self, count: u32) -> Self {
        self.failures = count;
        self
    }

    /// Build the mock probe.
    #[must_use]
    pub fn build(self) -> MockProbe {
        let address = self
            .address
            .unwrap_or_else(|| format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF));
        MockProbe {
            address,
            publisher: Publisher::new(),
            reading_celsius: RwLock::new(self.reading_celsius),
            battery: RwLock::new(self.battery),
            auto_complete: AtomicBool::new(self.auto_complete),
            step_latency_ms: AtomicU64::new(self.step_latency.as_millis() as u64),
            remaining_failures: AtomicU32::new(self.failures),
            reject_requests: AtomicBool::new(false),
            request_count: AtomicU32::new(0),
            cancel_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            activity: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
        }
    }
}

/// A response sink that records every save.
#[derive(Debug, Default)]
pub struct RecordingSink {
    saves: Mutex<Vec<(TaskId, String)>>,
    save_count: AtomicU32,
    should_fail: AtomicBool,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// All successful saves, in order.
    pub async fn saves(&self) -> Vec<(TaskId, String)> {
        self.saves.lock().await.clone()
    }

    /// Number of save attempts, including failed ones.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn save_response(&self, task_id: &TaskId, value: String) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::Relaxed);
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::save_failed(task_id.clone(), "mock sink failure"));
        }
        self.saves.lock().await.push((task_id.clone(), value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(rx: &mut EventReceiver, n: usize) -> Vec<ProbeEvent> {
        let mut events = Vec::with_capacity(n);
        for _ in 0..n {
            events.push(rx.recv().await.unwrap());
        }
        events
    }

    fn statuses(events: &[ProbeEvent]) -> Vec<ProbeStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                ProbeEvent::Status { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_auto_sequence_is_tagged() {
        let probe = MockProbe::builder().address("AA:BB").reading(2.5).build();
        let mut rx = probe.subscribe();
        let token = RequestToken::new(4);
        probe
            .request_reading(&TaskId::new("a"), token)
            .await
            .unwrap();

        let events = collect(&mut rx, 5).await;
        assert!(events.iter().all(|e| e.request() == Some(token)));
        assert_eq!(
            statuses(&events),
            vec![
                ProbeStatus::Scanning,
                ProbeStatus::Connecting,
                ProbeStatus::Reading,
                ProbeStatus::Done,
            ]
        );
        let reading = probe.latest_reading().unwrap();
        assert_eq!(reading.temperature_celsius, 2.5);
        assert_eq!(reading.device_address, "AA:BB");
        assert!(reading.captured_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let probe = MockProbe::builder().fail_next(1).build();
        let mut rx = probe.subscribe();
        probe
            .request_reading(&TaskId::new("a"), RequestToken::new(1))
            .await
            .unwrap();
        let events = collect(&mut rx, 2).await;
        assert_eq!(
            statuses(&events),
            vec![ProbeStatus::Scanning, ProbeStatus::Error]
        );

        probe
            .request_reading(&TaskId::new("a"), RequestToken::new(2))
            .await
            .unwrap();
        let events = collect(&mut rx, 5).await;
        assert_eq!(statuses(&events).last(), Some(&ProbeStatus::Done));
    }

    #[tokio::test]
    async fn test_cancel_stops_sequence() {
        let probe = MockProbe::builder()
            .step_latency(Duration::from_secs(60))
            .build();
        let mut rx = probe.subscribe();
        probe
            .request_reading(&TaskId::new("a"), RequestToken::new(1))
            .await
            .unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            ProbeEvent::status(Some(RequestToken::new(1)), ProbeStatus::Scanning)
        );

        probe.cancel_reading().await.unwrap();
        let next = rx.recv().await.unwrap();
        assert_eq!(next, ProbeEvent::status(None, ProbeStatus::NotStarted));
        assert_eq!(probe.cancel_count(), 1);
        assert_eq!(probe.status(), ProbeStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_manual_mode_records_requests() {
        let probe = MockProbe::builder().auto_complete(false).build();
        let mut rx = probe.subscribe();
        probe
            .request_reading(&TaskId::new("a"), RequestToken::new(1))
            .await
            .unwrap();
        probe.on_user_activity(ActivityTag::ReadPressed).await;

        assert_eq!(probe.request_count(), 1);
        assert_eq!(
            probe.requests().await,
            vec![(TaskId::new("a"), RequestToken::new(1))]
        );
        assert_eq!(probe.activity().await, vec![ActivityTag::ReadPressed]);
        assert!(rx.try_recv().is_err());

        probe.complete(Some(RequestToken::new(1))).await;
        assert!(matches!(rx.recv().await.unwrap(), ProbeEvent::Reading { .. }));
        assert_eq!(probe.status(), ProbeStatus::Done);
    }

    #[tokio::test]
    async fn test_rejected_request() {
        let probe = MockProbe::builder().build();
        probe.set_reject_requests(true);
        let result = probe
            .request_reading(&TaskId::new("a"), RequestToken::new(1))
            .await;
        assert!(matches!(result, Err(Error::Probe { .. })));
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.save_response(&TaskId::new("a"), "4.5".to_string())
            .await
            .unwrap();
        sink.set_should_fail(true);
        assert!(
            sink.save_response(&TaskId::new("a"), "5.0".to_string())
                .await
                .is_err()
        );
        assert_eq!(sink.save_count(), 2);
        assert_eq!(
            sink.saves().await,
            vec![(TaskId::new("a"), "4.5".to_string())]
        );
    }
}
