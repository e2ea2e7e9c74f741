//! End-to-end scenarios for the checklist event loop.
//!
//! These run a [`Checklist`] against the automatic [`MockProbe`], the way a
//! host drives it: button presses go through the command channel and the
//! probe's events arrive on its broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use dishtemp_core::checklist::command_channel;
use dishtemp_core::{
    Checklist, ChecklistHandle, DisplayPreferences, MockProbe, ReaderOptions, ReaderPolicy,
    RecordingSink,
};
use dishtemp_types::{ReadingState, TaskId, TemperatureUnit};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    handle: ChecklistHandle,
    sink: Arc<RecordingSink>,
    probe: Arc<MockProbe>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(probe: MockProbe, options: ReaderOptions, tasks: &[&str]) -> Self {
        let probe = Arc::new(probe);
        let sink = Arc::new(RecordingSink::new());
        let mut checklist = Checklist::new(Arc::clone(&probe), sink.clone(), options);
        for id in tasks {
            checklist.add_task(TaskId::new(*id)).unwrap();
        }

        let (handle, commands) = command_channel(16);
        let events = checklist.subscribe_events();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                checklist.run(events, commands, shutdown).await.unwrap();
            }
        });

        Self {
            handle,
            sink,
            probe,
            shutdown,
            task,
        }
    }

    async fn wait_for(&self, id: &str, state: ReadingState) {
        let task_id = TaskId::new(id);
        timeout(WAIT, async {
            loop {
                if self.handle.state_of(&task_id).await.unwrap() == state {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("task {} never reached {}", id, state));
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.unwrap();
    }
}

#[tokio::test]
async fn full_reading_shows_value_in_display_unit() {
    let options = ReaderOptions::new()
        .display(DisplayPreferences::new(TemperatureUnit::Fahrenheit).show_both(true));
    let harness = Harness::start(MockProbe::builder().reading(4.5).build(), options, &["a"]);

    harness.handle.press(&TaskId::new("a")).await.unwrap();
    harness.wait_for("a", ReadingState::Save).await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    let temperature = &snapshot[0].view.temperature;
    assert_eq!(temperature.text().as_deref(), Some("40.1 °F"));
    assert_eq!(temperature.alt_text().as_deref(), Some("(4.5 °C)"));
    assert!(snapshot[0].is_owner);
    harness.stop().await;
}

#[tokio::test]
async fn pressing_save_commits_once_in_celsius() {
    let options = ReaderOptions::new().display(DisplayPreferences::new(TemperatureUnit::Fahrenheit));
    let harness = Harness::start(MockProbe::builder().reading(-18.04).build(), options, &["a"]);
    let a = TaskId::new("a");

    harness.handle.press(&a).await.unwrap();
    harness.wait_for("a", ReadingState::Save).await;
    assert_eq!(harness.handle.press(&a).await.unwrap(), ReadingState::Read);

    assert_eq!(harness.sink.saves().await, vec![(a.clone(), "-18.0".to_string())]);
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert!(snapshot[0].saved);
    assert_eq!(snapshot[0].view.state, ReadingState::Read);
    assert_eq!(
        snapshot[0].view.temperature.text().as_deref(),
        Some("-0.4 °F")
    );
    harness.stop().await;
}

#[tokio::test]
async fn second_task_preempts_pending_save() {
    let probe = MockProbe::builder()
        .reading(5.0)
        .step_latency(Duration::from_millis(5))
        .build();
    let harness = Harness::start(probe, ReaderOptions::new(), &["a", "b"]);

    harness.handle.press(&TaskId::new("a")).await.unwrap();
    harness.wait_for("a", ReadingState::Save).await;

    harness.handle.press(&TaskId::new("b")).await.unwrap();
    assert_eq!(
        harness.handle.state_of(&TaskId::new("a")).await.unwrap(),
        ReadingState::Read
    );
    harness.wait_for("b", ReadingState::Save).await;
    assert_eq!(
        harness.handle.state_of(&TaskId::new("a")).await.unwrap(),
        ReadingState::Read
    );
    assert_eq!(harness.sink.save_count(), 0);
    harness.stop().await;
}

#[tokio::test]
async fn device_error_then_retry() {
    let probe = MockProbe::builder().reading(3.0).fail_next(1).build();
    let harness = Harness::start(probe, ReaderOptions::new(), &["a"]);
    let a = TaskId::new("a");

    harness.handle.press(&a).await.unwrap();
    harness.wait_for("a", ReadingState::Error).await;

    assert_eq!(harness.handle.press(&a).await.unwrap(), ReadingState::Error);
    harness.wait_for("a", ReadingState::Save).await;
    assert_eq!(harness.probe.request_count(), 2);
    harness.stop().await;
}

#[tokio::test]
async fn cancel_while_searching_returns_to_read() {
    let probe = MockProbe::builder()
        .step_latency(Duration::from_secs(60))
        .build();
    let harness = Harness::start(probe, ReaderOptions::new(), &["a"]);
    let a = TaskId::new("a");

    harness.handle.press(&a).await.unwrap();
    harness.wait_for("a", ReadingState::Searching).await;
    assert_eq!(harness.handle.cancel(&a).await.unwrap(), ReadingState::Read);
    assert_eq!(harness.probe.cancel_count(), 1);

    // The probe's own NotStarted keeps the task in Read.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.handle.state_of(&a).await.unwrap(), ReadingState::Read);
    harness.stop().await;
}

#[tokio::test]
async fn cancel_in_read_touches_nothing() {
    let harness = Harness::start(MockProbe::builder().build(), ReaderOptions::new(), &["a"]);
    let a = TaskId::new("a");

    assert_eq!(harness.handle.cancel(&a).await.unwrap(), ReadingState::Read);
    assert_eq!(harness.probe.cancel_count(), 0);
    assert_eq!(harness.probe.request_count(), 0);
    assert!(harness.probe.activity().await.is_empty());
    harness.stop().await;
}

#[tokio::test]
async fn inkbird_preemption_reverts_in_flight_reading() {
    let probe = MockProbe::builder()
        .step_latency(Duration::from_secs(60))
        .build();
    let options = ReaderOptions::new().policy(ReaderPolicy::inkbird());
    let harness = Harness::start(probe, options, &["a", "b"]);

    harness.handle.press(&TaskId::new("a")).await.unwrap();
    harness.wait_for("a", ReadingState::Searching).await;
    harness.handle.press(&TaskId::new("b")).await.unwrap();

    assert_eq!(
        harness.handle.state_of(&TaskId::new("a")).await.unwrap(),
        ReadingState::Read
    );
    harness.wait_for("b", ReadingState::Searching).await;
    harness.stop().await;
}

#[tokio::test]
async fn save_failure_is_reported_and_retryable() {
    let harness = Harness::start(MockProbe::builder().reading(2.0).build(), ReaderOptions::new(), &["a"]);
    let a = TaskId::new("a");

    harness.handle.press(&a).await.unwrap();
    harness.wait_for("a", ReadingState::Save).await;

    harness.sink.set_should_fail(true);
    assert!(harness.handle.press(&a).await.is_err());
    assert_eq!(harness.handle.state_of(&a).await.unwrap(), ReadingState::Save);

    harness.sink.set_should_fail(false);
    assert_eq!(harness.handle.press(&a).await.unwrap(), ReadingState::Read);
    assert_eq!(harness.sink.saves().await, vec![(a, "2.0".to_string())]);
    harness.stop().await;
}
