//! Checklist-level coordination of task readers.
//!
//! A [`Checklist`] owns every [`TaskReader`] on one screen together with the
//! shared probe and [`ReaderRegistry`]. [`Checklist::run`] is the single event
//! loop: probe events, ownership changes and [`ChecklistCommand`]s are handled
//! one at a time, so reader state never needs a lock.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use dishtemp_core::{Checklist, MockProbe, ReaderOptions, RecordingSink};
//! use dishtemp_types::{ReadingState, TaskId};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> dishtemp_core::Result<()> {
//!     let probe = Arc::new(MockProbe::builder().reading(4.5).build());
//!     let mut checklist = Checklist::new(probe, Arc::new(RecordingSink::new()), ReaderOptions::new());
//!     checklist.add_task(TaskId::new("fridge"))?;
//!
//!     let (handle, commands) = dishtemp_core::checklist::command_channel(8);
//!     let events = checklist.subscribe_events();
//!     let shutdown = CancellationToken::new();
//!     let task = tokio::spawn({
//!         let shutdown = shutdown.clone();
//!         async move { checklist.run(events, commands, shutdown).await }
//!     });
//!
//!     handle.press(&TaskId::new("fridge")).await?;
//!     while handle.state_of(&TaskId::new("fridge")).await? != ReadingState::Save {
//!         tokio::task::yield_now().await;
//!     }
//!     shutdown.cancel();
//!     task.await.ok();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dishtemp_types::{ProbeStatus, ReadingState, TaskId};

use crate::error::{Error, Result};
use crate::events::{EventReceiver, ProbeEvent};
use crate::ownership::ReaderRegistry;
use crate::task::{ReaderOptions, ReadingView, TaskReader};
use crate::traits::{ResponseSink, TemperatureProbe};

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// What the host shows.
    #[serde(flatten)]
    pub view: ReadingView,
    /// Whether the current reading has been committed.
    pub saved: bool,
    /// Whether the task is the active reader.
    pub is_owner: bool,
}

/// Commands accepted by [`Checklist::run`].
#[derive(Debug)]
pub enum ChecklistCommand {
    /// Press a task's button.
    Press {
        task_id: TaskId,
        reply: oneshot::Sender<Result<ReadingState>>,
    },
    /// Cancel a task's in-flight reading.
    Cancel {
        task_id: TaskId,
        reply: oneshot::Sender<Result<ReadingState>>,
    },
    /// Snapshot every task.
    Snapshot {
        reply: oneshot::Sender<Vec<TaskSnapshot>>,
    },
}

/// Sending side of a checklist's command channel.
#[derive(Debug, Clone)]
pub struct ChecklistHandle {
    commands: mpsc::Sender<ChecklistCommand>,
}

/// Create a command channel for [`Checklist::run`].
pub fn command_channel(capacity: usize) -> (ChecklistHandle, mpsc::Receiver<ChecklistCommand>) {
    let (commands, rx) = mpsc::channel(capacity);
    (ChecklistHandle { commands }, rx)
}

impl ChecklistHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ChecklistCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Press a task's button.
    pub async fn press(&self, task_id: &TaskId) -> Result<ReadingState> {
        let task_id = task_id.clone();
        self.request(|reply| ChecklistCommand::Press { task_id, reply })
            .await?
    }

    /// Cancel a task's in-flight reading.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<ReadingState> {
        let task_id = task_id.clone();
        self.request(|reply| ChecklistCommand::Cancel { task_id, reply })
            .await?
    }

    /// Snapshot every task.
    pub async fn snapshot(&self) -> Result<Vec<TaskSnapshot>> {
        self.request(|reply| ChecklistCommand::Snapshot { reply })
            .await
    }

    /// Current state of one task.
    pub async fn state_of(&self, task_id: &TaskId) -> Result<ReadingState> {
        self.snapshot()
            .await?
            .into_iter()
            .find(|s| &s.view.task_id == task_id)
            .map(|s| s.view.state)
            .ok_or_else(|| Error::UnknownTask(task_id.clone()))
    }
}

/// The task readers of one checklist and the probe they share.
pub struct Checklist<P: TemperatureProbe> {
    probe: Arc<P>,
    registry: Arc<ReaderRegistry>,
    sink: Arc<dyn ResponseSink>,
    options: ReaderOptions,
    readers: Vec<TaskReader<P>>,
}

impl<P: TemperatureProbe> std::fmt::Debug for Checklist<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checklist")
            .field("owner", &self.registry.owner())
            .field("readers", &self.readers)
            .finish()
    }
}

impl<P: TemperatureProbe> Checklist<P> {
    /// Create an empty checklist with its own registry.
    pub fn new(probe: Arc<P>, sink: Arc<dyn ResponseSink>, options: ReaderOptions) -> Self {
        Self::with_registry(probe, Arc::new(ReaderRegistry::new()), sink, options)
    }

    /// Create an empty checklist sharing an existing registry.
    pub fn with_registry(
        probe: Arc<P>,
        registry: Arc<ReaderRegistry>,
        sink: Arc<dyn ResponseSink>,
        options: ReaderOptions,
    ) -> Self {
        Self {
            probe,
            registry,
            sink,
            options,
            readers: Vec::new(),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<ReaderRegistry> {
        &self.registry
    }

    /// The shared probe.
    pub fn probe(&self) -> &Arc<P> {
        &self.probe
    }

    /// Subscribe to the probe's events, for [`Checklist::run`].
    pub fn subscribe_events(&self) -> EventReceiver {
        self.probe.subscribe()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Whether there are no tasks.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Task identifiers, in insertion order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.readers.iter().map(|r| r.task_id().clone()).collect()
    }

    /// The reader of a task.
    pub fn reader(&self, task_id: &TaskId) -> Option<&TaskReader<P>> {
        self.readers.iter().find(|r| r.task_id() == task_id)
    }

    fn reader_mut(&mut self, task_id: &TaskId) -> Result<&mut TaskReader<P>> {
        self.readers
            .iter_mut()
            .find(|r| r.task_id() == task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.clone()))
    }

    /// Add a task with no stored response.
    pub fn add_task(&mut self, task_id: TaskId) -> Result<()> {
        self.add_task_with_response(task_id, "", false)
    }

    /// Add a task starting from its existing response.
    pub fn add_task_with_response(
        &mut self,
        task_id: TaskId,
        response: impl Into<String>,
        skipped: bool,
    ) -> Result<()> {
        if self.reader(&task_id).is_some() {
            return Err(Error::DuplicateTask(task_id));
        }
        debug!(task_id = %task_id, "Adding task");
        let reader = TaskReader::new(
            task_id,
            Arc::clone(&self.probe),
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
            self.options,
        )
        .with_stored_response(response, skipped);
        self.readers.push(reader);
        Ok(())
    }

    /// Remove a task.
    ///
    /// If the task owns the probe, its in-flight reading is cancelled and
    /// ownership is released.
    pub async fn remove_task(&mut self, task_id: &TaskId) -> Result<()> {
        let index = self
            .readers
            .iter()
            .position(|r| r.task_id() == task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.clone()))?;
        let reader = self.readers.remove(index);

        if let Some(token) = reader.latest_token()
            && self.registry.is_owner(task_id)
        {
            if reader.state().is_active()
                && let Err(e) = self.probe.cancel_reading().await
            {
                warn!(task_id = %task_id, error = %e, "Cancel on removal failed");
            }
            self.registry.release(task_id, token);
        }
        debug!(task_id = %task_id, "Removed task");
        Ok(())
    }

    /// Press a task's button.
    ///
    /// Every other reader re-checks ownership afterwards, so a preempted
    /// task drops its pending reading immediately.
    pub async fn press(&mut self, task_id: &TaskId) -> Result<ReadingState> {
        let state = self.reader_mut(task_id)?.press().await?;
        self.sync_ownership();
        Ok(state)
    }

    /// Cancel a task's in-flight reading.
    pub async fn cancel(&mut self, task_id: &TaskId) -> Result<ReadingState> {
        self.reader_mut(task_id)?.cancel().await
    }

    /// Deliver a probe event to every reader.
    pub fn dispatch(&mut self, event: &ProbeEvent) {
        for reader in &mut self.readers {
            reader.handle_event(event);
        }
    }

    /// Make every reader re-check ownership.
    pub fn sync_ownership(&mut self) {
        for reader in &mut self.readers {
            reader.sync_ownership();
        }
    }

    /// Current state of a task.
    pub fn state_of(&self, task_id: &TaskId) -> Result<ReadingState> {
        self.reader(task_id)
            .map(TaskReader::state)
            .ok_or_else(|| Error::UnknownTask(task_id.clone()))
    }

    /// Snapshot every task, in insertion order.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.readers
            .iter()
            .map(|r| TaskSnapshot {
                view: r.view(),
                saved: r.is_saved(),
                is_owner: self.registry.is_owner(r.task_id()),
            })
            .collect()
    }

    async fn handle_command(&mut self, command: ChecklistCommand) {
        match command {
            ChecklistCommand::Press { task_id, reply } => {
                let result = self.press(&task_id).await;
                if let Err(e) = &result {
                    warn!(task_id = %task_id, error = %e, "Press failed");
                }
                let _ = reply.send(result);
            }
            ChecklistCommand::Cancel { task_id, reply } => {
                let _ = reply.send(self.cancel(&task_id).await);
            }
            ChecklistCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Replay the probe's current status after missed events.
    ///
    /// A finished request also replays its reading, which may have been
    /// among the missed events.
    fn resync(&mut self) {
        let token = self.registry.latest_token();
        let status = self.probe.status();
        if status == ProbeStatus::Done
            && let Some(reading) = self.probe.latest_reading()
        {
            self.dispatch(&ProbeEvent::reading(token, reading));
        }
        self.dispatch(&ProbeEvent::status(token, status));
    }

    /// Run the event loop until `shutdown` fires or both inputs close.
    pub async fn run(
        &mut self,
        mut events: EventReceiver,
        mut commands: mpsc::Receiver<ChecklistCommand>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut ownership = self.registry.subscribe();
        let mut events_open = true;
        let mut commands_open = true;
        info!(tasks = self.readers.len(), "Checklist event loop started");

        while events_open || commands_open {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Checklist shutdown requested");
                    break;
                }
                event = events.recv(), if events_open => match event {
                    Ok(event) => self.dispatch(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Probe events lagged, resyncing from probe status");
                        self.resync();
                    }
                    Err(RecvError::Closed) => {
                        debug!("Probe event channel closed");
                        events_open = false;
                    }
                },
                changed = ownership.changed() => {
                    if changed.is_ok() {
                        ownership.borrow_and_update();
                        self.sync_ownership();
                    }
                }
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
            }
        }

        info!("Checklist event loop stopped");
        Ok(())
    }
}
