//! The reading state machine.
//!
//! A task's "read temperature" button is driven by two inputs: the shared
//! probe's status stream and the user's presses. [`transition`] is a pure
//! function of the current [`MachineState`], whether the task currently owns
//! the probe, and the incoming [`ReaderEvent`]. It returns the next state and
//! the side effects the host must perform, in order. Nothing in this module
//! touches the probe, the registry or the response sink.
//!
//! # Transitions
//!
//! | From | Event | To | Effects |
//! |------|-------|----|---------|
//! | any (not owner) | any | `Read` if in `Save` | none |
//! | any (owner) | status `NotStarted` | `Read` | none |
//! | any (owner) | status `Scanning` | `Searching`, saved flag cleared | none |
//! | any (owner) | status `Connecting` | `Connecting` | none |
//! | any (owner) | status `Reading` | `Reading` | none |
//! | any (owner) | status `Done` | `Save`, or `Read` when already saved | none |
//! | any (owner) | status `Error` | `Error` | none |
//! | `Read` | press | `Read`, saved flag cleared | claim, request, activity |
//! | `Searching`, `Reading` | press / cancel | `Read` | cancel, activity |
//! | in flight (not owner) | press / cancel | `Read` | activity |
//! | `Save` | press | `Read`, saved flag set | commit, activity |
//! | `Error` | press | `Error` | claim, request, activity |
//!
//! [`ReaderPolicy`] switches the handful of rules that differ between probe
//! integrations.

use serde::{Deserialize, Serialize};

use dishtemp_types::{ProbeStatus, ReadingState};

use crate::error::{Error, Result};

/// Rules that differ between probe integrations.
///
/// The default is [`ReaderPolicy::dish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPolicy {
    /// When preempted, revert any active state (not only `Save`) to `Read`.
    pub revert_all_on_preempt: bool,
    /// Allow pressing the button while `Connecting` to cancel.
    pub cancel_while_connecting: bool,
    /// Treat `NotStarted` during an active reading as a dropped connection
    /// (`Error`), and keep `Error` when `NotStarted` arrives.
    pub not_started_interrupts: bool,
    /// On `Done` after the reading was already saved, go to `Read`
    /// (otherwise the state is left unchanged).
    pub done_after_save_resets: bool,
}

impl Default for ReaderPolicy {
    fn default() -> Self {
        Self::dish()
    }
}

impl ReaderPolicy {
    /// Policy for the dish temperature probe.
    pub fn dish() -> Self {
        Self {
            revert_all_on_preempt: false,
            cancel_while_connecting: false,
            not_started_interrupts: false,
            done_after_save_resets: true,
        }
    }

    /// Policy for Inkbird probes, whose connection can drop mid-reading.
    pub fn inkbird() -> Self {
        Self {
            revert_all_on_preempt: true,
            cancel_while_connecting: true,
            not_started_interrupts: true,
            done_after_save_resets: false,
        }
    }

    /// Look up a named policy (`dish` or `inkbird`).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "dish" | "dishtemp" => Ok(Self::dish()),
            "inkbird" => Ok(Self::inkbird()),
            other => Err(Error::invalid_config(format!(
                "unknown reader policy '{}' (expected dish or inkbird)",
                other
            ))),
        }
    }
}

/// User actions reported to the probe hook as activity.
///
/// The hook uses these to manage its own idle timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTag {
    /// A new reading was requested.
    ReadPressed,
    /// An in-flight reading was cancelled.
    CancelPressed,
    /// A reading was committed.
    SavePressed,
    /// A reading was retried after an error.
    RetryPressed,
}

impl ActivityTag {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityTag::ReadPressed => "read_button_pressed",
            ActivityTag::CancelPressed => "cancel_button_pressed",
            ActivityTag::SavePressed => "save_button_pressed",
            ActivityTag::RetryPressed => "retry_button_pressed",
        }
    }
}

impl std::fmt::Display for ActivityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    /// The probe hook reported a status.
    Status(ProbeStatus),
    /// The user pressed the task's button.
    Press,
    /// The user asked to abandon an in-flight reading.
    Cancel,
    /// The active reader changed.
    OwnershipChanged,
}

/// Side effects requested by a transition, executed in order by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Become the active reader (issues a new request token).
    ClaimProbe,
    /// Ask the probe hook for a reading.
    RequestReading,
    /// Ask the probe hook to abandon the current reading.
    CancelReading,
    /// Save the probe's last reading through the response sink.
    Commit,
    /// Report user activity to the probe hook.
    UserActivity(ActivityTag),
}

/// Per-task machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineState {
    /// Button state.
    pub state: ReadingState,
    /// Whether the current reading has already been committed.
    pub saved: bool,
}

impl MachineState {
    /// A state with the saved flag cleared.
    pub fn new(state: ReadingState) -> Self {
        Self {
            state,
            saved: false,
        }
    }

    fn with_state(self, state: ReadingState) -> Self {
        Self { state, ..self }
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the event.
    pub next: MachineState,
    /// Effects to perform, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(current: MachineState) -> Self {
        Self {
            next: current,
            effects: Vec::new(),
        }
    }

    fn to(next: MachineState) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with_effects(next: MachineState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    /// Whether the event changed nothing and requested nothing.
    pub fn is_noop(&self, current: MachineState) -> bool {
        self.next == current && self.effects.is_empty()
    }
}

/// Compute the next state and effects for an event.
///
/// `is_owner` tells whether the task is the probe's active reader at the time
/// the event is processed.
pub fn transition(
    policy: &ReaderPolicy,
    current: MachineState,
    is_owner: bool,
    event: ReaderEvent,
) -> Transition {
    let current = guard_ownership(policy, current, is_owner);

    match event {
        ReaderEvent::OwnershipChanged => Transition::to(current),
        // Status updates belong to whichever task owns the probe.
        ReaderEvent::Status(_) if !is_owner => Transition::to(current),
        ReaderEvent::Status(status) => Transition::to(on_status(policy, current, status)),
        // The probe is busy with another task's request; only drop our own view of it.
        ReaderEvent::Press | ReaderEvent::Cancel if !is_owner && current.state.is_in_flight() => {
            Transition::with_effects(
                current.with_state(ReadingState::Read),
                vec![Effect::UserActivity(ActivityTag::CancelPressed)],
            )
        }
        ReaderEvent::Press => on_press(policy, current),
        ReaderEvent::Cancel => {
            if can_cancel(policy, current.state) {
                cancel(current)
            } else {
                Transition::stay(current)
            }
        }
    }
}

/// Drop an uncommitted reading once another task owns the probe.
fn guard_ownership(policy: &ReaderPolicy, current: MachineState, is_owner: bool) -> MachineState {
    if is_owner {
        return current;
    }
    let revert = match current.state {
        ReadingState::Save => true,
        ReadingState::Searching | ReadingState::Connecting | ReadingState::Reading => {
            policy.revert_all_on_preempt
        }
        ReadingState::Read | ReadingState::Error => false,
    };
    if revert {
        current.with_state(ReadingState::Read)
    } else {
        current
    }
}

fn on_status(policy: &ReaderPolicy, current: MachineState, status: ProbeStatus) -> MachineState {
    match status {
        ProbeStatus::NotStarted => {
            if !policy.not_started_interrupts {
                current.with_state(ReadingState::Read)
            } else if current.state == ReadingState::Error {
                current
            } else if current.state.is_active() {
                current.with_state(ReadingState::Error)
            } else {
                current.with_state(ReadingState::Read)
            }
        }
        ProbeStatus::Scanning => MachineState::new(ReadingState::Searching),
        ProbeStatus::Connecting => current.with_state(ReadingState::Connecting),
        ProbeStatus::Reading => current.with_state(ReadingState::Reading),
        ProbeStatus::Done => {
            if !current.saved {
                current.with_state(ReadingState::Save)
            } else if policy.done_after_save_resets {
                current.with_state(ReadingState::Read)
            } else {
                current
            }
        }
        ProbeStatus::Error => current.with_state(ReadingState::Error),
    }
}

fn on_press(policy: &ReaderPolicy, current: MachineState) -> Transition {
    match current.state {
        ReadingState::Read => Transition::with_effects(
            MachineState::new(ReadingState::Read),
            vec![
                Effect::ClaimProbe,
                Effect::RequestReading,
                Effect::UserActivity(ActivityTag::ReadPressed),
            ],
        ),
        ReadingState::Searching | ReadingState::Reading => cancel(current),
        ReadingState::Connecting if policy.cancel_while_connecting => cancel(current),
        ReadingState::Connecting => Transition::stay(current),
        ReadingState::Save => Transition::with_effects(
            MachineState {
                state: ReadingState::Read,
                saved: true,
            },
            vec![
                Effect::Commit,
                Effect::UserActivity(ActivityTag::SavePressed),
            ],
        ),
        ReadingState::Error => Transition::with_effects(
            current,
            vec![
                Effect::ClaimProbe,
                Effect::RequestReading,
                Effect::UserActivity(ActivityTag::RetryPressed),
            ],
        ),
    }
}

fn can_cancel(policy: &ReaderPolicy, state: ReadingState) -> bool {
    match state {
        ReadingState::Searching | ReadingState::Reading => true,
        ReadingState::Connecting => policy.cancel_while_connecting,
        ReadingState::Read | ReadingState::Save | ReadingState::Error => false,
    }
}

fn cancel(current: MachineState) -> Transition {
    Transition::with_effects(
        current.with_state(ReadingState::Read),
        vec![
            Effect::CancelReading,
            Effect::UserActivity(ActivityTag::CancelPressed),
        ],
    )
}

/// A policy plus the state it governs.
///
/// Hosts that need to perform effects before adopting the next state use
/// [`ReadingMachine::peek`] and [`ReadingMachine::adopt`]; everyone else can
/// call [`ReadingMachine::apply`].
#[derive(Debug, Clone, Default)]
pub struct ReadingMachine {
    policy: ReaderPolicy,
    current: MachineState,
}

impl ReadingMachine {
    /// Create a machine in the `Read` state.
    pub fn new(policy: ReaderPolicy) -> Self {
        Self {
            policy,
            current: MachineState::default(),
        }
    }

    /// The policy in use.
    pub fn policy(&self) -> &ReaderPolicy {
        &self.policy
    }

    /// Current machine state.
    pub fn current(&self) -> MachineState {
        self.current
    }

    /// Current button state.
    pub fn state(&self) -> ReadingState {
        self.current.state
    }

    /// Whether the current reading has been committed.
    pub fn is_saved(&self) -> bool {
        self.current.saved
    }

    /// Compute a transition without adopting it.
    pub fn peek(&self, is_owner: bool, event: ReaderEvent) -> Transition {
        transition(&self.policy, self.current, is_owner, event)
    }

    /// Adopt a previously computed state.
    pub fn adopt(&mut self, next: MachineState) {
        self.current = next;
    }

    /// Apply an event and return the effects to perform.
    pub fn apply(&mut self, is_owner: bool, event: ReaderEvent) -> Vec<Effect> {
        let Transition { next, effects } = self.peek(is_owner, event);
        self.current = next;
        effects
    }
}
