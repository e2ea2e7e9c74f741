//! Reading coordination for BLE dish temperature probes.
//!
//! This crate holds the logic behind a task's "read temperature" button: a
//! pure state machine fed by the shared probe's status stream, a registry
//! that decides which task currently owns the probe, and the helpers that
//! turn Celsius readings into what the user sees and what gets saved.
//!
//! # Features
//!
//! - **Reading state machine**: `Read → Searching → Connecting → Reading → Save`,
//!   with `Error` and user-initiated retry
//! - **Single active reader**: a new request preempts the previous task,
//!   which drops any unsaved reading
//! - **Request tokens**: late status updates from a superseded request are
//!   recognised and ignored
//! - **Display projection**: Celsius or Fahrenheit, optionally both
//! - **Checklist event loop**: many tasks, one probe, one loop
//! - **Mock probe**: scriptable probe for tests and simulation
//!
//! # States
//!
//! | State | Label | Press does |
//! |-------|-------|------------|
//! | `Read` | Read | Request a reading |
//! | `Searching` | Searching... | Cancel |
//! | `Connecting` | Connecting... | Nothing (dish probe) |
//! | `Reading` | Reading... | Cancel |
//! | `Save` | Save | Commit the reading |
//! | `Error` | Error | Retry |
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use dishtemp_core::{
//!     MockProbe, ReaderOptions, ReaderRegistry, RecordingSink, TaskReader, TemperatureProbe,
//! };
//! use dishtemp_types::{ReadingState, TaskId};
//!
//! #[tokio::main]
//! async fn main() -> dishtemp_core::Result<()> {
//!     let probe = Arc::new(MockProbe::builder().auto_complete(false).build());
//!     let registry = Arc::new(ReaderRegistry::new());
//!     let sink = Arc::new(RecordingSink::new());
//!     let mut reader = TaskReader::new(
//!         TaskId::new("walk-in-cooler"),
//!         probe.clone(),
//!         registry,
//!         sink.clone(),
//!         ReaderOptions::new(),
//!     );
//!
//!     let mut events = probe.subscribe();
//!     reader.press().await?;
//!     probe.complete(reader.latest_token()).await;
//!     while let Ok(event) = events.try_recv() {
//!         reader.handle_event(&event);
//!     }
//!     assert_eq!(reader.state(), ReadingState::Save);
//!
//!     reader.press().await?;
//!     assert_eq!(sink.save_count(), 1);
//!     Ok(())
//! }
//! ```

pub mod checklist;
pub mod display;
pub mod error;
pub mod events;
pub mod machine;
pub mod mock;
pub mod ownership;
pub mod task;
pub mod traits;

pub use dishtemp_types::temperature;
pub use dishtemp_types::types;

pub use checklist::{Checklist, ChecklistCommand, ChecklistHandle, TaskSnapshot};
pub use display::{DisplayPreferences, DisplayTemperature};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, ProbeEvent};
pub use machine::{
    ActivityTag, Effect, MachineState, ReaderEvent, ReaderPolicy, ReadingMachine, Transition,
    transition,
};
pub use mock::{MockProbe, MockProbeBuilder, RecordingSink};
pub use ownership::{Ownership, ReaderRegistry};
pub use task::{ReaderOptions, ReadingView, TaskReader};
pub use traits::{ResponseSink, TemperatureProbe};

pub use dishtemp_types::{
    BatteryStatus, ProbeStatus, ReadingState, RequestToken, TaskId, TemperatureReading,
    TemperatureUnit,
};
