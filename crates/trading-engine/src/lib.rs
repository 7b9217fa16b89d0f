//! Trading engine.
//!
//! [`OrderSequencer`] runs one decision cycle against live exchange state;
//! [`Scheduler`] repeats it on a fixed interval until shut down.

mod report;
mod scheduler;
mod sequencer;

pub use report::{CycleOutcome, CycleReport, OpenOrderStatus, SequencerState};
pub use scheduler::{Scheduler, SchedulerSummary};
pub use sequencer::{OrderSequencer, SequencerSettings};
