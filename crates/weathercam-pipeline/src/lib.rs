//! Capture cycle orchestration: the per-cycle context, the cycle itself,
//! the fixed-period scheduler and the outcome channel they report on.

pub mod context;
pub mod cycle;
pub mod events;
pub mod scheduler;

pub use context::{CaptureRecord, CycleContext, DEFAULT_COORDINATE};
pub use cycle::{CycleRunner, Pipeline};
pub use events::{log_outcomes, CycleOutcome, Stage};
pub use scheduler::Scheduler;
