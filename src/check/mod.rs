//! Smart checking of answer placeholders.
//!
//! ```text
//! snapshot  → copy the answer file, substitute the user's text
//!   ↓
//! runner    → run the test command against the snapshot
//!   ↓
//! classify  → exact match against the success sentinel
//!   ↓
//! (drop)    → snapshot and support files deleted
//! ```
//!
//! [`SmartChecker`] ties the steps together.

mod checker;
mod classify;
mod runner;
mod snapshot;

pub use checker::{AnswerSource, CheckOutcome, CheckRequest, SmartChecker};
pub use classify::classify;
pub use runner::{
    CommandRunner, MarkedOutputRunner, ProcessOutput, RunLimits, TestRunner, run_process,
};
pub use snapshot::{ResourceCopy, Snapshot, SnapshotStage, prepare, snapshot_name};
