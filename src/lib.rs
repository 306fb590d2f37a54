//! # study-checker
//!
//! Snapshot-based checking of answer placeholders in exercise files.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! check     → Smart check: snapshot, verifier process, verdict
//!   ↓
//! course    → Task files and answer placeholders
//!   ↓
//! document  → Text documents, edits, file copies
//!   ↓
//! base      → Primitives (TextRange, LineCol, LineIndex)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use study::check::{AnswerSource, CommandRunner, SmartChecker};
//!
//! let checker = SmartChecker::new(CommandRunner::new("python3"));
//! let answer = AnswerSource::new(&answer_path, &answer_task);
//! let status = checker.smart_check(0, &answer, &mut user_task, &user_doc);
//! ```

/// Foundation types: TextRange, LineCol, LineIndex
pub mod base;

/// Smart check pipeline
pub mod check;

/// Checker settings
pub mod config;

/// Course data model: task files and placeholders
pub mod course;

/// Text documents consumed by the checker
pub mod document;

/// Error types
pub mod error;

pub use base::{LineCol, LineIndex, TextRange, TextSize};
pub use check::{AnswerSource, CheckOutcome, CheckRequest, SmartChecker};
pub use config::{CheckerConfig, TEST_OK};
pub use course::{AnswerPlaceholder, StudyStatus, TaskFile};
pub use document::{Document, TextDocument};
pub use error::{CheckError, ErrorKind, Result};
