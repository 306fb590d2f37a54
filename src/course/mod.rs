//! Course data model: task files and their answer placeholders.

mod placeholder;
mod task_file;

pub use placeholder::{AnswerPlaceholder, StudyStatus};
pub use task_file::TaskFile;
