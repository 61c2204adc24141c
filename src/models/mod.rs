pub mod job;
pub mod outcome;
pub mod record;
pub mod task_status;

pub use job::{Job, JobStatus};
pub use outcome::Outcome;
pub use record::{HistoryEntry, ScrapedRecord};
pub use task_status::{TaskResult, TaskState, TaskStatus};
