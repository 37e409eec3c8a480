mod project;
mod record;
mod task;
mod user;

pub use project::{Project, ProjectInput};
pub use record::{ContributionRecord, ExportRecord};
pub use task::{Task, TaskCategory, TaskInput, TaskPriority, TaskStatus};
pub use user::{User, UserInput, UserRole};
