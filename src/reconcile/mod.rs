pub mod issues;
pub mod settings;

pub use issues::{IssueOutcome, IssueReconciler, MigrationFlags};
pub use settings::{ConfigChange, ConfigOutcome, ConfigReconciler};
