pub mod issue;
pub mod setting;
