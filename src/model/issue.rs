use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueStatus {
    Open,
    Confirmed,
    Reopened,
    Resolved,
    Closed,
    #[serde(other)]
    Other,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "OPEN",
            IssueStatus::Confirmed => "CONFIRMED",
            IssueStatus::Reopened => "REOPENED",
            IssueStatus::Resolved => "RESOLVED",
            IssueStatus::Closed => "CLOSED",
            IssueStatus::Other => "OTHER",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an issue was resolved. Only meaningful when the status is `RESOLVED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "FALSE-POSITIVE")]
    FalsePositive,
    #[serde(rename = "WONTFIX")]
    WontFix,
    #[serde(rename = "FIXED")]
    Fixed,
    #[serde(rename = "REMOVED")]
    Removed,
    #[serde(other)]
    Other,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::FalsePositive => "FALSE-POSITIVE",
            Resolution::WontFix => "WONTFIX",
            Resolution::Fixed => "FIXED",
            Resolution::Removed => "REMOVED",
            Resolution::Other => "OTHER",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow transitions the migration may apply to a target issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    FalsePositive,
    WontFix,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::FalsePositive => "falsepositive",
            Transition::WontFix => "wontfix",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Raw text as entered by the author. Comments are deduplicated on this alone.
    #[serde(default)]
    pub markdown: Option<String>,
}

impl Comment {
    #[cfg(test)]
    pub fn text(text: &str) -> Self {
        Self {
            markdown: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub rule: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub status: IssueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// `None` when the server did not return comment data for this issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

impl Issue {
    /// Component path without the project key prefix, e.g. `src/A.java` for
    /// `com.test:prj1:src/A.java`.
    pub fn file_path(&self) -> &str {
        self.component
            .rsplit_once(':')
            .map(|(_, path)| path)
            .unwrap_or(&self.component)
    }

    /// Line distance to another issue. File-level issues (no line) are only
    /// comparable with each other.
    pub fn line_distance(&self, other: &Issue) -> Option<u32> {
        match (self.line, other.line) {
            (Some(a), Some(b)) => Some(a.abs_diff(b)),
            (None, None) => Some(0),
            _ => None,
        }
    }

    pub fn has_comment(&self, text: &str) -> bool {
        self.comments
            .iter()
            .flatten()
            .any(|c| c.markdown.as_deref() == Some(text))
    }

    /// `path/line` label used in log lines.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) => format!("{}/{}", self.file_path(), line),
            None => self.file_path().to_string(),
        }
    }
}
