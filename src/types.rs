use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

/// Status of a workflow task as reported by Zadig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Waiting,
    Queued,
    Prepare,
    Running,
    Passed,
    Failed,
    Timeout,
    Cancelled,
    Reject,
    Blocked,
    Pause,
    Unstable,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Passed
                | TaskStatus::Failed
                | TaskStatus::Timeout
                | TaskStatus::Cancelled
                | TaskStatus::Reject
                | TaskStatus::Unstable
        )
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            TaskStatus::Passed => "✓",
            TaskStatus::Failed | TaskStatus::Reject => "✗",
            TaskStatus::Timeout => "⏱",
            TaskStatus::Cancelled => "⊘",
            TaskStatus::Running | TaskStatus::Prepare => "⟳",
            TaskStatus::Created | TaskStatus::Waiting | TaskStatus::Queued => "◯",
            TaskStatus::Blocked | TaskStatus::Pause => "⏸",
            TaskStatus::Unstable => "!",
            TaskStatus::Unknown => "?",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Created => "Created",
            TaskStatus::Waiting => "Waiting",
            TaskStatus::Queued => "Queued",
            TaskStatus::Prepare => "Preparing",
            TaskStatus::Running => "Running",
            TaskStatus::Passed => "Passed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Timeout => "Timed out",
            TaskStatus::Cancelled => "Cancelled",
            TaskStatus::Reject => "Rejected",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Pause => "Paused",
            TaskStatus::Unstable => "Unstable",
            TaskStatus::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowTask {
    pub task_id: u64,
    pub workflow_key: String,
    pub workflow_display_name: String,
    pub status: TaskStatus,
    pub creator: String,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl WorkflowTask {
    /// Wall-clock run time in seconds, up to `now` for unfinished tasks.
    pub fn duration_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        let start = self.start_time?;
        let end = match self.end_time {
            Some(end) => end,
            None if !self.status.is_finished() => now,
            None => return None,
        };
        Some(end.signed_duration_since(start).num_seconds().max(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Choice,
    Text,
    Bool,
    #[serde(other)]
    Other,
}

/// A launch parameter and its current value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowParam {
    pub name: String,
    pub kind: ParamKind,
    pub value: String,
    pub choices: Vec<String>,
    pub is_credential: bool,
}

impl WorkflowParam {
    /// Value as shown on screen; credentials are masked.
    pub fn display_value(&self) -> String {
        if self.is_credential && !self.value.is_empty() {
            "••••••".to_string()
        } else {
            self.value.clone()
        }
    }

    /// Step through the choice list. No-op for other kinds.
    pub fn cycle_choice(&mut self, forward: bool) {
        if self.kind != ParamKind::Choice || self.choices.is_empty() {
            return;
        }
        let len = self.choices.len();
        let current = self.choices.iter().position(|c| *c == self.value);
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        };
        self.value = self.choices[next].clone();
    }

    pub fn toggle_bool(&mut self) {
        if self.kind == ParamKind::Bool {
            self.value = if self.value == "true" { "false" } else { "true" }.to_string();
        }
    }
}

/// What the launch form needs to know about a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    pub key: String,
    pub display_name: String,
    pub project_key: String,
    pub params: Vec<WorkflowParam>,
}

/// A task together with the parameters it ran with.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetail {
    pub task: WorkflowTask,
    pub params: Vec<WorkflowParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LaunchedTask {
    pub task_id: u64,
    #[serde(default)]
    pub workflow_key: String,
    #[serde(default)]
    pub project_key: String,
}
