use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_TEAM: &str = "Unknown";
pub const DEFAULT_ASSIGNEE: &str = "Unknown";
pub const DEFAULT_PRIORITY: &str = "No priority";

/// Workflow state of an issue. `kind` is the state category
/// (`backlog`, `unstarted`, `started`, `completed`, `canceled`, `triage`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
}

/// One state transition from an issue's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub created_at: String,
    #[serde(default)]
    pub from_state: Option<WorkflowState>,
    #[serde(default)]
    pub to_state: Option<WorkflowState>,
}

/// An issue as returned by the issue-fetch collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: String,
    pub created_at: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub canceled_at: Option<String>,
    #[serde(default)]
    pub estimate: Option<f64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub priority_label: Option<String>,
    #[serde(default)]
    pub state: WorkflowState,
    #[serde(default)]
    pub assignee: Option<Person>,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub cycle: Option<CycleRef>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl Issue {
    pub fn team_name(&self) -> &str {
        self.team.as_ref().map_or(DEFAULT_TEAM, |t| t.name.as_str())
    }

    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .map_or(DEFAULT_ASSIGNEE, |a| a.name.as_str())
    }

    pub fn priority_name(&self) -> &str {
        self.priority_label.as_deref().unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some() || self.state.kind == "completed"
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled_at.is_some() || self.state.kind == "canceled"
    }

    pub fn is_open(&self) -> bool {
        !self.is_completed() && !self.is_canceled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateKind {
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueId {
    pub id: String,
}

/// An issue as embedded in a cycle payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleIssue {
    #[serde(default)]
    pub estimate: Option<f64>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub assignee: Option<IssueId>,
    pub state: StateKind,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl CycleIssue {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some() || self.state.kind == "completed"
    }
}

/// A cycle (sprint) as returned by the cycle-fetch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: i64,
    pub starts_at: String,
    pub ends_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub progress: f64,
    pub team: TeamRef,
    #[serde(default)]
    pub issues: Vec<CycleIssue>,
    #[serde(default)]
    pub uncompleted_issues_upon_close: Vec<IssueId>,
    #[serde(default)]
    pub scope_history: Option<Vec<f64>>,
}

impl Cycle {
    /// Display name; unnamed cycles are called `Cycle <number>`.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Cycle {}", self.number),
        }
    }
}

/// Immutable input to every calculator.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub issues: Vec<Issue>,
    pub cycles: Vec<Cycle>,
}

impl Snapshot {
    pub fn new(issues: Vec<Issue>, cycles: Vec<Cycle>) -> Self {
        Self { issues, cycles }
    }

    /// Load a snapshot from two JSON arrays (issues, cycles). Either file
    /// may be omitted.
    pub fn from_json_files(
        issues: Option<&Path>,
        cycles: Option<&Path>,
    ) -> Result<Self> {
        let issues: Vec<Issue> = match issues {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => Vec::new(),
        };
        let cycles: Vec<Cycle> = match cycles {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => Vec::new(),
        };
        log::info!(
            "Loaded snapshot: {} issues, {} cycles",
            issues.len(),
            cycles.len()
        );
        Ok(Self { issues, cycles })
    }
}
