use crate::invoker::{InvocationState, ToolOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateLayout,
    MapExtraction,
    Sift,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::CreateLayout => "create output structure",
            OperationKind::MapExtraction => "memory map extraction",
            OperationKind::Sift => "sift",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub status: InvocationState,
    pub duration: Duration,
    pub captured_bytes: usize,
    pub exit_code: Option<i32>,
    pub artifact: Option<PathBuf>,
    pub sections: Option<usize>,
}

impl OperationRecord {
    pub fn layout(base_dir: PathBuf, duration: Duration) -> Self {
        Self {
            kind: OperationKind::CreateLayout,
            status: InvocationState::Completed,
            duration,
            captured_bytes: 0,
            exit_code: None,
            artifact: Some(base_dir),
            sections: None,
        }
    }

    pub fn from_tool(kind: OperationKind, output: &ToolOutput, artifact: Option<PathBuf>) -> Self {
        Self {
            kind,
            status: InvocationState::Completed,
            duration: output.duration,
            captured_bytes: output.stdout.len(),
            exit_code: output.exit_code,
            artifact,
            sections: None,
        }
    }

    pub fn with_sections(mut self, sections: usize) -> Self {
        self.sections = Some(sections);
        self
    }
}

/// Everything one invocation of the binary did, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub bin_name: String,
    pub base_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub operations: Vec<OperationRecord>,
}

impl RunReport {
    pub fn new<S: Into<String>>(bin_name: S, base_dir: PathBuf) -> Self {
        Self {
            bin_name: bin_name.into(),
            base_dir,
            started_at: Utc::now(),
            operations: Vec::new(),
        }
    }

    pub fn record(&mut self, operation: OperationRecord) {
        self.operations.push(operation);
    }

    pub fn total_duration(&self) -> Duration {
        self.operations.iter().map(|op| op.duration).sum()
    }

    /// Tools that ran but exited non-zero. Their output was still accepted.
    pub fn nonzero_exits(&self) -> Vec<&OperationRecord> {
        self.operations
            .iter()
            .filter(|op| op.exit_code.is_some_and(|code| code != 0))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_output(code: Option<i32>, stdout: &[u8], millis: u64) -> ToolOutput {
        ToolOutput {
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
            exit_code: code,
            duration: Duration::from_millis(millis),
        }
    }

    #[test]
    fn test_report_accumulates_operations() {
        let mut report = RunReport::new("crash1", PathBuf::from("/tmp/work"));
        assert!(report.is_empty());

        report.record(OperationRecord::layout(
            PathBuf::from("/tmp/work"),
            Duration::from_millis(5),
        ));
        report.record(
            OperationRecord::from_tool(
                OperationKind::MapExtraction,
                &tool_output(Some(0), b"[]", 20),
                Some(PathBuf::from("/tmp/work/mem/crash1.json")),
            )
            .with_sections(0),
        );
        report.record(OperationRecord::from_tool(
            OperationKind::Sift,
            &tool_output(Some(1), b"done\n", 100),
            None,
        ));

        assert_eq!(report.operations.len(), 3);
        assert_eq!(report.total_duration(), Duration::from_millis(125));
        assert_eq!(report.operations[2].captured_bytes, 5);

        let nonzero = report.nonzero_exits();
        assert_eq!(nonzero.len(), 1);
        assert_eq!(nonzero[0].kind, OperationKind::Sift);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new("crash1", PathBuf::from("/tmp/work"));
        report.record(OperationRecord::from_tool(
            OperationKind::Sift,
            &tool_output(None, b"", 1),
            None,
        ));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bin_name"], "crash1");
        assert_eq!(json["operations"][0]["kind"], "sift");
        assert_eq!(json["operations"][0]["status"], "completed");
        assert!(json["operations"][0]["exit_code"].is_null());
    }
}
