use super::command::{ProgressCallback, ToolCommand, ToolOutput};
use crate::error::{DumpSiftError, Result};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RADARE_TOOL_NAME: &str = "radare2";

/// Quiet mode, run `iSj` (sections as JSON) and quit.
const RADARE_SECTION_QUERY: [&str; 2] = ["-qc", "iSj"];

/// One section as reported by radare2. Kept as a generic JSON object so that
/// unknown keys survive the round trip to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionRecord(Map<String, Value>);

impl SectionRecord {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn perm(&self) -> Option<&str> {
        self.get("perm").and_then(Value::as_str)
    }

    pub fn size(&self) -> Option<u64> {
        self.get("size").and_then(Value::as_u64)
    }

    pub fn vsize(&self) -> Option<u64> {
        self.get("vsize").and_then(Value::as_u64)
    }

    pub fn paddr(&self) -> Option<u64> {
        self.get("paddr").and_then(Value::as_u64)
    }

    pub fn vaddr(&self) -> Option<u64> {
        self.get("vaddr").and_then(Value::as_u64)
    }
}

impl From<Map<String, Value>> for SectionRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl fmt::Display for SectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} perms={} paddr={:08x} size={:08x} vaddr={:08x} vsize={:08x}",
            self.name().unwrap_or("<unnamed>"),
            self.perm().unwrap_or("----"),
            self.paddr().unwrap_or(0),
            self.size().unwrap_or(0),
            self.vaddr().unwrap_or(0),
            self.vsize().unwrap_or(0)
        )
    }
}

/// Ordered list of sections, persisted as `mem/{bin}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryMap {
    sections: Vec<SectionRecord>,
}

impl MemoryMap {
    pub fn new(sections: Vec<SectionRecord>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[SectionRecord] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Compact JSON with sorted keys; identical input always yields identical bytes.
    pub fn to_canonical_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| DumpSiftError::Decode {
            context: "section map".to_string(),
            source,
        })
    }

    pub fn total_virtual_size(&self) -> u64 {
        self.sections
            .iter()
            .filter_map(SectionRecord::vsize)
            .sum()
    }
}

pub struct MapExtractor {
    radare_bin: PathBuf,
    progress_callback: Option<ProgressCallback>,
}

impl MapExtractor {
    pub fn new<P: Into<PathBuf>>(radare_bin: P) -> Self {
        Self {
            radare_bin: radare_bin.into(),
            progress_callback: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn build_command(&self, dump_path: &Path) -> ToolCommand {
        ToolCommand::new(RADARE_TOOL_NAME, &self.radare_bin)
            .args(RADARE_SECTION_QUERY)
            .arg(dump_path)
            .with_progress(self.progress_callback.clone())
    }

    /// Raw radare2 output for `dump_path`; decoding is left to the caller.
    pub fn run_map_extraction(&self, dump_path: &Path) -> Result<ToolOutput> {
        self.build_command(dump_path).run()
    }
}

/// Parse radare2's section report. Anything other than a JSON array of
/// objects is rejected, including empty output and plain diagnostics.
pub fn decode_map_output(raw_output: &[u8]) -> Result<MemoryMap> {
    let value: Value =
        serde_json::from_slice(raw_output).map_err(|source| DumpSiftError::Decode {
            context: "radare2 section report".to_string(),
            source,
        })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(DumpSiftError::MalformedMap {
                context: "radare2 section report".to_string(),
                message: format!("expected a JSON array, found {}", json_kind(&other)),
            })
        }
    };

    let sections = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(SectionRecord(fields)),
            other => Err(DumpSiftError::MalformedMap {
                context: "radare2 section report".to_string(),
                message: format!(
                    "section {} is {}, not an object",
                    index,
                    json_kind(&other)
                ),
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MemoryMap::new(sections))
}

/// Write the canonical form of `map` to `mem/{bin_name}.json`, replacing any
/// previous map for that dump.
pub fn persist_map(workspace: &Workspace, bin_name: &str, map: &MemoryMap) -> Result<PathBuf> {
    let output_file = workspace.resolve_map_path(bin_name);
    let content = map.to_canonical_json()?;

    info!(
        "Writing radare results ({}) to {}",
        content.len(),
        output_file.display()
    );

    fs::write(&output_file, content).map_err(|e| DumpSiftError::filesystem(&output_file, e))?;
    Ok(output_file)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
