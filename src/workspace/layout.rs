use crate::error::{DumpSiftError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const BINS_DIR_NAME: &str = "bins";
pub const MEMS_DIR_NAME: &str = "mem";
pub const SEARCHES_DIR_NAME: &str = "searches";

/// Directory convention rooted at `base_dir`:
///
/// ```text
/// base_dir/
///   bins/              dump inputs (never written here)
///   mem/{bin}.json     radare2 section maps
///   searches/{bin}/    sifter output, filled by the sifter itself
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    base_dir: PathBuf,
    bins_dir: PathBuf,
    mems_dir: PathBuf,
    searches_dir: PathBuf,
}

impl Workspace {
    /// Derive every workspace path from `base_dir`. Touches nothing on disk.
    pub fn configure<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = normalize(base_dir.as_ref());

        Self {
            bins_dir: base_dir.join(BINS_DIR_NAME),
            mems_dir: base_dir.join(MEMS_DIR_NAME),
            searches_dir: base_dir.join(SEARCHES_DIR_NAME),
            base_dir,
        }
    }

    /// Configure and create the three subdirectories. Safe to call repeatedly.
    pub fn ensure_layout<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let workspace = Self::configure(base_dir);

        for dir in [&workspace.bins_dir, &workspace.mems_dir, &workspace.searches_dir] {
            create_dir(dir)?;
        }

        debug!(
            "Workspace layout ready under {}",
            workspace.base_dir.display()
        );
        Ok(workspace)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn bins_dir(&self) -> &Path {
        &self.bins_dir
    }

    pub fn mems_dir(&self) -> &Path {
        &self.mems_dir
    }

    pub fn searches_dir(&self) -> &Path {
        &self.searches_dir
    }

    pub fn resolve_dump_path(&self, bin_name: &str, ext: &str) -> PathBuf {
        let reference = DumpReference::new(bin_name, ext);
        normalize(&self.bins_dir.join(reference.file_name()))
    }

    pub fn resolve_map_path(&self, bin_name: &str) -> PathBuf {
        normalize(&self.mems_dir.join(format!("{}.json", bin_name)))
    }

    /// `searches/{bin_name}/`, created if missing.
    pub fn resolve_search_output_dir(&self, bin_name: &str) -> Result<PathBuf> {
        let dir = normalize(&self.searches_dir.join(bin_name));
        create_dir(&dir)?;
        Ok(dir)
    }

    /// Whether all three subdirectories are present on disk.
    pub fn is_initialized(&self) -> bool {
        self.bins_dir.is_dir() && self.mems_dir.is_dir() && self.searches_dir.is_dir()
    }
}

/// A logical dump name plus the extension dumps are stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReference {
    pub bin_name: String,
    pub extension: String,
}

impl DumpReference {
    pub fn new<S: Into<String>, E: Into<String>>(bin_name: S, extension: E) -> Self {
        Self {
            bin_name: bin_name.into(),
            extension: extension.into(),
        }
    }

    /// `bin_name` unchanged when it already ends in `.{extension}` (any case),
    /// otherwise `bin_name.{extension}`.
    pub fn file_name(&self) -> String {
        if self.has_extension() {
            self.bin_name.clone()
        } else {
            format!("{}.{}", self.bin_name, self.extension)
        }
    }

    fn has_extension(&self) -> bool {
        let path = Path::new(&self.bin_name);
        let stem_present = path
            .file_stem()
            .is_some_and(|stem| !stem.is_empty() && stem != "." && stem != "..");

        stem_present
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

/// Reject bin names that cannot name a dump inside the workspace.
pub fn validate_bin_name(bin_name: &str) -> Result<()> {
    let trimmed = bin_name.trim();
    if trimmed.is_empty() {
        return Err(DumpSiftError::config("Bin name must not be empty"));
    }

    if Path::new(trimmed)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(DumpSiftError::config(format!(
            "Bin name must stay inside the workspace: {}",
            bin_name
        )));
    }

    Ok(())
}

// Collapses repeated separators and `.` segments without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DumpSiftError::filesystem(dir, e))
}
