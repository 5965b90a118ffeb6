use super::command::{ProgressCallback, ToolCommand, ToolOutput};
use crate::error::Result;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};

pub const SIFTER_TOOL_NAME: &str = "luau-sifter";

/// Fully resolved luau-sifter run for one dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SifterInvocation {
    pub sifter: PathBuf,
    pub num_threads: u32,
    pub output_dir: PathBuf,
    pub mem_file_path: PathBuf,
    pub dump_file_path: PathBuf,
}

impl SifterInvocation {
    /// Resolve every path for `bin_name` and create `searches/{bin_name}/`.
    pub fn prepare(
        workspace: &Workspace,
        sifter: &Path,
        bin_name: &str,
        dump_extension: &str,
        num_threads: u32,
    ) -> Result<Self> {
        let output_dir = workspace.resolve_search_output_dir(bin_name)?;
        Ok(Self::plan(
            workspace,
            sifter,
            bin_name,
            dump_extension,
            num_threads,
            output_dir,
        ))
    }

    /// Same resolution as [`prepare`](Self::prepare) without creating anything.
    pub fn preview(
        workspace: &Workspace,
        sifter: &Path,
        bin_name: &str,
        dump_extension: &str,
        num_threads: u32,
    ) -> Self {
        let output_dir = workspace.searches_dir().join(bin_name);
        Self::plan(
            workspace,
            sifter,
            bin_name,
            dump_extension,
            num_threads,
            output_dir,
        )
    }

    fn plan(
        workspace: &Workspace,
        sifter: &Path,
        bin_name: &str,
        dump_extension: &str,
        num_threads: u32,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            sifter: sifter.to_path_buf(),
            num_threads,
            output_dir,
            mem_file_path: workspace.resolve_map_path(bin_name),
            dump_file_path: workspace.resolve_dump_path(bin_name, dump_extension),
        }
    }

    /// `-p` pointer search, `-l` lua_Page search, `-r` regex block search.
    pub fn build_command(&self) -> ToolCommand {
        ToolCommand::new(SIFTER_TOOL_NAME, &self.sifter)
            .arg("-n")
            .arg(self.num_threads.to_string())
            .arg("-plr")
            .arg("-o")
            .arg(&self.output_dir)
            .arg("--r2-sections")
            .arg(&self.mem_file_path)
            .arg("--dmp")
            .arg(&self.dump_file_path)
    }

    pub fn run(&self, progress: Option<ProgressCallback>) -> Result<ToolOutput> {
        self.build_command().with_progress(progress).run()
    }
}

/// Configure a workspace for `base_dir` and run the sifter against `bin_name`.
pub fn run_sift(
    base_dir: &Path,
    sifter_executable_path: &Path,
    bin_name: &str,
    dump_extension: &str,
    num_threads: u32,
    progress: Option<ProgressCallback>,
) -> Result<ToolOutput> {
    let workspace = Workspace::configure(base_dir);
    SifterInvocation::prepare(
        &workspace,
        sifter_executable_path,
        bin_name,
        dump_extension,
        num_threads,
    )?
    .run(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DumpSiftError;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_output_dir_and_builds_argv() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::ensure_layout(temp_dir.path()).unwrap();

        let invocation =
            SifterInvocation::prepare(&workspace, Path::new("/opt/sifter"), "crash1", "DMP", 8)
                .unwrap();

        let output_dir = temp_dir.path().join("searches").join("crash1");
        assert!(output_dir.is_dir());

        let argv = invocation.build_command().argv();
        let dump = temp_dir.path().join("bins").join("crash1.DMP");
        let map = temp_dir.path().join("mem").join("crash1.json");
        assert_eq!(
            argv,
            vec![
                "/opt/sifter".to_string(),
                "-n".to_string(),
                "8".to_string(),
                "-plr".to_string(),
                "-o".to_string(),
                output_dir.display().to_string(),
                "--r2-sections".to_string(),
                map.display().to_string(),
                "--dmp".to_string(),
                dump.display().to_string(),
            ]
        );
    }

    #[test]
    fn test_preview_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::configure(temp_dir.path().join("work"));

        let invocation =
            SifterInvocation::preview(&workspace, Path::new("sifter"), "crash1.DMP", "DMP", 4);

        assert!(!temp_dir.path().join("work").exists());
        assert_eq!(
            invocation.dump_file_path,
            temp_dir.path().join("work/bins/crash1.DMP")
        );
        assert_eq!(
            invocation.mem_file_path,
            temp_dir.path().join("work/mem/crash1.DMP.json")
        );
    }

    #[test]
    fn test_paths_with_spaces_stay_single_arguments() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("my dumps {num_threads}");
        let workspace = Workspace::ensure_layout(&base).unwrap();

        let invocation =
            SifterInvocation::prepare(&workspace, Path::new("sifter"), "crash 1", "DMP", 2)
                .unwrap();
        let command = invocation.build_command();

        assert_eq!(command.get_args().len(), 9);
        let rendered = command.to_string();
        assert!(rendered.contains(&format!(
            "'{}'",
            base.join("searches").join("crash 1").display()
        )));
    }

    #[test]
    fn test_run_sift_missing_sifter() {
        let temp_dir = TempDir::new().unwrap();
        Workspace::ensure_layout(temp_dir.path()).unwrap();

        let err = run_sift(
            temp_dir.path(),
            Path::new("/nonexistent/luau-sifter"),
            "crash1",
            "DMP",
            8,
            None,
        )
        .unwrap_err();

        assert!(matches!(err, DumpSiftError::ToolInvocation { .. }));
        // The output directory is resolved before spawning.
        assert!(temp_dir.path().join("searches/crash1").is_dir());
    }
}
