pub mod cli;
pub mod config;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod report;
pub mod ui;
pub mod workspace;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, LoggingConfig, ToolsConfig, WorkspaceConfig};
pub use error::{DumpSiftError, Result, UserFriendlyError};

// Core functionality re-exports
pub use invoker::{
    decode_map_output, persist_map, run_sift, MapExtractor, MemoryMap, SectionRecord,
    SifterInvocation, ToolCommand, ToolOutput,
};
pub use report::{OperationKind, OperationRecord, RunReport};
pub use ui::{OutputFormatter, OutputMode, ProgressManager};
pub use workspace::{DumpReference, Workspace};

use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Main library interface: runs the requested operations against one dump.
pub struct DumpSift {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl DumpSift {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let show_progress = !quiet && output_mode == OutputMode::Human;
        let progress_manager = ProgressManager::new(show_progress);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    /// Create a DumpSift instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            crate::cli::OutputFormat::Human => OutputMode::Human,
            crate::cli::OutputFormat::Json => OutputMode::Json,
            crate::cli::OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(
            config,
            output_mode,
            cli_args.verbosity_level(),
            cli_args.quiet,
        ))
    }

    /// The workspace for the configured base directory. No I/O.
    pub fn workspace(&self) -> Result<Workspace> {
        Ok(Workspace::configure(self.config.base_directory()?))
    }

    /// Run `operations` in order against `bin_name`. The first failure ends the run.
    pub fn execute(&self, bin_name: &str, operations: &[OperationKind]) -> Result<RunReport> {
        workspace::validate_bin_name(bin_name)?;
        let workspace = self.workspace()?;
        let mut report = RunReport::new(bin_name, workspace.base_dir().to_path_buf());

        let mut ordered = operations.to_vec();
        ordered.sort();
        ordered.dedup();

        for operation in ordered {
            let record = match operation {
                OperationKind::CreateLayout => self.create_output_structure()?,
                OperationKind::MapExtraction => self.perform_map_extraction(&workspace, bin_name)?,
                OperationKind::Sift => self.perform_sift(bin_name)?,
            };
            report.record(record);
        }

        Ok(report)
    }

    pub fn create_output_structure(&self) -> Result<OperationRecord> {
        let start = Instant::now();
        let base_dir = self.config.base_directory()?;
        info!("Creating output structure under {}", base_dir.display());

        let workspace = Workspace::ensure_layout(base_dir).map_err(|e| {
            error!(
                "Failed creating output structure under {}: {}",
                base_dir.display(),
                e
            );
            e
        })?;

        self.output_formatter.success(&format!(
            "Output structure ready under {}",
            workspace.base_dir().display()
        ));

        Ok(OperationRecord::layout(
            workspace.base_dir().to_path_buf(),
            start.elapsed(),
        ))
    }

    /// Run radare2, decode its section report and persist it as `mem/{bin}.json`.
    pub fn perform_map_extraction(
        &self,
        workspace: &Workspace,
        bin_name: &str,
    ) -> Result<OperationRecord> {
        info!("Extracting memory sections from {}", bin_name);
        self.output_formatter
            .start_operation(&format!("Extracting memory sections from {}", bin_name));

        let result = self.extract_and_persist_map(workspace, bin_name);
        match result {
            Ok(record) => {
                info!("Done extracting memory sections from {}", bin_name);
                Ok(record)
            }
            Err(e) => {
                error!("Failed extracting memory sections from {}: {}", bin_name, e);
                Err(e)
            }
        }
    }

    fn extract_and_persist_map(
        &self,
        workspace: &Workspace,
        bin_name: &str,
    ) -> Result<OperationRecord> {
        let dump_path = workspace.resolve_dump_path(bin_name, &self.config.workspace.dump_extension);
        let progress = self
            .progress_manager
            .tool_progress(&format!("Running radare2 on {}", dump_path.display()));
        let output = MapExtractor::new(&self.config.tools.radare_bin)
            .with_progress(progress)
            .run_map_extraction(&dump_path)?;

        let map = decode_map_output(&output.stdout)?;
        debug!(
            "radare2 reported {} sections ({} bytes mapped) for {}",
            map.len(),
            map.total_virtual_size(),
            bin_name
        );
        for section in map.sections() {
            debug!("  {}", section);
        }

        let map_path = persist_map(workspace, bin_name, &map)?;
        self.output_formatter.success(&format!(
            "Wrote {} sections to {}",
            map.len(),
            map_path.display()
        ));

        Ok(OperationRecord::from_tool(OperationKind::MapExtraction, &output, Some(map_path))
            .with_sections(map.len()))
    }

    /// Run luau-sifter for `bin_name`; its results land in `searches/{bin}/`.
    pub fn perform_sift(&self, bin_name: &str) -> Result<OperationRecord> {
        info!(
            "Sifting through {} for pointers, lua_Page, and regex",
            bin_name
        );
        self.output_formatter
            .start_operation(&format!("Sifting through {}", bin_name));

        let base_dir = self.config.base_directory()?;
        let tools = &self.config.tools;
        let progress = self
            .progress_manager
            .tool_progress(&format!("Running luau-sifter on {}", bin_name));
        let output = run_sift(
            base_dir,
            &tools.sifter_bin,
            bin_name,
            &self.config.workspace.dump_extension,
            tools.num_threads,
            Some(progress),
        )
        .map_err(|e| {
            error!("Failed sifting through {}: {}", bin_name, e);
            e
        })?;

        for line in output.stdout_lossy().lines() {
            debug!("luau-sifter: {}", line);
        }

        info!(
            "Done sifting through {} for pointers, lua_Page, and regex",
            bin_name
        );

        let output_dir = Workspace::configure(base_dir).searches_dir().join(bin_name);
        self.output_formatter.success(&format!(
            "Sifter finished, results in {}",
            output_dir.display()
        ));

        Ok(OperationRecord::from_tool(
            OperationKind::Sift,
            &output,
            Some(output_dir),
        ))
    }

    /// Resolved paths and rendered command lines, without touching the disk.
    pub fn plan(&self, bin_name: &str, operations: &[OperationKind]) -> Result<Vec<(&'static str, String)>> {
        workspace::validate_bin_name(bin_name)?;
        let workspace = self.workspace()?;
        let ext = &self.config.workspace.dump_extension;

        let mut entries = vec![
            ("base directory", workspace.base_dir().display().to_string()),
            ("dump", workspace.resolve_dump_path(bin_name, ext).display().to_string()),
            ("memory map", workspace.resolve_map_path(bin_name).display().to_string()),
        ];

        if operations.contains(&OperationKind::CreateLayout) {
            entries.push((
                "create",
                format!(
                    "{}, {}, {}",
                    workspace.bins_dir().display(),
                    workspace.mems_dir().display(),
                    workspace.searches_dir().display()
                ),
            ));
        }

        if operations.contains(&OperationKind::MapExtraction) {
            let dump_path = workspace.resolve_dump_path(bin_name, ext);
            let command = MapExtractor::new(&self.config.tools.radare_bin).build_command(&dump_path);
            entries.push(("radare2", command.to_string()));
        }

        if operations.contains(&OperationKind::Sift) {
            let invocation = SifterInvocation::preview(
                &workspace,
                &self.config.tools.sifter_bin,
                bin_name,
                ext,
                self.config.tools.num_threads,
            );
            entries.push(("luau-sifter", invocation.build_command().to_string()));
        }

        Ok(entries)
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path, sample_config)
            .map_err(|e| DumpSiftError::filesystem(output_path, e))?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &DumpSiftError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
