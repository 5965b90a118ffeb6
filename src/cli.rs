use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::report::OperationKind;
use crate::workspace::validate_bin_name;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dumpsift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract memory maps and sift memory dumps with radare2 and luau-sifter")]
#[command(
    long_about = "DumpSift keeps memory dumps, radare2 section maps and luau-sifter results in a \
                  fixed layout under a base directory (bins/, mem/, searches/) and runs the \
                  external tools against a named dump."
)]
#[command(after_help = "EXAMPLES:\n  \
    dumpsift -c --base-dir ./analysis --bin-name crash1\n  \
    dumpsift --radare --base-dir ./analysis --bin-name crash1\n  \
    dumpsift --radare --sifter --base-dir ./analysis --bin-name crash1.DMP --num-threads 8\n  \
    dumpsift --sifter --sifter-bin ~/luau-sifter/target/release/luau-sifter --base-dir ./analysis --bin-name crash1")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Create the bins/, mem/ and searches/ directories under the base directory
    #[arg(short = 'c', long)]
    pub create_output_structure: bool,

    /// Extract the memory section map with radare2 and store it under mem/
    #[arg(long, visible_alias = "map-extraction")]
    pub radare: bool,

    /// Run luau-sifter against the dump, writing into searches/<bin-name>/
    #[arg(long, visible_alias = "sift")]
    pub sifter: bool,

    /// Path to the luau-sifter executable
    #[arg(long, alias = "luau_sifter_bin", value_name = "PATH")]
    pub sifter_bin: Option<PathBuf>,

    /// Path to the radare2 executable
    #[arg(long, value_name = "PATH")]
    pub radare_bin: Option<PathBuf>,

    /// Base directory for analysis
    #[arg(
        long,
        alias = "base_dir",
        value_name = "DIR",
        required_unless_present = "generate_config"
    )]
    pub base_dir: Option<PathBuf>,

    /// Dump name to analyze, with or without its extension
    #[arg(
        long,
        alias = "bin_name",
        value_name = "NAME",
        value_parser = parse_bin_name,
        required_unless_present = "generate_config"
    )]
    pub bin_name: Option<String>,

    /// Number of sifter threads (default 3030)
    #[arg(long, alias = "num_threads", value_parser = clap::value_parser!(u32).range(1..))]
    pub num_threads: Option<u32>,

    /// Extension of the dump file (default DMP)
    #[arg(long, alias = "dmp_ext", value_name = "EXT")]
    pub dmp_ext: Option<String>,

    /// Configuration file path
    #[arg(long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Directory holding the rolling log file
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show resolved paths and commands without executing)
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let base_dir = self.base_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(dir)
            }
        });

        CliOverrides::new()
            .with_base_dir(base_dir)
            .with_dump_extension(self.dmp_ext.clone())
            .with_radare_bin(self.radare_bin.clone())
            .with_sifter_bin(self.sifter_bin.clone())
            .with_num_threads(self.num_threads)
            .with_log_dir(self.log_dir.clone())
    }

    /// Selected operations in execution order: layout, map extraction, sift.
    pub fn requested_operations(&self) -> Vec<OperationKind> {
        let mut operations = Vec::new();
        if self.create_output_structure {
            operations.push(OperationKind::CreateLayout);
        }
        if self.radare {
            operations.push(OperationKind::MapExtraction);
        }
        if self.sifter {
            operations.push(OperationKind::Sift);
        }
        operations
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn parse_bin_name(s: &str) -> std::result::Result<String, String> {
    validate_bin_name(s).map_err(|e| e.to_string())?;
    Ok(s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dumpsift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_combine_in_fixed_order() {
        let cli = parse(&[
            "--sifter",
            "--radare",
            "-c",
            "--base-dir",
            "/tmp/work",
            "--bin-name",
            "crash1",
        ]);

        assert_eq!(
            cli.requested_operations(),
            vec![
                OperationKind::CreateLayout,
                OperationKind::MapExtraction,
                OperationKind::Sift
            ]
        );
    }

    #[test]
    fn test_legacy_flag_spellings() {
        let cli = parse(&[
            "--map-extraction",
            "--base_dir",
            "/tmp/work",
            "--bin_name",
            "crash1",
            "--num_threads",
            "8",
            "--dmp_ext",
            "dmp",
            "--luau_sifter_bin",
            "/opt/sifter",
        ]);

        assert!(cli.radare);
        assert_eq!(cli.num_threads, Some(8));
        assert_eq!(cli.dmp_ext.as_deref(), Some("dmp"));
        assert_eq!(cli.sifter_bin.as_deref(), Some(Path::new("/opt/sifter")));
    }

    #[test]
    fn test_base_dir_and_bin_name_required() {
        assert!(Cli::try_parse_from(["dumpsift", "--radare", "--bin-name", "crash1"]).is_err());
        assert!(Cli::try_parse_from(["dumpsift", "--radare", "--base-dir", "/tmp"]).is_err());
        assert!(Cli::try_parse_from(["dumpsift", "--generate-config"]).is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ["dumpsift", "--base-dir", "/tmp/work"];
        let with = |extra: &[&str]| {
            Cli::try_parse_from(base.iter().copied().chain(extra.iter().copied()))
        };

        assert!(with(&["--bin-name", ""]).is_err());
        assert!(with(&["--bin-name", "../etc"]).is_err());
        assert!(with(&["--bin-name", "."]).is_err());
        assert!(with(&["--bin-name", "crash1", "--num-threads", "0"]).is_err());
        assert!(with(&["--bin-name", "crash1", "--num-threads", "many"]).is_err());
    }

    #[test]
    fn test_config_defaults_apply() {
        let cli = parse(&["--base-dir", "/tmp/work", "--bin-name", "crash1"]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.tools.num_threads, 3030);
        assert_eq!(config.workspace.dump_extension, "DMP");
        assert_eq!(config.base_directory().unwrap(), Path::new("/tmp/work"));
        assert!(cli.requested_operations().is_empty());
    }

    #[test]
    fn test_relative_base_dir_is_anchored() {
        let cli = parse(&["--base-dir", "analysis", "--bin-name", "crash1"]);
        let overrides = cli.create_cli_overrides();

        let base = overrides.base_dir.unwrap();
        assert!(base.is_absolute());
        assert!(base.ends_with("analysis"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from([
            "dumpsift", "-q", "-v", "--base-dir", "/tmp", "--bin-name", "x"
        ])
        .is_err());

        let cli = parse(&["-q", "--base-dir", "/tmp", "--bin-name", "x"]);
        assert_eq!(cli.verbosity_level(), 0);
    }
}
