use crate::error::{DumpSiftError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

pub const DEFAULT_SIFTER_BIN: &str = "../luau-sifter/target/debug/luau-sifter";
pub const DEFAULT_RADARE_BIN: &str = "r2";
pub const DEFAULT_DUMP_EXTENSION: &str = "DMP";
pub const DEFAULT_NUM_THREADS: u32 = 3030;
pub const DEFAULT_LOG_PREFIX: &str = "analyze_dumps.log";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Left unset in files; the command line always supplies it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<PathBuf>,
    pub dump_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub radare_bin: PathBuf,
    pub sifter_bin: PathBuf,
    pub num_threads: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub max_files: usize,
    pub level: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_directory: None,
            dump_extension: DEFAULT_DUMP_EXTENSION.to_string(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            radare_bin: PathBuf::from(DEFAULT_RADARE_BIN),
            sifter_bin: PathBuf::from(DEFAULT_SIFTER_BIN),
            num_threads: DEFAULT_NUM_THREADS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: DEFAULT_LOG_PREFIX.to_string(),
            max_files: 7,
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DumpSiftError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DumpSiftError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            DumpSiftError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["dumpsift.toml", "dumpsift.config.toml", ".dumpsift.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref base_dir) = cli_args.base_dir {
            self.workspace.base_directory = Some(base_dir.clone());
        }

        if let Some(ref ext) = cli_args.dump_extension {
            self.workspace.dump_extension = ext.trim().trim_start_matches('.').to_string();
        }

        if let Some(ref radare) = cli_args.radare_bin {
            self.tools.radare_bin = radare.clone();
        }

        if let Some(ref sifter) = cli_args.sifter_bin {
            self.tools.sifter_bin = sifter.clone();
        }

        if let Some(threads) = cli_args.num_threads {
            self.tools.num_threads = threads;
        }

        if let Some(ref log_dir) = cli_args.log_dir {
            self.logging.directory = log_dir.clone();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| DumpSiftError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| DumpSiftError::filesystem(path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let ext = &self.workspace.dump_extension;
        if ext.is_empty() {
            return Err(DumpSiftError::config("Dump extension must not be empty"));
        }

        if ext.contains('.') || ext.contains('/') || ext.contains('\\') {
            return Err(DumpSiftError::config(format!(
                "Dump extension must be a bare extension such as DMP, got: {}",
                ext
            )));
        }

        if self.tools.num_threads == 0 {
            return Err(DumpSiftError::config(
                "Number of sifter threads must be greater than 0",
            ));
        }

        if self.tools.radare_bin.as_os_str().is_empty() {
            return Err(DumpSiftError::config("radare2 executable path is empty"));
        }

        if self.tools.sifter_bin.as_os_str().is_empty() {
            return Err(DumpSiftError::config("Sifter executable path is empty"));
        }

        if self.logging.max_files == 0 {
            return Err(DumpSiftError::config(
                "At least one log file must be retained",
            ));
        }

        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(DumpSiftError::config(format!(
                "Unknown log level '{}' (expected trace, debug, info, warn, error or off)",
                self.logging.level
            )));
        }

        if let Some(ref base) = self.workspace.base_directory {
            if base.as_os_str().is_empty() {
                return Err(DumpSiftError::config("Base directory must not be empty"));
            }
        }

        Ok(())
    }

    /// The base directory is mandatory for every operation except config generation.
    pub fn base_directory(&self) -> Result<&Path> {
        self.workspace
            .base_directory
            .as_deref()
            .ok_or_else(|| DumpSiftError::config("No base directory given (use --base-dir)"))
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub base_dir: Option<PathBuf>,
    pub dump_extension: Option<String>,
    pub radare_bin: Option<PathBuf>,
    pub sifter_bin: Option<PathBuf>,
    pub num_threads: Option<u32>,
    pub log_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn with_dump_extension(mut self, ext: Option<String>) -> Self {
        self.dump_extension = ext;
        self
    }

    pub fn with_radare_bin(mut self, radare: Option<PathBuf>) -> Self {
        self.radare_bin = radare;
        self
    }

    pub fn with_sifter_bin(mut self, sifter: Option<PathBuf>) -> Self {
        self.sifter_bin = sifter;
        self
    }

    pub fn with_num_threads(mut self, threads: Option<u32>) -> Self {
        self.num_threads = threads;
        self
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workspace.dump_extension, "DMP");
        assert_eq!(config.tools.num_threads, 3030);
        assert_eq!(config.tools.radare_bin, PathBuf::from("r2"));
        assert_eq!(config.logging.file_prefix, "analyze_dumps.log");
        assert!(config.workspace.base_directory.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.tools.num_threads = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workspace.dump_extension = "tar.gz".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workspace.dump_extension.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tools.sifter_bin = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();
        for level in ["trace", "DEBUG", "warn", "off"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{} rejected", level);
        }

        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_missing_base_directory() {
        let config = Config::default();
        let err = config.base_directory().unwrap_err();
        assert!(matches!(err, DumpSiftError::Configuration { .. }));
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.tools.num_threads = 16;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.tools.num_threads, 16);
        assert_eq!(loaded_config.workspace.dump_extension, "DMP");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[tools]\nnum_threads = 8").unwrap();

        let config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.tools.num_threads, 8);
        assert_eq!(config.tools.radare_bin, PathBuf::from("r2"));
        assert_eq!(config.workspace.dump_extension, "DMP");
    }

    #[test]
    fn test_invalid_config_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[tools\nnum_threads = ").unwrap();

        let err = Config::load_from_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, DumpSiftError::Configuration { .. }));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_base_dir(Some(PathBuf::from("/tmp/work")))
            .with_num_threads(Some(8))
            .with_dump_extension(Some(".dmp".to_string()))
            .with_sifter_bin(Some(PathBuf::from("/opt/sifter")));

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.base_directory().unwrap(), Path::new("/tmp/work"));
        assert_eq!(config.tools.num_threads, 8);
        assert_eq!(config.workspace.dump_extension, "dmp");
        assert_eq!(config.tools.sifter_bin, PathBuf::from("/opt/sifter"));
        assert_eq!(config.tools.radare_bin, PathBuf::from("r2"));
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(!sample.is_empty());
        assert!(sample.contains("[workspace]"));
        assert!(sample.contains("[tools]"));
        assert!(sample.contains("[logging]"));
        assert!(!sample.contains("base_directory"));
    }
}
