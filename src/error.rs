use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DumpSiftError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem operation failed on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {tool} ({program}): {source}")]
    ToolInvocation {
        tool: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed section map from {context}: {message}")]
    MalformedMap { context: String, message: String },
}

impl DumpSiftError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        DumpSiftError::Configuration {
            message: message.into(),
        }
    }

    pub fn filesystem<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        DumpSiftError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for both flavours of unusable tool output.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            DumpSiftError::Decode { .. } | DumpSiftError::MalformedMap { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            DumpSiftError::Configuration { .. } => 2,
            DumpSiftError::Filesystem { .. } => 3,
            DumpSiftError::ToolInvocation { .. } => 4,
            DumpSiftError::Decode { .. } | DumpSiftError::MalformedMap { .. } => 5,
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for DumpSiftError {
    fn user_message(&self) -> String {
        match self {
            DumpSiftError::Configuration { message } => {
                format!("Configuration error: {}", message)
            }
            DumpSiftError::Filesystem { path, source } => {
                format!("Cannot write to {}: {}", path.display(), source)
            }
            DumpSiftError::ToolInvocation {
                tool,
                program,
                source,
            } if source.kind() == std::io::ErrorKind::NotFound => {
                format!("{} executable not found: {}", tool, program)
            }
            DumpSiftError::ToolInvocation { tool, program, .. } => {
                format!("Could not start {} ({})", tool, program)
            }
            DumpSiftError::Decode { context, .. } => {
                format!("Output of {} is not valid JSON", context)
            }
            DumpSiftError::MalformedMap { context, message } => {
                format!("Unexpected section map layout from {}: {}", context, message)
            }
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            DumpSiftError::Configuration { .. } => Some(
                "Check the command line flags and your dumpsift.toml for missing or invalid values.".to_string()
            ),
            DumpSiftError::Filesystem { .. } => Some(
                "Ensure the base directory exists on a writable filesystem and you have permission to create directories in it.".to_string()
            ),
            DumpSiftError::ToolInvocation { tool, .. } if tool == "radare2" => Some(
                "Install radare2 or point --radare-bin at the r2 executable.".to_string()
            ),
            DumpSiftError::ToolInvocation { .. } => Some(
                "Build luau-sifter or point --sifter-bin at the compiled executable.".to_string()
            ),
            DumpSiftError::Decode { .. } | DumpSiftError::MalformedMap { .. } => Some(
                "Run radare2 manually against the dump to inspect its diagnostics; the dump may be missing or corrupt.".to_string()
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, DumpSiftError>;
