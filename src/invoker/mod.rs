pub mod command;
pub mod map_extraction;
pub mod sifter;

pub use command::{shell_quote, InvocationState, ProgressCallback, ToolCommand, ToolOutput};
pub use map_extraction::{decode_map_output, persist_map, MapExtractor, MemoryMap, SectionRecord};
pub use sifter::{run_sift, SifterInvocation};
