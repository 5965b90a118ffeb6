pub mod layout;

pub use layout::{validate_bin_name, DumpReference, Workspace};
