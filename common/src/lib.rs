//! Pieces shared by the gadget daemons and tools in this workspace.

mod logger;

pub use logger::{file_level, output_level, setup_logging};
