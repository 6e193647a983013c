//! Limits and strings of the interactive shell

/// Printed before every command line
pub const PROMPT: &str = "mfs> ";

/// Longest command line accepted, in bytes
pub const MAX_COMMAND_LENGTH: usize = 1024;

/// Longest image path `open` accepts
pub const MAX_IMAGE_PATH_LENGTH: usize = 100;
