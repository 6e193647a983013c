//! Program-wide constants. Filesystem layout constants live in
//! `filesys::fat32::constants`.

pub mod shell;
