#![cfg_attr(feature = "strict", deny(warnings))]

pub mod constants;
pub mod filesys;
pub mod logging;
pub mod shell;
