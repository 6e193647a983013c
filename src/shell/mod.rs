//! Interactive command shell over a single open volume image

use crate::constants::shell::MAX_COMMAND_LENGTH;
use crate::filesys::fat32::Fat32;
use crate::filesys::{BlockDevice, FsError};
use core::fmt;
use log::{debug, info};
use std::io::{self, Write};

mod commands;

pub use commands::ReadFormat;

/// Volume session as the shell holds it: any backing storage will do
pub type Session = Fat32<Box<dyn BlockDevice>>;

/// What the read-eval loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Errors a command can end with
#[derive(Debug)]
pub enum CommandError {
    /// The filesystem refused the operation
    Fs(FsError),
    /// Missing or malformed arguments
    Usage(&'static str),
    /// No command of that name
    Unknown(String),
    /// A file on the host could not be opened or created
    Local { path: String, source: io::Error },
    /// Writing command output failed
    Output(io::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Fs(e) => write!(f, "{}", e),
            CommandError::Usage(msg) => write!(f, "{}", msg),
            CommandError::Unknown(name) => write!(f, "Unknown command: {}", name),
            CommandError::Local { path, source } => write!(f, "{}: {}", path, source),
            CommandError::Output(e) => write!(f, "Output failed: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Fs(e) => Some(e),
            CommandError::Local { source, .. } => Some(source),
            CommandError::Output(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FsError> for CommandError {
    fn from(e: FsError) -> Self {
        CommandError::Fs(e)
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Output(e)
    }
}

/// Command interpreter holding at most one open volume
#[derive(Default)]
pub struct Shell {
    session: Option<Session>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Installs an already mounted session, as `open` does after mounting
    pub fn attach(&mut self, session: Session) -> Result<(), FsError> {
        if self.session.is_some() {
            return Err(FsError::AlreadyOpen);
        }
        self.session = Some(session);
        Ok(())
    }

    /// Closes the open volume, flushing it first
    pub fn detach(&mut self) -> Result<(), FsError> {
        let session = self.session.take().ok_or(FsError::NotOpen)?;
        session.into_device()?;
        info!("image closed");
        Ok(())
    }

    pub(crate) fn session(&self) -> Result<&Session, FsError> {
        self.session.as_ref().ok_or(FsError::NotOpen)
    }

    pub(crate) fn session_mut(&mut self) -> Result<&mut Session, FsError> {
        self.session.as_mut().ok_or(FsError::NotOpen)
    }

    /// Runs one command line, reporting any failure on `out` as
    /// `Error: <message>`
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> Flow {
        match self.dispatch(line, out) {
            Ok(flow) => flow,
            Err(e) => {
                debug!("command {:?} failed: {:?}", line.trim(), e);
                // Nothing sensible is left to do when the error report itself fails.
                let _ = writeln!(out, "Error: {}", e);
                Flow::Continue
            }
        }
    }

    /// Tokenizes `line` on whitespace and runs the named command
    pub fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> Result<Flow, CommandError> {
        if line.len() > MAX_COMMAND_LENGTH {
            return Err(CommandError::Usage("Command too long"));
        }

        let mut tokens = line.split_whitespace();
        let name = match tokens.next() {
            Some(name) => name,
            None => return Ok(Flow::Continue),
        };
        let args: Vec<&str> = tokens.collect();

        let command = commands::find(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        (command.handler)(self, &args, out)
    }
}
