use super::{CommandError, Flow, Session, Shell};
use crate::constants::shell::MAX_IMAGE_PATH_LENGTH;
use crate::filesys::block::ImageBlockDevice;
use crate::filesys::fat32::Fat32;
use crate::filesys::BlockDevice;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

type Handler = fn(&mut Shell, &[&str], &mut dyn Write) -> Result<Flow, CommandError>;

pub(super) struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub handler: Handler,
    pub hidden: bool,
}

static COMMANDS: &[Command] = &[
    Command {
        name: "open",
        usage: "open <image>",
        description: "opens a FAT32 image file",
        handler: cmd_open,
        hidden: false,
    },
    Command {
        name: "close",
        usage: "close",
        description: "closes the open image",
        handler: cmd_close,
        hidden: false,
    },
    Command {
        name: "info",
        usage: "info",
        description: "prints the volume parameters",
        handler: cmd_info,
        hidden: false,
    },
    Command {
        name: "ls",
        usage: "ls",
        description: "lists the current directory",
        handler: cmd_ls,
        hidden: false,
    },
    Command {
        name: "cd",
        usage: "cd <dir>",
        description: "changes the current directory",
        handler: cmd_cd,
        hidden: false,
    },
    Command {
        name: "stat",
        usage: "stat <name>",
        description: "shows attributes, starting cluster and size",
        handler: cmd_stat,
        hidden: false,
    },
    Command {
        name: "read",
        usage: "read <name> <position> <count> [-hex|-ascii|-dec]",
        description: "prints bytes of a file",
        handler: cmd_read,
        hidden: false,
    },
    Command {
        name: "get",
        usage: "get <name> [local]",
        description: "copies a file out of the image",
        handler: cmd_get,
        hidden: false,
    },
    Command {
        name: "put",
        usage: "put <local> [name]",
        description: "copies a local file into the current directory",
        handler: cmd_put,
        hidden: false,
    },
    Command {
        name: "del",
        usage: "del <name>",
        description: "deletes a file, leaving its clusters in place",
        handler: cmd_del,
        hidden: false,
    },
    Command {
        name: "undel",
        usage: "undel <name>",
        description: "restores a deleted file",
        handler: cmd_undel,
        hidden: false,
    },
    Command {
        name: "help",
        usage: "help",
        description: "shows this output",
        handler: cmd_help,
        hidden: false,
    },
    Command {
        name: "quit",
        usage: "quit",
        description: "closes the image and leaves",
        handler: cmd_quit,
        hidden: false,
    },
    Command {
        name: "exit",
        usage: "exit",
        description: "same as quit",
        handler: cmd_quit,
        hidden: true,
    },
];

/// Case-insensitive lookup in the command table
pub(super) fn find(name: &str) -> Option<&'static Command> {
    COMMANDS
        .iter()
        .find(|cmd| cmd.name.eq_ignore_ascii_case(name))
}

/// Rendering of bytes printed by `read`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFormat {
    #[default]
    Hex,
    Ascii,
    Decimal,
}

impl ReadFormat {
    /// Parses the optional flag of `read`; unknown flags keep the default
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("-ascii") => ReadFormat::Ascii,
            Some("-dec") => ReadFormat::Decimal,
            _ => ReadFormat::Hex,
        }
    }

    /// Writes `bytes` on one line
    pub fn render(self, bytes: &[u8], out: &mut dyn Write) -> std::io::Result<()> {
        match self {
            ReadFormat::Hex => {
                for byte in bytes {
                    write!(out, "0x{:02X} ", byte)?;
                }
            }
            ReadFormat::Ascii => out.write_all(bytes)?,
            ReadFormat::Decimal => {
                for byte in bytes {
                    write!(out, "{} ", byte)?;
                }
            }
        }
        writeln!(out)
    }
}

fn arg<'a>(args: &[&'a str], index: usize, missing: &'static str) -> Result<&'a str, CommandError> {
    args.get(index).copied().ok_or(CommandError::Usage(missing))
}

fn number(text: &str, invalid: &'static str) -> Result<u32, CommandError> {
    text.parse().map_err(|_| CommandError::Usage(invalid))
}

fn cmd_open(shell: &mut Shell, args: &[&str], _out: &mut dyn Write) -> Result<Flow, CommandError> {
    let path = arg(args, 0, "No filename specified")?;
    if shell.is_open() {
        return Err(crate::filesys::FsError::AlreadyOpen.into());
    }
    if path.len() > MAX_IMAGE_PATH_LENGTH {
        return Err(CommandError::Usage("Image path too long"));
    }

    let device: Box<dyn BlockDevice> = Box::new(ImageBlockDevice::open_volume(path)?);
    let session: Session = Fat32::mount(device)?;
    shell.attach(session)?;
    info!("opened {}", path);
    Ok(Flow::Continue)
}

fn cmd_close(shell: &mut Shell, _args: &[&str], _out: &mut dyn Write) -> Result<Flow, CommandError> {
    shell.detach()?;
    Ok(Flow::Continue)
}

fn cmd_info(shell: &mut Shell, _args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session()?;
    write!(out, "{}", session.geometry())?;
    Ok(Flow::Continue)
}

fn cmd_ls(shell: &mut Shell, _args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    for listing in shell.session()?.list()? {
        if listing.is_dir {
            writeln!(out, "{}/", listing.name)?;
        } else {
            writeln!(out, "{}", listing.name)?;
        }
    }
    Ok(Flow::Continue)
}

fn cmd_cd(shell: &mut Shell, args: &[&str], _out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session_mut()?;
    let dir = arg(args, 0, "No directory specified")?;
    session.change_dir(dir)?;
    Ok(Flow::Continue)
}

fn cmd_stat(shell: &mut Shell, args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session()?;
    let entry = session.stat(arg(args, 0, "No filename specified")?)?;

    writeln!(out, "Attributes: {}", entry.attributes)?;
    writeln!(out, "Starting Cluster: {}", entry.first_cluster())?;
    let size = if entry.is_directory() { 0 } else { entry.file_size };
    writeln!(out, "File Size: {} bytes", size)?;
    Ok(Flow::Continue)
}

fn cmd_read(shell: &mut Shell, args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session()?;
    let name = arg(args, 0, "Missing parameters")?;
    let position = number(arg(args, 1, "Missing position")?, "Invalid position")?;
    let count = number(arg(args, 2, "Missing number of bytes")?, "Invalid number of bytes")?;
    let format = ReadFormat::from_flag(args.get(3).copied());

    let bytes = session.read(name, position, count)?;
    format.render(&bytes, out)?;
    Ok(Flow::Continue)
}

fn cmd_get(shell: &mut Shell, args: &[&str], _out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session()?;
    let name = arg(args, 0, "No filename specified")?;
    let local = args.get(1).copied().unwrap_or(name);

    // Resolve the entry before creating anything on the host.
    session.stat(name)?;
    let file = File::create(local).map_err(|source| CommandError::Local {
        path: local.to_string(),
        source,
    })?;
    let mut sink = BufWriter::new(file);
    let written = match session.export(name, &mut sink) {
        Ok(written) => written,
        Err(e) => {
            drop(sink);
            if let Err(remove) = std::fs::remove_file(local) {
                warn!("cannot remove partial export {}: {}", local, remove);
            }
            return Err(e.into());
        }
    };
    info!("exported {} bytes of {} to {}", written, name, local);
    Ok(Flow::Continue)
}

fn cmd_put(shell: &mut Shell, args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session_mut()?;
    let local = arg(args, 0, "No filename specified")?;
    let name = match args.get(1) {
        Some(name) => *name,
        None => Path::new(local)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(local),
    };

    let mut source = File::open(local).map_err(|source| CommandError::Local {
        path: local.to_string(),
        source,
    })?;
    session.import(name, &mut source)?;
    writeln!(out, "File copied successfully")?;
    Ok(Flow::Continue)
}

fn cmd_del(shell: &mut Shell, args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session_mut()?;
    session.delete(arg(args, 0, "No filename specified")?)?;
    writeln!(out, "File deleted successfully")?;
    Ok(Flow::Continue)
}

fn cmd_undel(shell: &mut Shell, args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    let session = shell.session_mut()?;
    session.undelete(arg(args, 0, "No filename specified")?)?;
    writeln!(out, "File restored successfully")?;
    Ok(Flow::Continue)
}

fn cmd_help(_shell: &mut Shell, _args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    writeln!(out, "List of commands:")?;
    for cmd in COMMANDS.iter().filter(|cmd| !cmd.hidden) {
        writeln!(out, " {:<52} {}", cmd.usage, cmd.description)?;
    }
    Ok(Flow::Continue)
}

fn cmd_quit(shell: &mut Shell, _args: &[&str], out: &mut dyn Write) -> Result<Flow, CommandError> {
    if shell.is_open() {
        // The session is dropped even when its flush fails.
        if let Err(e) = shell.detach() {
            writeln!(out, "Error: {}", e)?;
        }
    }
    Ok(Flow::Quit)
}
