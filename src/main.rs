use anyhow::{anyhow, bail, Context, Result};
use fatimg::constants::shell::PROMPT;
use fatimg::logging;
use fatimg::shell::{Flow, Shell};
use log::{info, LevelFilter};
use std::io::{self, BufRead, Write};

const USAGE: &str = "usage: fatimg [-v|-q] [image]";

struct Args {
    level: LevelFilter,
    image: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        level: logging::default_level(),
        image: None,
    };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-v" => args.level = LevelFilter::Trace,
            "-q" => args.level = LevelFilter::Warn,
            flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, USAGE),
            _ => {
                if args.image.is_some() {
                    bail!(USAGE);
                }
                args.image = Some(arg.clone());
            }
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;
    logging::init(args.level).map_err(|e| anyhow!("cannot install logger: {}", e))?;

    let mut shell = Shell::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    if let Some(image) = &args.image {
        shell.execute(&format!("open {}", image), &mut stdout);
    }

    let mut line = String::new();
    loop {
        write!(stdout, "{}", PROMPT)?;
        stdout.flush()?;

        line.clear();
        let read = stdin.lock().read_line(&mut line).context("reading command")?;
        if read == 0 {
            // End of input behaves like quit.
            writeln!(stdout)?;
            shell.execute("quit", &mut stdout);
            break;
        }

        if shell.execute(&line, &mut stdout) == Flow::Quit {
            break;
        }
    }

    info!("bye");
    Ok(())
}
