use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use lc4_sim::debugger::command::Command;
use lc4_sim::debugger::{Debugger, Flow};
use lc4_sim::sim::SimFlags;

/// An LC-4 simulator and debugger for object files.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Object file to load before the first command
    obj_file: Option<PathBuf>,

    /// Run these `;`-separated debugger commands, then exit
    #[arg(short, long)]
    command: Option<String>,

    /// Fault on division by zero, protected writes, unknown opcodes, and data execution
    #[arg(long)]
    strict: bool,

    /// Run as though always in supervisor mode
    #[arg(long)]
    ignore_privilege: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log filter (e.g. `lc4_sim=trace`), overriding `RUST_LOG`
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    init_logging(args.log.as_deref(), !args.no_color);

    let flags = SimFlags {
        strict: args.strict,
        ignore_privilege: args.ignore_privilege,
        ..Default::default()
    };

    match run(args, flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("i/o error: {e}").red());
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr, so that debugger output on stdout stays clean.
fn init_logging(filter: Option<&str>, ansi: bool) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .init();
}

fn run(args: Args, flags: SimFlags) -> io::Result<()> {
    let mut dbg = Debugger::new(flags);
    let mut out = io::stdout().lock();

    if let Some(path) = args.obj_file {
        dbg.execute(Command::Load(path), &mut out)?;
    }

    match args.command {
        Some(commands) => {
            for line in commands.split(';') {
                if dbg.execute_line(line, &mut out)? == Flow::Quit {
                    break;
                }
            }
            Ok(())
        },
        None => repl(&mut dbg, &mut out),
    }
}

fn repl(dbg: &mut Debugger, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "LC4 ISA Emulator (type `help` for commands)")?;

    let mut stdin = io::stdin().lock();
    let mut line = String::new();
    loop {
        write!(out, "lc4> ")?;
        out.flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break Ok(());
        }
        if dbg.execute_line(&line, out)? == Flow::Quit {
            break Ok(());
        }
    }
}
