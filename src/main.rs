//! onchange - run a command when watched files change
//!
//! Usage: pipe a list of files on stdin, then either
//!
//!   onchange <command> [args...]   run the command once per change batch
//!   onchange +<path>               stream changed paths into a FIFO at <path>

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;

use onchange::input;
use onchange::rearm;
use onchange::sink::{ActionSink, CommandSink, FifoGuard, StreamSink};
use onchange::source;
use onchange::{dispatch, Notice, Registry, RetryPolicy, SystemClock};

/// Run arbitrary commands when files change
#[derive(Parser, Debug)]
#[command(name = "onchange")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit NDJSON progress records on stderr
    #[arg(long)]
    json: bool,

    /// Report changes and rearms on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Command to run, or +<path> naming a FIFO to stream changed paths into
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    action: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Exec { program: String, args: Vec<String> },
    Stream { fifo: PathBuf },
}

fn parse_mode(action: &[String]) -> Result<Mode> {
    let first = &action[0];
    if let Some(path) = first.strip_prefix('+') {
        if path.is_empty() {
            bail!("stream mode needs a path after '+'");
        }
        if action.len() > 1 {
            bail!("stream mode takes no arguments after '+{path}'");
        }
        Ok(Mode::Stream { fifo: PathBuf::from(path) })
    } else {
        Ok(Mode::Exec {
            program: first.clone(),
            args: action[1..].to_vec(),
        })
    }
}

fn main() -> Result<()> {
    // usage errors exit 1, --help/--version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            process::exit(code);
        }
    };

    let mode = parse_mode(&cli.action)?;
    run_watch(mode, cli.json, cli.verbose)
}

fn run_watch(mode: Mode, json: bool, verbose: bool) -> Result<()> {
    let max_files = input::raise_fd_limit().context("adjusting the open-file limit")?;
    let paths = {
        let mut stdin = io::stdin().lock();
        input::read_paths(&mut stdin, max_files).context("reading the file list from stdin")?
    };
    if paths.is_empty() {
        bail!("no files to watch; pipe a list of paths on stdin");
    }
    let mut registry = Registry::from_paths(paths);

    // the FIFO must exist before the blocking open-for-write, and the
    // interrupt handler must know about it before that open can block
    let mut fifo_guard = None;
    let mut sink: Box<dyn ActionSink> = match mode {
        Mode::Exec { program, args } => {
            install_interrupt_handler(None)?;
            Box::new(CommandSink::new(program, args))
        }
        Mode::Stream { fifo } => {
            let guard = FifoGuard::create(fifo)?;
            install_interrupt_handler(Some(guard.path().to_path_buf()))?;
            let writer = guard
                .open_writer()
                .context("waiting for a reader on the stream")?;
            fifo_guard = Some(guard);
            Box::new(StreamSink::new(writer))
        }
    };

    let track_input = io::stdin().is_terminal();
    let mut source = source::platform_source(track_input)?;
    let policy = RetryPolicy::default();
    let clock = SystemClock;
    let ids: Vec<_> = registry.ids().collect();
    for id in ids {
        rearm::arm(source.as_mut(), &mut registry, id, &policy, &clock)?;
    }

    let running = AtomicBool::new(true);
    dispatch::run(
        source.as_mut(),
        &mut registry,
        sink.as_mut(),
        &policy,
        &clock,
        &running,
        |notice| report(&notice, json, verbose),
    )?;

    drop(fifo_guard);
    Ok(())
}

/// The handler owns the cleanup that normal unwinding cannot reach
fn install_interrupt_handler(fifo: Option<PathBuf>) -> Result<()> {
    ctrlc::set_handler(move || {
        if let Some(path) = &fifo {
            let _ = fs::remove_file(path);
        }
        process::exit(0);
    })
    .context("installing the interrupt handler")
}

fn report(notice: &Notice, json: bool, verbose: bool) {
    if json {
        eprintln!("{}", notice.to_json());
    } else if verbose {
        match notice {
            Notice::WatchStarted { files } => eprintln!("watching {files} file(s)"),
            Notice::FileChanged { path } => eprintln!("changed: {path}"),
            Notice::Rearmed { path } => eprintln!("rearmed: {path}"),
            Notice::ActionFailed { message } => eprintln!("action failed: {message}"),
            Notice::QueueOverflow => {
                eprintln!("event queue overflowed; some changes may have been missed");
            }
            Notice::Shutdown => eprintln!("shutting down"),
        }
    } else if let Notice::ActionFailed { message } = notice {
        eprintln!("onchange: {message}");
    }
}
