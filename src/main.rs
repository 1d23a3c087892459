use chainar::{Archive, ArchiveError, ArchiveOptions, ListedEntry};
use clap::{ArgAction, ArgGroup, Parser};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "chainar", version, about = "Append-only chained-block archive")]
#[command(group(ArgGroup::new("action").required(true).args(["new", "dir", "add", "cat"])))]
struct Cli {
    /// Create a new, empty archive
    #[arg(short, long, value_name = "ARCHIVE")]
    new: Option<PathBuf>,
    /// List the entries of an archive
    #[arg(short, long, value_name = "ARCHIVE")]
    dir: Option<PathBuf>,
    /// Append items to an archive: --add ARCHIVE ITEM...
    #[arg(short, long, value_names = ["ARCHIVE", "ITEM"], num_args = 2..)]
    add: Option<Vec<PathBuf>>,
    /// Write one entry's payload to stdout: --cat ARCHIVE NAME
    #[arg(long, value_names = ["ARCHIVE", "NAME"], num_args = 2)]
    cat: Option<Vec<String>>,
    /// Print the listing as JSON
    #[arg(long, requires = "dir")]
    json: bool,
    /// Copy buffer in bytes (default: the input's preferred block size)
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ArchiveOptions {
        copy_buffer: cli.buffer_size,
        ..ArchiveOptions::default()
    };

    let result = if let Some(path) = cli.new {
        Archive::create(&path, options).map(|_| {
            println!("new archive '{}' created.", path.display());
        })
    } else if let Some(path) = cli.dir {
        list(&path, options, cli.json)
    } else if let Some(args) = cli.add {
        return add(&args[0], &args[1..], options);
    } else if let Some(args) = cli.cat {
        cat(&args[0], &args[1], options)
    } else {
        unreachable!("clap enforces one action")
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

// ── actions ──────────────────────────────────────────────────────────────────

fn list(path: &Path, options: ArchiveOptions, json: bool) -> Result<(), ArchiveError> {
    let mut ar = Archive::open_read_only(path, options)?;

    if json {
        let entries = ar.entries()?;
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, &entries).map_err(io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    println!("Entries of '{}'", path.display());
    println!("-----------------------");
    println!("{:>12} {:<26} {:>8} {:>8} {:>8} {:>5}",
             "Size", "Filename", "UID", "GID", "Status", "Type");
    let blocks = ar.list(print_entry)?;
    println!("({} block{})", blocks, if blocks == 1 { "" } else { "s" });
    Ok(())
}

fn print_entry(e: &ListedEntry) {
    println!("{:>12} {:<26} {:>8} {:>8} {:>8} {:>5}",
             e.length, e.name, e.uid, e.gid, e.status, e.kind);
}

fn add(archive: &Path, items: &[PathBuf], options: ArchiveOptions) -> ExitCode {
    let mut ar = match Archive::open(archive, options) {
        Ok(ar) => ar,
        Err(e) => return report(&e),
    };

    let mut code = ExitCode::SUCCESS;
    let mut failed = false;
    for item in items {
        match ar.append_path(item) {
            Ok(done) => println!("  added   {} ({} bytes at {:#x})",
                                 done.name, done.length, done.position),
            Err(e) => {
                let c = report(&e);
                if !failed {
                    failed = true;
                    code = c;
                }
            }
        }
    }
    code
}

fn cat(archive: &str, name: &str, options: ArchiveOptions) -> Result<(), ArchiveError> {
    let mut ar = Archive::open_read_only(archive, options)?;
    let mut out = io::stdout().lock();
    ar.extract(name.as_bytes(), &mut out)?;
    out.flush()?;
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn report(e: &ArchiveError) -> ExitCode {
    eprintln!("chainar: {e}");
    ExitCode::from(e.exit_code())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}
