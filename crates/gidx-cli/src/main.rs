mod dump;

use std::io;
use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use gidx_index::SourceIndex;

/// `-h` prints the index header here, so clap's automatic help flag is
/// disabled; parse errors are ignored so that unknown flags are skipped
/// rather than fatal.
#[derive(Parser)]
#[command(
    name = "git-convert-index",
    about = "Convert the current repository's index from the v2/v3 format to v5",
    disable_help_flag = true,
    ignore_errors = true
)]
pub struct Cli {
    /// Print the index header
    #[arg(short = 'h')]
    header: bool,

    /// Print all index entries (git ls-files --debug format)
    #[arg(short = 'i')]
    entries: bool,

    /// Print the cache-tree extension data
    #[arg(short = 'c')]
    cache_tree: bool,

    /// Print the resolve-undo extension data
    #[arg(short = 'u')]
    resolve_undo: bool,

    /// Run as if started in <path>
    #[arg(short = 'C')]
    directory: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("fatal: cannot change to '{}': {}", dir.display(), e);
            process::exit(128);
        }
    }

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("fatal: {e}");
            process::exit(128);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    // Dumps only happen after a successful parse and checksum check, so a
    // corrupt input never produces partial output.
    let index = SourceIndex::read_from(".git/index")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.header {
        dump::header(&mut out, &index.header)?;
    }
    if cli.entries {
        dump::entries(&mut out, &index.active)?;
    }
    if cli.cache_tree {
        dump::cache_tree(&mut out, &index.cache_tree)?;
    }
    if cli.resolve_undo {
        dump::resolve_undo(&mut out, &index.resolve_undo)?;
    }

    index.write_v5(".git/index-v5")?;
    Ok(0)
}
