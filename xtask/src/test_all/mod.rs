//! Workspace test runner.
//!
//! Snapshot tests use insta inline snapshots, so a failing run leaves `.pending-snap` files (and
//! `.snap.new` for file snapshots) next to the sources. `run` removes stale ones first so that
//! `cargo insta review` only ever shows output from the latest run.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

/// Directories scanned for pending snapshot files.
const SOURCE_ROOTS: &[&str] = &["src", "quickstep-config/src"];

const PENDING_SUFFIXES: &[&str] = &[".snap.new", ".pending-snap"];

#[derive(Subcommand)]
pub enum Action {
    /// Run every test in the workspace
    Run {
        /// Only run tests matching this filter
        #[arg(long, short)]
        filter: Option<String>,

        /// Keep pending snapshot files from earlier runs
        #[arg(long)]
        no_pre_clean: bool,

        /// Remove pending snapshot files after a failed run
        #[arg(long)]
        post_clean: bool,

        /// Run tests in release mode
        #[arg(long)]
        release: bool,
    },
    /// Remove pending snapshot files
    Clean {
        /// List the files without removing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Count pending snapshot files
    Status,
}

pub fn run(action: Action) -> Result<()> {
    match action {
        Action::Run {
            filter,
            no_pre_clean,
            post_clean,
            release,
        } => run_tests(filter, no_pre_clean, post_clean, release),
        Action::Clean { dry_run } => clean(dry_run),
        Action::Status => status(),
    }
}

// =============================================================================
// Test runner
// =============================================================================

fn run_tests(
    filter: Option<String>,
    no_pre_clean: bool,
    post_clean: bool,
    release: bool,
) -> Result<()> {
    if !no_pre_clean {
        let removed = remove_all(&find_pending()?)?;
        if removed > 0 {
            println!("removed {removed} stale pending snapshot files");
        }
    }

    let mut cmd = Command::new("cargo");
    cmd.args(["test", "--workspace"]);
    if release {
        cmd.arg("--release");
    }
    if let Some(filter) = &filter {
        cmd.args(["--", filter]);
    }

    let start = Instant::now();
    let status = cmd.status().context("error running cargo test")?;
    let elapsed = start.elapsed().as_secs_f64();

    if status.success() {
        println!("all tests passed in {elapsed:.2}s");
        return Ok(());
    }

    let pending = find_pending()?;
    if !pending.is_empty() {
        println!("{} pending snapshot files", pending.len());
        if post_clean {
            remove_all(&pending)?;
        } else {
            println!("review with `cargo insta review` or remove with `cargo xtask test-all clean`");
        }
    }

    bail!("tests failed after {elapsed:.2}s");
}

// =============================================================================
// Cleanup
// =============================================================================

fn clean(dry_run: bool) -> Result<()> {
    let pending = find_pending()?;
    if pending.is_empty() {
        println!("no pending snapshot files");
        return Ok(());
    }

    for path in &pending {
        println!("{}", path.display());
    }

    if dry_run {
        println!("would remove {} files", pending.len());
    } else {
        let removed = remove_all(&pending)?;
        println!("removed {removed} files");
    }

    Ok(())
}

fn status() -> Result<()> {
    let pending = find_pending()?;
    println!("pending snapshot files: {}", pending.len());
    for path in &pending {
        println!("  {}", path.display());
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn find_pending() -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in SOURCE_ROOTS {
        let root = Path::new(root);
        if root.exists() {
            walk(root, &mut files)?;
        }
    }
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("error reading {dir:?}"))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if is_pending(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_pending(path: &Path) -> bool {
    let name = path.to_string_lossy();
    PENDING_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn remove_all(files: &[PathBuf]) -> Result<usize> {
    for path in files {
        std::fs::remove_file(path).with_context(|| format!("error removing {path:?}"))?;
    }
    Ok(files.len())
}
