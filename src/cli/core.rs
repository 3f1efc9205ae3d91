
use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use std::path::Path;

use crate::cli::polish::PolishSettings;
use crate::cli::scan::ScanSettings;

lazy_static! {
    /// Package version plus the git description emitted by build.rs, e.g. `0.3.1-6bb9635-dirty`
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string containing the legalese.
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2023-{}     Plastome Polish contributors
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// Plastome Polish, a tool for turning candidate chloroplast assemblies into one clean sequence.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Selects, corrects, and re-orients the candidate assemblies for a batch of samples
    Polish(Box<PolishSettings>),
    /// Reports the windowed k-mer concordance of a single sequence against the reference
    Scan(Box<ScanSettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Fails if a user-provided input file is missing
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{label} does not exist: \"{}\"", filename.display());
    }
    Ok(())
}

/// Same as `check_required_filename`, but an unset path passes
/// # Arguments
/// * `opt_filename` - the optional file path to check for
/// * `label` - the label to use for error messages
pub fn check_optional_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    match opt_filename {
        Some(filename) => check_required_filename(filename, label),
        None => Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_filenames() {
        assert!(check_required_filename(Path::new("/this/does/not/exist.fa"), "Reference").is_err());
        assert!(check_optional_filename(None, "Regions").is_ok());
        assert!(check_optional_filename(Some(Path::new("/this/does/not/exist.tsv")), "Regions").is_err());
    }
}
