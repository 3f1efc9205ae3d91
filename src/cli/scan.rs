
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::orientation::kmer_index::MAX_KMER_SIZE;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct ScanSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    plastome_polish_version: String,

    /// Reference FASTA file
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_fn: PathBuf,

    /// Reference record to use [default: the only record]
    #[clap(long = "reference-contig")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_contig: Option<String>,

    /// Query FASTA file, the first record is scanned
    #[clap(required = true)]
    #[clap(short = 'q')]
    #[clap(long = "query")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub query_fn: PathBuf,

    /// Output window table (.tsv or .csv)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_fn: PathBuf,

    /// k-mer length for the concordance scan
    #[clap(short = 'k')]
    #[clap(long = "kmer-size")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Scan parameters"))]
    #[clap(default_value = "16")]
    pub kmer_size: usize,

    /// Scan window width
    #[clap(long = "window-size")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Scan parameters"))]
    #[clap(default_value = "400")]
    pub window_size: usize,

    /// Minimum k-mer concordance for a window to pass
    #[clap(long = "concordance-threshold")]
    #[clap(value_name = "FRAC")]
    #[clap(help_heading = Some("Scan parameters"))]
    #[clap(default_value = "0.6")]
    pub concordance_threshold: f64,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_scan_settings(mut settings: ScanSettings) -> anyhow::Result<ScanSettings> {
    // hard code the version in
    settings.plastome_polish_version = FULL_VERSION.clone();
    info!("Plastome Polish version: {:?}", &settings.plastome_polish_version);
    info!("Sub-command: scan");
    info!("Inputs:");

    check_required_filename(&settings.reference_fn, "Reference FASTA")?;
    info!("\tReference: {:?}", &settings.reference_fn);
    if let Some(contig) = settings.reference_contig.as_ref() {
        info!("\tReference contig: {contig:?}");
    }
    check_required_filename(&settings.query_fn, "Query FASTA")?;
    info!("\tQuery: {:?}", &settings.query_fn);

    info!("Outputs:");
    info!("\tWindow table: {:?}", &settings.output_fn);

    info!("Scan parameters:");
    ensure!(
        settings.kmer_size > 0 && settings.kmer_size <= MAX_KMER_SIZE,
        "--kmer-size must be in 1..={MAX_KMER_SIZE}"
    );
    info!("\tk-mer size: {}", settings.kmer_size);
    ensure!(settings.window_size >= settings.kmer_size, "--window-size must be >= --kmer-size");
    info!("\tWindow size: {}", settings.window_size);
    ensure!(
        (0.0..=1.0).contains(&settings.concordance_threshold),
        "--concordance-threshold must be in [0, 1]"
    );
    info!("\tConcordance threshold: {}", settings.concordance_threshold);

    Ok(settings)
}
