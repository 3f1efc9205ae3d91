
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::orientation::kmer_index::MAX_KMER_SIZE;
use crate::orientation::repairer::MAX_REPAIR_PASSES;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct PolishSettings {
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

    /// Reference region boundaries (TSV with name, start, end)
    #[clap(long = "regions")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub regions_fn: Option<PathBuf>,

    /// Candidate assembly manifest (TSV)
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "manifest")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub manifest_fn: PathBuf,

    /// Output folder
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-folder")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Candidates must be within this fraction of the reference length [default: disabled]
    #[clap(long = "length-tolerance")]
    #[clap(value_name = "FRAC")]
    #[clap(help_heading = Some("Selection parameters"))]
    pub length_tolerance: Option<f64>,

    /// Number of LSC/IRa/SSC/IRb lengths that must be within the length tolerance
    #[clap(long = "min-region-matches")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Selection parameters"))]
    #[clap(default_value = "3")]
    pub min_region_matches: usize,

    /// Winning share must be above this to count as a true majority
    #[clap(long = "majority-threshold")]
    #[clap(value_name = "FRAC")]
    #[clap(help_heading = Some("Correction parameters"))]
    #[clap(default_value = "0.5")]
    pub majority_threshold: f64,

    /// Minimum reads supporting the winning base; 0 disables the filter
    #[clap(long = "min-support")]
    #[clap(value_name = "COUNT")]
    #[clap(help_heading = Some("Correction parameters"))]
    #[clap(default_value = "0")]
    pub min_support: u64,

    /// k-mer length for the concordance scan
    #[clap(short = 'k')]
    #[clap(long = "kmer-size")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "16")]
    pub kmer_size: usize,

    /// Scan window width
    #[clap(long = "window-size")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "400")]
    pub window_size: usize,

    /// Minimum k-mer concordance for a window to pass
    #[clap(long = "concordance-threshold")]
    #[clap(value_name = "FRAC")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "0.6")]
    pub concordance_threshold: f64,

    /// Failing spans must be longer than this to be re-oriented
    #[clap(long = "min-flip-span")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "2000")]
    pub min_flip_span: usize,

    /// Flanking sequence included on each side when rescoring a trial
    #[clap(long = "flank-margin")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "200")]
    pub flank_margin: usize,

    /// Maximum number of re-orientation passes
    #[clap(long = "max-passes")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Orientation parameters"))]
    #[clap(default_value = "2")]
    pub max_passes: usize,

    /// Number of threads to use for processing samples
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    // Debug options that are generally hidden and just for quick testing
    /// Skips a number of samples (debug only); non-0 values create partial outputs
    #[clap(hide = true)]
    #[clap(long = "skip")]
    #[clap(default_value = "0")]
    pub skip_samples: usize,

    /// Takes a number of samples (debug only); non-0 values create partial outputs
    #[clap(hide = true)]
    #[clap(long = "take")]
    #[clap(default_value = "0")]
    pub take_samples: usize,
}

pub fn check_polish_settings(mut settings: PolishSettings) -> anyhow::Result<PolishSettings> {
    // hard code the version in
    settings.plastome_polish_version = FULL_VERSION.clone();
    info!("Plastome Polish version: {:?}", &settings.plastome_polish_version);
    info!("Sub-command: polish");
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.reference_fn, "Reference FASTA")?;
    info!("\tReference: {:?}", &settings.reference_fn);
    if let Some(contig) = settings.reference_contig.as_ref() {
        info!("\tReference contig: {contig:?}");
    }
    check_optional_filename(settings.regions_fn.as_deref(), "Reference regions")?;
    if let Some(r_fn) = settings.regions_fn.as_deref() {
        info!("\tReference regions: {r_fn:?}");
    } else {
        info!("\tReference regions: None");
    }
    check_required_filename(&settings.manifest_fn, "Candidate manifest")?;
    info!("\tManifest: {:?}", &settings.manifest_fn);

    // outputs
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Selection parameters:");
    if let Some(tolerance) = settings.length_tolerance {
        ensure!(tolerance > 0.0, "--length-tolerance must be >0");
        info!("\tLength tolerance: {:.1}%", tolerance * 100.0);
        ensure!(settings.min_region_matches <= 4, "--min-region-matches must be <=4");
        info!("\tMinimum region matches: {}", settings.min_region_matches);
    } else {
        info!("\tLength tolerance: DISABLED");
    }

    info!("Correction parameters:");
    ensure!(
        (0.0..1.0).contains(&settings.majority_threshold),
        "--majority-threshold must be in [0, 1)"
    );
    info!("\tMajority threshold: {}", settings.majority_threshold);
    info!("\tMinimum support: {}", if settings.min_support == 0 { "DISABLED".to_string() } else { settings.min_support.to_string() });

    info!("Orientation parameters:");
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
    info!("\tMinimum flip span: {}", settings.min_flip_span);
    info!("\tFlank margin: {}", settings.flank_margin);
    ensure!(
        settings.max_passes > 0 && settings.max_passes <= MAX_REPAIR_PASSES,
        "--max-passes must be in 1..={MAX_REPAIR_PASSES}"
    );
    info!("\tMaximum passes: {}", settings.max_passes);

    // 0 is just a sentinel for everything
    if settings.take_samples == 0 {
        settings.take_samples = usize::MAX;
    }
    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
