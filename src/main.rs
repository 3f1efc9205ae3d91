
use log::{LevelFilter, error, info, warn};
use std::time::Instant;

use plastome_polish::assembly_selector::SelectorConfigBuilder;
use plastome_polish::cli::core::{Commands, get_cli};
use plastome_polish::cli::polish::{PolishSettings, check_polish_settings};
use plastome_polish::cli::scan::{ScanSettings, check_scan_settings};
use plastome_polish::consensus_corrector::CorrectorConfigBuilder;
use plastome_polish::data_types::orientation::WindowScore;
use plastome_polish::data_types::sample_result::SampleStatus;
use plastome_polish::data_types::sequence::Sequence;
use plastome_polish::orientation::kmer_index::KmerIndex;
use plastome_polish::orientation::repairer::OrientationConfigBuilder;
use plastome_polish::orientation::window_scanner::{WindowScanner, mean_concordance};
use plastome_polish::parsing::fasta::load_fasta_record;
use plastome_polish::parsing::manifest::load_manifest;
use plastome_polish::parsing::reference::load_reference;
use plastome_polish::pipeline::{CancellationToken, FatalError, PipelineConfigBuilder, run_batch};
use plastome_polish::util::json_io::save_json;
use plastome_polish::writers::batch_outputs::write_polish_outputs;
use plastome_polish::writers::window_scan::write_window_scan;

/// Shared logging setup, verbosity comes from the -v count
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

fn run_polish(settings: PolishSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_polish_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // create a debug folder if specified
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("Creating debug folder at {debug_folder:?}...");
        match std::fs::create_dir_all(debug_folder) {
            Ok(()) => {},
            Err(e) => {
                error!("Error while creating debug folder: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }

        // save the CLI options
        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(&settings, &cli_json) {
            error!("Error while saving CLI options: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // load the reference genome
    info!("Pre-loading reference genome into memory...");
    let reference_genome = match load_reference(
        &settings.reference_fn, settings.reference_contig.as_deref(), settings.regions_fn.as_deref()
    ) {
        Ok(rg) => rg,
        Err(e) => {
            error!("Error while loading reference genome: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    info!("Loaded {:?} with {} bp and {} region(s).",
        reference_genome.sequence().id(), reference_genome.len(), reference_genome.regions().len());

    info!("Indexing reference k-mers...");
    let reference_index = match KmerIndex::new(reference_genome.sequence().bases(), settings.kmer_size) {
        Ok(ki) => ki,
        Err(e) => {
            error!("Error while indexing reference genome: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    // check if we're in debug mode
    let skip_count = settings.skip_samples;
    let take_count = settings.take_samples;
    if skip_count != 0 || take_count != usize::MAX {
        warn!("Debug run detected, outputs will only contain a subset of samples.");
        warn!("Samples to skip: {skip_count}");
        warn!("Samples to process: {take_count}");
    }

    info!("Loading candidate assemblies...");
    let all_samples = match load_manifest(&settings.manifest_fn, skip_count, take_count) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while loading candidate manifest: {e:#}");
            if e.downcast_ref::<FatalError>().is_some() {
                std::process::exit(exitcode::OSERR);
            }
            std::process::exit(exitcode::IOERR);
        }
    };
    info!("Candidate loading complete.");

    // build our configuration
    let selector_config = match SelectorConfigBuilder::default()
        .length_tolerance(settings.length_tolerance)
        .min_region_matches(settings.min_region_matches)
        .build() {
        Ok(sc) => sc,
        Err(e) => {
            error!("Error while building selector config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let corrector_config = match CorrectorConfigBuilder::default()
        .majority_threshold(settings.majority_threshold)
        .min_support(settings.min_support)
        .build() {
        Ok(cc) => cc,
        Err(e) => {
            error!("Error while building corrector config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let orientation_config = match OrientationConfigBuilder::default()
        .window_size(settings.window_size)
        .concordance_threshold(settings.concordance_threshold)
        .min_flip_span(settings.min_flip_span)
        .flank_margin(settings.flank_margin)
        .max_passes(settings.max_passes)
        .build() {
        Ok(oc) => oc,
        Err(e) => {
            error!("Error while building orientation config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let pipeline_config = match PipelineConfigBuilder::default()
        .selector(selector_config)
        .corrector(corrector_config)
        .orientation(orientation_config)
        .kmer_size(settings.kmer_size)
        .build() {
        Ok(pc) => pc,
        Err(e) => {
            error!("Error while building pipeline config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        let config_json = debug_folder.join("pipeline_config.json");
        info!("Saving pipeline configuration to {config_json:?}...");
        if let Err(e) = save_json(&pipeline_config, &config_json) {
            error!("Error while saving pipeline configuration: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // run every sample on the pool
    let token = CancellationToken::new();
    if let Err(e) = token.cancel_on_interrupt() {
        error!("Error while installing interrupt handler: {e}");
        std::process::exit(exitcode::OSERR);
    }
    let report = match run_batch(all_samples, &reference_genome, &reference_index, &pipeline_config, &token) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while processing samples: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };
    info!("Sample processing complete, saving all outputs...");

    let summary_writer = match write_polish_outputs(report.results(), &settings.output_folder) {
        Ok(sw) => sw,
        Err(e) => {
            error!("Error while saving output files: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Succeeded: {}", summary_writer.count_status(SampleStatus::Succeeded));
    info!("Succeeded with warnings: {}", summary_writer.count_status(SampleStatus::SucceededWithWarnings));
    info!("Failed: {}", summary_writer.count_status(SampleStatus::Failed));
    if report.cancelled() > 0 {
        warn!("Cancelled: {}", report.cancelled());
    }

    // now write the summary
    let summary_fn = settings.output_folder.join("summary.tsv");
    info!("Saving output summary to {summary_fn:?}...");
    if let Err(e) = summary_writer.write_summary(&summary_fn) {
        error!("Error while saving summary file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    if report.cancelled() > 0 {
        error!("Run was interrupted, outputs only contain the samples completed before the interrupt.");
        std::process::exit(exitcode::TEMPFAIL);
    }

    info!("Polishing completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_scan(settings: ScanSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    init_logging(settings.verbosity);

    let settings = match check_scan_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    info!("Pre-loading reference genome into memory...");
    let reference_genome = match load_reference(&settings.reference_fn, settings.reference_contig.as_deref(), None) {
        Ok(rg) => rg,
        Err(e) => {
            error!("Error while loading reference genome: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let reference_index = match KmerIndex::new(reference_genome.sequence().bases(), settings.kmer_size) {
        Ok(ki) => ki,
        Err(e) => {
            error!("Error while indexing reference genome: {e}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    info!("Loading query sequence...");
    let query = match load_fasta_record(&settings.query_fn, None)
        .and_then(|(name, bases)| Ok(Sequence::new(name, &bases, true)?)) {
        Ok(q) => q,
        Err(e) => {
            error!("Error while loading query sequence: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    let windows: Vec<WindowScore> = WindowScanner::new(
        query.bases(), &reference_index, settings.window_size, settings.concordance_threshold
    ).collect();
    let num_failing = windows.iter().filter(|w| w.is_failing()).count();
    match mean_concordance(&windows) {
        Some(mean) => info!("Mean concordance of {:?}: {mean:.4}", query.id()),
        None => warn!("No scorable windows in {:?}", query.id())
    };
    info!("Failing windows: {num_failing} / {}", windows.len());

    info!("Saving window scan to {:?}...", settings.output_fn);
    if let Err(e) = write_window_scan(&settings.output_fn, query.id(), windows) {
        error!("Error while saving window scan: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Scan completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Polish(settings) => {
            run_polish(*settings);
        },
        Commands::Scan(settings) => {
            run_scan(*settings);
        }
    }

    info!("Process finished successfully.");
}
