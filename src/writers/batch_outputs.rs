
use anyhow::Context;
use indicatif::ProgressIterator;
use log::info;
use std::path::Path;

use crate::data_types::sample_result::SampleResult;
use crate::util::progress_bar::get_progress_style;
use crate::writers::corrections::CorrectionWriter;
use crate::writers::fasta::{ArchiveWriter, check_fasta_collisions, write_sample_fasta};
use crate::writers::orientation::OrientationWriter;
use crate::writers::review_list::ReviewListWriter;
use crate::writers::summary::SummaryWriter;

/// Writes every per-sample output of a polish run into the output folder.
/// The summary is returned unwritten so the caller can report on it before saving.
/// # Arguments
/// * `all_results` - completed samples, already sorted by sample ID
/// * `output_folder` - the folder to write into, must already exist
/// # Errors
/// * if two sample IDs would be written to the same FASTA file
/// * if any output file cannot be created or written
pub fn write_polish_outputs(all_results: &[SampleResult], output_folder: &Path) -> anyhow::Result<SummaryWriter> {
    let sequence_folder = output_folder.join("sequences");
    check_fasta_collisions(&sequence_folder, all_results)?;
    std::fs::create_dir_all(&sequence_folder)
        .with_context(|| format!("Error while creating {sequence_folder:?}:"))?;

    let review_fn = output_folder.join("review_list.tsv");
    let mut review_writer = ReviewListWriter::new(&review_fn)
        .with_context(|| format!("Error while creating {review_fn:?}:"))?;
    let corrections_fn = output_folder.join("corrections.tsv");
    let mut correction_writer = CorrectionWriter::new(&corrections_fn)
        .with_context(|| format!("Error while creating {corrections_fn:?}:"))?;
    let decisions_fn = output_folder.join("orientation_decisions.tsv");
    let unresolved_fn = output_folder.join("unresolved_regions.tsv");
    let mut orientation_writer = OrientationWriter::new(&decisions_fn, &unresolved_fn)
        .with_context(|| format!("Error while creating {decisions_fn:?}:"))?;
    let archive_fn = output_folder.join("rejected_orientations.fasta");
    let mut archive_writer = ArchiveWriter::from_path(&archive_fn)?;

    let mut summary_writer = SummaryWriter::new();
    let mut num_sequences = 0;
    let style = get_progress_style();
    for result in all_results.iter().progress_with_style(style) {
        summary_writer.add_result(result);
        review_writer.write_result(result)
            .with_context(|| format!("Error while writing {review_fn:?}:"))?;
        correction_writer.write_result(result)
            .with_context(|| format!("Error while writing {corrections_fn:?}:"))?;
        orientation_writer.write_result(result)
            .with_context(|| format!("Error while writing {decisions_fn:?}:"))?;
        archive_writer.write_result(result)
            .with_context(|| format!("Error while writing {archive_fn:?}:"))?;
        if write_sample_fasta(&sequence_folder, result)?.is_some() {
            num_sequences += 1;
        }
    }

    let num_reviews = review_writer.finish()?;
    correction_writer.finish()?;
    orientation_writer.finish()?;
    let num_archived = archive_writer.finish()?;
    info!("Wrote {num_sequences} final sequence(s), {num_reviews} review entries, and {num_archived} archived orientation(s).");
    Ok(summary_writer)
}
