
use anyhow::{bail, Context};
use noodles::fasta;
use noodles::fasta::record::{Definition, Sequence as FastaSequence};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data_types::sample_result::SampleResult;

/// Builds a noodles record from our pieces
fn build_record(name: String, description: Option<String>, bases: &[u8]) -> fasta::Record {
    let definition = Definition::new(name, description.map(|d| d.into()));
    fasta::Record::new(definition, FastaSequence::from(bases.to_vec()))
}

/// Sample IDs end up in file names, so strip any path separators
fn sanitize_filename(sample_id: &str) -> String {
    sample_id.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Path of the final sequence for a sample, `<folder>/<sanitized sample_id>.fasta`
pub fn sample_fasta_filename(folder: &Path, sample_id: &str) -> PathBuf {
    folder.join(format!("{}.fasta", sanitize_filename(sample_id)))
}

/// Fails if two samples with sequences would be written to the same file.
/// Sample IDs are unique, but sanitizing can still map two of them to one name.
/// # Arguments
/// * `folder` - the sequence output folder
/// * `all_results` - every result that will be written
pub fn check_fasta_collisions(folder: &Path, all_results: &[SampleResult]) -> anyhow::Result<()> {
    let mut claimed: FxHashMap<PathBuf, &str> = Default::default();
    for result in all_results.iter().filter(|r| r.sequence().is_some()) {
        let filename = sample_fasta_filename(folder, result.sample_id());
        if let Some(previous) = claimed.insert(filename.clone(), result.sample_id()) {
            bail!("Samples {previous:?} and {:?} would both be written to {filename:?}", result.sample_id());
        }
    }
    Ok(())
}

/// Writes the final sequence for a sample to `<folder>/<sample_id>.fasta`.
/// Returns the path written, or None if the sample has no sequence.
/// # Errors
/// * if the file cannot be created or written
pub fn write_sample_fasta(folder: &Path, result: &SampleResult) -> anyhow::Result<Option<PathBuf>> {
    let sequence = match result.sequence() {
        Some(s) => s,
        None => return Ok(None)
    };

    let filename = sample_fasta_filename(folder, result.sample_id());
    let file = File::create(&filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;
    let mut writer = fasta::io::Writer::new(BufWriter::new(file));

    let record = build_record(result.sample_id().to_string(), sample_description(result), sequence.bases());
    writer.write_record(&record)
        .with_context(|| format!("Error while writing {filename:?}:"))?;
    writer.get_mut().flush()
        .with_context(|| format!("Error while flushing {filename:?}:"))?;
    Ok(Some(filename))
}

/// Header description, e.g. `candidate=novo score=0.9500 external_score=0.98`
fn sample_description(result: &SampleResult) -> Option<String> {
    result.winner().map(|(candidate_id, score)| {
        match result.winner_external_score() {
            Some(external) => format!("candidate={candidate_id} score={score:.4} external_score={external}"),
            None => format!("candidate={candidate_id} score={score:.4}")
        }
    })
}

/// Writes the rejected variant of every orientation decision.
/// Each record is named `sample:start-end:orientation`.
pub struct ArchiveWriter<W: Write> {
    writer: fasta::io::Writer<W>,
    num_records: usize
}

impl ArchiveWriter<BufWriter<File>> {
    /// Creates a new archive file
    /// # Errors
    /// * if the file cannot be created
    pub fn from_path(filename: &Path) -> anyhow::Result<Self> {
        let file = File::create(filename)
            .with_context(|| format!("Error while creating {filename:?}:"))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: fasta::io::Writer::new(inner),
            num_records: 0
        }
    }

    /// Writes every archived variant for the sample
    pub fn write_result(&mut self, result: &SampleResult) -> std::io::Result<()> {
        for variant in result.archived_variants().iter() {
            let name = format!("{}:{}:{}", result.sample_id(), variant.span, variant.orientation);
            self.writer.write_record(&build_record(name, None, &variant.bases))?;
            self.num_records += 1;
        }
        Ok(())
    }

    /// Flushes the output, returning the number of records written
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.writer.get_mut().flush()?;
        Ok(self.num_records)
    }
}
