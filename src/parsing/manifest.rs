/*!
# Candidate manifest
The manifest is a tab-delimited file with a header row and one row per candidate assembly.
Required columns are `sample_id`, `candidate_id`, `fasta`, and `tool_pass`.
Optional columns are `external_score`, `matched_bases`, `aligned_reference_bases`, `lsc`, `ira`, `ssc`, `irb`, and `frequency_table`.
Relative paths are resolved against the folder containing the manifest.

Candidates that cannot be loaded are kept as malformed so they show up on the review list instead of stopping the batch.
*/
use anyhow::{bail, ensure, Context};
use indexmap::IndexMap;
use indicatif::ParallelProgressIterator;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::data_types::candidate::{AlignmentSummary, CandidateAssembly, RegionLengths};
use crate::data_types::sequence::{Sequence, SequenceError};
use crate::parsing::fasta::load_fasta_record;
use crate::parsing::frequency_tsv::load_frequency_table;
use crate::pipeline::{FatalError, SampleInput};
use crate::util::progress_bar::get_progress_style;

/// A single row of the manifest
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ManifestRow {
    pub sample_id: String,
    pub candidate_id: String,
    pub fasta: PathBuf,
    #[serde(deserialize_with = "deserialize_tool_pass")]
    pub tool_pass: bool,
    #[serde(default)]
    pub external_score: Option<f64>,
    #[serde(default)]
    pub matched_bases: Option<u64>,
    #[serde(default)]
    pub aligned_reference_bases: Option<u64>,
    #[serde(default)]
    pub lsc: Option<usize>,
    #[serde(default)]
    pub ira: Option<usize>,
    #[serde(default)]
    pub ssc: Option<usize>,
    #[serde(default)]
    pub irb: Option<usize>,
    #[serde(default)]
    pub frequency_table: Option<PathBuf>
}

impl ManifestRow {
    /// Region lengths, only if all four are provided
    fn region_lengths(&self) -> Option<RegionLengths> {
        match (self.lsc, self.ira, self.ssc, self.irb) {
            (Some(lsc), Some(ira), Some(ssc), Some(irb)) => Some(RegionLengths { lsc, ira, ssc, irb }),
            (None, None, None, None) => None,
            _ => {
                warn!("{}/{}: partial region lengths provided, ignoring them", self.sample_id, self.candidate_id);
                None
            }
        }
    }

    fn alignment(&self) -> Option<AlignmentSummary> {
        self.matched_bases.map(|matched_bases| AlignmentSummary {
            matched_bases,
            aligned_reference_bases: self.aligned_reference_bases
        })
    }
}

/// Parses the pass/fail flag from the external tool
fn parse_tool_pass(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "pass" | "1" => Some(true),
        "false" | "fail" | "0" => Some(false),
        _ => None
    }
}

fn deserialize_tool_pass<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_tool_pass(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid tool_pass value {raw:?}, expected true/false/pass/fail/1/0")))
}

/// Reads manifest rows and groups them by sample in manifest order.
/// # Errors
/// * if any row fails to parse
/// * if a sample or candidate ID is empty
/// * if a candidate ID is repeated within a sample
pub fn read_manifest<R: Read>(reader: R) -> anyhow::Result<IndexMap<String, Vec<ManifestRow>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);

    let mut samples: IndexMap<String, Vec<ManifestRow>> = Default::default();
    for (row_index, result) in csv_reader.deserialize().enumerate() {
        let row: ManifestRow = result
            .with_context(|| format!("Error while parsing manifest row {}:", row_index + 1))?;
        ensure!(!row.sample_id.is_empty(), "Empty sample_id on manifest row {}", row_index + 1);
        ensure!(!row.candidate_id.is_empty(), "Empty candidate_id on manifest row {}", row_index + 1);

        let candidates = samples.entry(row.sample_id.clone()).or_default();
        if candidates.iter().any(|c| c.candidate_id == row.candidate_id) {
            bail!("Duplicate candidate {:?} for sample {:?}", row.candidate_id, row.sample_id);
        }
        candidates.push(row);
    }
    Ok(samples)
}

/// Resolves a manifest path relative to the manifest folder
fn resolve_path(base_folder: &Path, raw_path: &Path) -> PathBuf {
    if raw_path.has_root() {
        raw_path.to_path_buf()
    } else {
        base_folder.join(raw_path)
    }
}

/// Loads everything for one candidate.
/// Load failures produce a malformed candidate rather than an error.
/// # Arguments
/// * `row` - the manifest row
/// * `base_folder` - folder that relative paths are resolved against
/// # Errors
/// * only if the sequence could not be allocated, which halts the batch
pub fn load_candidate(row: &ManifestRow, base_folder: &Path) -> anyhow::Result<CandidateAssembly> {
    let candidate_id = row.candidate_id.clone();
    if !row.tool_pass {
        // failed runs frequently have no usable output, so do not bother loading it
        return Ok(CandidateAssembly::new_malformed(candidate_id, "not loaded, flagged as failed".to_string(), false));
    }

    let fasta_fn = resolve_path(base_folder, &row.fasta);
    let bases = match load_fasta_record(&fasta_fn, None) {
        Ok((_name, bases)) => bases,
        Err(e) => {
            warn!("{}/{}: {e:#}", row.sample_id, row.candidate_id);
            return Ok(CandidateAssembly::new_malformed(candidate_id, format!("{e:#}"), true));
        }
    };

    let sequence = match Sequence::new(candidate_id.clone(), &bases, true) {
        Ok(s) => s,
        Err(SequenceError::AllocationFailed { length, .. }) => {
            return Err(FatalError::ResourceExhausted { sample_id: row.sample_id.clone(), bytes: length }.into());
        },
        Err(e) => {
            warn!("{}/{}: {e}", row.sample_id, row.candidate_id);
            return Ok(CandidateAssembly::new_malformed(candidate_id, e.to_string(), true));
        }
    };

    let frequency_table = match row.frequency_table.as_ref() {
        Some(raw_path) => {
            let table_fn = resolve_path(base_folder, raw_path);
            match load_frequency_table(&table_fn) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("{}/{}: {e:#}", row.sample_id, row.candidate_id);
                    return Ok(CandidateAssembly::new_malformed(candidate_id, format!("{e:#}"), true));
                }
            }
        },
        None => None
    };

    debug!("{}/{}: loaded {} bp", row.sample_id, row.candidate_id, sequence.len());
    Ok(CandidateAssembly::new(candidate_id, sequence, true)
        .with_external_score(row.external_score)
        .with_alignment(row.alignment())
        .with_region_lengths(row.region_lengths())
        .with_frequency_table(frequency_table))
}

/// Loads a manifest and all of the candidates it references.
/// # Arguments
/// * `filename` - the manifest TSV
/// * `skip_samples` - number of samples to skip, in manifest order
/// * `take_samples` - maximum number of samples to load after skipping
/// # Errors
/// * if the manifest cannot be opened or parsed
/// * if a candidate hits a fatal error while loading
pub fn load_manifest(filename: &Path, skip_samples: usize, take_samples: usize) -> anyhow::Result<Vec<SampleInput>> {
    let file = std::fs::File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let samples = read_manifest(file)
        .with_context(|| format!("Error while reading {filename:?}:"))?;
    ensure!(!samples.is_empty(), "No samples found in {filename:?}");

    let base_folder = match filename.parent() {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::default()
    };

    // par_iter with progress needs an indexed iterator, so convert to Vec first
    let samples: Vec<(String, Vec<ManifestRow>)> = samples.into_iter()
        .skip(skip_samples)
        .take(take_samples)
        .collect();
    debug!("Loading candidates for {} sample(s)", samples.len());
    let style = get_progress_style();
    samples.into_par_iter()
        .map(|(sample_id, rows)| {
            let candidates = rows.iter()
                .map(|row| load_candidate(row, &base_folder))
                .collect::<anyhow::Result<Vec<CandidateAssembly>>>()?;
            Ok(SampleInput { sample_id, candidates })
        })
        .progress_with_style(style)
        .collect::<anyhow::Result<Vec<SampleInput>>>()
        .context("Error while loading candidates")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_pass() {
        for raw in ["true", "PASS", "1", " Pass "] {
            assert_eq!(parse_tool_pass(raw), Some(true));
        }
        for raw in ["false", "fail", "0", "FALSE"] {
            assert_eq!(parse_tool_pass(raw), Some(false));
        }
        assert_eq!(parse_tool_pass("maybe"), None);
        assert_eq!(parse_tool_pass(""), None);
    }

    #[test]
    fn test_read_manifest() {
        let tsv = "\
sample_id\tcandidate_id\tfasta\ttool_pass\texternal_score\tmatched_bases\tlsc\tira\tssc\tirb\tfrequency_table
s2\tnovo\ts2/novo.fa\tpass\t0.98\t150000\t86000\t26000\t18000\t26000\ts2/pileup.tsv
s1\tgetorg\t/abs/s1.fa\tfail\t\t\t\t\t\t\t
s2\tgetorg\ts2/getorg.fa\t1\t\t\t\t\t\t\t
";
        let samples = read_manifest(tsv.as_bytes()).unwrap();
        // manifest order, not sorted
        let ids: Vec<&String> = samples.keys().collect();
        assert_eq!(ids, vec!["s2", "s1"]);

        let s2 = &samples["s2"];
        assert_eq!(s2.len(), 2);
        assert_eq!(s2[0].candidate_id, "novo");
        assert!(s2[0].tool_pass);
        assert_eq!(s2[0].external_score, Some(0.98));
        assert_eq!(s2[0].alignment(), Some(AlignmentSummary { matched_bases: 150_000, aligned_reference_bases: None }));
        assert_eq!(s2[0].region_lengths(), Some(RegionLengths { lsc: 86000, ira: 26000, ssc: 18000, irb: 26000 }));
        assert_eq!(s2[0].frequency_table, Some(PathBuf::from("s2/pileup.tsv")));
        assert_eq!(s2[1].frequency_table, None);
        assert_eq!(s2[1].alignment(), None);

        let s1 = &samples["s1"];
        assert!(!s1[0].tool_pass);
        assert_eq!(resolve_path(Path::new("/data"), &s1[0].fasta), PathBuf::from("/abs/s1.fa"));
        assert_eq!(resolve_path(Path::new("/data"), &s2[0].fasta), PathBuf::from("/data/s2/novo.fa"));
    }

    #[test]
    fn test_minimal_columns() {
        let tsv = "sample_id\tcandidate_id\tfasta\ttool_pass\ns1\tc1\tc1.fa\ttrue\n";
        let samples = read_manifest(tsv.as_bytes()).unwrap();
        let row = &samples["s1"][0];
        assert_eq!(row.external_score, None);
        assert_eq!(row.region_lengths(), None);
        assert_eq!(row.frequency_table, None);
    }

    #[test]
    fn test_bad_manifest() {
        // duplicate candidate in one sample
        let tsv = "sample_id\tcandidate_id\tfasta\ttool_pass\ns1\tc1\ta.fa\ttrue\ns1\tc1\tb.fa\ttrue\n";
        assert!(read_manifest(tsv.as_bytes()).is_err());
        // the same candidate ID in different samples is fine
        let tsv = "sample_id\tcandidate_id\tfasta\ttool_pass\ns1\tc1\ta.fa\ttrue\ns2\tc1\tb.fa\ttrue\n";
        assert_eq!(read_manifest(tsv.as_bytes()).unwrap().len(), 2);
        // bad flag
        let tsv = "sample_id\tcandidate_id\tfasta\ttool_pass\ns1\tc1\ta.fa\tmaybe\n";
        assert!(read_manifest(tsv.as_bytes()).is_err());
        // missing required column
        let tsv = "sample_id\tcandidate_id\ttool_pass\ns1\tc1\ttrue\n";
        assert!(read_manifest(tsv.as_bytes()).is_err());
    }

    #[test]
    fn test_unloadable_candidates() {
        let tsv = "\
sample_id\tcandidate_id\tfasta\ttool_pass
s1\tmissing\tdoes_not_exist.fa\ttrue
s1\tfailed\tdoes_not_exist.fa\tfail
";
        let samples = read_manifest(tsv.as_bytes()).unwrap();
        let rows = &samples["s1"];
        let folder = Path::new("/nonexistent_manifest_folder");

        let missing = load_candidate(&rows[0], folder).unwrap();
        assert!(missing.sequence().is_err());
        assert!(missing.tool_passed());

        let failed = load_candidate(&rows[1], folder).unwrap();
        assert!(failed.sequence().is_err());
        assert!(!failed.tool_passed());
    }

    #[test]
    fn test_load_manifest_skip_take() {
        let folder = std::env::temp_dir().join(format!("plastome_polish_manifest_{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("c1.fa"), ">c1\nACGTACGTAAACCCGGGTTT\n").unwrap();
        let manifest_fn = folder.join("manifest.tsv");
        std::fs::write(&manifest_fn, "\
sample_id\tcandidate_id\tfasta\ttool_pass
s1\tc1\tc1.fa\ttrue
s2\tc1\tc1.fa\ttrue
s3\tc1\tc1.fa\tfail
").unwrap();

        let all = load_manifest(&manifest_fn, 0, usize::MAX).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].candidates[0].sequence().unwrap().len(), 20);
        assert!(!all[2].candidates[0].tool_passed());

        let subset = load_manifest(&manifest_fn, 1, 1).unwrap();
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].sample_id, "s2");

        // skipping everything leaves nothing to load
        assert!(load_manifest(&manifest_fn, 3, usize::MAX).unwrap().is_empty());

        std::fs::remove_dir_all(&folder).unwrap();
    }
}
