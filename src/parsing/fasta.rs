
use anyhow::{anyhow, bail, ensure};
use log::warn;
use rust_lib_reference_genome::reference_genome::ReferenceGenome as FastaReference;
use std::path::Path;

/// Loads a single record from a FASTA file.
/// If `contig` is None, the file is expected to contain one record; for multi-record files the first key is used with a warning.
/// # Arguments
/// * `filename` - the FASTA file, optionally gzipped
/// * `contig` - optional record name to pull
/// # Errors
/// * if the file cannot be opened or parsed
/// * if the file has no records, or the requested contig is missing
pub fn load_fasta_record(filename: &Path, contig: Option<&str>) -> anyhow::Result<(String, Vec<u8>)> {
    ensure!(filename.exists(), "File not found: {filename:?}");
    let fasta = FastaReference::from_fasta(filename)
        .map_err(|e| anyhow!("Error while loading {filename:?}: {e:?}"))?;
    let keys: Vec<String> = fasta.contig_keys().iter().cloned().collect();

    let name = match contig {
        Some(c) => {
            if !keys.iter().any(|k| k == c) {
                bail!("Contig {c:?} was not found in {filename:?}");
            }
            c.to_string()
        },
        None => {
            let first = keys.first()
                .ok_or(anyhow!("No sequences found in {filename:?}"))?;
            if keys.len() > 1 {
                warn!("Found {} sequences in {filename:?}, using {first:?}", keys.len());
            }
            first.clone()
        }
    };

    let bases = fasta.get_full_chromosome(&name).to_vec();
    Ok((name, bases))
}
