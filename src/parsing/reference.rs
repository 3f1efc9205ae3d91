
use anyhow::Context;
use log::info;
use std::path::Path;

use crate::data_types::reference::ReferenceGenome;
use crate::data_types::sequence::Sequence;
use crate::parsing::fasta::load_fasta_record;
use crate::parsing::regions::load_region_tsv;

/// Loads the reference genome along with optional region boundaries.
/// # Arguments
/// * `fasta_fn` - reference FASTA
/// * `contig` - optional record name, otherwise the file should have exactly one record
/// * `regions_fn` - optional region TSV
/// # Errors
/// * if the FASTA or region file fail to load
/// * if the sequence has invalid symbols or a region is out of bounds
pub fn load_reference(fasta_fn: &Path, contig: Option<&str>, regions_fn: Option<&Path>) -> anyhow::Result<ReferenceGenome> {
    let (name, bases) = load_fasta_record(fasta_fn, contig)?;
    let sequence = Sequence::new(name, &bases, true)
        .with_context(|| format!("Error while parsing reference sequence in {fasta_fn:?}:"))?;
    info!("Loaded reference {:?} with {} bp", sequence.id(), sequence.len());

    let regions = match regions_fn {
        Some(r_fn) => {
            let regions = load_region_tsv(r_fn)?;
            info!("Loaded {} reference regions from {r_fn:?}", regions.len());
            regions
        },
        None => vec![]
    };

    ReferenceGenome::new(sequence, regions)
        .with_context(|| format!("Error while building reference from {fasta_fn:?}:"))
}
