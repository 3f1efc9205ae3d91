
use anyhow::{Context, ensure};
use std::io::Read;
use std::path::Path;

use crate::data_types::reference::RegionBoundary;

/// Loads a region TSV with a `name`, `start`, `end` header; coordinates are 0-based half-open.
/// # Errors
/// * if the file cannot be opened
/// * if any row fails to parse or has `start > end`
pub fn load_region_tsv(filename: &Path) -> anyhow::Result<Vec<RegionBoundary>> {
    let file = std::fs::File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    parse_regions(file)
        .with_context(|| format!("Error while parsing {filename:?}:"))
}

/// Parses region rows from any reader, see `load_region_tsv`
pub fn parse_regions<R: Read>(reader: R) -> anyhow::Result<Vec<RegionBoundary>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut regions = vec![];
    for result in csv_reader.deserialize() {
        let region: RegionBoundary = result?;
        ensure!(region.start <= region.end, "Region {} has start {} > end {}", region.name, region.start, region.end);
        regions.push(region);
    }
    Ok(regions)
}
