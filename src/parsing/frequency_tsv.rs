/*!
# Frequency table parsing
Two layouts are accepted, detected from the header row:
* Long: `position`, `base`, `count`; one row per observed symbol. A base of `.` or `,` is a read matching the pileup reference.
* Wide: the pileup summary layout `CHROM POS . , A C G T N + - ^ $ other`; indel and read boundary columns are ignored.

Positions are 1-based in both layouts and 0-based once loaded.
*/
use anyhow::{anyhow, bail, ensure, Context};
use log::trace;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::data_types::frequency_table::{FrequencyRecord, FrequencyTable};

/// Symbols from the wide layout that count toward the vote or the total
const WIDE_SYMBOLS: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

/// Column indices for the wide layout
#[derive(Debug, PartialEq)]
struct WideColumns {
    chrom: usize,
    pos: usize,
    ref_forward: usize,
    ref_reverse: usize,
    symbols: Vec<(u8, usize)>
}

#[derive(Debug, PartialEq)]
enum FrequencyLayout {
    Long,
    Wide(WideColumns)
}

impl FrequencyLayout {
    fn detect(headers: &csv::StringRecord) -> anyhow::Result<Self> {
        let find = |label: &str| headers.iter().position(|h| h == label);
        if let (Some(_p), Some(_b), Some(_c)) = (find("position"), find("base"), find("count")) {
            return Ok(Self::Long);
        }

        if let (Some(chrom), Some(pos)) = (find("CHROM"), find("POS")) {
            let ref_forward = find(".").ok_or(anyhow!("Missing \".\" column in pileup header"))?;
            let ref_reverse = find(",").ok_or(anyhow!("Missing \",\" column in pileup header"))?;
            let symbols = WIDE_SYMBOLS.iter()
                .map(|&s| {
                    let label = (s as char).to_string();
                    find(&label)
                        .map(|i| (s, i))
                        .ok_or(anyhow!("Missing {label:?} column in pileup header"))
                })
                .collect::<anyhow::Result<Vec<(u8, usize)>>>()?;
            return Ok(Self::Wide(WideColumns { chrom, pos, ref_forward, ref_reverse, symbols }));
        }

        bail!("Unrecognized frequency table header: {headers:?}")
    }
}

/// Row in the long layout
#[derive(Debug, Deserialize)]
struct LongRow {
    position: usize,
    base: String,
    count: u64
}

/// Raw counts for a position before validation: symbol counts and reference matches
type RawCounts = BTreeMap<usize, (BTreeMap<u8, u64>, u64)>;

/// Loads a frequency table from a TSV file, optionally gzipped.
/// # Errors
/// * if the file cannot be opened
/// * if the header is not one of the accepted layouts
/// * if any row fails to parse, has position 0, or has an invalid symbol
pub fn load_frequency_table(filename: &Path) -> anyhow::Result<FrequencyTable> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let reader: Box<dyn Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(flate2::read::MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    parse_frequency_table(reader)
        .with_context(|| format!("Error while parsing {filename:?}:"))
}

/// Parses a frequency table from any reader, see `load_frequency_table`
pub fn parse_frequency_table<R: Read>(reader: R) -> anyhow::Result<FrequencyTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let raw_counts = match FrequencyLayout::detect(&headers)? {
        FrequencyLayout::Long => parse_long(csv_reader)?,
        FrequencyLayout::Wide(columns) => parse_wide(csv_reader, &columns)?
    };

    let mut records = vec![];
    for (position, (counts, reference_matches)) in raw_counts.into_iter() {
        let total: u64 = counts.values().sum::<u64>() + reference_matches;
        if total == 0 {
            // no coverage, nothing to vote on
            trace!("Skipping uncovered position {}", position + 1);
            continue;
        }
        let record = FrequencyRecord::new(position, counts, reference_matches)
            .with_context(|| format!("Error at position {}:", position + 1))?;
        records.push((position, record));
    }
    Ok(FrequencyTable::from_records(records))
}

/// Converts a 1-based position to 0-based
fn to_zero_based(position: usize) -> anyhow::Result<usize> {
    ensure!(position > 0, "Frequency positions are 1-based, found position 0");
    Ok(position - 1)
}

fn parse_long<R: Read>(mut csv_reader: csv::Reader<R>) -> anyhow::Result<RawCounts> {
    let mut raw_counts: RawCounts = Default::default();
    for result in csv_reader.deserialize() {
        let row: LongRow = result?;
        let position = to_zero_based(row.position)?;
        let entry = raw_counts.entry(position).or_default();
        match row.base.as_bytes() {
            [b'.'] | [b','] => entry.1 += row.count,
            [symbol] => *entry.0.entry(*symbol).or_insert(0) += row.count,
            _ => bail!("Expected a single symbol at position {}, found {:?}", row.position, row.base)
        }
    }
    Ok(raw_counts)
}

fn parse_wide<R: Read>(mut csv_reader: csv::Reader<R>, columns: &WideColumns) -> anyhow::Result<RawCounts> {
    let parse_count = |row: &csv::StringRecord, index: usize| -> anyhow::Result<u64> {
        let raw = row.get(index).ok_or(anyhow!("Missing column {index} on row: {row:?}"))?;
        raw.parse::<u64>()
            .with_context(|| format!("Error while parsing count {raw:?}:"))
    };

    let mut raw_counts: RawCounts = Default::default();
    let mut chrom: Option<String> = None;
    for result in csv_reader.records() {
        let row = result?;

        // one table describes one sequence
        let row_chrom = row.get(columns.chrom).ok_or(anyhow!("Missing CHROM on row: {row:?}"))?;
        let expected = chrom.get_or_insert_with(|| row_chrom.to_string());
        ensure!(*expected == row_chrom, "Found multiple sequences in pileup: {expected:?} and {row_chrom:?}");

        let raw_pos = row.get(columns.pos).ok_or(anyhow!("Missing POS on row: {row:?}"))?;
        let position = to_zero_based(
            raw_pos.parse::<usize>().with_context(|| format!("Error while parsing POS {raw_pos:?}:"))?
        )?;

        let reference_matches = parse_count(&row, columns.ref_forward)? + parse_count(&row, columns.ref_reverse)?;
        let mut counts: BTreeMap<u8, u64> = Default::default();
        for &(symbol, index) in columns.symbols.iter() {
            let count = parse_count(&row, index)?;
            if count > 0 {
                counts.insert(symbol, count);
            }
        }

        let entry = raw_counts.entry(position).or_default();
        entry.1 += reference_matches;
        for (symbol, count) in counts.into_iter() {
            *entry.0.entry(symbol).or_insert(0) += count;
        }
    }
    Ok(raw_counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_layout() {
        let tsv = "position\tbase\tcount\n43\tA\t7\n43\tG\t3\n1\tc\t2\n1\t.\t5\n2\tA\t0\n";
        let table = parse_frequency_table(tsv.as_bytes()).unwrap();
        // position 2 had no support at all
        assert_eq!(table.len(), 2);

        let record = table.get(42).unwrap();
        assert_eq!(record.count(b'A'), 7);
        assert_eq!(record.count(b'G'), 3);
        assert_eq!(record.vote().unwrap().symbol, b'A');

        let record = table.get(0).unwrap();
        assert_eq!(record.count(b'C'), 2);
        assert_eq!(record.reference_matches(), 5);
        assert_eq!(record.total(), 7);
    }

    #[test]
    fn test_wide_layout() {
        let tsv = "\
CHROM\tPOS\t.\t,\tA\tC\tG\tT\tN\t+\t-\t^\t$\tother
chr\t1\t10\t5\t0\t0\t0\t0\t0\t0\t0\t1\t0\t0
chr\t2\t1\t1\t0\t0\t12\t0\t1\t2\t0\t0\t0\t0
chr\t3\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0
";
        let table = parse_frequency_table(tsv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().reference_matches(), 15);
        assert_eq!(table.get(0).unwrap().vote(), None);

        let record = table.get(1).unwrap();
        assert_eq!(record.count(b'G'), 12);
        assert_eq!(record.count(b'N'), 1);
        assert_eq!(record.total(), 15);
        assert_eq!(record.vote().unwrap().symbol, b'G');
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_bad_tables() {
        // unknown header
        assert!(parse_frequency_table("pos\tsymbol\tn\n1\tA\t3\n".as_bytes()).is_err());
        // 0-based position
        assert!(parse_frequency_table("position\tbase\tcount\n0\tA\t3\n".as_bytes()).is_err());
        // multi-character symbol
        assert!(parse_frequency_table("position\tbase\tcount\n1\tAC\t3\n".as_bytes()).is_err());
        // invalid symbol
        assert!(parse_frequency_table("position\tbase\tcount\n1\tZ\t3\n".as_bytes()).is_err());
        // multiple sequences in one pileup
        let tsv = "\
CHROM\tPOS\t.\t,\tA\tC\tG\tT\tN\t+\t-\t^\t$\tother
chr1\t1\t10\t5\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0
chr2\t2\t10\t5\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0
";
        assert!(parse_frequency_table(tsv.as_bytes()).is_err());
        // missing pileup column
        assert!(parse_frequency_table("CHROM\tPOS\t.\t,\tA\tC\tG\tT\nchr\t1\t1\t1\t1\t1\t1\t1\n".as_bytes()).is_err());
    }

    #[test]
    fn test_layout_detection() {
        let headers = csv::StringRecord::from(vec!["position", "base", "count"]);
        assert_eq!(FrequencyLayout::detect(&headers).unwrap(), FrequencyLayout::Long);

        let headers = csv::StringRecord::from(vec!["CHROM", "POS", ".", ",", "A", "C", "G", "T", "N"]);
        let layout = FrequencyLayout::detect(&headers).unwrap();
        assert_eq!(layout, FrequencyLayout::Wide(WideColumns {
            chrom: 0, pos: 1, ref_forward: 2, ref_reverse: 3,
            symbols: vec![(b'A', 4), (b'C', 5), (b'G', 6), (b'T', 7), (b'N', 8)]
        }));
    }
}
