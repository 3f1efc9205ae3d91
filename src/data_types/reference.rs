
use coitrees::{COITree, Interval, IntervalTree};
use serde::Deserialize;

use crate::data_types::candidate::RegionLengths;
use crate::data_types::sequence::Sequence;

/// A named region on the reference, 0-based half-open
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct RegionBoundary {
    /// Region label, e.g. LSC, IRa, SSC, IRb
    pub name: String,
    /// First included base, 0-based
    pub start: usize,
    /// First excluded base, 0-based
    pub end: usize
}

impl RegionBoundary {
    /// Constructor
    pub fn new(name: String, start: usize, end: usize) -> Self {
        Self { name, start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The reference genome: a single sequence plus ordered region boundaries.
/// Regions are reporting context only, scoring never depends on them.
#[derive(Clone)]
pub struct ReferenceGenome {
    /// The reference sequence
    sequence: Sequence,
    /// Region boundaries in input order
    regions: Vec<RegionBoundary>,
    /// Lookup tree over the regions; 0-based inclusive coordinates with the region index as metadata
    region_tree: COITree<usize, usize>
}

impl std::fmt::Debug for ReferenceGenome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug, the regions carry the same information
        f.debug_struct("ReferenceGenome")
            .field("id", &self.sequence.id())
            .field("length", &self.sequence.len())
            .field("regions", &self.regions)
            .finish()
    }
}

impl ReferenceGenome {
    /// Creates a new reference from a sequence and any region boundaries.
    /// # Arguments
    /// * `sequence` - the reference sequence
    /// * `regions` - named region boundaries, may be empty
    /// # Errors
    /// * if a region is empty or extends past the end of the sequence
    pub fn new(sequence: Sequence, regions: Vec<RegionBoundary>) -> anyhow::Result<Self> {
        for region in regions.iter() {
            anyhow::ensure!(
                region.start < region.end && region.end <= sequence.len(),
                "Region {:?} ({}-{}) is outside the reference of length {}", region.name, region.start, region.end, sequence.len()
            );
        }

        let coi_intervals: Vec<Interval<usize>> = regions.iter().enumerate()
            .map(|(r_index, region)| {
                // convert to 0-based inclusive
                Interval::new(region.start as i32, region.end as i32 - 1, r_index)
            })
            .collect();
        let region_tree = COITree::new(&coi_intervals);

        Ok(Self {
            sequence,
            regions,
            region_tree
        })
    }

    /// Returns the names of all regions overlapping the half-open span [start, end), in input order
    pub fn overlapping_regions(&self, start: usize, end: usize) -> Vec<String> {
        if end <= start {
            return vec![];
        }

        let mut indices: Vec<usize> = vec![];
        self.region_tree.query(start as i32, end as i32 - 1, |node| {
            indices.push(node.metadata.clone());
        });
        indices.sort_unstable();
        indices.into_iter()
            .map(|r_index| self.regions[r_index].name.clone())
            .collect()
    }

    /// If the standard four plastome regions are all present, returns their lengths.
    pub fn region_lengths(&self) -> Option<RegionLengths> {
        let find = |label: &str| -> Option<usize> {
            self.regions.iter()
                .find(|r| r.name.eq_ignore_ascii_case(label))
                .map(|r| r.len())
        };
        Some(RegionLengths {
            lsc: find("LSC")?,
            ira: find("IRa")?,
            ssc: find("SSC")?,
            irb: find("IRb")?
        })
    }

    // getters
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn regions(&self) -> &[RegionBoundary] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
