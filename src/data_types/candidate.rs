
use serde::Serialize;

use crate::data_types::frequency_table::FrequencyTable;
use crate::data_types::sequence::Sequence;

/// Output from the external alignment of a candidate against the reference
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AlignmentSummary {
    /// Number of reference bases matched by the candidate
    pub matched_bases: u64,
    /// Number of reference bases covered by any alignment block, if reported
    pub aligned_reference_bases: Option<u64>
}

/// Lengths of the four canonical plastome regions as reported by the assembler
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RegionLengths {
    pub lsc: usize,
    pub ira: usize,
    pub ssc: usize,
    pub irb: usize
}

impl RegionLengths {
    /// Returns the lengths in canonical order LSC, IRa, SSC, IRb
    pub fn as_array(&self) -> [usize; 4] {
        [self.lsc, self.ira, self.ssc, self.irb]
    }
}

/// One externally produced assembly attempt for a sample
#[derive(Clone, Debug)]
pub struct CandidateAssembly {
    /// Opaque identifier from the manifest
    candidate_id: String,
    /// The loaded sequence, or the reason it could not be loaded
    sequence: Result<Sequence, String>,
    /// Pass/fail flag from the external assembly tool
    tool_passed: bool,
    /// Quality value reported by the external tool, reported for the winner in the summary and FASTA header
    external_score: Option<f64>,
    /// Optional alignment statistics against the reference
    alignment: Option<AlignmentSummary>,
    /// Optional region lengths reported by the external tool
    region_lengths: Option<RegionLengths>,
    /// Optional pileup-derived frequencies in this candidate's coordinates
    frequency_table: Option<FrequencyTable>
}

impl CandidateAssembly {
    /// Constructor for a candidate with a successfully loaded sequence
    pub fn new(candidate_id: String, sequence: Sequence, tool_passed: bool) -> Self {
        Self {
            candidate_id,
            sequence: Ok(sequence),
            tool_passed,
            external_score: None,
            alignment: None,
            region_lengths: None,
            frequency_table: None
        }
    }

    /// Constructor for a candidate whose input could not be loaded.
    /// These are kept so they show up on the review list instead of vanishing.
    pub fn new_malformed(candidate_id: String, reason: String, tool_passed: bool) -> Self {
        Self {
            candidate_id,
            sequence: Err(reason),
            tool_passed,
            external_score: None,
            alignment: None,
            region_lengths: None,
            frequency_table: None
        }
    }

    // builder-style setters
    pub fn with_external_score(mut self, external_score: Option<f64>) -> Self {
        self.external_score = external_score;
        self
    }

    pub fn with_alignment(mut self, alignment: Option<AlignmentSummary>) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_region_lengths(mut self, region_lengths: Option<RegionLengths>) -> Self {
        self.region_lengths = region_lengths;
        self
    }

    pub fn with_frequency_table(mut self, frequency_table: Option<FrequencyTable>) -> Self {
        self.frequency_table = frequency_table;
        self
    }

    // getters
    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    pub fn sequence(&self) -> Result<&Sequence, &str> {
        self.sequence.as_ref().map_err(|e| e.as_str())
    }

    /// Length of the sequence, 0 if it failed to load
    pub fn len(&self) -> usize {
        self.sequence.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tool_passed(&self) -> bool {
        self.tool_passed
    }

    pub fn external_score(&self) -> Option<f64> {
        self.external_score
    }

    pub fn alignment(&self) -> Option<&AlignmentSummary> {
        self.alignment.as_ref()
    }

    pub fn region_lengths(&self) -> Option<&RegionLengths> {
        self.region_lengths.as_ref()
    }

    pub fn frequency_table(&self) -> Option<&FrequencyTable> {
        self.frequency_table.as_ref()
    }
}
