
use serde::Serialize;

/// A single base substitution made by the consensus corrector
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CorrectionEvent {
    /// 0-based position in the sequence
    pub position: usize,
    /// The base before correction
    #[serde(serialize_with = "serialize_symbol")]
    pub original: u8,
    /// The base after correction
    #[serde(serialize_with = "serialize_symbol")]
    pub resolved: u8,
    /// Winning count / total A+C+G+T count
    pub margin: f64,
    /// True if the winner had more than half the support, false if it only had a plurality
    pub true_majority: bool
}

impl CorrectionEvent {
    /// Returns true if the vote was only a plurality, i.e. a reviewer should look at it
    pub fn is_ambiguous(&self) -> bool {
        !self.true_majority
    }
}

/// Symbols are stored as bytes, but we want them readable in the TSV outputs
fn serialize_symbol<S: serde::Serializer>(symbol: &u8, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_char(*symbol as char)
}
