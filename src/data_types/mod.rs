
/// Candidate assemblies and their externally computed attributes
pub mod candidate;
/// Consensus correction events
pub mod correction;
/// Per-position read support tables
pub mod frequency_table;
/// Window scores, spans, and orientation decisions
pub mod orientation;
/// Reference genome with named region boundaries
pub mod reference;
/// Per-sample results, statuses, and review list entries
pub mod sample_result;
/// Core nucleotide sequence type and reverse complement helpers
pub mod sequence;
