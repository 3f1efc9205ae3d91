/*!
# Orientation module
Window-based k-mer concordance scanning and inverted span repair.
*/

/// Packed k-mer sets used as the orientation ground truth
pub mod kmer_index;
/// Detection and re-orientation of long low-concordance spans
pub mod repairer;
/// Lazy fixed-window concordance scan
pub mod window_scanner;
