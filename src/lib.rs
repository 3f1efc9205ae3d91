
/// Scores a candidate assembly against the reference
pub mod assembly_scorer;
/// Screens and ranks the candidate assemblies of a sample
pub mod assembly_selector;
/// Command line interface functionality
pub mod cli;
/// Majority-vote correction of a selected assembly
pub mod consensus_corrector;
/// Contains various shared data types
pub mod data_types;
/// k-mer concordance scanning and inverted span repair
pub mod orientation;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Runs all stages for a sample, and for a batch of samples in parallel
pub mod pipeline;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
