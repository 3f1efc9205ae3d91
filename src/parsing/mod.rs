/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Single record loading from FASTA files
pub mod fasta;
/// Parser for per-position read support tables
pub mod frequency_tsv;
/// Parser for the candidate manifest, which loads every candidate assembly
pub mod manifest;
/// Loads the reference genome and its regions
pub mod reference;
/// Parser for reference region boundaries
pub mod regions;
