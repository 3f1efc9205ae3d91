/*!
# CLI module
Command line interface functionality that is specific to Plastome Polish.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The polish CLI subcommand
pub mod polish;
/// The scan CLI subcommand
pub mod scan;
