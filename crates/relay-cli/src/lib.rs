//! CLI argument models and validation for the relay bot binary.
//!
//! Every flag is mirrored by a `RELAY_*` environment variable so the bot can
//! be configured entirely from its deployment environment.

pub mod cli_args;
pub mod cli_types;
pub mod validation;

pub use cli_args::Cli;
pub use cli_types::*;
pub use validation::*;
