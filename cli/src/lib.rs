//! Command line front end for marag.

mod app;
mod cli;
mod config;
mod repl;

pub use cli::Cli;
pub use config::{EmbeddingBackend, EmbeddingsConfig, MaragConfig};
