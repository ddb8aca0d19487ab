//! clustergraph CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (process, search, cache clear)

pub mod cli;
pub mod commands;

pub use cli::{CacheCommands, Cli, Commands};
pub use commands::{
    clear_cache, init_logging, load_settings, process, read_messages, read_output, search,
    write_json, ProcessArgs, SearchArgs,
};
