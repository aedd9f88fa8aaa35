//! CLI subcommands.

pub mod cache;
pub mod common;
pub mod config;
pub mod fetch;
pub mod init;
pub mod latest;
