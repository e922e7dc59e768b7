//! CLI subcommand implementations

pub mod evaluate;
pub mod health;
