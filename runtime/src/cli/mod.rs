//! CLI subcommand implementations for the `pillar` binary.

pub mod acquire_cmd;
pub mod chart_cmd;
pub mod doctor;
pub mod output;
