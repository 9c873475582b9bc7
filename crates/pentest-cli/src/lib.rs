//! Operator tooling for the pentest harness: validate a contract file
//! offline, inspect a budget snapshot, or replay a finding through the
//! validator, all without starting the daemon.

pub mod commands;
pub mod format;
