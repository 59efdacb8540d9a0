//! Strata CLI - manage a copy-on-write layer store.

pub mod commands;
pub mod output;
