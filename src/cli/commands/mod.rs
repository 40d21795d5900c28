//! CLI command implementations

pub mod compare;
pub mod completions;
pub mod config;
pub mod extract;
pub mod inspect;
pub mod run;
