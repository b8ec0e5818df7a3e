//! Command implementations

pub mod config;
pub mod console;
pub mod worker;
