//! Core types and constants for the target tracker

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
