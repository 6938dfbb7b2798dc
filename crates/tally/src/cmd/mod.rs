//! Command implementations for the tally CLI

pub mod replay;
pub mod validate;
