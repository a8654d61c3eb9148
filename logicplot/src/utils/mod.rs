//! Supporting infrastructure for the output modules.
//!
//! Provides packed-sample decoding, unit formatting and error types.

pub mod errors;
pub mod sample_reader;
pub mod units;
