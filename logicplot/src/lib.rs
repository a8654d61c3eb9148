#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Converter from captured digital-logic samples to the column text format
//! read by gnuplot.
//!
//! ### Sample Layout
//!
//! A capture is a stream of packed samples. Each sample holds one bit per
//! enabled channel, least significant bit first, in
//! `ceil(enabled_channels / 8)` little-endian bytes. At most
//! [`structs::channel::MAX_CHANNELS`] channels can be enabled.
//!
//! ### Output Layout
//!
//! A comment header naming the generator, the sample rate and the channel of
//! each column, followed by one row per retained sample:
//!
//! ```text
//! 0	1 1 0
//! 2	1 0 1
//! ```
//!
//! The first column counts samples. Runs of identical samples collapse to
//! their first row, but the first sample of a capture and the last sample of
//! every chunk are always written.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use logicplot::process::{Event, OutputOptions, gnuplot::GnuplotOutput};
//! use logicplot::structs::device::{Device, FixedRateDriver};
//!
//! let driver = Arc::new(FixedRateDriver::new("demo", Some(8_000_000)));
//! let device = Device::with_channel_names(&["A", "B", "C"], driver);
//!
//! let mut output = GnuplotOutput::open(Some(&device), &OutputOptions::default())?;
//!
//! // The first chunk carries the header
//! let text = output.convert(&[0b011, 0b011, 0b101])?;
//! assert!(text.starts_with("# Sample data"));
//! assert!(text.ends_with("0\t1 1 0 \n2\t1 0 1 \n"));
//!
//! output.handle_event(Event::End);
//! # Ok::<(), logicplot::utils::errors::OutputError>(())
//! ```

/// Library version, used in the default `Generated by:` header line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output session lifecycle.
///
/// 1. **Open** ([`process::gnuplot::GnuplotOutput::open`]): validates the
///    channel list and renders the header.
/// 2. **Convert** ([`process::gnuplot::GnuplotOutput::convert`]): turns
///    chunks of packed samples into rows.
/// 3. **Finalize** ([`process::gnuplot::GnuplotOutput::handle_event`]):
///    releases the session on [`process::Event::End`].
pub mod process;

/// Device model consumed by output modules.
///
/// - **Channels** ([`structs::channel`]): probe names, enabled flags, unit size
/// - **Devices** ([`structs::device`]): channel lists and driver capability queries
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Errors** ([`utils::errors`]): Error types and the `log_or_err!` macro
/// - **Sample Decoding** ([`utils::sample_reader`]): Little-endian packed samples
/// - **Units** ([`utils::units`]): Sample rate and period strings
pub mod utils;
