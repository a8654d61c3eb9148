use std::fmt::Display;

use chrono::NaiveDateTime;
use log::Level;

use crate::structs::device::Device;
use crate::utils::errors::OutputError;

/// Header synthesis.
///
/// Provides [`build_header`](header::build_header), which renders the comment
/// block describing the column layout of a session.
pub mod header;

/// Packed-sample to gnuplot text conversion.
///
/// Provides [`GnuplotOutput`](gnuplot::GnuplotOutput), the session object
/// holding per-capture counters between chunks.
pub mod gnuplot;

/// Datafeed events other than sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A trigger fired at the current position in the stream.
    Trigger,
    /// The acquisition finished; no more data follows.
    End,
    /// Any other packet type, identified by its raw id.
    Other(u16),
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Trigger => write!(f, "trigger"),
            Event::End => write!(f, "end"),
            Event::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Session-independent settings of an output module.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Tool and version named in the `Generated by:` header line.
    pub generator: String,
    /// Fixed generation time; the local clock is read when `None`.
    pub timestamp: Option<NaiveDateTime>,
    /// Conditions logged at or above this severity become errors.
    ///
    /// - `log::Level::Error`: only fail on Error level conditions (default)
    /// - `log::Level::Warn`: fail on warnings too (strict mode)
    pub fail_level: Level,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            generator: format!("logicplot {}", crate::VERSION),
            timestamp: None,
            fail_level: Level::Error,
        }
    }
}

/// The lifecycle a host drives an output module through:
/// `open`, then any number of `data` calls, then `event(Event::End)`.
pub trait OutputModule: Sized {
    /// Short identifier used to select the module.
    const ID: &'static str;
    /// One-line human readable name.
    const DESCRIPTION: &'static str;

    fn open(device: Option<&Device>, options: &OutputOptions) -> Result<Self, OutputError>;

    /// Converts one chunk of logic data; the caller owns the returned text.
    fn data(&mut self, data: &[u8]) -> Result<String, OutputError>;

    /// Handles a non-data packet. The returned buffer is empty for modules
    /// that have nothing to emit.
    fn event(&mut self, event: Event) -> Vec<u8>;
}

#[test]
fn test_event_display() {
    assert_eq!(Event::Trigger.to_string(), "trigger");
    assert_eq!(Event::End.to_string(), "end");
    assert_eq!(Event::Other(10003).to_string(), "10003");
}
