use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::utils::errors::OutputError;
use crate::utils::units::UnitFormatter;

/// `ctime(3)` layout, minus the trailing newline.
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

const COLUMN_RULE_WIDTH: usize = 77;

/// Everything the gnuplot header says about a session.
#[derive(Debug, Clone)]
pub struct HeaderInfo<'a> {
    pub generator: &'a str,
    pub timestamp: NaiveDateTime,
    pub enabled_channels: &'a [String],
    pub total_channels: usize,
    pub samplerate: Option<u64>,
}

/// Builds the comment block that precedes the first data row.
///
/// The acquisition comment is only present when the sample rate is known;
/// without it the period reads `unknown`.
pub fn build_header(
    info: &HeaderInfo,
    formatter: &dyn UnitFormatter,
) -> Result<String, OutputError> {
    let (comment, period) = match info.samplerate {
        Some(samplerate) => {
            let rate = formatter
                .samplerate_string(samplerate)
                .ok_or(OutputError::Format {
                    what: "samplerate",
                    samplerate,
                })?;
            let period = formatter
                .period_string(samplerate)
                .ok_or(OutputError::Format {
                    what: "period",
                    samplerate,
                })?;
            let comment = format!(
                "# Comment: Acquisition with {}/{} probes at {rate}\n",
                info.enabled_channels.len(),
                info.total_channels
            );
            (comment, period)
        }
        None => (String::new(), "unknown".to_string()),
    };

    let mut header = String::new();
    header.push_str("# Sample data in space-separated columns format usable by gnuplot\n");
    header.push_str("#\n");
    writeln!(
        header,
        "# Generated by: {} on {}",
        info.generator,
        info.timestamp.format(TIMESTAMP_FORMAT)
    )?;
    header.push_str(&comment);
    writeln!(header, "# Period: {period}")?;
    header.push_str("#\n");
    header.push_str("# Column\tProbe\n");
    writeln!(header, "# {}", "-".repeat(COLUMN_RULE_WIDTH))?;
    header.push_str("# 0\t\tSample counter (for internal gnuplot purposes)\n");
    for (i, name) in info.enabled_channels.iter().enumerate() {
        writeln!(header, "# {}\t\t{name}", i + 1)?;
    }
    header.push('\n');

    Ok(header)
}
