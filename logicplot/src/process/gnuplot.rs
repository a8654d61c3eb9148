use std::fmt::Write;

use chrono::Local;
use log::Level;

use super::header::{HeaderInfo, build_header};
use super::{Event, OutputModule, OutputOptions};
use crate::log_or_err;
use crate::structs::channel::{enabled_channel_names, unit_size};
use crate::structs::device::Device;
use crate::utils::errors::OutputError;
use crate::utils::sample_reader::PackedSampleReader;
use crate::utils::units::{SiFormatter, UnitFormatter};

/// Room reserved for the counter column, its tab and the row terminator.
const MIN_COUNTER_COLUMN: usize = 16;

/// Upper bound on the length of one data row.
///
/// A row is `<counter>\t` followed by `<bit> ` per channel and `\n`. The
/// counter column is sized for `last_counter`, the largest counter the row
/// can carry.
pub fn max_line_len(enabled_channels: usize, last_counter: u64) -> usize {
    let counter_digits = last_counter.checked_ilog10().map_or(1, |d| d as usize + 1);
    MIN_COUNTER_COLUMN.max(counter_digits + 2) + 2 * enabled_channels
}

/// Bytes to reserve for converting `samples` samples starting at counter
/// `first_counter`, plus a pending header. `None` if it overflows `usize`.
pub fn output_capacity(
    samples: usize,
    enabled_channels: usize,
    first_counter: u64,
    header_len: usize,
) -> Option<usize> {
    if samples == 0 {
        return Some(header_len);
    }
    let last_counter = first_counter.saturating_add(samples as u64 - 1);
    samples
        .checked_mul(max_line_len(enabled_channels, last_counter))?
        .checked_add(header_len)
}

#[derive(Debug)]
struct Session {
    channels: Vec<String>,
    unit_size: usize,
    header: Option<String>,
    sample_count: u64,
    last_sample: u64,
}

/// Gnuplot text output for one capture session.
///
/// Created by [`open`](GnuplotOutput::open), fed with packed logic samples
/// through [`convert`](GnuplotOutput::convert) and finalized by
/// [`handle_event`](GnuplotOutput::handle_event) with [`Event::End`].
///
/// Rows repeating the previous sample are suppressed, except for the first
/// sample of the session and the last sample of every chunk. The counter
/// column keeps counting suppressed samples, so gnuplot still places each row
/// at its true sample position.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use logicplot::process::{Event, OutputOptions, gnuplot::GnuplotOutput};
/// use logicplot::structs::device::{Device, FixedRateDriver};
///
/// let driver = Arc::new(FixedRateDriver::new("demo", Some(1_000_000)));
/// let device = Device::with_channel_names(&["CLK", "DATA"], driver);
///
/// let mut output = GnuplotOutput::open(Some(&device), &OutputOptions::default())?;
/// let text = output.convert(&[0b01, 0b01, 0b01, 0b11])?;
/// assert!(text.ends_with("0\t1 0 \n3\t1 1 \n"));
///
/// output.handle_event(Event::End);
/// assert!(output.convert(&[0]).is_err());
/// # Ok::<(), logicplot::utils::errors::OutputError>(())
/// ```
#[derive(Debug)]
pub struct GnuplotOutput {
    session: Option<Session>,
    fail_level: Level,
}

impl GnuplotOutput {
    /// Opens a session using SI unit strings in the header.
    pub fn open(device: Option<&Device>, options: &OutputOptions) -> Result<Self, OutputError> {
        Self::open_with_formatter(device, options, &SiFormatter)
    }

    /// Opens a session, rendering rate and period with `formatter`.
    ///
    /// Fails if the device or its driver is missing, if no channel (or more
    /// than [`MAX_CHANNELS`](crate::structs::channel::MAX_CHANNELS)) is
    /// enabled, or if the formatter cannot render the sample rate.
    pub fn open_with_formatter(
        device: Option<&Device>,
        options: &OutputOptions,
        formatter: &dyn UnitFormatter,
    ) -> Result<Self, OutputError> {
        let device = device.ok_or(OutputError::InvalidArgument("no device"))?;
        let driver = device
            .driver
            .as_ref()
            .ok_or(OutputError::InvalidArgument("device has no driver"))?;

        let channels = enabled_channel_names(&device.channels)?;
        if channels.is_empty() {
            return Err(OutputError::InvalidArgument("no enabled channels"));
        }
        let unit_size = unit_size(channels.len());

        let samplerate = driver.current_samplerate();
        let header = build_header(
            &HeaderInfo {
                generator: &options.generator,
                timestamp: options
                    .timestamp
                    .unwrap_or_else(|| Local::now().naive_local()),
                enabled_channels: &channels,
                total_channels: device.channels.len(),
                samplerate,
            },
            formatter,
        )?;

        log::debug!(
            "Opened gnuplot output on {}: {}/{} channels enabled, unit size {unit_size}, samplerate {samplerate:?}",
            driver.name(),
            channels.len(),
            device.channels.len(),
        );

        Ok(Self {
            session: Some(Session {
                channels,
                unit_size,
                header: Some(header),
                sample_count: 0,
                last_sample: 0,
            }),
            fail_level: options.fail_level,
        })
    }

    /// Sets the failure level for recoverable conditions.
    ///
    /// - `log::Level::Error`: partial trailing samples are logged and dropped (default)
    /// - `log::Level::Warn`: partial trailing samples fail the conversion (strict mode)
    pub fn set_fail_level(&mut self, level: Level) {
        self.fail_level = level;
    }

    /// Converts a chunk of packed samples into gnuplot rows.
    ///
    /// The first call also emits the header. Bytes past the last complete
    /// sample are not converted. On error the session is left exactly as it
    /// was and no text is returned.
    pub fn convert(&mut self, data: &[u8]) -> Result<String, OutputError> {
        let session = self.session.as_mut().ok_or(OutputError::InvalidState)?;

        let trailing = data.len() % session.unit_size;
        if trailing != 0 {
            log_or_err!(
                self,
                Level::Warn,
                OutputError::PartialSample {
                    trailing,
                    unit_size: session.unit_size,
                }
            );
        }

        let samples = PackedSampleReader::new(data, session.unit_size);
        let complete = samples.len();
        let channel_count = session.channels.len();
        let header_len = session.header.as_ref().map_or(0, String::len);

        let capacity = output_capacity(complete, channel_count, session.sample_count, header_len)
            .ok_or(OutputError::AllocationFailure(usize::MAX))?;
        let mut out = String::new();
        out.try_reserve_exact(capacity)
            .map_err(|_| OutputError::AllocationFailure(capacity))?;

        if let Some(header) = &session.header {
            out.push_str(header);
        }

        let mut sample_count = session.sample_count;
        let mut last_sample = session.last_sample;
        let mut rows = 0usize;
        for (i, sample) in samples.enumerate() {
            let sample = sample?;
            let counter = sample_count;
            sample_count += 1;

            let repeated = counter != 0 && sample == last_sample;
            last_sample = sample;
            if repeated && i + 1 != complete {
                continue;
            }

            write_row(&mut out, counter, sample, channel_count)?;
            rows += 1;
        }

        debug_assert!(
            out.len() <= capacity,
            "wrote {} bytes into a {capacity} byte reservation",
            out.len()
        );

        log::trace!(
            "Converted {complete} samples into {rows} rows ({} bytes)",
            out.len()
        );

        session.header = None;
        session.sample_count = sample_count;
        session.last_sample = last_sample;

        Ok(out)
    }

    /// Handles a non-data event. Always returns an empty buffer.
    ///
    /// [`Event::End`] releases the session; later conversions fail with
    /// [`OutputError::InvalidState`].
    pub fn handle_event(&mut self, event: Event) -> Vec<u8> {
        match event {
            // TODO: decide whether a trigger mark can be expressed as a gnuplot comment row
            Event::Trigger => log::trace!("Ignoring trigger event"),
            Event::End => match self.session.take() {
                Some(session) => log::debug!(
                    "End of stream after {} samples, releasing session",
                    session.sample_count
                ),
                None => log::debug!("End of stream on an already finalized session"),
            },
            Event::Other(kind) => log::error!("Unsupported event type: {kind}"),
        }
        Vec::new()
    }

    /// Enabled channel names, or `None` once finalized.
    pub fn enabled_channels(&self) -> Option<&[String]> {
        self.session.as_ref().map(|s| s.channels.as_slice())
    }

    /// Bytes per packed sample, or `None` once finalized.
    pub fn unit_size(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.unit_size)
    }

    /// Samples processed so far, including suppressed ones.
    pub fn sample_count(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.sample_count)
    }

    /// The header, until the first chunk has been converted.
    pub fn pending_header(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.header.as_deref())
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_none()
    }
}

fn write_row(
    out: &mut String,
    counter: u64,
    sample: u64,
    channel_count: usize,
) -> Result<(), OutputError> {
    write!(out, "{counter}\t")?;
    for p in 0..channel_count {
        out.push(if (sample >> p) & 1 == 1 { '1' } else { '0' });
        out.push(' ');
    }
    out.push('\n');
    Ok(())
}

impl OutputModule for GnuplotOutput {
    const ID: &'static str = "gnuplot";
    const DESCRIPTION: &'static str = "Gnuplot";

    fn open(device: Option<&Device>, options: &OutputOptions) -> Result<Self, OutputError> {
        GnuplotOutput::open(device, options)
    }

    fn data(&mut self, data: &[u8]) -> Result<String, OutputError> {
        self.convert(data)
    }

    fn event(&mut self, event: Event) -> Vec<u8> {
        self.handle_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::channel::{Channel, MAX_CHANNELS};
    use crate::structs::device::FixedRateDriver;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn options() -> OutputOptions {
        OutputOptions {
            generator: "logicplot test".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(3, 4, 5)),
            fail_level: Level::Error,
        }
    }

    fn device(names: &[&str], samplerate: Option<u64>) -> Device {
        Device::with_channel_names(names, Arc::new(FixedRateDriver::new("test", samplerate)))
    }

    fn numbered_device(count: usize) -> Device {
        let names: Vec<String> = (0..count).map(|i| format!("D{i}")).collect();
        Device::with_channel_names(&names, Arc::new(FixedRateDriver::new("test", None)))
    }

    fn open(device: &Device) -> GnuplotOutput {
        GnuplotOutput::open(Some(device), &options()).unwrap()
    }

    /// Data rows only: everything after the blank line closing the header.
    fn rows(text: &str) -> Vec<&str> {
        let body = text.split_once("\n\n").map_or(text, |(_, rows)| rows);
        body.lines().collect()
    }

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn bytes(&mut self, len: usize) -> Vec<u8> {
            (0..len).map(|_| self.next() as u8).collect()
        }
    }

    #[test]
    fn three_channel_capture() -> Result<(), OutputError> {
        let device = device(&["A", "B", "C"], None);
        let mut output = open(&device);
        assert_eq!(output.unit_size(), Some(1));

        let header = output.pending_header().unwrap().to_string();
        let text = output.convert(&[0b011, 0b011, 0b101])?;
        assert_eq!(text, format!("{header}0\t1 1 0 \n2\t1 0 1 \n"));
        assert_eq!(output.pending_header(), None);

        let text = output.convert(&[0b101, 0b111])?;
        assert_eq!(text, "4\t1 1 1 \n");
        Ok(())
    }

    #[test]
    fn first_change_and_last_rows_survive_dedup() -> Result<(), OutputError> {
        let device = device(&["A"], Some(1_000));
        let mut output = open(&device);

        let text = output.convert(&[0, 0, 0, 1, 1, 0])?;
        assert_eq!(rows(&text), ["0\t0 ", "3\t1 ", "5\t0 "]);
        assert_eq!(output.sample_count(), Some(6));
        Ok(())
    }

    #[test]
    fn last_sample_of_every_chunk_is_emitted() -> Result<(), OutputError> {
        let device = device(&["A"], None);
        let mut output = open(&device);

        output.convert(&[1, 1])?;
        assert_eq!(output.convert(&[1, 1, 1])?, "4\t1 \n");
        assert_eq!(output.convert(&[1])?, "5\t1 \n");
        assert_eq!(output.convert(&[])?, "");
        assert_eq!(output.convert(&[0, 0])?, "6\t0 \n7\t0 \n");
        Ok(())
    }

    #[test]
    fn dedup_state_carries_across_chunks() -> Result<(), OutputError> {
        let device = device(&["A", "B"], None);
        let mut output = open(&device);

        output.convert(&[0b10])?;
        // the first sample of the second chunk repeats the last emitted value
        assert_eq!(output.convert(&[0b10, 0b10, 0b01])?, "3\t1 0 \n");
        Ok(())
    }

    #[test]
    fn counter_is_independent_of_chunking() -> Result<(), OutputError> {
        let device = numbered_device(12);
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let data = rng.bytes(2 * 5000);

        for chunk_samples in [1usize, 2, 3, 7, 64, 1000, 4999, 5000] {
            let mut output = open(&device);
            let mut previous: Option<u64> = None;
            for chunk in data.chunks(chunk_samples * 2) {
                for row in rows(&output.convert(chunk)?) {
                    let (counter, _) = row.split_once('\t').unwrap();
                    let counter: u64 = counter.parse().unwrap();
                    assert!(previous.is_none_or(|p| p < counter));
                    previous = Some(counter);
                }
            }
            assert_eq!(output.sample_count(), Some(5000));
            assert_eq!(previous, Some(4999));
        }
        Ok(())
    }

    #[test]
    fn bits_are_lsb_first_across_bytes() -> Result<(), OutputError> {
        let device = numbered_device(10);
        let mut output = open(&device);
        assert_eq!(output.unit_size(), Some(2));

        let text = output.convert(&[0b0000_0001, 0b0000_0010])?;
        assert_eq!(rows(&text), ["0\t1 0 0 0 0 0 0 0 0 1 "]);
        Ok(())
    }

    #[test]
    fn sixty_four_channels_use_the_full_word() -> Result<(), OutputError> {
        let device = numbered_device(MAX_CHANNELS);
        let mut output = open(&device);
        assert_eq!(output.unit_size(), Some(8));

        let text = output.convert(&u64::MAX.to_le_bytes())?;
        let expected = format!("0\t{}", "1 ".repeat(64));
        assert_eq!(rows(&text), [expected.as_str()]);
        Ok(())
    }

    #[test]
    fn partial_trailing_sample_is_dropped() -> Result<(), OutputError> {
        let device = numbered_device(9);
        let mut output = open(&device);

        let text = output.convert(&[0x01, 0x00, 0x01, 0x01, 0xFF])?;
        assert_eq!(rows(&text), ["0\t1 0 0 0 0 0 0 0 0 ", "1\t1 0 0 0 0 0 0 0 1 "]);
        assert_eq!(output.sample_count(), Some(2));

        assert_eq!(output.convert(&[0xFF])?, "");
        assert_eq!(output.sample_count(), Some(2));
        Ok(())
    }

    #[test]
    fn strict_mode_rejects_partial_samples_without_side_effects() -> Result<(), OutputError> {
        let device = numbered_device(9);
        let mut output = open(&device);
        output.set_fail_level(Level::Warn);

        let result = output.convert(&[0x01, 0x00, 0x01]);
        assert!(matches!(
            result,
            Err(OutputError::PartialSample {
                trailing: 1,
                unit_size: 2
            })
        ));
        assert!(output.pending_header().is_some());
        assert_eq!(output.sample_count(), Some(0));

        let text = output.convert(&[0x01, 0x00])?;
        assert!(text.starts_with("# Sample data"));
        Ok(())
    }

    #[test]
    fn convert_after_end_is_invalid() {
        let device = device(&["A"], None);
        let mut output = open(&device);
        assert!(output.handle_event(Event::End).is_empty());
        assert!(output.is_finished());
        assert!(matches!(
            output.convert(&[1]),
            Err(OutputError::InvalidState)
        ));

        // a second end is harmless
        assert!(output.handle_event(Event::End).is_empty());
        assert_eq!(output.sample_count(), None);
    }

    #[test]
    fn trigger_and_unknown_events_keep_the_session() -> Result<(), OutputError> {
        let device = device(&["A"], None);
        let mut output = open(&device);
        assert!(output.handle_event(Event::Trigger).is_empty());
        assert!(output.handle_event(Event::Other(10002)).is_empty());
        assert!(!output.is_finished());
        assert!(output.convert(&[1])?.ends_with("0\t1 \n"));
        Ok(())
    }

    #[test]
    fn sessions_do_not_share_counters() -> Result<(), OutputError> {
        let device = device(&["A"], None);
        let mut first = open(&device);
        let mut second = open(&device);

        first.convert(&[1, 1, 1, 1])?;
        let text = second.convert(&[1])?;
        assert_eq!(rows(&text), ["0\t1 "]);
        assert_eq!(first.sample_count(), Some(4));
        assert_eq!(second.sample_count(), Some(1));
        Ok(())
    }

    #[test]
    fn open_rejects_missing_context() {
        assert!(matches!(
            GnuplotOutput::open(None, &options()),
            Err(OutputError::InvalidArgument(_))
        ));

        let orphan = Device {
            channels: vec![Channel::new(0, "A", true)],
            driver: None,
        };
        assert!(matches!(
            GnuplotOutput::open(Some(&orphan), &options()),
            Err(OutputError::InvalidArgument(_))
        ));

        let disabled = Device::new(
            vec![Channel::new(0, "A", false)],
            Arc::new(FixedRateDriver::new("test", None)),
        );
        assert!(matches!(
            GnuplotOutput::open(Some(&disabled), &options()),
            Err(OutputError::InvalidArgument(_))
        ));
    }

    #[test]
    fn open_rejects_too_many_channels() {
        let device = numbered_device(MAX_CHANNELS + 1);
        assert!(matches!(
            GnuplotOutput::open(Some(&device), &options()),
            Err(OutputError::ChannelLimitExceeded { count: 65, max: 64 })
        ));
    }

    #[test]
    fn open_reports_formatter_failure() {
        let device = device(&["A"], Some(0));
        assert!(matches!(
            GnuplotOutput::open(Some(&device), &options()),
            Err(OutputError::Format {
                what: "samplerate",
                samplerate: 0
            })
        ));
    }

    #[test]
    fn header_counts_enabled_and_total_channels() -> Result<(), OutputError> {
        let channels = vec![
            Channel::new(0, "CLK", true),
            Channel::new(1, "CS", false),
            Channel::new(2, "MOSI", true),
        ];
        let device = Device::new(
            channels,
            Arc::new(FixedRateDriver::new("test", Some(24_000_000))),
        );
        let output = open(&device);

        let header = output.pending_header().unwrap();
        assert!(header.contains("# Generated by: logicplot test on Tue Jan  2 03:04:05 2024\n"));
        assert!(header.contains("# Comment: Acquisition with 2/3 probes at 24 MHz\n"));
        assert!(header.contains("# Period: 41.666 ns\n"));
        assert!(header.contains("# 1\t\tCLK\n# 2\t\tMOSI\n\n"));
        Ok(())
    }

    #[test]
    fn capacity_bounds_output_for_all_channel_counts() -> Result<(), OutputError> {
        let mut rng = XorShift(0xDEAD_BEEF_CAFE_F00D);

        for channels in 1..=MAX_CHANNELS {
            let device = numbered_device(channels);
            let unit = unit_size(channels);
            let mut lengths = vec![1usize, 2, 7, 64, 257];
            if [1, 8, 9, 33, 64].contains(&channels) {
                lengths.push(10_000);
            }

            for samples in lengths {
                let mut output = open(&device);
                let data = rng.bytes(samples * unit);
                let header_len = output.pending_header().map_or(0, str::len);
                let capacity = output_capacity(samples, channels, 0, header_len).unwrap();
                let text = output.convert(&data)?;
                assert!(
                    text.len() <= capacity,
                    "{channels} channels, {samples} samples: {} > {capacity}",
                    text.len()
                );

                let capacity = output_capacity(samples, channels, samples as u64, 0).unwrap();
                let text = output.convert(&data)?;
                assert!(text.len() <= capacity);
            }
        }
        Ok(())
    }

    #[test]
    fn capacity_holds_for_huge_counters() -> Result<(), OutputError> {
        let device = numbered_device(1);
        let mut output = open(&device);
        output.convert(&[])?;

        let start = u64::MAX - 10;
        if let Some(session) = output.session.as_mut() {
            session.sample_count = start;
            session.last_sample = 1;
        }
        let data: Vec<u8> = (0..8).map(|i| i % 2).collect();
        let capacity = output_capacity(data.len(), 1, start, 0).unwrap();
        let text = output.convert(&data)?;
        assert_eq!(text.lines().count(), 8);
        assert!(text.starts_with(&format!("{start}\t0 \n")));
        assert!(text.len() <= capacity);
        Ok(())
    }

    #[test]
    fn line_length_matches_classic_bound_for_small_counters() {
        assert_eq!(max_line_len(1, 0), 18);
        assert_eq!(max_line_len(64, 99_999_999_999_999), 16 + 128);
        assert_eq!(max_line_len(3, u64::MAX), 22 + 6);
        assert_eq!(output_capacity(0, 8, 0, 120), Some(120));
        assert_eq!(output_capacity(usize::MAX, 8, 0, 0), None);
    }

    #[test]
    fn module_identity() {
        assert_eq!(<GnuplotOutput as OutputModule>::ID, "gnuplot");
        assert_eq!(<GnuplotOutput as OutputModule>::DESCRIPTION, "Gnuplot");
    }
}
