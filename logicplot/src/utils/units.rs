//! Human-readable sample rate and period strings.
//!
//! The header of every output names the acquisition rate ("1 MHz") and the
//! resulting sampling period ("1 us"). Formatting goes through the
//! [`UnitFormatter`] trait so hosts can substitute their own notation; the
//! built-in [`SiFormatter`] uses SI prefixes.

pub const KHZ: u64 = 1_000;
pub const MHZ: u64 = 1_000_000;
pub const GHZ: u64 = 1_000_000_000;

const RATE_UNITS: [(u64, &str); 4] = [(GHZ, "GHz"), (MHZ, "MHz"), (KHZ, "kHz"), (1, "Hz")];

// (10^n, suffix) for a period of 1/rate seconds
const PERIOD_UNITS: [(u128, &str); 5] = [
    (1, "s"),
    (1_000, "ms"),
    (1_000_000, "us"),
    (1_000_000_000, "ns"),
    (1_000_000_000_000, "ps"),
];

/// Renders sample rates and sampling periods for the output header.
///
/// Either method may decline by returning `None`, which aborts session open
/// with a format error.
pub trait UnitFormatter {
    fn samplerate_string(&self, samplerate: u64) -> Option<String>;

    fn period_string(&self, samplerate: u64) -> Option<String>;
}

/// SI-prefixed formatter (`"2.5 MHz"`, `"400 ns"`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SiFormatter;

impl UnitFormatter for SiFormatter {
    fn samplerate_string(&self, samplerate: u64) -> Option<String> {
        if samplerate == 0 {
            return None;
        }

        let (divisor, unit) = RATE_UNITS
            .iter()
            .copied()
            .find(|&(divisor, _)| samplerate >= divisor)?;

        let whole = samplerate / divisor;
        let rest = samplerate % divisor;
        if rest == 0 {
            return Some(format!("{whole} {unit}"));
        }

        let width = divisor.ilog10() as usize;
        let fraction = format!("{rest:0width$}");
        Some(format!("{whole}.{} {unit}", fraction.trim_end_matches('0')))
    }

    fn period_string(&self, samplerate: u64) -> Option<String> {
        if samplerate == 0 {
            return None;
        }

        let rate = samplerate as u128;
        let &(scale, unit) = PERIOD_UNITS
            .iter()
            .find(|&&(scale, _)| scale >= rate)
            .unwrap_or(&PERIOD_UNITS[PERIOD_UNITS.len() - 1]);

        let whole = scale / rate;
        let rest = scale % rate;
        if rest == 0 {
            return Some(format!("{whole} {unit}"));
        }

        let millis = rest * 1000 / rate;
        if millis == 0 {
            return Some(format!("{whole} {unit}"));
        }
        let fraction = format!("{millis:03}");
        Some(format!("{whole}.{} {unit}", fraction.trim_end_matches('0')))
    }
}

/// Parses a sample rate such as `"48000"`, `"250k"`, `"1 MHz"` or `"2.5GHz"`.
///
/// Returns `None` for malformed input, zero, or values that overflow `u64`.
pub fn parse_samplerate(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    if number.is_empty() {
        return None;
    }

    let suffix = suffix.trim();
    let (prefix, hz) = match suffix.char_indices().next() {
        Some((_, c @ ('k' | 'K' | 'M' | 'G'))) => (Some(c), &suffix[1..]),
        _ => (None, suffix),
    };
    if !(hz.is_empty() || hz.eq_ignore_ascii_case("hz")) {
        return None;
    }

    let multiplier = match prefix {
        None => 1,
        Some('k' | 'K') => KHZ,
        Some('M') => MHZ,
        Some('G') => GHZ,
        Some(_) => unreachable!(),
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(multiplier)?;

    if !fraction.is_empty() {
        let digits = fraction.len() as u32;
        let denominator = 10u64.checked_pow(digits)?;
        let numerator: u64 = fraction.parse().ok()?;
        let scaled = (numerator as u128 * multiplier as u128) / denominator as u128;
        if (numerator as u128 * multiplier as u128) % denominator as u128 != 0 {
            return None;
        }
        value = value.checked_add(u64::try_from(scaled).ok()?)?;
    }

    (value != 0).then_some(value)
}

/// Duration of `samples` at `samplerate`, as `HH:MM:SS.mmm`.
pub fn duration_string(samples: u64, samplerate: u64) -> Option<String> {
    if samplerate == 0 {
        return None;
    }
    let total_ms = (samples as u128 * 1000 / samplerate as u128) as u64;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);
    Some(format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}"))
}
