use std::path::Path;

use anyhow::{Result, anyhow};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs, generator};
use crate::capture::CaptureConfig;
use crate::input::InputReader;
use logicplot::process::gnuplot::GnuplotOutput;
use logicplot::process::{Event, OutputModule, OutputOptions};
use logicplot::utils::units::{SiFormatter, UnitFormatter, duration_string};

#[derive(Debug, Serialize)]
struct SessionInfo {
    format: &'static str,
    description: &'static str,
    generator: String,
    driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    samplerate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    period: Option<String>,
    unit_size: usize,
    channels: Vec<ChannelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<InputInfo>,
}

#[derive(Debug, Serialize)]
struct ChannelInfo {
    name: String,
    enabled: bool,
    /// gnuplot column, absent for disabled channels
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<usize>,
}

#[derive(Debug, Serialize)]
struct InputInfo {
    path: String,
    bytes: u64,
    samples: u64,
    trailing_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let capture = CaptureConfig::from_args(&args.capture)?;
    let info = describe_session(&capture, args.input.as_deref(), cli, multi)?;
    print!("{}", serde_yaml_ng::to_string(&info)?);
    Ok(())
}

fn describe_session(
    capture: &CaptureConfig,
    input: Option<&Path>,
    cli: &Cli,
    multi: Option<&MultiProgress>,
) -> Result<SessionInfo> {
    let device = capture.to_device()?;
    let options = OutputOptions {
        generator: generator(),
        timestamp: None,
        fail_level: cli.fail_level(),
    };

    // Opening validates the channel list exactly as a conversion would
    let mut output = <GnuplotOutput as OutputModule>::open(Some(&device), &options)?;
    let unit_size = output
        .unit_size()
        .ok_or_else(|| anyhow!("Output session closed unexpectedly"))?;
    if let Some(header) = output.pending_header() {
        log::debug!("Header:\n{header}");
    }
    output.event(Event::End);

    let samplerate = device.samplerate();
    let mut column = 0;
    let channels = device
        .channels
        .iter()
        .map(|c| ChannelInfo {
            name: c.name.clone(),
            enabled: c.enabled,
            column: c.enabled.then(|| {
                column += 1;
                column
            }),
        })
        .collect();

    let input = match input {
        Some(path) => Some(measure_input(path, unit_size, samplerate, multi)?),
        None => None,
    };

    Ok(SessionInfo {
        format: GnuplotOutput::ID,
        description: GnuplotOutput::DESCRIPTION,
        generator: options.generator,
        driver: capture.driver.clone().unwrap_or_else(|| "file".to_string()),
        samplerate: samplerate.and_then(|r| SiFormatter.samplerate_string(r)),
        period: samplerate.and_then(|r| SiFormatter.period_string(r)),
        unit_size,
        channels,
        input,
    })
}

fn measure_input(
    path: &Path,
    unit_size: usize,
    samplerate: Option<u64>,
    multi: Option<&MultiProgress>,
) -> Result<InputInfo> {
    log::info!("Measuring capture: {}", path.display());
    let mut reader = InputReader::new(path)?;

    let bytes = match reader.total_bytes() {
        Some(len) => len,
        None => {
            let pb = match multi {
                Some(multi) => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    pb.set_style(ProgressStyle::with_template("{spinner:.green} {bytes} {msg}")?);
                    pb.enable_steady_tick(std::time::Duration::from_millis(100));
                    pb.set_message("reading capture...");
                    Some(pb)
                }
                None => None,
            };

            let mut bytes = 0u64;
            reader.process_chunks(64 * 1024, |chunk| {
                bytes += chunk.len() as u64;
                if let Some(pb) = &pb {
                    pb.set_position(bytes);
                }
                Ok(true)
            })?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            bytes
        }
    };

    let samples = bytes / unit_size as u64;
    let trailing_bytes = bytes % unit_size as u64;
    if trailing_bytes != 0 {
        log::warn!("Capture ends with {trailing_bytes} bytes of an incomplete sample");
    }

    Ok(InputInfo {
        path: path.display().to_string(),
        bytes,
        samples,
        trailing_bytes,
        duration: samplerate.and_then(|r| duration_string(samples, r)),
    })
}
