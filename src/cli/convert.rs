use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, ConvertArgs, generator};
use super::progress::{create_progress_bar, finish_progress_bar};
use crate::capture::CaptureConfig;
use crate::input::InputReader;
use logicplot::process::gnuplot::GnuplotOutput;
use logicplot::process::{Event, OutputModule, OutputOptions};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStats {
    pub chunks: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

pub fn cmd_convert(args: &ConvertArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    if args.chunk_samples == 0 {
        bail!("--chunk-samples must be at least 1");
    }

    let capture = CaptureConfig::from_args(&args.capture)?;
    let device = capture.to_device()?;
    let options = OutputOptions {
        generator: generator(),
        timestamp: None,
        fail_level: cli.fail_level(),
    };

    let mut output = <GnuplotOutput as OutputModule>::open(Some(&device), &options)?;
    let unit_size = output
        .unit_size()
        .ok_or_else(|| anyhow!("Output session closed before conversion"))?;
    let chunk_bytes = args
        .chunk_samples
        .checked_mul(unit_size)
        .ok_or_else(|| anyhow!("--chunk-samples {} is too large", args.chunk_samples))?;

    log::info!(
        "Converting {} to {} ({} output, {} channels, {unit_size} bytes per sample, strict mode: {})",
        args.input.display(),
        args.output.display(),
        GnuplotOutput::DESCRIPTION,
        output.enabled_channels().map_or(0, <[String]>::len),
        cli.strict,
    );

    let mut input = InputReader::new(&args.input)?;
    if input.is_pipe() {
        log::debug!("Reading samples from stdin, progress will not show a total");
    }
    let mut writer = create_writer(&args.output)?;

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, input.total_bytes())?),
        None => None,
    };

    let start_time = std::time::Instant::now();
    let result = convert_stream(&mut output, &mut input, &mut writer, chunk_bytes, &pb);
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            if let Some(pb) = pb {
                pb.finish_with_message("conversion failed");
            }
            return Err(e);
        }
    };
    writer.flush()?;

    let samples = stats.bytes_read / unit_size as u64;
    finish_progress_bar(&pb, samples, stats.chunks);
    log::info!(
        "Converted {samples} samples in {} chunks ({} bytes in, {} bytes out) in {:.3}s",
        stats.chunks,
        stats.bytes_read,
        stats.bytes_written,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Streams `input` through an output module into `writer`, then ends the
/// session.
///
/// The module is fed at least once so that an empty capture still produces
/// a header.
pub fn convert_stream<M: OutputModule, W: Write>(
    output: &mut M,
    input: &mut InputReader,
    writer: &mut W,
    chunk_bytes: usize,
    pb: &Option<ProgressBar>,
) -> Result<ConvertStats> {
    let mut stats = ConvertStats::default();

    input.process_chunks(chunk_bytes, |chunk| {
        let text = output
            .data(chunk)
            .with_context(|| format!("Conversion failed at input offset {}", stats.bytes_read))?;
        writer.write_all(text.as_bytes())?;

        stats.chunks += 1;
        stats.bytes_read += chunk.len() as u64;
        stats.bytes_written += text.len() as u64;
        if let Some(pb) = pb {
            pb.set_position(stats.bytes_read);
        }
        Ok(true)
    })?;

    if stats.chunks == 0 {
        log::warn!("Input is empty, writing header only");
        let text = output.data(&[])?;
        writer.write_all(text.as_bytes())?;
        stats.bytes_written += text.len() as u64;
    }

    let trailer = output.event(Event::End);
    writer.write_all(&trailer)?;
    stats.bytes_written += trailer.len() as u64;

    Ok(stats)
}

fn create_writer(path: &Path) -> Result<Box<dyn Write>> {
    if path.to_string_lossy() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}
