#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Failed to allocate {0} bytes for the output buffer")]
    AllocationFailure(usize),

    #[error("Failed to format {what} string for samplerate {samplerate}")]
    Format {
        what: &'static str,
        samplerate: u64,
    },

    #[error("Output session has already been finalized")]
    InvalidState,

    #[error("{count} enabled channels exceed the supported maximum of {max}")]
    ChannelLimitExceeded { count: usize, max: usize },

    #[error("Dropping {trailing} trailing bytes that do not form a complete {unit_size}-byte sample")]
    PartialSample { trailing: usize, unit_size: usize },

    #[error("Failed to read packed sample: {0}")]
    SampleRead(#[from] std::io::Error),

    #[error("Failed to write output row: {0}")]
    Fmt(#[from] std::fmt::Error),
}
