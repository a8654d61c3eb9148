use crate::utils::errors::OutputError;

/// Largest number of enabled channels a session can carry. One packed sample
/// must fit in a `u64`.
pub const MAX_CHANNELS: usize = 64;

/// One logic probe of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub index: usize,
    pub name: String,
    pub enabled: bool,
}

impl Channel {
    pub fn new(index: usize, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            index,
            name: name.into(),
            enabled,
        }
    }
}

/// Bytes needed to hold one bit per enabled channel.
pub fn unit_size(enabled_channels: usize) -> usize {
    enabled_channels.div_ceil(8)
}

/// Names of the enabled channels, in enumeration order.
///
/// Fails if more than [`MAX_CHANNELS`] are enabled.
pub fn enabled_channel_names(channels: &[Channel]) -> Result<Vec<String>, OutputError> {
    let count = channels.iter().filter(|c| c.enabled).count();
    if count > MAX_CHANNELS {
        return Err(OutputError::ChannelLimitExceeded {
            count,
            max: MAX_CHANNELS,
        });
    }

    Ok(channels
        .iter()
        .filter(|c| c.enabled)
        .map(|c| c.name.clone())
        .collect())
}
