use std::sync::Arc;

use super::channel::Channel;

/// Capability queries answered by an acquisition driver.
pub trait Driver {
    fn name(&self) -> &str;

    /// Current sample rate in Hz, or `None` if the driver has no samplerate
    /// capability.
    fn current_samplerate(&self) -> Option<u64>;
}

/// A driver whose configuration is known before the capture starts, e.g.
/// when replaying a recorded sample file.
#[derive(Debug, Clone)]
pub struct FixedRateDriver {
    pub name: String,
    pub samplerate: Option<u64>,
}

impl FixedRateDriver {
    pub fn new(name: impl Into<String>, samplerate: Option<u64>) -> Self {
        Self {
            name: name.into(),
            samplerate,
        }
    }
}

impl Driver for FixedRateDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_samplerate(&self) -> Option<u64> {
        self.samplerate
    }
}

/// A device instance: its probes and the driver that owns them.
#[derive(Clone)]
pub struct Device {
    pub channels: Vec<Channel>,
    pub driver: Option<Arc<dyn Driver>>,
}

impl Device {
    pub fn new(channels: Vec<Channel>, driver: Arc<dyn Driver>) -> Self {
        Self {
            channels,
            driver: Some(driver),
        }
    }

    /// Builds a device with every named channel enabled.
    pub fn with_channel_names<S: AsRef<str>>(names: &[S], driver: Arc<dyn Driver>) -> Self {
        let channels = names
            .iter()
            .enumerate()
            .map(|(i, name)| Channel::new(i, name.as_ref(), true))
            .collect();
        Self::new(channels, driver)
    }

    pub fn samplerate(&self) -> Option<u64> {
        self.driver.as_ref().and_then(|d| d.current_samplerate())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("channels", &self.channels)
            .field("driver", &self.driver.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}
