use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::cli::command::CaptureArgs;
use logicplot::structs::channel::Channel;
use logicplot::structs::device::{Device, FixedRateDriver};
use logicplot::utils::units::parse_samplerate;

const DEFAULT_DRIVER: &str = "file";

/// Description of a recorded capture: which probes it has and how fast it
/// was sampled.
///
/// ```yaml
/// driver: fx2lafw
/// samplerate: 24 MHz
/// channels:
///   - name: CLK
///   - name: CS
///     enabled: false
///   - name: MOSI
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samplerate: Option<SampleRate>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleRate {
    Hz(u64),
    Text(String),
}

impl SampleRate {
    pub fn to_hz(&self) -> Result<u64> {
        match self {
            SampleRate::Hz(0) => bail!("Sample rate must not be zero"),
            SampleRate::Hz(hz) => Ok(*hz),
            SampleRate::Text(text) => {
                parse_samplerate(text).ok_or_else(|| anyhow!("Invalid sample rate: {text:?}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl CaptureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture description {}", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("Invalid capture description {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Loads `--config` if given, then applies `--channels` and
    /// `--samplerate` on top.
    pub fn from_args(args: &CaptureArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                log::debug!("Loading capture description from {}", path.display());
                Self::load(path)?
            }
            None => Self::default(),
        };

        if let Some(names) = &args.channels {
            config.channels = names
                .iter()
                .map(|name| ChannelConfig {
                    name: name.trim().to_string(),
                    enabled: true,
                })
                .collect();
        }

        if let Some(rate) = &args.samplerate {
            config.samplerate = Some(SampleRate::Text(rate.clone()));
        }

        if config.channels.is_empty() {
            bail!("No channels given; use --channels or a --config file with a channel list");
        }

        Ok(config)
    }

    pub fn samplerate_hz(&self) -> Result<Option<u64>> {
        self.samplerate.as_ref().map(SampleRate::to_hz).transpose()
    }

    pub fn to_device(&self) -> Result<Device> {
        if let Some(empty) = self.channels.iter().position(|c| c.name.is_empty()) {
            bail!("Channel {empty} has an empty name");
        }

        let driver = FixedRateDriver::new(
            self.driver.as_deref().unwrap_or(DEFAULT_DRIVER),
            self.samplerate_hz()?,
        );
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, c)| Channel::new(i, c.name.as_str(), c.enabled))
            .collect();

        Ok(Device::new(channels, Arc::new(driver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "
driver: fx2lafw
samplerate: 24 MHz
channels:
  - name: CLK
  - name: CS
    enabled: false
  - name: MOSI
";

    #[test]
    fn parse_description() -> Result<()> {
        let config = CaptureConfig::from_yaml(YAML)?;
        assert_eq!(config.driver.as_deref(), Some("fx2lafw"));
        assert_eq!(config.samplerate_hz()?, Some(24_000_000));
        assert_eq!(config.channels.len(), 3);
        assert!(!config.channels[1].enabled);

        let device = config.to_device()?;
        assert_eq!(device.samplerate(), Some(24_000_000));
        assert_eq!(device.channels[2], Channel::new(2, "MOSI", true));
        Ok(())
    }

    #[test]
    fn integer_rates_and_missing_rates() -> Result<()> {
        let config = CaptureConfig::from_yaml("samplerate: 48000\nchannels: [{name: A}]")?;
        assert_eq!(config.samplerate, Some(SampleRate::Hz(48_000)));
        assert_eq!(config.samplerate_hz()?, Some(48_000));

        let config = CaptureConfig::from_yaml("channels: [{name: A}]")?;
        assert_eq!(config.samplerate_hz()?, None);
        assert_eq!(config.to_device()?.samplerate(), None);
        Ok(())
    }

    #[test]
    fn bad_rates_are_rejected() -> Result<()> {
        let config = CaptureConfig::from_yaml("samplerate: fast\nchannels: [{name: A}]")?;
        assert!(config.samplerate_hz().is_err());
        let config = CaptureConfig::from_yaml("samplerate: 0\nchannels: [{name: A}]")?;
        assert!(config.to_device().is_err());
        assert!(CaptureConfig::from_yaml("channels: [{name: A, colour: red}]").is_err());
        Ok(())
    }

    #[test]
    fn flags_override_config() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("logicplotd-capture-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let path = dir.join("capture.yaml");
        fs::write(&path, YAML)?;

        let args = CaptureArgs {
            config: Some(path.clone()),
            channels: None,
            samplerate: Some("1MHz".to_string()),
        };
        let config = CaptureConfig::from_args(&args)?;
        assert_eq!(config.samplerate_hz()?, Some(1_000_000));
        assert_eq!(config.channels.len(), 3);

        let args = CaptureArgs {
            config: Some(path),
            channels: Some(vec!["A".to_string(), " B".to_string()]),
            samplerate: None,
        };
        let config = CaptureConfig::from_args(&args)?;
        assert_eq!(config.samplerate_hz()?, Some(24_000_000));
        let names: Vec<&str> = config.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn channels_are_required() {
        let args = CaptureArgs {
            config: None,
            channels: None,
            samplerate: Some("1MHz".to_string()),
        };
        assert!(CaptureConfig::from_args(&args).is_err());
    }
}
