use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceParseError {
    #[error("Unknown device \"{0}\", expected \"cpu\", \"metal\" or \"cuda[:index]\"")]
    UnknownDevice(String),
    #[error("Invalid device index in \"{0}\"")]
    InvalidIndex(String),
}

/// Compute device an array or a model is placed on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
    Metal,
}

impl Device {
    pub fn is_host(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
            Device::Metal => write!(f, "metal"),
        }
    }
}

impl FromStr for Device {
    type Err = DeviceParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.split_once(':') {
            None => match normalized.as_str() {
                "cpu" => Ok(Device::Cpu),
                "cuda" => Ok(Device::Cuda(0)),
                "metal" | "mps" => Ok(Device::Metal),
                _ => Err(DeviceParseError::UnknownDevice(value.to_string())),
            },
            Some(("cuda", index)) => index
                .parse()
                .map(Device::Cuda)
                .map_err(|_| DeviceParseError::InvalidIndex(value.to_string())),
            Some(_) => Err(DeviceParseError::UnknownDevice(value.to_string())),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = DeviceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<Device>(), Ok(Device::Cpu));
        assert_eq!("CUDA".parse::<Device>(), Ok(Device::Cuda(0)));
        assert_eq!("cuda:3".parse::<Device>(), Ok(Device::Cuda(3)));
        assert_eq!("mps".parse::<Device>(), Ok(Device::Metal));
        assert_eq!(
            "cuda:x".parse::<Device>(),
            Err(DeviceParseError::InvalidIndex("cuda:x".to_string()))
        );
        assert_eq!(
            "tpu".parse::<Device>(),
            Err(DeviceParseError::UnknownDevice("tpu".to_string()))
        );
    }

    #[test]
    fn test_device_serde() {
        let device: Device = serde_json::from_str("\"cuda:1\"").unwrap();
        assert_eq!(device, Device::Cuda(1));
        assert_eq!(serde_json::to_string(&Device::Cpu).unwrap(), "\"cpu\"");
        assert!(serde_json::from_str::<Device>("\"gpu\"").is_err());
    }
}
