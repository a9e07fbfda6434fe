mod device;
mod device_state;

pub use device::{Device, DeviceParseError};
pub use device_state::{DeviceError, DevicePlacement, DeviceState};
