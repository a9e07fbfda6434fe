use std::ops::{Deref, DerefMut};

use thiserror::Error;

use super::Device;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device {0} is not available")]
    Unavailable(Device),
    #[error("Failed to move \"{label}\" to {device}: {reason}")]
    TransferFailed {
        label: String,
        device: Device,
        reason: String,
    },
}

/// Anything that lives on a device and can be moved between devices.
pub trait DevicePlacement {
    fn device(&self) -> Device;

    fn to_device(
        &mut self,
        device: Device,
    ) -> Result<(), DeviceError>;
}

/// Scoped placement of a value on a device.
///
/// Acquiring the state moves the value to the requested device; dropping it
/// moves the value back to where it was before, on every exit path.
pub struct DeviceState<'a, P: DevicePlacement + ?Sized> {
    target: &'a mut P,
    previous: Device,
}

impl<'a, P: DevicePlacement + ?Sized> DeviceState<'a, P> {
    pub fn acquire(
        target: &'a mut P,
        device: Device,
    ) -> Result<Self, DeviceError> {
        let previous = target.device();
        if previous != device {
            target.to_device(device)?;
        }
        Ok(Self {
            target,
            previous,
        })
    }

    pub fn previous(&self) -> Device {
        self.previous
    }
}

impl<P: DevicePlacement + ?Sized> Deref for DeviceState<'_, P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        self.target
    }
}

impl<P: DevicePlacement + ?Sized> DerefMut for DeviceState<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.target
    }
}

impl<P: DevicePlacement + ?Sized> Drop for DeviceState<'_, P> {
    fn drop(&mut self) {
        if self.target.device() == self.previous {
            return;
        }
        if let Err(error) = self.target.to_device(self.previous) {
            log::warn!("Unable to restore device {}: {}", self.previous, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Placed {
        device: Device,
        moves: Vec<Device>,
    }

    impl DevicePlacement for Placed {
        fn device(&self) -> Device {
            self.device
        }

        fn to_device(
            &mut self,
            device: Device,
        ) -> Result<(), DeviceError> {
            self.moves.push(device);
            self.device = device;
            Ok(())
        }
    }

    fn fail_inside(state: &DeviceState<'_, Placed>) -> Result<(), String> {
        assert_eq!(state.device(), Device::Cuda(0));
        Err(String::from("forward failed"))
    }

    #[test]
    fn test_device_restored_on_drop() {
        let mut placed = Placed {
            device: Device::Cpu,
            moves: Vec::new(),
        };
        {
            let state = DeviceState::acquire(&mut placed, Device::Cuda(0))
                .unwrap();
            assert_eq!(state.device(), Device::Cuda(0));
            assert_eq!(state.previous(), Device::Cpu);
        }
        assert_eq!(placed.device, Device::Cpu);
        assert_eq!(placed.moves, vec![Device::Cuda(0), Device::Cpu]);
    }

    #[test]
    fn test_device_restored_on_error() {
        let mut placed = Placed {
            device: Device::Cpu,
            moves: Vec::new(),
        };
        let result = (|| {
            let state = DeviceState::acquire(&mut placed, Device::Cuda(0))
                .map_err(|error| error.to_string())?;
            fail_inside(&state)
        })();
        assert!(result.is_err());
        assert_eq!(placed.device, Device::Cpu);
    }

    #[test]
    fn test_same_device_does_not_move() {
        let mut placed = Placed {
            device: Device::Cpu,
            moves: Vec::new(),
        };
        drop(DeviceState::acquire(&mut placed, Device::Cpu).unwrap());
        assert!(placed.moves.is_empty());
    }
}
