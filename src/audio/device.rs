//! Audio device lookup using cpal. CaptureEngine always opens the system
//! default input device; the engine does not expose device selection as a
//! command.

use cpal::traits::{DeviceTrait, HostTrait};

/// Human-readable name for a device, for logging.
pub fn get_device_display_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".to_string())
}

/// Get the default input device for the current host.
pub fn get_default_input_device() -> Option<cpal::Device> {
    cpal::default_host().default_input_device()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_default_input_device_does_not_panic() {
        let _ = get_default_input_device();
    }
}
