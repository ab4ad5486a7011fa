use anyhow::{Context, Result};
use pingboard_core::DEVICE_NAME;

/// Pingboard USB identifiers (PJRC shared VID, Teensy MIDI PID).
const PINGBOARD_VID: u16 = 0x16C0;
const PINGBOARD_PID: u16 = 0x0485;

/// A matching device on the bus.
pub struct Found {
    pub bus: u8,
    pub address: u8,
    /// Product string, when the device could be opened to read it.
    pub product: Option<String>,
}

/// How sure we are that a matching device is a Pingboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Pingboard,
    /// The product string could not be read.
    Possible,
    Other,
}

impl Found {
    /// Other Teensy MIDI devices share the IDs; only the product string tells them apart.
    pub fn identity(&self) -> Identity {
        match self.product.as_deref() {
            Some(DEVICE_NAME) => Identity::Pingboard,
            Some(_) => Identity::Other,
            None => Identity::Possible,
        }
    }
}

/// List attached devices with the Pingboard VID/PID.
pub fn scan() -> Result<Vec<Found>> {
    let devices = rusb::devices().context("failed to enumerate USB devices")?;
    let mut found = Vec::new();

    for device in devices.iter() {
        let desc = device
            .device_descriptor()
            .context("failed to read device descriptor")?;
        if desc.vendor_id() != PINGBOARD_VID || desc.product_id() != PINGBOARD_PID {
            continue;
        }

        let product = match device.open() {
            Ok(handle) => handle.read_product_string_ascii(&desc).ok(),
            Err(err) => {
                log::debug!(
                    "cannot open {:03}:{:03} to read its name: {}",
                    device.bus_number(),
                    device.address(),
                    err
                );
                None
            }
        };

        found.push(Found {
            bus: device.bus_number(),
            address: device.address(),
            product,
        });
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(product: Option<&str>) -> Found {
        Found {
            bus: 1,
            address: 4,
            product: product.map(String::from),
        }
    }

    #[test]
    fn product_string_decides() {
        assert_eq!(found(Some("Pingboard")).identity(), Identity::Pingboard);
        assert_eq!(found(Some("Teensy MIDI")).identity(), Identity::Other);
    }

    #[test]
    fn unreadable_name_is_only_possible() {
        assert_eq!(found(None).identity(), Identity::Possible);
    }
}
