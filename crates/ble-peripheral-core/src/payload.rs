//! Advertise settings, advertisement payload and GATT service descriptions
//!
//! These are the native-agnostic equivalents of the builders a platform
//! Bluetooth stack exposes. The stack turns them into its own objects and
//! produces the actual advertisement packet.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::AdvertiseConfig;
use crate::encoding::encode_bytes;
use crate::error::Result;

/// Maximum legacy advertising data length in bytes
pub const MAX_ADVERTISEMENT_LEN: usize = 31;

/// Lower 96 bits of the Bluetooth base UUID (0000xxxx-0000-1000-8000-00805F9B34FB)
const BASE_UUID_LOW_BITS: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;
const LOW_96_MASK: u128 = (1u128 << 96) - 1;

// ----------------------------------------------------------------------------
// Advertise Settings
// ----------------------------------------------------------------------------

/// Advertising interval policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    LowLatency,
}

/// Settings applied to an advertising session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvertiseSettings {
    pub mode: AdvertiseMode,
    /// Zero advertises until explicitly stopped
    pub timeout: Duration,
    pub connectable: bool,
}

impl AdvertiseSettings {
    /// Whether the session runs until stopped
    pub fn is_indefinite(&self) -> bool {
        self.timeout.is_zero()
    }
}

impl Default for AdvertiseSettings {
    /// Balanced mode, no timeout. Not configurable yet.
    fn default() -> Self {
        Self {
            mode: AdvertiseMode::Balanced,
            timeout: Duration::ZERO,
            connectable: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Advertisement Payload
// ----------------------------------------------------------------------------

/// Advertisement content handed to the native stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvertisePayload {
    pub service_uuids: Vec<Uuid>,
    pub service_data: BTreeMap<Uuid, Vec<u8>>,
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    pub include_device_name: Option<bool>,
    pub include_tx_power_level: Option<bool>,
}

impl AdvertisePayload {
    pub fn builder() -> AdvertisePayloadBuilder {
        AdvertisePayloadBuilder::default()
    }

    /// Build the payload for an advertise configuration
    ///
    /// Service data is attached only when a service data UUID is given and
    /// manufacturer data only when a manufacturer id is given; missing bytes
    /// attach an empty buffer.
    pub fn from_config(config: &AdvertiseConfig) -> Result<Self> {
        let mut builder = Self::builder().add_service_uuid(config.uuid);

        match config.service_data_uuid {
            Some(uuid) => {
                let data = encode_bytes(config.service_data.as_deref().unwrap_or_default())?;
                builder = builder.add_service_data(uuid, data);
            }
            None if config.service_data.is_some() => {
                debug!("Service data given without a service data UUID, not attached");
            }
            None => {}
        }

        if let Some(manufacturer_id) = config.manufacturer_id {
            let data = encode_bytes(config.manufacturer_data.as_deref().unwrap_or_default())?;
            builder = builder.add_manufacturer_data(manufacturer_id, data);
        }
        if let Some(include) = config.include_device_name {
            builder = builder.set_include_device_name(include);
        }
        if let Some(include) = config.transmission_power_included {
            builder = builder.set_include_tx_power_level(include);
        }

        Ok(builder.build())
    }

    /// Estimated legacy advertising data length for the given device name
    ///
    /// Counts the flags field, the service UUID lists, service data,
    /// manufacturer data, TX power and the complete local name.
    pub fn estimated_len(&self, device_name: &str) -> usize {
        // Flags are always present for connectable advertising
        let mut len = 3;

        let mut uuid_groups: BTreeMap<usize, usize> = BTreeMap::new();
        for uuid in &self.service_uuids {
            *uuid_groups.entry(uuid_len(uuid)).or_default() += 1;
        }
        for (size, count) in uuid_groups {
            len += 2 + size * count;
        }

        for (uuid, data) in &self.service_data {
            len += 2 + uuid_len(uuid) + data.len();
        }
        for data in self.manufacturer_data.values() {
            len += 2 + 2 + data.len();
        }
        if self.include_tx_power_level == Some(true) {
            len += 3;
        }
        if self.include_device_name == Some(true) {
            len += 2 + device_name.len();
        }
        len
    }
}

/// Shortest on-air size for a UUID, 2 or 4 bytes for Bluetooth base UUIDs
fn uuid_len(uuid: &Uuid) -> usize {
    let value = uuid.as_u128();
    if value & LOW_96_MASK != BASE_UUID_LOW_BITS {
        16
    } else if value >> 96 <= 0xFFFF {
        2
    } else {
        4
    }
}

/// Builder mirroring the native advertise data builders
#[derive(Debug, Default)]
pub struct AdvertisePayloadBuilder {
    payload: AdvertisePayload,
}

impl AdvertisePayloadBuilder {
    pub fn add_service_uuid(mut self, uuid: Uuid) -> Self {
        if !self.payload.service_uuids.contains(&uuid) {
            self.payload.service_uuids.push(uuid);
        }
        self
    }

    pub fn add_service_data(mut self, uuid: Uuid, data: Vec<u8>) -> Self {
        self.payload.service_data.insert(uuid, data);
        self
    }

    pub fn add_manufacturer_data(mut self, manufacturer_id: u16, data: Vec<u8>) -> Self {
        self.payload.manufacturer_data.insert(manufacturer_id, data);
        self
    }

    pub fn set_include_device_name(mut self, include: bool) -> Self {
        self.payload.include_device_name = Some(include);
        self
    }

    pub fn set_include_tx_power_level(mut self, include: bool) -> Self {
        self.payload.include_tx_power_level = Some(include);
        self
    }

    pub fn build(self) -> AdvertisePayload {
        self.payload
    }
}

// ----------------------------------------------------------------------------
// GATT Service
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceType {
    Primary,
    Secondary,
}

/// A GATT service registered on the native GATT server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GattService {
    pub uuid: Uuid,
    pub service_type: ServiceType,
}

impl GattService {
    pub fn primary(uuid: Uuid) -> Self {
        Self {
            uuid,
            service_type: ServiceType::Primary,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.service_type == ServiceType::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PeripheralError;
    use proptest::prelude::*;

    fn heart_rate() -> Uuid {
        Uuid::parse_str("0000180d-0000-1000-8000-00805f9b34fb").unwrap()
    }

    fn custom() -> Uuid {
        Uuid::parse_str("6e400001-b5a3-f393-e0a9-e50e24dcca9e").unwrap()
    }

    #[test]
    fn test_default_settings_policy() {
        let settings = AdvertiseSettings::default();
        assert_eq!(settings.mode, AdvertiseMode::Balanced);
        assert!(settings.is_indefinite());
        assert!(settings.connectable);
    }

    #[test]
    fn test_minimal_config_sets_only_service_uuid() {
        let config = AdvertiseConfig::with_uuid(heart_rate());
        let payload = AdvertisePayload::from_config(&config).unwrap();

        assert_eq!(payload.service_uuids, vec![heart_rate()]);
        assert!(payload.service_data.is_empty());
        assert!(payload.manufacturer_data.is_empty());
        assert!(payload.include_device_name.is_none());
        assert!(payload.include_tx_power_level.is_none());
    }

    #[test]
    fn test_full_config_attaches_everything() {
        let config = AdvertiseConfig::with_uuid(heart_rate())
            .with_service_data(custom(), vec![1, 2, 3])
            .with_manufacturer_data(0x004C, vec![10, 255, 0])
            .with_include_device_name(false)
            .with_transmission_power_included(true);
        let payload = AdvertisePayload::from_config(&config).unwrap();

        assert_eq!(payload.service_data.get(&custom()), Some(&vec![1, 2, 3]));
        assert_eq!(payload.manufacturer_data.get(&0x004C), Some(&vec![10, 255, 0]));
        assert_eq!(payload.include_device_name, Some(false));
        assert_eq!(payload.include_tx_power_level, Some(true));
    }

    #[test]
    fn test_data_without_key_is_not_attached() {
        let mut config = AdvertiseConfig::with_uuid(heart_rate());
        config.service_data = Some(vec![1, 2]);
        config.manufacturer_data = Some(vec![3, 4]);
        let payload = AdvertisePayload::from_config(&config).unwrap();

        assert!(payload.service_data.is_empty());
        assert!(payload.manufacturer_data.is_empty());
    }

    #[test]
    fn test_key_without_data_attaches_empty_buffer() {
        let mut config = AdvertiseConfig::with_uuid(heart_rate());
        config.manufacturer_id = Some(0xFFFF);
        let payload = AdvertisePayload::from_config(&config).unwrap();
        assert_eq!(payload.manufacturer_data.get(&0xFFFF), Some(&Vec::new()));
    }

    #[test]
    fn test_out_of_range_byte_fails() {
        let config =
            AdvertiseConfig::with_uuid(heart_rate()).with_manufacturer_data(1, vec![0, 300]);
        assert!(matches!(
            AdvertisePayload::from_config(&config),
            Err(PeripheralError::ByteOutOfRange { index: 1, value: 300 })
        ));
    }

    #[test]
    fn test_estimated_len() {
        let payload = AdvertisePayload::builder()
            .add_service_uuid(heart_rate())
            .build();
        // flags + 16-bit uuid list
        assert_eq!(payload.estimated_len("ignored"), 3 + 4);

        let payload = AdvertisePayload::builder()
            .add_service_uuid(custom())
            .add_manufacturer_data(0x004C, vec![0; 8])
            .set_include_device_name(true)
            .build();
        assert_eq!(payload.estimated_len("abc"), 3 + 18 + 12 + 5);
    }

    #[test]
    fn test_gatt_service_primary() {
        let service = GattService::primary(heart_rate());
        assert!(service.is_primary());
    }

    proptest! {
        #[test]
        fn unset_optionals_never_reach_payload(
            include_name in proptest::option::of(any::<bool>()),
            include_tx in proptest::option::of(any::<bool>()),
            manufacturer in proptest::option::of(any::<u16>()),
        ) {
            let mut config = AdvertiseConfig::with_uuid(heart_rate());
            config.include_device_name = include_name;
            config.transmission_power_included = include_tx;
            config.manufacturer_id = manufacturer;

            let payload = AdvertisePayload::from_config(&config).unwrap();
            prop_assert_eq!(payload.include_device_name, include_name);
            prop_assert_eq!(payload.include_tx_power_level, include_tx);
            prop_assert_eq!(payload.manufacturer_data.is_empty(), manufacturer.is_none());
            prop_assert!(payload.service_data.is_empty());
        }
    }
}
