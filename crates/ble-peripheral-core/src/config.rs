//! Advertise configuration sent by the application layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PeripheralError, Result};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Description of one advertising session
///
/// Optional fields that are `None` are never passed on to the native stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertiseConfig {
    /// Primary service UUID, advertised and registered as a GATT service
    pub uuid: Uuid,
    /// UUID under which `service_data` is attached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_data_uuid: Option<Uuid>,
    /// Service data as byte-valued integers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_data: Option<Vec<i32>>,
    /// 16-bit manufacturer code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<u16>,
    /// Manufacturer data as byte-valued integers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_data: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_device_name: Option<bool>,
    /// Clear previously registered GATT services before adding this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_all_services: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission_power_included: Option<bool>,
}

impl AdvertiseConfig {
    /// Create a configuration advertising only the given primary service UUID
    pub fn new(uuid: &str) -> Result<Self> {
        Ok(Self::with_uuid(Self::parse_uuid(uuid)?))
    }

    /// Create a configuration from an already parsed UUID
    pub fn with_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            service_data_uuid: None,
            service_data: None,
            manufacturer_id: None,
            manufacturer_data: None,
            include_device_name: None,
            remove_all_services: None,
            transmission_power_included: None,
        }
    }

    /// Parse a UUID string, reporting the offending value on failure
    pub fn parse_uuid(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value).map_err(|source| PeripheralError::InvalidUuid {
            value: value.to_string(),
            source,
        })
    }

    /// Attach service data under the given UUID
    pub fn with_service_data(mut self, uuid: Uuid, data: Vec<i32>) -> Self {
        self.service_data_uuid = Some(uuid);
        self.service_data = Some(data);
        self
    }

    /// Attach manufacturer specific data
    pub fn with_manufacturer_data(mut self, manufacturer_id: u16, data: Vec<i32>) -> Self {
        self.manufacturer_id = Some(manufacturer_id);
        self.manufacturer_data = Some(data);
        self
    }

    pub fn with_include_device_name(mut self, include: bool) -> Self {
        self.include_device_name = Some(include);
        self
    }

    pub fn with_remove_all_services(mut self, remove: bool) -> Self {
        self.remove_all_services = Some(remove);
        self
    }

    pub fn with_transmission_power_included(mut self, include: bool) -> Self {
        self.transmission_power_included = Some(include);
        self
    }

    /// Whether existing GATT services are cleared before registration
    pub fn clears_services(&self) -> bool {
        self.remove_all_services.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEART_RATE: &str = "0000180d-0000-1000-8000-00805f9b34fb";

    #[test]
    fn test_new_rejects_malformed_uuid() {
        let err = AdvertiseConfig::new("not-a-uuid").unwrap_err();
        match err {
            PeripheralError::InvalidUuid { value, .. } => assert_eq!(value, "not-a-uuid"),
            other => panic!("expected InvalidUuid, got {:?}", other),
        }
    }

    #[test]
    fn test_new_leaves_optionals_unset() {
        let config = AdvertiseConfig::new(HEART_RATE).unwrap();
        assert_eq!(config.uuid.to_string(), HEART_RATE);
        assert!(config.service_data_uuid.is_none());
        assert!(config.manufacturer_id.is_none());
        assert!(config.include_device_name.is_none());
        assert!(!config.clears_services());
    }

    #[test]
    fn test_deserialize_application_payload() {
        let json = r#"{
            "uuid": "0000180d-0000-1000-8000-00805f9b34fb",
            "manufacturerId": 76,
            "manufacturerData": [2, 21],
            "includeDeviceName": true
        }"#;
        let config: AdvertiseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.manufacturer_id, Some(76));
        assert_eq!(config.manufacturer_data, Some(vec![2, 21]));
        assert_eq!(config.include_device_name, Some(true));
        assert!(config.transmission_power_included.is_none());
    }

    #[test]
    fn test_deserialize_rejects_bad_uuid() {
        let json = r#"{ "uuid": "1234" }"#;
        assert!(serde_json::from_str::<AdvertiseConfig>(json).is_err());
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let config = AdvertiseConfig::new(HEART_RATE)
            .unwrap()
            .with_remove_all_services(true);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("removeAllServices"));
        assert!(!json.contains("manufacturerId"));
    }
}
