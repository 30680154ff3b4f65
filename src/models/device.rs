//! Devices registered in a Workplace organization

use std::fmt;

use serde::Deserialize;

use super::null_as_default;
use crate::properties::NOT_AVAILABLE;

/// Provisioning/connectivity state of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Unprovisioned,
    Provisioned,
    Online,
    Offline,
    Missing,
    #[default]
    #[serde(other)]
    NotAvailable,
}

impl DeviceState {
    /// Whether the device is reachable
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unprovisioned => "Unprovisioned",
            Self::Provisioned => "Provisioned",
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::Missing => "Missing",
            Self::NotAvailable => NOT_AVAILABLE,
        })
    }
}

/// Hardware type of a device
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeviceType {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Static display attributes
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    #[serde(default)]
    pub product_model: Option<String>,
}

/// A firmware release
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Firmware {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Named entity the device is placed in (location, desk, room)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Located {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Last reported device telemetry
///
/// The API reports `uptime`, `presence` and `cpuUtilization` with varying
/// JSON types across firmware versions, so they are kept as raw values.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub temperature: Option<i64>,
    #[serde(default)]
    pub firmware: Option<String>,
    #[serde(default)]
    pub uptime: Option<serde_json::Value>,
    #[serde(default)]
    pub presence: Option<serde_json::Value>,
    #[serde(default)]
    pub cpu_utilization: Option<serde_json::Value>,
}

/// A device as returned by the device list query
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub org_id: String,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: DeviceState,
    #[serde(default)]
    pub firmware_public_key: Option<String>,
    #[serde(default)]
    pub assigned_firmware: Option<Firmware>,
    #[serde(default)]
    pub latest_firmware: Option<Firmware>,
    #[serde(default)]
    pub next_firmware: Option<Firmware>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub place: Option<Located>,
    #[serde(default)]
    pub desk: Option<Located>,
    #[serde(default)]
    pub room: Option<Located>,
}

impl Device {
    /// Firmware version the device last reported running
    #[must_use]
    pub fn current_firmware(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.firmware.as_deref())
    }

    /// Product model, falling back to the type name
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.attributes
            .as_ref()
            .and_then(|a| a.product_model.as_deref())
            .or_else(|| self.device_type.as_ref().and_then(|t| t.name.as_deref()))
    }

    /// Human readable name for host records
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.model(), self.serial.as_deref()) {
            (Some(model), Some(serial)) => format!("{model} {serial}"),
            (None, Some(serial)) => serial.to_string(),
            (Some(model), None) => format!("{model} {}", self.id),
            (None, None) => self.id.clone(),
        }
    }
}

/// Result of the next-firmware lookup; `null` when no update is scheduled
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NextFirmware(pub Option<Firmware>);

/// Result of a device control mutation
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_device_with_nested_fields() {
        let body = r#"{
            "id": "dev-1",
            "orgId": "org-1",
            "orgName": "AVI-SPL-LAB",
            "serial": "SN123",
            "type": {"id": "t-1", "name": "Evoko Naso"},
            "state": "ONLINE",
            "status": {"timestamp": "2024-10-23T08:00:00.000000Z", "temperature": 41,
                       "firmware": "2.1.0", "cpuUtilization": 12.5, "presence": true},
            "room": {"id": "r-1", "name": "Board Room"}
        }"#;
        let device: Device = serde_json::from_str(body).unwrap();

        assert_eq!(device.state, DeviceState::Online);
        assert!(device.state.is_online());
        assert_eq!(device.current_firmware(), Some("2.1.0"));
        assert_eq!(device.model(), Some("Evoko Naso"));
        assert_eq!(device.display_name(), "Evoko Naso SN123");
        assert_eq!(device.room.unwrap().name.as_deref(), Some("Board Room"));
    }

    #[test]
    fn unknown_state_is_not_available() {
        let device: Device =
            serde_json::from_str(r#"{"id":"d","orgId":"o","state":"HIBERNATING"}"#).unwrap();
        assert_eq!(device.state, DeviceState::NotAvailable);
        assert_eq!(device.display_name(), "d");
    }

    #[test]
    fn null_state_is_not_available() {
        let devices: Vec<Device> = serde_json::from_str(
            r#"[{"id":"d1","orgId":"o","state":"ONLINE"},{"id":"d2","orgId":"o","state":null}]"#,
        )
        .unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].state, DeviceState::Online);
        assert_eq!(devices[1].state, DeviceState::NotAvailable);
    }

    #[test]
    fn next_firmware_accepts_null() {
        let none: NextFirmware = serde_json::from_str("null").unwrap();
        let some: NextFirmware = serde_json::from_str(r#"{"id":"fw","version":"2.2.0"}"#).unwrap();

        assert_eq!(none, NextFirmware(None));
        assert_eq!(some.0.unwrap().version.as_deref(), Some("2.2.0"));
    }
}
