//! Host-facing records built from declarative property tables
//!
//! Every output group is a static slice of [`Property`] entries; rendering
//! iterates the table and substitutes [`NOT_AVAILABLE`] for anything the
//! extractor could not produce, so a group is never silently omitted.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Device, Located, Organization, Profile};

/// Sentinel for values that could not be obtained
pub const NOT_AVAILABLE: &str = "N/A";

/// Output timestamp layout, e.g. `Oct 23, 2024, 8:00 AM`
const TIMESTAMP_FORMAT: &str = "%b %-d, %Y, %-I:%M %p";

/// Separator between a group name and a property name
const GROUP_SEPARATOR: char = '#';

/// One `{outputKey, extractor}` entry
pub struct Property<T> {
    pub name: &'static str,
    pub extract: fn(&T) -> Option<String>,
}

/// A table of properties rendered under a common group prefix
pub struct PropertyGroup<T: 'static> {
    /// Prefix including the separator, empty for ungrouped properties
    pub prefix: &'static str,
    pub properties: &'static [Property<T>],
}

impl<T: 'static> PropertyGroup<T> {
    /// Render every property of the group into `out`
    pub fn render_into(&self, source: Option<&T>, out: &mut BTreeMap<String, String>) {
        for property in self.properties {
            let value = source
                .and_then(|s| (property.extract)(s))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            out.insert(format!("{}{}", self.prefix, property.name), value);
        }
    }
}

// -- Account statistics -------------------------------------------------------

pub const PROFILE_GROUP: PropertyGroup<Profile> = PropertyGroup {
    prefix: "Profile#",
    properties: &[
        Property { name: "ID", extract: |p| Some(p.id.clone()) },
        Property { name: "Name", extract: |p| p.name.clone() },
        Property { name: "Email", extract: |p| p.email.clone() },
        Property { name: "IsSuperAdmin", extract: |p| p.super_admin.map(|b| b.to_string()) },
    ],
};

const ORGANIZATION_PROPERTIES: &[Property<Organization>] = &[
    Property { name: "ID", extract: |o| Some(o.id.clone()) },
    Property { name: "Name", extract: |o| o.name.clone() },
    Property { name: "UserRole", extract: |o| Some(o.membership_role.to_string()) },
    Property { name: "MembershipStatus", extract: |o| Some(o.membership_status.to_string()) },
    Property { name: "InvitationStatus", extract: |o| Some(o.invitation_status.to_string()) },
];

/// Inputs of one statistics snapshot
#[derive(Debug, Clone, Copy)]
pub struct StatisticsSource<'a> {
    pub adapter_uptime: Duration,
    pub last_cycle_duration: Option<Duration>,
    /// `None` when the profile could not be fetched this cycle
    pub profile: Option<&'a Profile>,
    pub organizations: &'a IndexMap<String, Organization>,
    /// Device count per organization id; absent when the fetch failed
    pub device_counts: &'a IndexMap<String, usize>,
    pub monitored_devices: usize,
}

/// Account-level snapshot returned by `get_statistics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub properties: BTreeMap<String, String>,
}

impl Statistics {
    /// Render a snapshot
    #[must_use]
    pub fn render(source: &StatisticsSource<'_>) -> Self {
        let mut properties = BTreeMap::new();

        properties.insert("AdapterVersion".into(), env!("CARGO_PKG_VERSION").into());
        properties.insert(
            "AdapterUptime(min)".into(),
            (source.adapter_uptime.as_secs() / 60).to_string(),
        );
        properties.insert(
            "LastMonitoringCycleDuration(ms)".into(),
            source
                .last_cycle_duration
                .map_or_else(|| NOT_AVAILABLE.to_string(), |d| d.as_millis().to_string()),
        );
        properties.insert(
            "MonitoredDevicesTotal".into(),
            source.monitored_devices.to_string(),
        );
        properties.insert(
            "OrganizationsTotal".into(),
            source.organizations.len().to_string(),
        );

        PROFILE_GROUP.render_into(source.profile, &mut properties);

        let mut labels = HashSet::new();
        for organization in source.organizations.values() {
            let mut label = organization.label().to_string();
            if !labels.insert(label.clone()) {
                label = format!("{label}_{}", organization.id);
                labels.insert(label.clone());
            }
            let prefix = format!("Organization_{label}{GROUP_SEPARATOR}");
            for property in ORGANIZATION_PROPERTIES {
                let value = (property.extract)(organization)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                properties.insert(format!("{prefix}{}", property.name), value);
            }

            let count = source
                .device_counts
                .get(&organization.id)
                .map_or_else(|| NOT_AVAILABLE.to_string(), ToString::to_string);
            properties.insert(format!("{prefix}DeviceCount"), count);
        }

        Self { properties }
    }

    /// Value of one key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

// -- Device records -----------------------------------------------------------

const OVERVIEW_GROUP: PropertyGroup<Device> = PropertyGroup {
    prefix: "",
    properties: &[
        Property { name: "Model", extract: |d| d.model().map(str::to_owned) },
        Property { name: "Type", extract: |d| d.device_type.as_ref().and_then(|t| t.name.clone()) },
        Property { name: "State", extract: |d| Some(d.state.to_string()) },
        Property { name: "SerialNumber", extract: |d| d.serial.clone() },
        Property { name: "OrganizationID", extract: |d| Some(d.org_id.clone()) },
        Property { name: "OrganizationName", extract: |d| d.org_name.clone() },
    ],
};

const FIRMWARE_GROUP: PropertyGroup<Device> = PropertyGroup {
    prefix: "Firmware#",
    properties: &[
        Property { name: "AssignedFirmware", extract: |d| version(d.assigned_firmware.as_ref()) },
        Property { name: "CurrentFirmware", extract: |d| d.current_firmware().map(str::to_owned) },
        Property { name: "LatestFirmware", extract: |d| version(d.latest_firmware.as_ref()) },
        Property { name: "NextFirmware", extract: |d| version(d.next_firmware.as_ref()) },
    ],
};

const STATUS_GROUP: PropertyGroup<Device> = PropertyGroup {
    prefix: "Status#",
    properties: &[
        Property {
            name: "CPUUtilization(%)",
            extract: |d| d.status.as_ref().and_then(|s| scalar(s.cpu_utilization.as_ref())),
        },
        Property {
            name: "Temperature(C)",
            extract: |d| d.status.as_ref().and_then(|s| s.temperature).map(|t| t.to_string()),
        },
        Property {
            name: "PresenceDetected",
            extract: |d| d.status.as_ref().and_then(|s| scalar(s.presence.as_ref())),
        },
        Property {
            name: "Uptime(s)",
            extract: |d| d.status.as_ref().and_then(|s| scalar(s.uptime.as_ref())),
        },
        Property {
            name: "Timestamp(UTC)",
            extract: |d| {
                d.status
                    .as_ref()
                    .and_then(|s| s.timestamp.as_deref())
                    .map(format_timestamp)
            },
        },
    ],
};

const WORKPLACE_GROUP: PropertyGroup<Device> = PropertyGroup {
    prefix: "Workplace#",
    properties: &[
        Property { name: "LocationID", extract: |d| located_id(d.place.as_ref()) },
        Property { name: "LocationName", extract: |d| located_name(d.place.as_ref()) },
        Property { name: "DeskID", extract: |d| located_id(d.desk.as_ref()) },
        Property { name: "DeskName", extract: |d| located_name(d.desk.as_ref()) },
        Property { name: "RoomID", extract: |d| located_id(d.room.as_ref()) },
        Property { name: "RoomName", extract: |d| located_name(d.room.as_ref()) },
    ],
};

const DEVICE_GROUPS: &[PropertyGroup<Device>] =
    &[OVERVIEW_GROUP, FIRMWARE_GROUP, STATUS_GROUP, WORKPLACE_GROUP];

/// Per-device record returned by `get_aggregated_devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedDevice {
    pub device_id: String,
    pub device_name: String,
    pub device_model: String,
    pub device_online: bool,
    pub properties: BTreeMap<String, String>,
    pub dynamic_statistics: BTreeMap<String, String>,
}

impl AggregatedDevice {
    /// Render a cached device
    ///
    /// Properties named in `historical` (bare or group-qualified) move into
    /// `dynamic_statistics` when their value is numeric.
    #[must_use]
    pub fn render(device: &Device, historical: &[String]) -> Self {
        let mut properties = BTreeMap::new();
        for group in DEVICE_GROUPS {
            group.render_into(Some(device), &mut properties);
        }

        let mut dynamic_statistics = BTreeMap::new();
        properties.retain(|key, value| {
            if is_historical(key, historical) && value.parse::<f64>().is_ok() {
                dynamic_statistics.insert(key.clone(), value.clone());
                return false;
            }
            true
        });

        Self {
            device_id: device.id.clone(),
            device_name: device.display_name(),
            device_model: device.model().unwrap_or(NOT_AVAILABLE).to_string(),
            device_online: device.state.is_online(),
            properties,
            dynamic_statistics,
        }
    }
}

fn is_historical(key: &str, historical: &[String]) -> bool {
    let bare = key
        .rsplit_once(GROUP_SEPARATOR)
        .map_or(key, |(_, name)| name);
    historical.iter().any(|h| h == key || h == bare)
}

fn version(firmware: Option<&crate::models::Firmware>) -> Option<String> {
    firmware.and_then(|f| f.version.clone())
}

fn located_id(located: Option<&Located>) -> Option<String> {
    located.map(|l| l.id.clone())
}

fn located_name(located: Option<&Located>) -> Option<String> {
    located.and_then(|l| l.name.clone())
}

/// Render a JSON scalar; `null`, arrays and objects are unavailable
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s != "null" => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reformat an RFC 3339 timestamp; unparseable input is passed through
fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |ts| ts.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string(),
    )
}
