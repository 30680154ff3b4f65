//! Typed domain objects decoded from the Workplace API

use serde::{Deserialize, Deserializer};

pub mod auth;
pub mod device;
pub mod profile;

pub use auth::TokenResponse;
pub use device::{
    Attributes, CommandResult, Device, DeviceState, DeviceStatus, DeviceType, Firmware, Located,
    NextFirmware,
};
pub use profile::{
    Invitation, InvitationStatus, Membership, MembershipRole, MembershipStatus, Organization,
    OrganizationRef, Profile,
};

/// Read an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
