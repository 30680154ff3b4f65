//! GraphQL documents sent to the Workplace API

/// Page size for device list queries
pub const DEVICE_PAGE_LIMIT: u32 = 200;

pub const PROFILE: &str = r"query Profile {
  profile {
    id
    name
    email
    superAdmin
    memberships { id orgId role status organization { id name domain } }
    invitations { id orgId email status }
  }
}";

pub const DEVICES: &str = r"query Devices($limit: Int, $offset: Int, $filter: DeviceFilter) {
  devices(limit: $limit, offset: $offset, filter: $filter) {
    id
    orgId
    orgName
    serial
    type { id name }
    attributes { productModel }
    state
    firmwarePublicKey
    assignedFirmware { id version }
    latestFirmware { id version }
    status { timestamp temperature firmware uptime presence cpuUtilization }
    place { id name }
    desk { id name }
    room { id name }
  }
}";

pub const NEXT_FIRMWARE: &str = r"query NextFirmware($deviceId: ID!, $fwrev: String, $pubkey: String) {
  nextFirmware(deviceId: $deviceId, fwrev: $fwrev, pubkey: $pubkey) { id version }
}";

pub const REBOOT_DEVICE: &str = r"mutation RebootDevice($orgId: ID!, $deviceId: ID!) {
  rebootDevice(orgId: $orgId, deviceId: $deviceId) { success errorMessage }
}";
