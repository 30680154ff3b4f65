//! Authenticated user profile and organization memberships

use std::fmt;

use serde::Deserialize;

use super::null_as_default;
use crate::properties::NOT_AVAILABLE;

/// Role of the authenticated user inside an organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    Unspecified,
    Owner,
    OrgAdmin,
    DeskAdmin,
    User,
    #[default]
    #[serde(other)]
    NotAvailable,
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unspecified => "Unspecified",
            Self::Owner => "Owner",
            Self::OrgAdmin => "OrgAdmin",
            Self::DeskAdmin => "DeskAdmin",
            Self::User => "User",
            Self::NotAvailable => NOT_AVAILABLE,
        })
    }
}

/// Membership lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Requested,
    Invited,
    Active,
    Deactivated,
    #[default]
    #[serde(other)]
    NotAvailable,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "Requested",
            Self::Invited => "Invited",
            Self::Active => "Active",
            Self::Deactivated => "Deactivated",
            Self::NotAvailable => NOT_AVAILABLE,
        })
    }
}

/// Status of an invitation into an organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Expired,
    Declined,
    Accepted,
    #[default]
    #[serde(other)]
    NotAvailable,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "Pending",
            Self::Expired => "Expired",
            Self::Declined => "Declined",
            Self::Accepted => "Accepted",
            Self::NotAvailable => NOT_AVAILABLE,
        })
    }
}

/// Profile of the identity the session was issued to
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub super_admin: Option<bool>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub invitations: Vec<Invitation>,
}

/// Membership of the profile in one organization
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub org_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: MembershipRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: MembershipStatus,
    #[serde(default)]
    pub organization: Option<OrganizationRef>,
}

/// Organization summary embedded in a membership
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Invitation addressed to the profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub org_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: InvitationStatus,
}

/// Organization the authenticated identity belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: String,
    pub name: Option<String>,
    pub membership_role: MembershipRole,
    pub membership_status: MembershipStatus,
    pub invitation_status: InvitationStatus,
}

impl Organization {
    /// Name used to group this organization's statistics
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

impl Profile {
    /// One organization per membership, keyed by organization id
    #[must_use]
    pub fn organizations(&self) -> Vec<Organization> {
        let mut organizations: Vec<Organization> = Vec::with_capacity(self.memberships.len());

        for membership in &self.memberships {
            if organizations.iter().any(|o| o.id == membership.org_id) {
                continue;
            }

            let invitation_status = self
                .invitations
                .iter()
                .find(|i| i.org_id == membership.org_id)
                .map_or(InvitationStatus::NotAvailable, |i| i.status);

            organizations.push(Organization {
                id: membership.org_id.clone(),
                name: membership.organization.as_ref().and_then(|o| o.name.clone()),
                membership_role: membership.role,
                membership_status: membership.status,
                invitation_status,
            });
        }

        organizations
    }
}
