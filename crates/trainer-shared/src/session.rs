use chrono::{DateTime, Utc};
use secrecy::SecretString;
use trainer_time::Timestamp;

use crate::{
    id::{OrgId, UserId},
    organization::{Organization, OrganizationMembership, Role, UserOrganization},
};

/// Proof of authenticated identity as issued by the auth service
///
/// Tokens are kept secret so they never show up in logs
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: Timestamp,
    pub user: User,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile fields stored alongside the user by the auth service
#[derive(Debug, Default, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UserMetadata {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<OrganizationSummary>,
}

/// Organization details the backend embeds in the user's metadata once they
/// are a member
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct OrganizationSummary {
    pub id: OrgId,
    pub name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

impl User {
    /// First name if known, otherwise the email, otherwise the id
    pub fn display_name(&self) -> String {
        let metadata = &self.user_metadata;
        if let Some(first) = metadata.first_name.as_deref().filter(|s| !s.is_empty()) {
            return first.to_string();
        }
        self.email()
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.user_metadata.email.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Up to two upper case letters for the avatar
    pub fn initials(&self) -> String {
        let metadata = &self.user_metadata;
        let first_letter = |s: Option<&str>| {
            s.and_then(|s| s.chars().next())
                .and_then(|c| c.to_uppercase().next())
        };
        let initials: String = [
            first_letter(metadata.first_name.as_deref()),
            first_letter(metadata.last_name.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect();
        if initials.is_empty() {
            first_letter(self.email()).map(String::from).unwrap_or_default()
        } else {
            initials
        }
    }

    /// Builds the current organization out of the metadata summary if the
    /// backend embedded one
    pub fn organization_from_metadata(&self) -> Option<UserOrganization> {
        let summary = self.user_metadata.organization.as_ref()?;
        Some(UserOrganization {
            organization: Organization {
                id: summary.id,
                name: summary.name.clone(),
                created_by: self.id,
                created_at: summary.joined_at,
            },
            member: OrganizationMembership {
                org_id: summary.id,
                user_id: self.id,
                role: summary.role,
                joined_at: summary.joined_at,
            },
        })
    }
}
