use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::{
    errors::ConversionError,
    id::{OrgId, UserId},
};

/// A team workspace
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

/// Link between a user and an organization
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct OrganizationMembership {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// The organization the current user belongs to together with their membership
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct UserOrganization {
    pub organization: Organization,
    pub member: OrganizationMembership,
}

/// Name for a new organization. Constrained to not be blank
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct OrgName(String);

impl OrgName {
    pub const MAX_LENGTH: usize = 100;
}

impl TryFrom<String> for OrgName {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ConversionError::Empty);
        }
        let actual = value.chars().count();
        if actual > Self::MAX_LENGTH {
            return Err(ConversionError::MaxExceeded {
                max: Self::MAX_LENGTH,
                actual,
            });
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for OrgName {
    type Error = ConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_string().try_into()
    }
}

impl From<OrgName> for String {
    fn from(value: OrgName) -> Self {
        value.0
    }
}

impl AsRef<str> for OrgName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for OrgName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty("", ConversionError::Empty)]
    #[case::whitespace(" \t ", ConversionError::Empty)]
    #[case::too_long("a".repeat(101), ConversionError::MaxExceeded { max: 100, actual: 101 })]
    fn illegal_org_name(#[case] name: String, #[case] expected: ConversionError) {
        // Act
        let actual: Result<OrgName, ConversionError> = name.try_into();

        // Assert
        assert_eq!(actual.unwrap_err(), expected);
    }

    #[test]
    fn org_name_is_trimmed() {
        let name = OrgName::try_from("  Rowing Club ").unwrap();
        assert_eq!(name.as_ref(), "Rowing Club");
    }

    #[rstest]
    #[case::admin(r#""admin""#, Role::Admin)]
    #[case::member(r#""member""#, Role::Member)]
    fn role_uses_lowercase_on_the_wire(#[case] json: &str, #[case] expected: Role) {
        let actual: Role = serde_json::from_str(json).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(serde_json::to_string(&expected).unwrap(), json);
        assert_eq!(expected.to_string(), json.trim_matches('"'));
    }

    #[test]
    fn membership_parses_postgres_timestamps() {
        let json = r#"{
            "org_id": "6f1c4c3e-8a53-4b7a-9d43-4a0f2a8e4b11",
            "user_id": "0b7a3f9d-1f2e-4c5d-8e9f-a0b1c2d3e4f5",
            "role": "admin",
            "joined_at": "2025-03-04T10:20:30.123456+00:00"
        }"#;

        let actual: OrganizationMembership = serde_json::from_str(json).unwrap();

        assert_eq!(actual.role, Role::Admin);
        assert_eq!(actual.joined_at.timestamp(), 1_741_083_630);
    }
}
