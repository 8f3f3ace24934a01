use std::fmt::Display;

use crate::errors::ConversionError;

/// An email address that has passed a basic shape check (`local@domain`)
#[derive(
    Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

/// A first or last name as entered on the registration form
#[derive(Default, Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct PersonName(String);

impl EmailAddress {
    pub const MAX_LENGTH: usize = 254;
}

impl PersonName {
    pub const MAX_LENGTH: usize = 50;

    /// Blank input means the field was not filled in
    pub fn optional(value: &str) -> Result<Option<Self>, ConversionError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            trimmed.to_string().try_into().map(Some)
        }
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ConversionError::Empty);
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(ConversionError::MaxExceeded {
                max: Self::MAX_LENGTH,
                actual: value.len(),
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ConversionError::InvalidFormat("whitespace not allowed"));
        }
        let Some((local, domain)) = value.split_once('@') else {
            return Err(ConversionError::InvalidFormat("missing @"));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(ConversionError::InvalidFormat("expected local@domain"));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for EmailAddress {
    type Error = ConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_string().try_into()
    }
}

impl TryFrom<String> for PersonName {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ConversionError::Empty);
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(ConversionError::MaxExceeded {
                max: Self::MAX_LENGTH,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl From<PersonName> for String {
    fn from(value: PersonName) -> Self {
        value.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
