use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConversionError {
    #[error("Empty not allowed")]
    Empty,
    #[error("Maximum length exceeded. {max} allowed but found {actual}")]
    MaxExceeded { max: usize, actual: usize },
    #[error("Invalid format: {0}")]
    InvalidFormat(&'static str),
}

/// Problems with user input that are caught before any request is sent
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Organization name is invalid. {0}")]
    OrganizationName(ConversionError),
    #[error("Email address {input:?} is invalid. {reason}")]
    Email {
        input: String,
        reason: ConversionError,
    },
    #[error("Name is invalid. {0}")]
    PersonName(ConversionError),
    #[error("Password is required")]
    EmptyPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Debug, Error)]
#[error("The user has not logged in")]
pub struct NotLoggedInError;
