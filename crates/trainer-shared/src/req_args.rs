//! Arguments for the operations the client sends to the backend. Constructors
//! that take raw form input do all local validation so nothing invalid is ever
//! sent

use secrecy::{ExposeSecret as _, SecretString};
use std::fmt::Debug;

use crate::{
    errors::ValidationError,
    organization::OrgName,
    profile::{EmailAddress, PersonName},
};

#[derive(Clone)]
pub struct LoginReqArgs {
    pub email: EmailAddress,
    pub password: SecretString,
}

#[derive(Clone)]
pub struct SignUpReqArgs {
    pub email: EmailAddress,
    pub password: SecretString,
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
}

#[derive(Debug, Clone)]
pub struct OtpReqArgs {
    pub email: EmailAddress,
    /// Allows the passcode email to also create the account
    pub should_create_user: bool,
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    #[default]
    Google,
    Github,
    Apple,
}

#[derive(Debug, Clone)]
pub struct CreateOrganizationReqArgs {
    pub name: OrgName,
    pub invitee_emails: Vec<EmailAddress>,
}

fn parse_email(input: &str) -> Result<EmailAddress, ValidationError> {
    EmailAddress::try_from(input).map_err(|reason| ValidationError::Email {
        input: input.to_string(),
        reason,
    })
}

fn require_password(password: &SecretString) -> Result<(), ValidationError> {
    if password.expose_secret().is_empty() {
        Err(ValidationError::EmptyPassword)
    } else {
        Ok(())
    }
}

impl LoginReqArgs {
    pub fn from_form(email: &str, password: SecretString) -> Result<Self, ValidationError> {
        let email = parse_email(email)?;
        require_password(&password)?;
        Ok(Self { email, password })
    }
}

impl SignUpReqArgs {
    pub fn from_form(
        email: &str,
        password: SecretString,
        password_confirmation: &SecretString,
        first_name: &str,
        last_name: &str,
    ) -> Result<Self, ValidationError> {
        let email = parse_email(email)?;
        require_password(&password)?;
        if password.expose_secret() != password_confirmation.expose_secret() {
            return Err(ValidationError::PasswordMismatch);
        }
        let first_name = PersonName::optional(first_name).map_err(ValidationError::PersonName)?;
        let last_name = PersonName::optional(last_name).map_err(ValidationError::PersonName)?;
        Ok(Self {
            email,
            password,
            first_name,
            last_name,
        })
    }

    /// Profile fields to store with the new user (omits missing names)
    pub fn profile_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut result = serde_json::Map::new();
        if let Some(first) = &self.first_name {
            result.insert("first_name".into(), first.as_ref().into());
        }
        if let Some(last) = &self.last_name {
            result.insert("last_name".into(), last.as_ref().into());
        }
        result
    }
}

impl OtpReqArgs {
    pub fn from_form(email: &str, should_create_user: bool) -> Result<Self, ValidationError> {
        Ok(Self {
            email: parse_email(email)?,
            should_create_user,
        })
    }
}

impl CreateOrganizationReqArgs {
    /// Blank invitee entries are skipped, anything else must be a valid email
    pub fn from_form<'a, I>(name: &str, invitee_emails: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let name = OrgName::try_from(name).map_err(ValidationError::OrganizationName)?;
        let invitee_emails = invitee_emails
            .into_iter()
            .filter(|x| !x.trim().is_empty())
            .map(parse_email)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            invitee_emails,
        })
    }
}

impl Debug for LoginReqArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginReqArgs")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Debug for SignUpReqArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpReqArgs")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::errors::ConversionError;

    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn sign_up_password_mismatch() {
        let actual = SignUpReqArgs::from_form("a@b.com", secret("Secret123"), &secret("Secret124"), "", "");
        assert_eq!(actual.err(), Some(ValidationError::PasswordMismatch));
    }

    #[test]
    fn sign_up_empty_password() {
        let actual = SignUpReqArgs::from_form("a@b.com", secret(""), &secret(""), "", "");
        assert_eq!(actual.err(), Some(ValidationError::EmptyPassword));
    }

    #[test]
    fn sign_up_profile_fields_only_include_given_names() {
        let args =
            SignUpReqArgs::from_form("a@b.com", secret("Secret123"), &secret("Secret123"), "A", " ")
                .unwrap();

        let actual = serde_json::Value::Object(args.profile_fields());

        assert_eq!(actual, serde_json::json!({"first_name": "A"}));
    }

    #[test]
    fn login_debug_hides_password() {
        let args = LoginReqArgs::from_form("a@b.com", secret("hunter2")).unwrap();
        let actual = format!("{args:?}");
        assert!(!actual.contains("hunter2"), "{actual}");
    }

    #[rstest]
    #[case::no_invitees("Club", vec![], 0)]
    #[case::blank_lines_skipped("Club", vec!["", "  ", "a@b.com"], 1)]
    #[case::several("Club", vec!["a@b.com", "c@d.com", "e@f.com"], 3)]
    fn create_org_invitees(
        #[case] name: &str,
        #[case] invitees: Vec<&str>,
        #[case] expected_count: usize,
    ) {
        let actual = CreateOrganizationReqArgs::from_form(name, invitees).unwrap();
        assert_eq!(actual.invitee_emails.len(), expected_count);
    }

    #[test]
    fn create_org_rejects_empty_name() {
        let actual = CreateOrganizationReqArgs::from_form("  ", ["a@b.com"]);
        assert_eq!(
            actual.unwrap_err(),
            ValidationError::OrganizationName(ConversionError::Empty)
        );
    }

    #[test]
    fn create_org_rejects_bad_invitee() {
        let actual = CreateOrganizationReqArgs::from_form("Club", ["a@b.com", "nope"]);
        assert!(matches!(
            actual.unwrap_err(),
            ValidationError::Email { input, .. } if input == "nope"
        ));
    }
}
