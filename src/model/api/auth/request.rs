use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum length of a password chosen at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum length of a password chosen through a reset.
pub const MIN_RESET_PASSWORD_LENGTH: usize = 8;

fn require_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::BadRequest("Please provide a valid email".to_string()))
    }
}

/// A request to create an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// First login step: email and password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(Error::BadRequest(
                "Please provide an email and password".to_string(),
            ));
        }
        Ok(())
    }
}

/// Second login step: the session token from the first step and the code
/// the user was sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyMfaRequest {
    pub mfa_token: String,
    pub mfa_code: String,
}

impl VerifyMfaRequest {
    pub fn validate(&self) -> Result<()> {
        if self.mfa_token.is_empty() || self.mfa_code.trim().is_empty() {
            return Err(Error::BadRequest(
                "Please provide an MFA token and code".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(&self) -> Result<()> {
        require_email(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<()> {
        if self.password != self.confirm_password {
            return Err(Error::BadRequest("Passwords do not match".to_string()));
        }
        let long_enough = self.password.chars().count() >= MIN_RESET_PASSWORD_LENGTH;
        let has_digit = self.password.chars().any(|c| c.is_ascii_digit());
        let has_upper = self.password.chars().any(char::is_uppercase);
        if !(long_enough && has_digit && has_upper) {
            return Err(Error::BadRequest(format!(
                "Password must be at least {MIN_RESET_PASSWORD_LENGTH} characters and contain a number and an uppercase letter"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod examples {
    use crate::model::common::user::examples::{EXAMPLE_EMAIL, EXAMPLE_PASSWORD};

    use super::*;

    impl LoginRequest {
        pub fn example() -> Self {
            Self {
                email: EXAMPLE_EMAIL.to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }

    impl RegisterRequest {
        pub fn example() -> Self {
            Self {
                email: "lin@example.com".to_string(),
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<LoginRequest>(
            r#"{"email": "a@b.io", "password": "pw", "isAdmin": true}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn email_shapes() {
        for good in ["a@b.io", "first.last@mail.example.org"] {
            assert!(require_email(good).is_ok(), "{good}");
        }
        for bad in ["", "ab.io", "@b.io", "a@b", "a@@b.io", "a b@c.io", "a@.io"] {
            assert!(require_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn registration_password_length() {
        let mut request = RegisterRequest::example();
        request.password = "12345".to_string();
        assert!(request.validate().is_err());
        request.password = "123456".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn reset_password_rules() {
        let reset = |password: &str, confirm: &str| ResetPasswordRequest {
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        };
        assert!(reset("Abcdefg1", "Abcdefg1").validate().is_ok());
        assert!(reset("Abcdefg1", "Abcdefg2").validate().is_err());
        assert!(reset("Abcdef1", "Abcdef1").validate().is_err());
        assert!(reset("abcdefg1", "abcdefg1").validate().is_err());
        assert!(reset("Abcdefgh", "Abcdefgh").validate().is_err());
    }

    #[test]
    fn mfa_request_is_camel_case() {
        let request: VerifyMfaRequest =
            serde_json::from_str(r#"{"mfaToken": "t", "mfaCode": "123456"}"#).unwrap();
        assert_eq!(request.mfa_token, "t");
        assert!(request.validate().is_ok());
    }
}
