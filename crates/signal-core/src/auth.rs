use thiserror::Error;

/// Problems with what the player typed, caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("enter an email address")]
    MissingEmail,
    #[error("enter a password")]
    MissingPassword,
    #[error("that does not look like an email address")]
    MalformedEmail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Trim and check both fields. The password is kept verbatim apart from
    /// the emptiness check.
    pub fn new(email: &str, password: &str) -> Result<Self, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::MissingEmail);
        }
        if !email.contains('@') {
            return Err(AuthError::MalformedEmail);
        }
        if password.trim().is_empty() {
            return Err(AuthError::MissingPassword);
        }
        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}
