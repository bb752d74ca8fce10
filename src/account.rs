//! Login and signup forms.
use thiserror::Error;
use tracing::{info, warn};

use crate::client::AccountBackend;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const LOGIN_SUCCESS_REPLY: &str = "Login Successful";
pub const NETWORK_ERROR_TEXT: &str = "Network error. Please try again.";

/// Caught before any request is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingField,
    #[error("Username must be at least 3 characters long")]
    UsernameTooShort,
    #[error("Password must be at least 6 characters long")]
    PasswordTooShort,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl LoginForm {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingField);
        }
        Ok(())
    }
}

impl SignupForm {
    pub fn new(username: &str, password: &str, confirm_password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() || self.password.is_empty() || self.confirm_password.is_empty()
        {
            return Err(ValidationError::MissingField);
        }
        if self.username.chars().count() < MIN_USERNAME_LEN {
            return Err(ValidationError::UsernameTooShort);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    /// Logged in, or account created.
    Accepted(String),
    /// The server answered but refused, e.g. "Invalid Password".
    Rejected(String),
    Invalid(ValidationError),
    NetworkError,
}

impl AccountOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AccountOutcome::Accepted(_))
    }

    pub fn message(&self) -> String {
        match self {
            AccountOutcome::Accepted(reply) | AccountOutcome::Rejected(reply) => reply.clone(),
            AccountOutcome::Invalid(e) => e.to_string(),
            AccountOutcome::NetworkError => NETWORK_ERROR_TEXT.to_string(),
        }
    }
}

pub async fn login<B: AccountBackend + ?Sized>(backend: &B, form: &LoginForm) -> AccountOutcome {
    if let Err(e) = form.validate() {
        return AccountOutcome::Invalid(e);
    }
    match backend.login(&form.username, &form.password).await {
        Ok(reply) if reply == LOGIN_SUCCESS_REPLY => {
            info!(username = %form.username, "Logged in");
            AccountOutcome::Accepted(reply)
        }
        Ok(reply) if reply.is_empty() => AccountOutcome::Rejected("Login failed".to_string()),
        Ok(reply) => AccountOutcome::Rejected(reply),
        Err(e) => {
            warn!(error = %e, "Login request failed");
            AccountOutcome::NetworkError
        }
    }
}

pub async fn create_account<B: AccountBackend + ?Sized>(
    backend: &B,
    form: &SignupForm,
) -> AccountOutcome {
    if let Err(e) = form.validate() {
        return AccountOutcome::Invalid(e);
    }
    match backend.create_account(&form.username, &form.password).await {
        Ok(reply) if reply.to_lowercase().contains("success") => {
            info!(username = %form.username, "Account created");
            AccountOutcome::Accepted(reply)
        }
        Ok(reply) if reply.is_empty() => {
            AccountOutcome::Rejected("Account creation failed".to_string())
        }
        Ok(reply) => AccountOutcome::Rejected(reply),
        Err(e) => {
            warn!(error = %e, "Account creation request failed");
            AccountOutcome::NetworkError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAccounts {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeAccounts {
        fn answering(reply: Option<&'static str>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        fn answer(&self) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or(ClientError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    #[async_trait]
    impl AccountBackend for FakeAccounts {
        async fn create_account(&self, _: &str, _: &str) -> Result<String, ClientError> {
            self.answer()
        }
        async fn login(&self, _: &str, _: &str) -> Result<String, ClientError> {
            self.answer()
        }
    }

    #[test]
    fn signup_rules_apply_in_order() {
        assert_eq!(
            SignupForm::new("  ", "secret1", "secret1").validate(),
            Err(ValidationError::MissingField)
        );
        assert_eq!(
            SignupForm::new("al", "secret1", "secret1").validate(),
            Err(ValidationError::UsernameTooShort)
        );
        assert_eq!(
            SignupForm::new("alice", "short", "short").validate(),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(
            SignupForm::new("alice", "secret1", "secret2").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(SignupForm::new(" alice ", "secret1", "secret1").validate(), Ok(()));
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_server() {
        let backend = FakeAccounts::answering(Some(LOGIN_SUCCESS_REPLY));

        let outcome = login(&backend, &LoginForm::new("alice", "")).await;

        assert_eq!(outcome, AccountOutcome::Invalid(ValidationError::MissingField));
        assert_eq!(outcome.message(), "Please fill in all fields");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_needs_exact_success_reply() {
        let ok = FakeAccounts::answering(Some("Login Successful"));
        assert!(login(&ok, &LoginForm::new("alice", "pw")).await.is_accepted());

        let wrong = FakeAccounts::answering(Some("Invalid Password"));
        assert_eq!(
            login(&wrong, &LoginForm::new("alice", "pw")).await,
            AccountOutcome::Rejected("Invalid Password".into())
        );

        let down = FakeAccounts::answering(None);
        let outcome = login(&down, &LoginForm::new("alice", "pw")).await;
        assert_eq!(outcome, AccountOutcome::NetworkError);
        assert_eq!(outcome.message(), NETWORK_ERROR_TEXT);
    }

    #[tokio::test]
    async fn signup_accepts_any_success_wording() {
        let backend = FakeAccounts::answering(Some("Account Created Successfully"));
        let form = SignupForm::new("alice", "secret1", "secret1");
        assert!(create_account(&backend, &form).await.is_accepted());

        let taken = FakeAccounts::answering(Some("Username already exists"));
        assert_eq!(
            create_account(&taken, &form).await,
            AccountOutcome::Rejected("Username already exists".into())
        );
    }
}
