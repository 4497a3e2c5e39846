//! Delivery of temporary passwords to imported users.
//!
//! The user store hands back an [`IssuedCredentials`] for every user it
//! creates; the processing loop passes it to a [`CredentialNotifier`].
//! [`EmailCredentialNotifier`] sends it over SMTP when `SMTP_HOST` is set.
//! Otherwise [`CredentialOutbox`] keeps it in memory.

use std::fmt;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::RwLock;

// ---------------------------------------------------------------------------
// Issued credentials
// ---------------------------------------------------------------------------

/// Login details for a freshly imported user.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredentials {
    pub name: String,
    pub email: String,
    pub temporary_password: String,
}

impl fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("temporary_password", &"[redacted]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

/// Hands temporary passwords to the users they were issued for.
#[async_trait]
pub trait CredentialNotifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, batch_id: &str, credentials: &IssuedCredentials)
        -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_PORT: u16 = 587;

const DEFAULT_FROM_ADDRESS: &str = "noreply@examdesk.local";

/// SMTP settings for credential emails.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl SmtpConfig {
    /// Load from the environment. `None` when `SMTP_HOST` is not set.
    ///
    /// | Variable        | Default                   |
    /// |-----------------|---------------------------|
    /// | `SMTP_HOST`     | required                  |
    /// | `SMTP_PORT`     | `587`                     |
    /// | `SMTP_FROM`     | `noreply@examdesk.local`  |
    /// | `SMTP_USER`     | unset                     |
    /// | `SMTP_PASSWORD` | unset                     |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

/// Emails each imported user their temporary password.
pub struct EmailCredentialNotifier {
    config: SmtpConfig,
}

impl EmailCredentialNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn message(&self, credentials: &IssuedCredentials) -> Result<Message, NotifyError> {
        let body = format!(
            "Hello {},\n\n\
             An account has been created for you.\n\n\
             Email: {}\n\
             Temporary password: {}\n\n\
             You will be asked to choose a new password when you first sign in.\n",
            credentials.name, credentials.email, credentials.temporary_password,
        );

        Message::builder()
            .from(self.config.from_address.parse()?)
            .to(credentials.email.parse()?)
            .subject("Your examdesk account")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl CredentialNotifier for EmailCredentialNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn deliver(
        &self,
        batch_id: &str,
        credentials: &IssuedCredentials,
    ) -> Result<(), NotifyError> {
        let email = self.message(credentials)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);
        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder.build().send(email).await?;
        tracing::info!(to = %credentials.email, batch_id, "Credentials email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Keeps issued credentials in process memory, in delivery order.
#[derive(Default)]
pub struct CredentialOutbox {
    sent: RwLock<Vec<IssuedCredentials>>,
}

impl CredentialOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<IssuedCredentials> {
        self.sent.read().await.clone()
    }

    /// The last credentials issued to `email`, compared case-insensitively.
    pub async fn for_email(&self, email: &str) -> Option<IssuedCredentials> {
        self.sent
            .read()
            .await
            .iter()
            .rev()
            .find(|c| c.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }
}

#[async_trait]
impl CredentialNotifier for CredentialOutbox {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn deliver(
        &self,
        batch_id: &str,
        credentials: &IssuedCredentials,
    ) -> Result<(), NotifyError> {
        tracing::debug!(to = %credentials.email, batch_id, "Credentials kept in outbox");
        self.sent.write().await.push(credentials.clone());
        Ok(())
    }
}
