//! Access token acquisition.
//!
//! The identity SDK itself lives outside this crate. It is reached through
//! [`TokenSource`], and the rest of the crate only ever asks a
//! [`CredentialProvider`] for a bearer token right before each request.

use tracing::{debug, info, warn};

use crate::error::{AuthError, Error, Result};

/// Supplies a bearer token for catalog requests.
pub trait CredentialProvider: Send + Sync {
    /// Return a currently valid access token.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when no token can be obtained.
    fn access_token(&self) -> Result<String>;
}

/// Seam to the vendor identity SDK.
#[cfg_attr(test, mockall::automock)]
pub trait TokenSource: Send + Sync {
    /// Acquire a token from the cached account without user interaction.
    fn acquire_silent(&self) -> Result<String>;

    /// Acquire a token by prompting the user.
    fn acquire_interactive(&self) -> Result<String>;
}

/// Tries silent acquisition first and prompts only when the provider says
/// interaction is required.
#[derive(Debug)]
pub struct SilentFirst<S: TokenSource> {
    source: S,
}

impl<S: TokenSource> SilentFirst<S> {
    /// Wrap a token source.
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Access the wrapped source.
    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<S: TokenSource> CredentialProvider for SilentFirst<S> {
    fn access_token(&self) -> Result<String> {
        match self.source.acquire_silent() {
            Ok(token) => {
                debug!("Acquired access token silently");
                Ok(token)
            }
            Err(Error::Auth(AuthError::InteractionRequired)) => {
                info!("Silent token acquisition needs interaction, prompting user");
                self.source.acquire_interactive()
            }
            Err(e) => {
                warn!("Silent token acquisition failed: {}", e);
                Err(e)
            }
        }
    }
}

/// A fixed token, e.g. from a command line flag.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        let token = self.0.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential.into());
        }
        Ok(token.to_string())
    }
}
