//! Google OAuth token provider backed by an on-disk token cache.

use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::{DefaultInstalledFlowDelegate, InstalledFlowDelegate};
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use super::{AccessToken, AuthError, TokenProvider, GMAIL_SCOPE};

/// Installed-app OAuth flow with tokens persisted between runs.
///
/// Only the `connect` command requests tokens interactively. Background
/// polls rely on the cached refresh token and fail when it is missing. The
/// background authenticator is built on first use and reused, so its
/// in-memory token cache and HTTP client survive across polls.
pub struct GoogleTokenProvider {
    client_secret_path: PathBuf,
    token_cache_path: PathBuf,
    background: OnceCell<DefaultAuthenticator>,
}

/// Flow delegate for background polls: never shows a consent URL
struct NoConsentPrompt;

impl InstalledFlowDelegate for NoConsentPrompt {
    fn present_user_url<'a>(
        &'a self,
        _url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async {
            Err("consent is required; run `code-poller connect`".to_string())
        })
    }
}

impl GoogleTokenProvider {
    pub fn new(client_secret_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_cache_path: token_cache_path.into(),
            background: OnceCell::new(),
        }
    }

    async fn build_authenticator(&self, interactive: bool) -> Result<DefaultAuthenticator, AuthError> {
        let secret = yup_oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|e| {
                AuthError::Token(format!(
                    "failed to read client secret {}: {}",
                    self.client_secret_path.display(),
                    e
                ))
            })?;

        // The redirect flow ignores a delegate error and keeps waiting for the
        // browser, so background polls use the code flow, which stops on it
        let method = if interactive {
            InstalledFlowReturnMethod::HTTPRedirect
        } else {
            InstalledFlowReturnMethod::Interactive
        };
        let delegate: Box<dyn InstalledFlowDelegate> = if interactive {
            Box::new(DefaultInstalledFlowDelegate)
        } else {
            Box::new(NoConsentPrompt)
        };

        InstalledFlowAuthenticator::builder(secret, method)
            .persist_tokens_to_disk(self.token_cache_path.clone())
            .flow_delegate(delegate)
            .build()
            .await
            .map_err(|e| AuthError::Token(format!("failed to build authenticator: {}", e)))
    }
}

async fn access_token(auth: &DefaultAuthenticator, interactive: bool) -> Result<AccessToken, AuthError> {
    let token = auth.token(&[GMAIL_SCOPE]).await.map_err(|e| {
        if interactive {
            AuthError::Token(e.to_string())
        } else {
            AuthError::NotConnected(e.to_string())
        }
    })?;

    token
        .token()
        .map(AccessToken::new)
        .ok_or_else(|| AuthError::Token("token response had no access token".to_string()))
}

#[async_trait]
impl TokenProvider for GoogleTokenProvider {
    async fn token(&self, interactive: bool) -> Result<AccessToken, AuthError> {
        if interactive {
            let auth = self.build_authenticator(true).await?;
            return access_token(&auth, true).await;
        }

        if !self.token_cache_path.exists() {
            return Err(AuthError::NotConnected(format!(
                "no token cache at {}",
                self.token_cache_path.display()
            )));
        }

        let auth = self
            .background
            .get_or_try_init(|| self.build_authenticator(false))
            .await?;
        access_token(auth, false).await
    }
}
