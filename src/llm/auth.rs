//! Credentials for the model backend
//!
//! Static keys are fixed at construction. Dynamic providers are asked for
//! fresh credentials before every request, which suits short-lived proxy
//! tokens.
//!
//! ```ignore
//! let client = AnthropicClient::with_auth_provider(|| async {
//!     let token = refresh_proxy_token().await?;
//!     Ok(AuthConfig::with_base_url(token, "https://proxy.internal/v1/messages"))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::AgentResult;

/// Credentials used for one request
#[derive(Clone)]
pub struct AuthConfig {
    pub api_key: String,
    /// Overrides the default Messages API endpoint
    pub base_url: Option<String>,
}

impl AuthConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Some(base_url.into()),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = AgentResult<AuthConfig>> + Send + 'a>>;

/// Source of fresh credentials, called before each model request
pub trait AuthProvider: Send + Sync {
    fn get_auth(&self) -> AuthFuture<'_>;
}

/// Wrapper to implement AuthProvider for async closures
pub struct FnAuthProvider<F> {
    func: F,
}

impl<F, Fut> AuthProvider for FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
{
    fn get_auth(&self) -> AuthFuture<'_> {
        Box::pin((self.func)())
    }
}

/// Create an auth provider from an async closure
pub fn auth_provider<F, Fut>(func: F) -> FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
{
    FnAuthProvider { func }
}

#[derive(Clone)]
pub(crate) enum AuthSource {
    Static(AuthConfig),
    Dynamic(Arc<dyn AuthProvider>),
}

impl AuthSource {
    pub(crate) async fn get_auth(&self) -> AgentResult<AuthConfig> {
        match self {
            AuthSource::Static(config) => Ok(config.clone()),
            AuthSource::Dynamic(provider) => provider.get_auth().await,
        }
    }
}
