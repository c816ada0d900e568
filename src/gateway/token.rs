//! OAuth2 client-credentials token cache
//!
//! One token is shared by every gateway call. The lock is held across the
//! refresh request so concurrent tool calls wait for a single fetch.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::config::OAuthConfig;
use crate::core::{AgentError, AgentResult};

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

pub struct TokenCache {
    client: Client,
    oauth: OAuthConfig,
    refresh_margin: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(oauth: OAuthConfig, refresh_margin: Duration) -> Self {
        Self {
            client: Client::new(),
            oauth,
            refresh_margin,
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, fetching a new one when the cached one is
    /// within the refresh margin of expiry
    pub async fn access_token(&self) -> AgentResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now(), self.refresh_margin) {
                tracing::trace!("[TokenCache] Reusing cached token");
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> AgentResult<CachedToken> {
        tracing::info!("[TokenCache] Requesting token from {}", self.oauth.token_url);

        let requested_at = Instant::now();
        let response = self
            .client
            .post(&self.oauth.token_url)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::gateway(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::gateway(format!("token response unreadable: {}", e)))?;

        if !status.is_success() {
            tracing::error!("[TokenCache] Token request failed: {} {}", status, body);
            return Err(AgentError::gateway(format!(
                "token request failed: {} {}",
                status, body
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::gateway(format!("malformed token response: {}", e)))?;

        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));
        tracing::info!("[TokenCache] Token acquired, expires in {}s", lifetime.as_secs());

        Ok(CachedToken {
            value: parsed.access_token,
            expires_at: requested_at + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP responder: answers every request with `status` and `body`
    async fn serve_tokens(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/oauth2/token", addr), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn oauth(token_url: String) -> OAuthConfig {
        OAuthConfig {
            token_url,
            client_id: "client".into(),
            client_secret: "secret".into(),
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let (url, hits) = serve_tokens(200, r#"{"access_token":"tok-1","expires_in":3600}"#).await;
        let cache = TokenCache::new(oauth(url), Duration::from_secs(60));

        assert_eq!(cache.access_token().await.unwrap(), "tok-1");
        assert_eq!(cache.access_token().await.unwrap(), "tok-1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        cache.access_token().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refetched() {
        // expires inside the refresh margin, so never considered fresh
        let (url, hits) = serve_tokens(200, r#"{"access_token":"tok-short","expires_in":30}"#).await;
        let cache = TokenCache::new(oauth(url), Duration::from_secs(60));

        cache.access_token().await.unwrap();
        cache.access_token().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_error_status() {
        let (url, _) = serve_tokens(401, r#"{"error":"invalid_client"}"#).await;
        let cache = TokenCache::new(oauth(url), Duration::from_secs(60));

        let err = cache.access_token().await.unwrap_err();
        assert!(matches!(err, AgentError::Gateway(msg) if msg.contains("invalid_client")));
    }

    #[test]
    fn test_freshness_margin() {
        let now = Instant::now();
        let token = CachedToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(120),
        };
        assert!(token.is_fresh(now, Duration::from_secs(60)));
        assert!(!token.is_fresh(now + Duration::from_secs(61), Duration::from_secs(60)));
    }
}
