//! Facebook Graph API adapters

mod retriever;
mod sender;

pub use retriever::{FacebookRetriever, FacebookRetrieverConfig};
pub use sender::{FacebookSender, FacebookSenderConfig};

use crosspost_domain::{RetrieveError, SendError};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const GRAPH_API_URL: &str = "https://graph.facebook.com";
pub const GRAPH_API_VERSION: &str = "v18.0";

/// Graph error codes that signal throttling
const RATE_LIMIT_CODES: [i64; 4] = [4, 17, 341, 368];
/// Invalid or expired access token
const OAUTH_ERROR_CODE: i64 = 190;

/// Failure of a single Graph API call
#[derive(Debug, thiserror::Error)]
pub(crate) enum FacebookError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Graph API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<FacebookError> for SendError {
    fn from(error: FacebookError) -> Self {
        match error {
            FacebookError::Http(e) => SendError::Network(e),
            FacebookError::RateLimited(_) => SendError::RateLimited(None),
            FacebookError::Auth(e) => SendError::Auth(e),
            other => SendError::Api(other.to_string()),
        }
    }
}

impl From<FacebookError> for RetrieveError {
    fn from(error: FacebookError) -> Self {
        match error {
            FacebookError::Http(e) => RetrieveError::Network(e),
            FacebookError::RateLimited(_) => RetrieveError::RateLimited(None),
            FacebookError::Auth(e) => RetrieveError::Auth(e),
            FacebookError::Decode(e) => RetrieveError::InvalidResponse(e),
            other => RetrieveError::Api(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: GraphError,
}

#[derive(Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

impl GraphError {
    fn into_error(self) -> FacebookError {
        let lowered = self.message.to_lowercase();
        if RATE_LIMIT_CODES.contains(&self.code)
            || lowered.contains("rate limit")
            || lowered.contains("too many requests")
        {
            FacebookError::RateLimited(self.message)
        } else if self.code == OAUTH_ERROR_CODE {
            FacebookError::Auth(self.message)
        } else {
            FacebookError::Api {
                code: self.code,
                message: self.message,
            }
        }
    }
}

/// Thin Graph API client bound to one page
pub(crate) struct GraphApi {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl GraphApi {
    pub(crate) fn new(client: Client, token: SecretString, base_url: String) -> Self {
        Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FacebookError> {
        self.request(Method::GET, path, params).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FacebookError> {
        self.request(Method::POST, path, params).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FacebookError> {
        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("access_token", self.token.expose_secret()));

        let endpoint = format!("{}/{}/{}", self.base_url, GRAPH_API_VERSION, path);
        let request = if method == Method::GET {
            self.client.get(endpoint).query(&query)
        } else {
            self.client.request(method, endpoint).form(&query)
        };

        let response = request
            .send()
            .await
            .map_err(|e| FacebookError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FacebookError::Http(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => envelope.error.into_error(),
                Err(_) if status == 429 => {
                    FacebookError::RateLimited(format!("{} returned HTTP 429", path))
                }
                Err(_) => FacebookError::Api {
                    code: i64::from(status.as_u16()),
                    message: format!("{} returned HTTP {}", path, status),
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| FacebookError::Decode(format!("{}: {}", path, e)))
    }
}
