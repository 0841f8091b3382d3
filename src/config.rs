//! Public, transport-agnostic kernel connection configuration.
//!
//! This type intentionally contains no WebSocket-specific concepts.
//! Transport layers are responsible for interpreting this config into
//! concrete connection settings.

use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// Connection parameters for one kernel.
///
/// Identity fields (`username`, `token`) are caller-supplied credentials;
/// the crate never generates them.
///
/// # Example
///
/// ```
/// use kernel_rpc::KernelConfig;
/// use std::time::Duration;
///
/// let config = KernelConfig::new(
///     "wss://hub.example.com/user/user-1",
///     "f0bf08b5-583c-4879-b228-5278e4614f71",
/// )
/// .with_username("user-1")
/// .with_token("4d2dd9c82e624fd4afd074b265e44f73")
/// .with_request_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct KernelConfig {
    // ---
    /// Base URL of the notebook server, up to but not including
    /// `/api/kernels/...` (e.g. `"wss://hub.example.com/user/user-1"`).
    pub base_url: String,

    /// Identifier of the running kernel to attach to.
    pub kernel_id: String,

    /// Username placed in outbound frame headers.
    pub username: String,

    /// API token appended to the channel URL query string.
    ///
    /// Empty means no token parameter is sent.
    pub token: String,

    /// How long [`KernelClient::execute`](crate::KernelClient::execute)
    /// waits for a matching reply.
    ///
    /// `None` (the default) waits indefinitely; the wait then ends only
    /// when a matching frame arrives or the connection fails.
    pub request_timeout: Option<Duration>,
}

impl KernelConfig {
    /// Create a config for the given server and kernel.
    ///
    /// Username and token start empty; the request wait is unbounded.
    pub fn new(base_url: impl Into<String>, kernel_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            kernel_id: kernel_id.into(),
            username: String::new(),
            token: String::new(),
            request_timeout: None,
        }
    }

    /// Set the username carried in request headers.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the API token for the channel URL.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Opt into a bounded wait for each request.
    ///
    /// # Example
    ///
    /// ```
    /// use kernel_rpc::KernelConfig;
    /// use std::time::Duration;
    ///
    /// let config = KernelConfig::new("wss://hub.example.com/user/u", "k1")
    ///     .with_request_timeout(Duration::from_secs(10));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the kernel channels endpoint URL:
    /// `{base_url}/api/kernels/{kernel_id}/channels?token={token}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `base_url` does not parse or cannot
    /// carry path segments.
    pub fn channels_url(&self) -> Result<Url> {
        // ---
        let mut url =
            Url::parse(&self.base_url).map_err(|err| Error::InvalidUrl(err.to_string()))?;

        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("cannot-be-a-base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "kernels", self.kernel_id.as_str(), "channels"]);

        if !self.token.is_empty() {
            url.query_pairs_mut().append_pair("token", &self.token);
        }

        Ok(url)
    }
}
