//! Remote offset sources.

use crate::error::Result;

/// A source of offset documents outside the local file system.
pub trait RemoteOffsets {
    /// Fetch the raw JSON document.
    fn fetch(&self) -> Result<String>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Fetches the offset document over HTTP(S).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpOffsets {
    url: String,
}

#[cfg(feature = "remote")]
impl HttpOffsets {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[cfg(feature = "remote")]
impl RemoteOffsets for HttpOffsets {
    fn fetch(&self) -> Result<String> {
        use crate::config::offsets::HTTP_TIMEOUT;
        use crate::retry::{ExponentialBackoff, RetryStrategy};

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build();
        let agent: ureq::Agent = config.into();

        ExponentialBackoff::new().execute(|attempt| -> Result<String> {
            tracing::debug!("Fetching offsets from {} (attempt {})", self.url, attempt + 1);
            let mut response = agent.get(&self.url).call()?;
            let body = response.body_mut().read_to_string()?;
            Ok(body)
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
