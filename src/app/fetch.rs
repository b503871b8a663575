//! Outbound HTTP GET used by the `/external` route.

use std::time::Duration;

use anyhow::Context;

/// Fetches a URL and reports the upstream status and body.
///
/// Non-2xx statuses are reported as `Ok`; only transport failures are
/// errors.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> anyhow::Result<(u16, String)>;
}

pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Fetch for UreqFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<(u16, String)> {
        let parsed = url::Url::parse(url).with_context(|| format!("Invalid upstream URL {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported upstream scheme {}", parsed.scheme());
        }

        tracing::debug!(url = %parsed, "Fetching upstream");

        match self.agent.get(parsed.as_str()).call() {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .context("Failed to read upstream body")?;
                Ok((status, body))
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Ok((status, body))
            }
            Err(e) => Err(e).context("Upstream request failed"),
        }
    }
}
