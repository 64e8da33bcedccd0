use super::RegistryError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const DIAL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const DIAL_READ_TIMEOUT: Duration = Duration::from_secs(70);

/// HTTP client for the registry storage daemon's control endpoints.
/// Distinct from [`super::v2::RegistryV2Client`]: this one talks to the
/// internal control plane, not the public OCI distribution API.
#[derive(Clone)]
pub struct RegistryControlClient {
    client: Client,
    base_url: String,
    health_check_timeout: Duration,
}

impl RegistryControlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_health_check_timeout(base_url, DIAL_READ_TIMEOUT)
    }

    /// `health_check_timeout` bounds only the init liveness probe
    /// ([`Self::health`]); manifest/blob deletes keep using the fixed
    /// [`DIAL_READ_TIMEOUT`] regardless, since they're the ones the bounded
    /// retry loop already paces.
    pub fn with_health_check_timeout(base_url: impl Into<String>, health_check_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(DIAL_CONNECTION_TIMEOUT)
            .timeout(DIAL_READ_TIMEOUT)
            .build()
            .expect("failed to build registry control http client");

        Self {
            client,
            base_url: base_url.into(),
            health_check_timeout,
        }
    }

    /// Liveness probe; a failure here aborts the GC run before mark begins.
    pub async fn health(&self) -> Result<(), RegistryError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.get(&url).timeout(self.health_check_timeout).send().await?;
        self.check_status(response).await
    }

    /// Removes the manifest's revisions folder for `repository`.
    pub async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<(), RegistryError> {
        let url = format!(
            "{}/api/registry/{}/manifests/{}",
            self.base_url, repository, digest
        );
        debug!(repository, digest, "deleting manifest revisions from storage");
        let response = self.client.delete(&url).send().await?;
        self.check_status(response).await
    }

    /// Removes the blob's content.
    pub async fn delete_blob(&self, digest: &str) -> Result<(), RegistryError> {
        let url = format!("{}/api/blobs/{}", self.base_url, digest);
        debug!(digest, "deleting blob from storage");
        let response = self.client.delete(&url).send().await?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<(), RegistryError> {
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound(response.url().to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RegistryError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_panicking() {
        let _ = RegistryControlClient::new("http://localhost:8081");
    }
}
