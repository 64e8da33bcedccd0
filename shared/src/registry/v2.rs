use super::RegistryError;
use reqwest::{Client, StatusCode};

/// Client for the public OCI distribution (registry v2) API. GC uses only
/// the manifest DELETE: it removes every tag and revision pointer for a
/// repository/digest pair in one call, which is the only way GC can clear
/// tags it has no record of in its own database (spec §4.5 step B.1).
#[derive(Clone)]
pub struct RegistryV2Client {
    client: Client,
    base_url: String,
}

impl RegistryV2Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<(), RegistryError> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repository, digest);
        let response = self.client.delete(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound(url)),
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
