use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};

use crate::core::error::Error;
use crate::core::retry::{retry_with_backoff, RetryPolicy};
use crate::dto::allocation::{AllocationReqDto, AllocationResDto};
use crate::model::credential::Credential;
use crate::model::identity::ClusterIdentity;
use crate::model::key::ServiceKey;

/// Remote allocation service owning public IP assignment
#[async_trait]
pub trait AllocationApi: Send + Sync {
    /// Requests addresses for a service, returns at least one address on success
    async fn allocate(&self, cluster: &ClusterIdentity, credential: &Credential, req: &AllocationReqDto) -> Result<Vec<String>, Error>;

    /// Releases whatever the allocator holds for the service
    async fn release(&self, cluster: &ClusterIdentity, credential: &Credential, key: &ServiceKey) -> Result<(), Error>;
}

pub struct AllocationClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl AllocationClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(http, base_url, retry))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    fn services_url(&self, cluster: &ClusterIdentity) -> String {
        format!("{}/cluster/{cluster}/service", self.base_url)
    }

    fn service_url(&self, cluster: &ClusterIdentity, key: &ServiceKey) -> String {
        format!("{}/cluster/{cluster}/service/{}", self.base_url, key.allocator_id())
    }

    async fn allocate_once(&self, url: &str, credential: &Credential, req: &AllocationReqDto) -> Result<Vec<String>, Error> {
        let res = self.http.post(url)
            .bearer_auth(credential.expose())
            .json(req)
            .send()
            .await
            .map_err(|err| Error::AllocationRequestFailed {
                reason: format!("POST {url} - {err}"),
                retryable: true,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::AllocationRequestFailed {
                reason: format!("POST {url} returned {status} - {}", extract_error_message(res).await),
                retryable: is_retryable_status(status),
            });
        }

        let body = res.bytes().await
            .map_err(|err| Error::AllocationRequestFailed {
                reason: format!("Error reading response body - {err}"),
                retryable: true,
            })?;
        let parsed = serde_json::from_slice::<AllocationResDto>(&body)
            .map_err(|err| Error::AllocationResponseInvalid(format!("Deserialization error - {err}")))?;

        if parsed.ip.is_empty() {
            return Err(Error::AllocationResponseInvalid(String::from("allocator returned no addresses")));
        }
        Ok(parsed.ip)
    }

    async fn release_once(&self, url: &str, credential: &Credential) -> Result<(), Error> {
        let res = self.http.delete(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|err| Error::ReleaseFailed {
                reason: format!("DELETE {url} - {err}"),
                retryable: true,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::ReleaseFailed {
                reason: format!("DELETE {url} returned {status} - {}", extract_error_message(res).await),
                retryable: is_retryable_status(status),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AllocationApi for AllocationClient {
    async fn allocate(&self, cluster: &ClusterIdentity, credential: &Credential, req: &AllocationReqDto) -> Result<Vec<String>, Error> {
        let url = self.services_url(cluster);
        retry_with_backoff(&self.retry, "allocate", Error::is_retryable, || self.allocate_once(&url, credential, req)).await
    }

    /// Single attempt, the release queue owns the retry policy of this call
    async fn release(&self, cluster: &ClusterIdentity, credential: &Credential, key: &ServiceKey) -> Result<(), Error> {
        let url = self.service_url(cluster, key);
        self.release_once(&url, credential).await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT
}

async fn extract_error_message(res: Response) -> String {
    match res.text().await {
        Ok(body) if body.is_empty() => String::from("empty body"),
        Ok(body) => body.chars().take(256).collect(),
        Err(err) => format!("Error extracting response body - {err}"),
    }
}
