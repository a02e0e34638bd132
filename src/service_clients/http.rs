use crate::error::MillError;
use crate::service::{
    AddImageRequest, DeleteImageRequest, ImageSearchService, RemoteError, SearchImageRequest,
    SearchImageResponse, ServiceFault,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Talks to the image search service over HTTP, one `POST {endpoint}/{Action}`
/// per call with a JSON body.
pub struct HttpImageSearchClient {
    client: Client,
    endpoint: Url,
}

impl HttpImageSearchClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, MillError> {
        log::debug!("Creating image search client for endpoint: {}", endpoint);
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MillError::InvalidConfig(format!("cannot build HTTP client: {}", e)))?;
        log::trace!("Image search client created successfully.");
        Ok(Self { client, endpoint })
    }

    async fn send<B>(&self, action: &str, body: &B) -> Result<reqwest::Response, RemoteError>
    where
        B: Serialize + Sync,
    {
        let url = self
            .endpoint
            .join(action)
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        log::trace!("Calling {} at {}", action, url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let fault = serde_json::from_str::<ServiceFault>(&text).unwrap_or_default();
        log::debug!(
            "{} failed with HTTP {} code '{}' request '{}'",
            action,
            status.as_u16(),
            fault.code,
            fault.request_id
        );
        Err(RemoteError::Service {
            status: status.as_u16(),
            fault,
        })
    }

    async fn call<B, R>(&self, action: &str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.send(action, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| RemoteError::Transport(format!("undecodable {} response: {}", action, e)))
    }
}

#[async_trait]
impl ImageSearchService for HttpImageSearchClient {
    async fn add_image(&self, request: AddImageRequest) -> Result<(), RemoteError> {
        log::debug!("Adding image '{}' to instance '{}'", request.pic_name, request.instance_name);
        self.send("AddImage", &request).await?;
        Ok(())
    }

    async fn delete_image(&self, request: DeleteImageRequest) -> Result<(), RemoteError> {
        log::debug!(
            "Deleting image '{}' from instance '{}'",
            request.pic_name,
            request.instance_name
        );
        self.send("DeleteImage", &request).await?;
        Ok(())
    }

    async fn search_image(
        &self,
        request: SearchImageRequest,
    ) -> Result<SearchImageResponse, RemoteError> {
        log::debug!(
            "Searching instance '{}' with filter {} start {} num {}",
            request.instance_name,
            request.filter,
            request.start,
            request.num
        );
        self.call("SearchImage", &request).await
    }
}
