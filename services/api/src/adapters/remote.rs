//! services/api/src/adapters/remote.rs
//!
//! This module contains the adapter for the remote document store used by sync.
//! It implements the `RemoteStore` port from the `core` crate over HTTP with
//! `reqwest`. Documents live at `{base}/users/{user}/datasets/{NAME}`.

use async_trait::async_trait;
use reader_core::ports::{Dataset, PortError, PortResult, RemoteDocument, RemoteStore};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::warn;

use crate::config::RemoteConfig;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `RemoteStore` port against a JSON document API.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: RemoteConfig,
}

impl HttpRemoteStore {
    /// Creates a new `HttpRemoteStore`.
    pub fn new(client: Client, config: RemoteConfig) -> Self {
        Self { client, config }
    }

    pub fn dataset_url(&self, dataset: Dataset) -> String {
        format!(
            "{}/users/{}/datasets/{}",
            self.config.base_url,
            self.config.user_id,
            dataset.remote_name()
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

//=========================================================================================
// `RemoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn load(&self, dataset: Dataset) -> PortResult<Option<RemoteDocument>> {
        let response = self
            .authorize(self.client.get(self.dataset_url(dataset)))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Remote store unreachable: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortError::Unauthorized),
            status if status.is_success() => {
                let document = response.json::<RemoteDocument>().await.map_err(|e| {
                    PortError::Unexpected(format!(
                        "Invalid {} document: {}",
                        dataset.remote_name(),
                        e
                    ))
                })?;
                Ok(Some(document))
            }
            status => Err(PortError::Unexpected(format!(
                "Loading {} failed with status {}",
                dataset.remote_name(),
                status
            ))),
        }
    }

    async fn save(&self, dataset: Dataset, document: &RemoteDocument) -> PortResult<bool> {
        let response = self
            .authorize(self.client.put(self.dataset_url(dataset)))
            .json(document)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Remote store unreachable: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PortError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(dataset = dataset.remote_name(), %status, "Remote store refused the write: {}", body);
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_urls_are_scoped_by_user() {
        let store = HttpRemoteStore::new(
            Client::new(),
            RemoteConfig {
                base_url: "https://store.example.com/v1".into(),
                user_id: "reader-7".into(),
                api_token: None,
            },
        );
        assert_eq!(
            store.dataset_url(Dataset::ReadingHistory),
            "https://store.example.com/v1/users/reader-7/datasets/READING_HISTORY"
        );
        assert_eq!(
            store.dataset_url(Dataset::Books),
            "https://store.example.com/v1/users/reader-7/datasets/BOOKS"
        );
    }
}
