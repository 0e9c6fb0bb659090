//! Result publishing to the remote document store.
//!
//! Documents are appended to a Firestore collection through its REST API:
//! `POST /v1/projects/{project}/databases/(default)/documents/{collection}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;
use url::Url;
use weathercam_core::{PublishError, ReqwestErrorExt, StoreConfig};

/// One classified capture, as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub weather: String,
    pub latitude: f64,
    pub longitude: f64,
    pub time: String,
}

impl WeatherRecord {
    /// Firestore typed-value encoding of the record.
    pub fn to_document(&self) -> Value {
        json!({
            "fields": {
                "weather": { "stringValue": self.weather },
                "latitude": { "doubleValue": self.latitude },
                "longitude": { "doubleValue": self.longitude },
                "time": { "stringValue": self.time },
            }
        })
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Append one record. Records are never updated afterwards.
    async fn publish(&self, record: &WeatherRecord) -> Result<(), PublishError>;
}

/// Firestore REST client for a single collection
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    client: Arc<Client>,
    documents_url: Url,
    bearer_token: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: &StoreConfig) -> Result<Self, PublishError> {
        if !config.is_configured() {
            return Err(PublishError::NotConfigured(
                "store.project_id is not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PublishError::Network(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            documents_url: Self::documents_url(config)?,
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn documents_url(config: &StoreConfig) -> Result<Url, PublishError> {
        let mut url = Url::parse(&config.base_url)
            .map_err(|e| PublishError::NotConfigured(format!("store.base_url: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| PublishError::NotConfigured("store.base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                config.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                config.collection.as_str(),
            ]);

        if let Some(key) = &config.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }

        Ok(url)
    }

    /// Collection endpoint documents are posted to
    pub fn endpoint(&self) -> &Url {
        &self.documents_url
    }
}

#[async_trait]
impl Publisher for FirestoreClient {
    #[instrument(skip(self), level = "debug")]
    async fn publish(&self, record: &WeatherRecord) -> Result<(), PublishError> {
        let mut request = self
            .client
            .post(self.documents_url.clone())
            .json(&record.to_document());

        if let Some(token) = &self.bearer_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!("Document successfully written ({})", record.weather);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(project: &str) -> StoreConfig {
        StoreConfig {
            project_id: project.to_string(),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_document_encoding() {
        let record = WeatherRecord {
            weather: "cloudy".into(),
            latitude: 35.5,
            longitude: 139.25,
            time: "2021:07:04 09:15:30".into(),
        };
        assert_eq!(
            record.to_document(),
            json!({
                "fields": {
                    "weather": { "stringValue": "cloudy" },
                    "latitude": { "doubleValue": 35.5 },
                    "longitude": { "doubleValue": 139.25 },
                    "time": { "stringValue": "2021:07:04 09:15:30" },
                }
            })
        );
    }

    #[test]
    fn test_endpoint_encodes_collection() {
        let client = FirestoreClient::new(&store("demo")).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/weather%20information"
        );
    }

    #[test]
    fn test_endpoint_with_api_key_and_base_path() {
        let config = StoreConfig {
            base_url: "http://localhost:8080/".into(),
            api_key: Some("abc".into()),
            ..store("demo")
        };
        let client = FirestoreClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/weather%20information?key=abc"
        );
    }

    #[test]
    fn test_unconfigured_project_rejected() {
        assert!(matches!(
            FirestoreClient::new(&StoreConfig::default()),
            Err(PublishError::NotConfigured(_))
        ));
    }
}
