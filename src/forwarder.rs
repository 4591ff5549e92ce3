// Delivery of built documents to the internal API
use crate::config::{RetryConfig, Settings};
use crate::record::MessageKind;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Internal API returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        kind: MessageKind,
        xml: &str,
        authorization: Option<&str>,
    ) -> Result<ForwardResponse, ForwardError>;
}

// POSTs XML to `<base_url>/<availability|rate>`. Transport failures are
// retried with backoff; any HTTP response, success or not, is final.
pub struct InternalApiClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl InternalApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ForwardError> {
        Self::new(
            settings.internal_api_url.clone(),
            settings.internal_api_timeout,
            settings.retry.clone(),
        )
    }

    pub fn endpoint(&self, kind: MessageKind) -> String {
        format!("{}/{}", self.base_url, kind.endpoint_path())
    }
}

#[async_trait]
impl Forwarder for InternalApiClient {
    async fn forward(
        &self,
        kind: MessageKind,
        xml: &str,
        authorization: Option<&str>,
    ) -> Result<ForwardResponse, ForwardError> {
        let url = self.endpoint(kind);
        let mut retry_attempt = 0;

        loop {
            info!(%url, attempt = retry_attempt + 1, "Posting XML to internal API");
            let mut request = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/xml")
                .body(xml.to_string());
            if let Some(authorization) = authorization {
                request = request.header(AUTHORIZATION, authorization);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if (200..300).contains(&status) {
                        info!(status, "Internal API response");
                        return Ok(ForwardResponse { status, body });
                    }
                    error!(status, %body, "HTTP error posting to internal API");
                    return Err(ForwardError::Status { status, body });
                }
                Err(e) if retry_attempt < self.retry.max_retries => {
                    let backoff = self.retry.calculate_backoff(retry_attempt);
                    warn!(
                        %url,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request error posting to internal API, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    retry_attempt += 1;
                }
                Err(e) => {
                    error!(%url, error = %e, "Request error posting to internal API");
                    return Err(ForwardError::Transport {
                        url,
                        attempts: retry_attempt + 1,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_endpoint_per_message_kind() {
        let client =
            InternalApiClient::new("http://internal/api/", Duration::from_secs(1), fast_retry(0))
                .unwrap();
        assert_eq!(client.endpoint(MessageKind::Availability), "http://internal/api/availability");
        assert_eq!(client.endpoint(MessageKind::Rate), "http://internal/api/rate");
    }

    #[tokio::test]
    async fn test_forward_posts_xml_with_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rate"))
            .and(header("content-type", "application/xml"))
            .and(header("authorization", "Bearer abc"))
            .and(body_string("<OTA_HotelRateAmountNotifRQ/>"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client =
            InternalApiClient::new(mock_server.uri(), Duration::from_secs(5), fast_retry(2))
                .unwrap();
        let response = client
            .forward(MessageKind::Rate, "<OTA_HotelRateAmountNotifRQ/>", Some("Bearer abc"))
            .await
            .unwrap();
        assert_eq!(response, ForwardResponse { status: 200, body: "accepted".to_string() });
    }

    #[tokio::test]
    async fn test_http_errors_are_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/availability"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client =
            InternalApiClient::new(mock_server.uri(), Duration::from_secs(5), fast_retry(3))
                .unwrap();
        let result = client.forward(MessageKind::Availability, "<x/>", None).await;
        assert!(matches!(
            result,
            Err(ForwardError::Status { status: 503, ref body }) if body == "down"
        ));

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        // Bind then drop so the port refuses connections
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let client =
            InternalApiClient::new(format!("http://{}", address), Duration::from_secs(2), fast_retry(2))
                .unwrap();
        let result = client.forward(MessageKind::Availability, "<x/>", None).await;
        match result {
            Err(ForwardError::Transport { attempts, url, .. }) => {
                assert_eq!(attempts, 3);
                assert!(url.ends_with("/availability"));
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
