// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP-backed instance describer.
//!
//! Issues `GET {base_url}/instances/{instance_id}` and decodes the body as an
//! [`InstanceDescription`]. A `404` means the instance is unknown.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::DescribeError;

use super::{InstanceDescriber, InstanceDescription};

/// Describer that queries a describe service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInstanceDescriber {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInstanceDescriber {
    /// Create a describer for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DescribeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DescribeError::Request {
                instance_id: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn instance_url(&self, instance_id: &str) -> String {
        format!("{}/instances/{}", self.base_url, instance_id)
    }
}

#[async_trait]
impl InstanceDescriber for HttpInstanceDescriber {
    #[instrument(skip(self))]
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, DescribeError> {
        let response = self
            .client
            .get(self.instance_url(instance_id))
            .send()
            .await
            .map_err(|e| DescribeError::Request {
                instance_id: instance_id.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Instance not known to describe service");
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| DescribeError::Request {
                instance_id: instance_id.to_string(),
                reason: e.to_string(),
            })?;

        let description = response
            .json::<InstanceDescription>()
            .await
            .map_err(|e| DescribeError::InvalidResponse {
                instance_id: instance_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::MonitoringPolicy;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn describer_for(mock_server: &MockServer) -> HttpInstanceDescriber {
        HttpInstanceDescriber::new(mock_server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_describe_known_instance() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instances/i-0abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instanceId": "i-0abc",
                "launchTime": "2025-03-01T09:55:00Z",
                "tags": {"RuntimeMonitoring": "enabled", "Team": "batch"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let description = describer_for(&mock_server)
            .describe_instance("i-0abc")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(description.instance_id, "i-0abc");
        assert_eq!(
            description.launch_time.map(|t| t.to_rfc3339()),
            Some("2025-03-01T09:55:00+00:00".to_string())
        );
        assert_eq!(description.tag("RuntimeMonitoring"), Some("enabled"));
        assert!(MonitoringPolicy::default().is_monitored(&description));
    }

    #[tokio::test]
    async fn test_describe_without_optional_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instances/i-0bare"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"instanceId": "i-0bare"})),
            )
            .mount(&mock_server)
            .await;

        let description = describer_for(&mock_server)
            .describe_instance("i-0bare")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(description.launch_time, None);
        assert!(description.tags.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_instance_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instances/i-gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = describer_for(&mock_server)
            .describe_instance("i-gone")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_request_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instances/i-0abc"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let err = describer_for(&mock_server)
            .describe_instance("i-0abc")
            .await
            .unwrap_err();

        match err {
            DescribeError::Request {
                instance_id,
                reason,
            } => {
                assert_eq!(instance_id, "i-0abc");
                assert!(reason.contains("500"), "unexpected reason: {}", reason);
            }
            other => panic!("expected Request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instances/i-0abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = describer_for(&mock_server)
            .describe_instance("i-0abc")
            .await
            .unwrap_err();

        assert!(
            matches!(
                &err,
                DescribeError::InvalidResponse { instance_id, .. } if instance_id == "i-0abc"
            ),
            "expected InvalidResponse, got {:?}",
            err
        );
    }

    #[test]
    fn test_instance_url_trims_trailing_slash() {
        let describer =
            HttpInstanceDescriber::new("http://localhost:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            describer.instance_url("i-0abc"),
            "http://localhost:9000/instances/i-0abc"
        );
    }
}
