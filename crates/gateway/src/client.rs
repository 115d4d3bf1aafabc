//! Live gateway talking to the JDownloader local HTTP API

use crate::traits::DeliveryGateway;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use types::{
    utils::sanitize_for_logging, AddContainerRequest, AddLinksRequest, BridgeError,
    ContainerType, GatewayError, GatewayResult, JdErrorResponse, Result,
};

const GATEWAY_NAME: &str = "jdownloader";

/// HTTP client for a JDownloader instance with the deprecated local API enabled
#[derive(Debug, Clone)]
pub struct LiveGateway {
    base_url: String,
    http_client: Client,
}

impl LiveGateway {
    /// Create a new live gateway; `timeout` caps every request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jd-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> GatewayResult<()> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        acknowledge(response).await
    }

    /// Older JD builds only expose `linkcollector/addLinks`, taking the links
    /// comma separated in the query string
    async fn post_legacy_links(&self, links: &[String]) -> GatewayResult<()> {
        let url = format!("{}/linkcollector/addLinks", self.base_url);
        let joined = links.join(",");

        let response = self
            .http_client
            .post(&url)
            .query(&[
                ("links", joined.as_str()),
                ("autostart", "false"),
                ("deepDecrypt", "true"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        acknowledge(response).await
    }
}

#[async_trait]
impl DeliveryGateway for LiveGateway {
    async fn probe_online(&self) -> bool {
        let url = format!("{}/help", self.base_url);
        match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "JDownloader probe returned non-success status");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "JDownloader probe failed");
                false
            }
        }
    }

    async fn deliver_links(
        &self,
        links: &[String],
        name: Option<&str>,
        password: Option<&str>,
    ) -> GatewayResult<()> {
        let request = AddLinksRequest::new(links, name, password);

        tracing::info!(
            package = name.unwrap_or("-"),
            link_count = links.len(),
            first_link = %links.first().map(|l| sanitize_for_logging(l)).unwrap_or_default(),
            "Delivering links to JDownloader"
        );

        match self.post_json("/linkgrabberv2/addLinks", &request).await {
            Err(GatewayError::HttpError { status, .. }) if (400..500).contains(&status) => {
                tracing::warn!(status, "linkgrabberv2/addLinks refused, falling back to linkcollector/addLinks");
                self.post_legacy_links(links).await?;
            }
            result => result?,
        }
        tracing::debug!(package = name.unwrap_or("-"), "Links acknowledged");
        Ok(())
    }

    async fn deliver_container(&self, filename: &str, payload: &[u8]) -> GatewayResult<()> {
        let kind = ContainerType::from_filename(filename);
        let request = AddContainerRequest::new(kind, STANDARD.encode(payload));

        tracing::info!(
            filename = %filename,
            container_type = kind.as_str(),
            size = payload.len(),
            "Delivering container to JDownloader"
        );

        self.post_json("/linkgrabberv2/addContainer", &request).await?;
        tracing::debug!(filename = %filename, "Container acknowledged");
        Ok(())
    }

    fn name(&self) -> &str {
        GATEWAY_NAME
    }
}

async fn acknowledge(response: reqwest::Response) -> GatewayResult<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::HttpError {
            target: GATEWAY_NAME.to_string(),
            status: status.as_u16(),
        });
    }

    let raw_text = response.text().await.map_err(|e| GatewayError::InvalidResponse {
        target: GATEWAY_NAME.to_string(),
        message: format!("error reading response body: {}", e),
    })?;

    parse_acknowledgement(&raw_text)
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::ConnectionTimeout {
            target: GATEWAY_NAME.to_string(),
        }
    } else if let Some(status) = e.status() {
        GatewayError::HttpError {
            target: GATEWAY_NAME.to_string(),
            status: status.as_u16(),
        }
    } else {
        GatewayError::ConnectionFailed {
            target: GATEWAY_NAME.to_string(),
            message: e.to_string(),
        }
    }
}

/// Interpret a 2xx body. JD signals failures in-band with an error object
/// such as `{"src":"DEVICE","type":"BAD_PARAMETERS"}`; anything else counts
/// as an acknowledgement, including empty and non-JSON bodies.
fn parse_acknowledgement(raw_text: &str) -> GatewayResult<()> {
    let trimmed = raw_text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Ok(()),
    };

    let has_data = value.get("data").map(|d| !d.is_null()).unwrap_or(false);
    if has_data || value.get("type").is_none() {
        return Ok(());
    }

    let reason = match serde_json::from_value::<JdErrorResponse>(value) {
        Ok(err) => match err.src {
            Some(src) => format!("{} ({})", err.kind, src),
            None => err.kind,
        },
        Err(e) => format!("unrecognised error object: {} | raw: {}", e, trimmed),
    };

    Err(GatewayError::Rejected {
        target: GATEWAY_NAME.to_string(),
        reason,
    })
}
