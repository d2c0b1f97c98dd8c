//! HTTP delivery of encoded payloads, either directly to the intake
//! (agentless mode) or through a local proxy agent.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Client;

use crate::config::WireConfig;
use crate::error::{Result, WireError};

/// Intake subdomain for test-cycle payloads.
pub const TEST_CYCLE_SUBDOMAIN: &str = "testcycle-intake";
/// API path for test-cycle payloads.
pub const TEST_CYCLE_PATH: &str = "api/v2/testcycle";
/// Proxy path prefix used when delivering through the local agent.
pub const INTAKE_PROXY_PATH: &str = "intake-proxy/v2";

const HEADER_API_KEY: &str = "x-vigil-api-key";
const HEADER_SUBDOMAIN: &str = "x-vigil-subdomain";
const HEADER_META_LANG: &str = "x-vigil-meta-lang";
const HEADER_META_PLATFORM: &str = "x-vigil-meta-platform";
const HEADER_META_LIBRARY_VERSION: &str = "x-vigil-meta-library-version";
const HEADER_CONTAINER_ID: &str = "x-vigil-container-id";

/// Something that can deliver one encoded envelope.
///
/// `body` is the uncompressed msgpack bytes; implementations own any
/// transfer encoding they apply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: Bytes) -> Result<()>;

    /// Target description, for logging.
    fn endpoint(&self) -> &str;
}

/// The production transport: gzip-compressed HTTP POST with msgpack bodies.
pub struct IntakeTransport {
    client: Client,
    url: String,
    headers: Vec<(&'static str, String)>,
}

impl IntakeTransport {
    pub fn new(config: &WireConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WireError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut headers: Vec<(&'static str, String)> = vec![
            (HEADER_META_LANG, "rust".to_string()),
            (
                HEADER_META_PLATFORM,
                format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            ),
            (
                HEADER_META_LIBRARY_VERSION,
                env!("CARGO_PKG_VERSION").to_string(),
            ),
        ];
        if let Some(cid) = &config.container_id {
            headers.push((HEADER_CONTAINER_ID, cid.clone()));
        }

        let url = if config.agentless {
            let key = config.api_key.clone().ok_or_else(|| {
                WireError::Config(format!(
                    "agentless delivery requires an API key ({})",
                    crate::config::ENV_API_KEY
                ))
            })?;
            headers.push((HEADER_API_KEY, key));
            match &config.intake_url {
                Some(base) => format!("{}/{}", base.trim_end_matches('/'), TEST_CYCLE_PATH),
                None => format!(
                    "https://{}.{}/{}",
                    TEST_CYCLE_SUBDOMAIN, config.site, TEST_CYCLE_PATH
                ),
            }
        } else {
            headers.push((HEADER_SUBDOMAIN, TEST_CYCLE_SUBDOMAIN.to_string()));
            format!(
                "{}/{}/{}",
                config.agent_url.trim_end_matches('/'),
                INTAKE_PROXY_PATH,
                TEST_CYCLE_PATH
            )
        };

        Ok(Self {
            client,
            url,
            headers,
        })
    }
}

#[async_trait]
impl Transport for IntakeTransport {
    async fn send(&self, body: Bytes) -> Result<()> {
        let compressed = gzip(&body)?;

        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", "application/msgpack")
            .header("content-encoding", "gzip")
            .body(compressed);
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(1000)
                .collect();
            return Err(WireError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// A transport that drops everything. Used when delivery cannot be
/// configured; tests still run, only telemetry is lost.
pub struct DiscardTransport;

#[async_trait]
impl Transport for DiscardTransport {
    async fn send(&self, _body: Bytes) -> Result<()> {
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "discard"
    }
}

fn gzip(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}
