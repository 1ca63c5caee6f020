use std::time::Duration;

use chrono::NaiveDateTime;
use zeroize::Zeroizing;

use super::dump::ArtifactDump;
use super::envelope::{build_order_envelope, build_period_envelope};
use super::response::parse_order_response;
use super::types::{LabGateway, RemoteResult};
use super::GatewayError;
use crate::config::{ConfigError, RemoteConfig};
use crate::models::remote_key;

const CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Blocking HTTP client for the provider's result service.
///
/// Must be created and dropped outside an async context; the worker moves
/// calls onto blocking threads.
pub struct LabClient {
    endpoint: String,
    login: String,
    passwd: Zeroizing<String>,
    action_order_result: String,
    action_period_result: String,
    client: reqwest::blocking::Client,
    probe_client: reqwest::blocking::Client,
    read_timeout: Duration,
    dump: Option<ArtifactDump>,
}

impl LabClient {
    /// Validate the remote settings and build the HTTP clients.
    pub fn new(config: &RemoteConfig) -> Result<Self, GatewayError> {
        config.validate().map_err(|e| match e {
            ConfigError::Missing(name) => GatewayError::MissingSetting(name),
            other => GatewayError::InvalidSetting(other.to_string()),
        })?;

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let probe_client = reqwest::blocking::Client::builder()
            .connect_timeout(PROBE_TIMEOUT)
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim().to_string(),
            login: config.login.clone(),
            passwd: config.passwd.clone(),
            action_order_result: config.action_order_result.clone(),
            action_period_result: config.action_period_result.clone(),
            client,
            probe_client,
            read_timeout: config.read_timeout,
            dump: None,
        })
    }

    /// Enable the artifact side channel.
    pub fn with_dump(mut self, dump: Option<ArtifactDump>) -> Self {
        self.dump = dump;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Service description URL used by the reachability probe.
    pub fn probe_url(&self) -> String {
        if self.endpoint.contains('?') {
            format!("{}&WSDL", self.endpoint)
        } else {
            format!("{}?WSDL", self.endpoint)
        }
    }

    /// Order-result call that surfaces transport errors.
    /// Faults and provider error messages are part of the returned result.
    pub fn try_fetch_order(
        &self,
        year: i32,
        remote_order_code: &str,
        include_pdf: bool,
    ) -> Result<RemoteResult, GatewayError> {
        let key = remote_key(year, remote_order_code);
        tracing::debug!(order = %key, include_pdf, "Requesting order result");

        let envelope = build_order_envelope(
            &self.login,
            &self.passwd,
            year,
            remote_order_code,
            include_pdf,
        );
        let body = self.post(&self.action_order_result, envelope)?;
        let result = parse_order_response(&body, year, remote_order_code);

        if let Some(dump) = &self.dump {
            dump.order_result(&result);
        }

        if result.success {
            tracing::info!(
                order = %key,
                pdfs = result.pdf_artifacts.len(),
                graphics = result.graphic_artifacts.len(),
                pdf_bytes = result.pdf_artifacts.iter().map(|a| a.len()).sum::<usize>(),
                "Order result retrieved"
            );
        } else {
            tracing::info!(
                order = %key,
                reason = result.error_message.as_deref().unwrap_or(""),
                "Order result not available"
            );
        }
        Ok(result)
    }

    /// Period-result call that surfaces transport errors.
    pub fn try_fetch_period_results(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        include_graphics: bool,
    ) -> Result<String, GatewayError> {
        tracing::debug!(%start, %end, include_graphics, "Requesting period results");

        let envelope = build_period_envelope(&self.login, &self.passwd, start, end, include_graphics);
        let body = self.post(&self.action_period_result, envelope)?;

        if let Some(dump) = &self.dump {
            dump.period_result(start, end, &body);
        }
        tracing::debug!(size = body.len(), "Period results received");
        Ok(body)
    }

    /// POST an envelope and read the body whatever the status.
    /// Error bodies may still carry a parseable fault.
    fn post(&self, action: &str, envelope: String) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), size = body.len(), "Provider answered with error status");
            if body.trim().is_empty() {
                return Err(GatewayError::HttpStatus {
                    status: status.as_u16(),
                });
            }
        }
        Ok(body)
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                after_ms: self.read_timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            GatewayError::Transport(format!("cannot connect to {}", self.endpoint))
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

impl LabGateway for LabClient {
    fn fetch_order(&self, year: i32, remote_order_code: &str, include_pdf: bool) -> RemoteResult {
        match self.try_fetch_order(year, remote_order_code, include_pdf) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    order = %remote_key(year, remote_order_code),
                    error = %e,
                    "Order request failed"
                );
                RemoteResult::failed(year, remote_order_code, e.to_string())
            }
        }
    }

    fn fetch_period_results(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        include_graphics: bool,
    ) -> Option<String> {
        self.try_fetch_period_results(start, end, include_graphics)
            .map_err(|e| tracing::error!(error = %e, "Period request failed"))
            .ok()
    }

    fn check_reachable(&self) -> bool {
        let url = self.probe_url();
        match self.probe_client.get(&url).send() {
            Ok(response) => {
                let reachable = response.status().is_success();
                tracing::info!(status = response.status().as_u16(), reachable, "Provider probe");
                reachable
            }
            Err(e) => {
                tracing::error!(error = %e, "Provider probe failed");
                false
            }
        }
    }
}
