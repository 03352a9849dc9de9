//! Client for the remote `/predict` service.

use serde::Serialize;
use std::{future::Future, time::Duration};

use crate::error::PredictError;
use crate::normalize::{normalize, PredictionResult};

pub const DEFAULT_METEOR_TYPE: &str = "generic";
pub const DEFAULT_YEAR: i32 = 1950;

/// Wire body of `POST /predict`. Always exactly these four fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictRequest {
    pub velocity: f64,
    pub mass: f64,
    #[serde(rename = "type_meteor")]
    pub meteor_type: String,
    pub year: i32,
}

impl PredictRequest {
    /// Builds a request without ever refusing the input: non-finite numbers
    /// go out as 0 and a blank meteor type as [`DEFAULT_METEOR_TYPE`].
    pub fn new(speed_km_s: f64, mass_kg: f64, meteor_type: Option<&str>, year: i32) -> Self {
        Self {
            velocity: coerce_number("velocity", speed_km_s),
            mass: coerce_number("mass", mass_kg),
            meteor_type: meteor_type_or_default(meteor_type),
            year,
        }
    }

    /// Same policy for raw text input (form fields, CLI strings).
    pub fn from_text(velocity: &str, mass: &str, meteor_type: Option<&str>, year: &str) -> Self {
        Self {
            velocity: parse_number("velocity", velocity),
            mass: parse_number("mass", mass),
            meteor_type: meteor_type_or_default(meteor_type),
            year: parse_year(year),
        }
    }
}

fn coerce_number(name: &'static str, v: f64) -> f64 {
    if v.is_finite() {
        return v;
    }
    tracing::warn!(field = name, value = v, "non-finite request field sent as 0");
    0.0
}

fn parse_number(name: &'static str, s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(v) => coerce_number(name, v),
        Err(_) => {
            tracing::warn!(field = name, input = s, "unparsable request field sent as 0");
            0.0
        }
    }
}

fn parse_year(s: &str) -> i32 {
    let t = s.trim();
    if let Ok(y) = t.parse::<i32>() {
        return y;
    }
    match t.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() < i32::MAX as f64 => v.trunc() as i32,
        _ => {
            tracing::warn!(input = s, "unparsable year sent as {DEFAULT_YEAR}");
            DEFAULT_YEAR
        }
    }
}

fn meteor_type_or_default(t: Option<&str>) -> String {
    match t.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_METEOR_TYPE.to_string(),
    }
}

/// Anything that can answer a prediction request.
pub trait PredictionBackend: Send + Sync + 'static {
    fn predict(
        &self,
        req: PredictRequest,
    ) -> impl Future<Output = Result<PredictionResult, PredictError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// `None` leaves the request unbounded.
    pub timeout: Option<Duration>,
    /// One extra attempt after a connect or timeout failure.
    pub retry_transient: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: None,
            retry_transient: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    client: reqwest::Client,
    endpoint: String,
    retry_transient: bool,
}

impl HttpPredictionClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, PredictError> {
        let url = reqwest::Url::parse(&cfg.base_url)
            .map_err(|e| PredictError::Internal(format!("backend url {:?}: {e}", cfg.base_url)))?;
        let mut builder = reqwest::Client::builder();
        if let Some(t) = cfg.timeout {
            builder = builder.timeout(t);
        }
        // a local backend never goes through HTTP_PROXY
        if matches!(url.host_str(), Some("127.0.0.1" | "localhost" | "[::1]")) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| PredictError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/predict", cfg.base_url.trim_end_matches('/')),
            retry_transient: cfg.retry_transient,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, req: &PredictRequest) -> Result<PredictionResult, PredictError> {
        let resp = self.client.post(&self.endpoint).json(req).send().await?;
        let status = resp.status();

        if !status.is_success() {
            // the status alone is enough to classify the failure
            let body = resp.text().await.unwrap_or_else(|e| {
                tracing::warn!(status = status.as_u16(), error = %e, "error body unreadable");
                String::new()
            });
            return Err(PredictError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| PredictError::Decode(e.to_string()))?;
        Ok(normalize(raw))
    }
}

impl PredictionBackend for HttpPredictionClient {
    async fn predict(&self, req: PredictRequest) -> Result<PredictionResult, PredictError> {
        tracing::info!(endpoint = %self.endpoint, ?req, "sending prediction request");
        match self.attempt(&req).await {
            Err(e) if self.retry_transient && e.is_transient() => {
                tracing::warn!(error = %e, "prediction request failed, retrying once");
                self.attempt(&req).await
            }
            other => other,
        }
    }
}
