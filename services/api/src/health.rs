//! Developer health checks for the external collaborators.

use crate::config::Config;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use utoipa::ToSchema;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Serialize, ToSchema, Debug)]
pub struct CheckResult {
    pub ok: bool,
    pub details: String,
}

impl CheckResult {
    fn pass(details: impl Into<String>) -> Self {
        Self {
            ok: true,
            details: details.into(),
        }
    }

    fn fail(details: impl Into<String>) -> Self {
        Self {
            ok: false,
            details: details.into(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthReport {
    pub model: CheckResult,
    pub speech: CheckResult,
    pub transcriber: CheckResult,
}

/// Runs the configuration and connectivity checks behind the developer
/// health view. The checks are diagnostic only and never call the billed
/// model endpoint.
pub async fn run_health_checks(config: &Config) -> HealthReport {
    HealthReport {
        model: check_model(config),
        speech: check_speech(config),
        transcriber: check_transcriber(&config.transcriber_url).await,
    }
}

fn check_model(config: &Config) -> CheckResult {
    if config.model_api_key.trim().is_empty() {
        return CheckResult::fail("model API key is empty");
    }
    if let Some(base) = &config.model_api_base {
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return CheckResult::fail(format!("model API base '{base}' is not an http(s) URL"));
        }
    }
    CheckResult::pass(format!("model '{}' configured", config.chat_model))
}

fn check_speech(config: &Config) -> CheckResult {
    let Some(speech) = &config.speech else {
        return CheckResult::fail("speech credentials not configured; playback disabled");
    };
    // A URL in the key field is the classic copy-paste mistake.
    if speech.key.contains("://") {
        return CheckResult::fail("speech key looks like a URL, expected a subscription key");
    }
    CheckResult::pass(format!(
        "voice '{}' in region '{}'",
        speech.voice, speech.region
    ))
}

async fn check_transcriber(url: &str) -> CheckResult {
    let Some(addr) = host_port(url) else {
        return CheckResult::fail(format!("cannot parse transcriber URL '{url}'"));
    };
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => CheckResult::pass(format!("reached {addr}")),
        Ok(Err(error)) => CheckResult::fail(format!("cannot connect to {addr}: {error}")),
        Err(_) => CheckResult::fail(format!("connection to {addr} timed out")),
    }
}

/// Extracts `host:port` from a ws(s):// URL, defaulting the port by scheme.
fn host_port(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    if authority.contains(':') {
        return Some(authority.to_string());
    }
    let default_port = match scheme {
        "wss" | "https" => 443,
        _ => 80,
    };
    Some(format!("{authority}:{default_port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_parses_ws_urls() {
        assert_eq!(
            host_port("ws://localhost:9000/transcribe").as_deref(),
            Some("localhost:9000")
        );
        assert_eq!(
            host_port("wss://stt.example.dk/feed").as_deref(),
            Some("stt.example.dk:443")
        );
        assert_eq!(host_port("ws://host/path").as_deref(), Some("host:80"));
        assert_eq!(host_port("not a url"), None);
        assert_eq!(host_port("ws:///path"), None);
    }

    #[tokio::test]
    async fn transcriber_check_fails_on_unreachable_address() {
        let result = check_transcriber("ws://127.0.0.1:1/transcribe").await;
        assert!(!result.ok);
    }
}
