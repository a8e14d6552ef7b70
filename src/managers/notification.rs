//! End-of-run hook notifications
//!
//! Exactly one outbound call per run. A successful run without attached logs
//! is a plain GET on the success URL (Healthchecks and Uptime Kuma style
//! pings); everything else is a POST with a JSON report.

use super::backup::RunReport;
use crate::config::HookConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest log excerpt attached to a hook call; the tail is kept
const MAX_LOG_CHARS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookRequest {
    pub method: HookMethod,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

/// Delivers hook requests
pub trait HookTransport: Send + Sync {
    fn send(&self, request: &HookRequest) -> Result<()>;
}

/// HTTP delivery with reqwest's blocking client
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HookTransport for HttpTransport {
    fn send(&self, request: &HookRequest) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let builder = match request.method {
            HookMethod::Get => client.get(&request.url),
            HookMethod::Post => client.post(&request.url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .with_context(|| format!("Failed to call hook {}", request.url))?;

        let status = response.status();
        if status.is_success() {
            debug!("Hook {} answered {}", request.url, status);
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Hook {} failed with status {}: {}", request.url, status, body.trim())
        }
    }
}

/// JSON body of a POST hook call
#[derive(Debug, Serialize)]
pub struct HookPayload {
    pub success: bool,
    pub started_at: String,
    pub finished_at: String,
    pub duration_seconds: f64,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub targets: Vec<TargetPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TargetPayload {
    pub name: String,
    pub engine: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HookPayload {
    pub fn from_report(report: &RunReport, logs: Option<String>) -> Self {
        let targets = report
            .outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(artifact) => TargetPayload {
                    name: outcome.target_name.clone(),
                    engine: outcome.engine.to_string(),
                    success: true,
                    file: Some(artifact.file_name.clone()),
                    bytes: Some(artifact.bytes),
                    s3_key: artifact.s3_key.clone(),
                    warning: artifact.is_empty().then(|| "empty dump".to_string()),
                    error: None,
                },
                Err(e) => TargetPayload {
                    name: outcome.target_name.clone(),
                    engine: outcome.engine.to_string(),
                    success: false,
                    file: None,
                    bytes: None,
                    s3_key: None,
                    warning: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Self {
            success: report.success(),
            started_at: report.started_at.to_rfc3339(),
            finished_at: report.finished_at.to_rfc3339(),
            duration_seconds: report.duration().as_secs_f64(),
            summary: report.summary(),
            error: report.error.clone(),
            targets,
            logs: logs.map(|l| tail_chars(&l, MAX_LOG_CHARS)),
        }
    }
}

/// Sends the end-of-run hook
#[derive(Clone)]
pub struct NotificationManager {
    success_url: Option<String>,
    failure_url: Option<String>,
    include_logs: bool,
    transport: Arc<dyn HookTransport>,
}

impl NotificationManager {
    /// Manager delivering over HTTP
    pub fn new(config: &HookConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new(config.timeout())))
    }

    pub fn with_transport(config: &HookConfig, transport: Arc<dyn HookTransport>) -> Self {
        Self {
            success_url: config.success_url(),
            failure_url: config.failure_url(),
            include_logs: config.include_logs,
            transport,
        }
    }

    pub fn include_logs(&self) -> bool {
        self.include_logs
    }

    /// The call to make for a finished run, if a URL is configured for it
    pub fn build_request(&self, report: &RunReport, logs: Option<String>) -> Option<HookRequest> {
        let success = report.success();
        let url = if success {
            self.success_url.clone()
        } else {
            self.failure_url.clone()
        }?;

        let logs = if self.include_logs { logs } else { None };

        if success && logs.is_none() {
            return Some(HookRequest {
                method: HookMethod::Get,
                url,
                body: None,
            });
        }

        let payload = HookPayload::from_report(report, logs);
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize hook payload: {}", e);
                serde_json::json!({ "success": success, "summary": payload.summary })
            }
        };

        Some(HookRequest {
            method: HookMethod::Post,
            url,
            body: Some(body),
        })
    }

    /// Deliver a request. Failures are logged and never retried.
    pub fn deliver(&self, request: &HookRequest) {
        match self.transport.send(request) {
            Ok(()) => info!("Notified hook {}", request.url),
            Err(e) => warn!("Failed to notify hook: {:#}", e),
        }
    }
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skip = count - max_chars;
    let mut tail = String::from("[...]\n");
    tail.extend(text.chars().skip(skip));
    tail
}

/// Format duration in human-readable form
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, secs)
        }
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every request instead of sending it
    #[derive(Clone, Default)]
    pub struct MockTransport {
        pub requests: Arc<Mutex<Vec<HookRequest>>>,
        should_fail: Arc<Mutex<bool>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure every delivery to fail
        pub fn with_failure(self) -> Self {
            *self.should_fail.lock().unwrap() = true;
            self
        }

        pub fn get_requests(&self) -> Vec<HookRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HookTransport for MockTransport {
        fn send(&self, request: &HookRequest) -> Result<()> {
            self.requests.lock().unwrap().push(request.clone());
            if *self.should_fail.lock().unwrap() {
                anyhow::bail!("Mock hook failure");
            }
            Ok(())
        }
    }
}
