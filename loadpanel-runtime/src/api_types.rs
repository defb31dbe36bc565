//! Serde request/response types for the panel HTTP API.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CONCURRENCY, DEFAULT_REQUESTS};

fn default_requests() -> u64 {
    DEFAULT_REQUESTS
}

fn default_concurrency() -> u64 {
    DEFAULT_CONCURRENCY
}

#[derive(Debug, Deserialize)]
pub struct StartLoadRequest {
    /// Targets to bombard; validated non-empty by the supervisor so the
    /// caller gets a structured validation error instead of a decode failure.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_requests")]
    pub requests: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,
    /// Seconds each job's wait is bounded by; 0 or absent means unbounded.
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Serialize)]
pub struct StartLoadResponse {
    pub status: String,
    pub started: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StopLoadRequest {
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StopLoadResponse {
    pub status: String,
    pub stopped: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub status: String,
    pub sandbox_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Container id of the provisioned sandbox, or `"unset"`.
    pub sandbox_id: String,
    pub busy_targets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_defaults() {
        let req: StartLoadRequest = serde_json::from_str(r#"{"targets":["node1"]}"#).unwrap();
        assert_eq!(req.targets, vec!["node1"]);
        assert_eq!(req.requests, DEFAULT_REQUESTS);
        assert_eq!(req.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(req.duration, 0);
    }

    #[test]
    fn start_request_missing_targets_decodes_empty() {
        let req: StartLoadRequest = serde_json::from_str("{}").unwrap();
        assert!(req.targets.is_empty());
    }

    #[test]
    fn start_request_explicit_values() {
        let req: StartLoadRequest = serde_json::from_str(
            r#"{"targets":["node1","node2"],"requests":1000,"concurrency":10,"duration":30}"#,
        )
        .unwrap();
        assert_eq!(req.requests, 1000);
        assert_eq!(req.concurrency, 10);
        assert_eq!(req.duration, 30);
    }
}
