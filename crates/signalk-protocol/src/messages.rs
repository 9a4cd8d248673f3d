//! Protocol message types for PUT requests.
//!
//! A PUT travels in three shapes:
//! - `RestPutBody`: what an HTTP client sends to `/signalk/v1/api/vessels/self/...`
//! - `PutResult`: what a registered handler answers
//! - `PutResponse`: the result stamped with a request id, sent back to the client
//!
//! Messages are serialized as JSON.

use serde::{Deserialize, Serialize};

/// Body of a REST PUT request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestPutBody {
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// PUT request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PutState {
    Completed,
    Pending,
    Failed,
}

/// Outcome of a PUT as decided by the handler that owns the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutResult {
    pub state: PutState,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PutResult {
    /// Write accepted and applied.
    pub fn completed() -> Self {
        Self {
            state: PutState::Completed,
            status_code: 200,
            message: None,
        }
    }

    /// Write processed but refused by the handler.
    pub fn rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            state: PutState::Completed,
            status_code,
            message: Some(message.into()),
        }
    }

    /// Write could not be processed at all (no handler, bad request).
    pub fn failed(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            state: PutState::Failed,
            status_code,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == PutState::Completed && self.status_code < 300
    }
}

/// PUT response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub result: PutResult,
}

impl PutResponse {
    pub fn new(request_id: impl Into<String>, result: PutResult) -> Self {
        Self {
            request_id: request_id.into(),
            result,
        }
    }
}

// ============================================================================
// Discovery Endpoint
// ============================================================================

/// Discovery response for `/signalk` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub endpoints: DiscoveryEndpoints,
    pub server: ServerInfo,
}

/// Endpoints advertised in discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryEndpoints {
    pub v1: DiscoveryV1,
}

/// Version 1 API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryV1 {
    pub version: String,
    #[serde(rename = "signalk-http")]
    pub signalk_http: String,
}

/// Server identity advertised in discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,
    pub version: String,
}

impl DiscoveryResponse {
    /// Create a discovery response advertising the REST API under `base_url`.
    pub fn new(base_url: &str, server_id: &str, server_version: &str) -> Self {
        Self {
            endpoints: DiscoveryEndpoints {
                v1: DiscoveryV1 {
                    version: "1.7.0".to_string(),
                    signalk_http: format!("{}/signalk/v1/api", base_url.trim_end_matches('/')),
                },
            },
            server: ServerInfo {
                id: server_id.to_string(),
                version: server_version.to_string(),
            },
        }
    }
}
