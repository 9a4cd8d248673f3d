//! REST API over the plugin host.
//!
//! - `GET  /signalk` discovery
//! - `GET  /signalk/v1/api[/*path]` data model
//! - `PUT  /signalk/v1/api/vessels/<id>/*path` writes, body `{ "value": ..., "source"?: ... }`
//! - `GET  /skServer/plugins` plugin list
//! - `POST /skServer/plugins/:id/config` save configuration and restart

use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use signalk_core::{Path, PathError};
use signalk_plugins::{PluginError, PluginHost, PluginInfo};
use signalk_protocol::{DiscoveryResponse, PutResponse, PutResult, RestPutBody};

pub type AppState = Arc<PluginHost>;

/// Body of `POST /skServer/plugins/:id/config`.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfigBody {
    pub enabled: bool,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

pub fn router(host: AppState) -> Router {
    Router::new()
        .route("/signalk", get(discovery_handler))
        .route("/signalk/v1/api", get(full_api_handler))
        .route("/signalk/v1/api/*path", get(path_handler).put(put_handler))
        .route("/skServer/plugins", get(plugins_handler))
        .route("/skServer/plugins/:id/config", post(plugin_config_handler))
        .with_state(host)
}

async fn discovery_handler() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse::new(
        "",
        "signalk-server-rust",
        env!("CARGO_PKG_VERSION"),
    ))
}

async fn full_api_handler(State(host): State<AppState>) -> Json<serde_json::Value> {
    Json(host.full_model())
}

/// A REST data address below `/signalk/v1/api`.
#[derive(Debug, Clone, PartialEq)]
enum Address {
    /// `vessels/<id>[/path...]`; the id is kept verbatim since URNs carry ':' and '-'
    Vessel { context: String, path: Option<Path> },
    Other(Path),
}

impl Address {
    fn parse(url_path: &str) -> Result<Self, PathError> {
        let segments: Vec<&str> = url_path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["vessels", id, rest @ ..] => {
                let path = if rest.is_empty() {
                    None
                } else {
                    Some(Path::parse(&rest.join("."))?)
                };
                Ok(Address::Vessel {
                    context: format!("vessels.{}", id),
                    path,
                })
            }
            _ => Path::from_url(url_path).map(Address::Other),
        }
    }

    fn full_path(&self) -> String {
        match self {
            Address::Vessel { context, path: Some(path) } => format!("{}.{}", context, path),
            Address::Vessel { context, path: None } => context.clone(),
            Address::Other(path) => path.to_string(),
        }
    }
}

async fn path_handler(
    UrlPath(path): UrlPath<String>,
    State(host): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let address = Address::parse(&path).map_err(|_| StatusCode::NOT_FOUND)?;
    host.get_path(&address.full_path())
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

fn put_response(result: PutResult) -> Response {
    let status =
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let response = PutResponse::new(uuid::Uuid::new_v4().to_string(), result);
    (status, Json(response)).into_response()
}

async fn put_handler(
    UrlPath(path): UrlPath<String>,
    State(host): State<AppState>,
    Json(body): Json<RestPutBody>,
) -> Response {
    let address = match Address::parse(&path) {
        Ok(address) => address,
        Err(e) => return put_response(PutResult::failed(400, e.to_string())),
    };

    match address {
        Address::Vessel {
            context,
            path: Some(target),
        } => put_response(host.put(
            &context,
            target.as_str(),
            &body.value,
            body.source.as_deref(),
        )),
        other => put_response(PutResult::failed(
            400,
            format!("PUT must address a vessel path, got {}", other.full_path()),
        )),
    }
}

async fn plugins_handler(State(host): State<AppState>) -> Json<Vec<PluginInfo>> {
    Json(host.plugins())
}

async fn plugin_config_handler(
    UrlPath(id): UrlPath<String>,
    State(host): State<AppState>,
    Json(body): Json<PluginConfigBody>,
) -> Response {
    match host.configure_plugin(&id, body.enabled, body.configuration) {
        Ok(()) => {
            (StatusCode::OK, format!("Saved configuration for plugin {}", id)).into_response()
        }
        Err(e @ PluginError::UnknownPlugin(_)) => {
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e @ PluginError::InvalidOptions(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Saving configuration for {} failed: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use signalk_core::{MemoryConfigStorage, PluginConfigData};
    use signalk_plugins::ServerApi;
    use signalk_rest_provider::{RestProvider, PLUGIN_ID};
    use tower::ServiceExt;

    const URN: &str = "vessels.urn:mrn:signalk:uuid:test-vessel";

    fn test_host(configuration: Value) -> AppState {
        host_for(URN, configuration)
    }

    fn host_for(self_urn: &str, configuration: Value) -> AppState {
        let storage = MemoryConfigStorage::new().with_plugin(
            PLUGIN_ID,
            PluginConfigData {
                enabled: true,
                configuration,
            },
        );
        let host = Arc::new(PluginHost::new(self_urn, Arc::new(storage)));
        host.add_plugin(Arc::new(RestProvider::new()));
        host.start_all();
        host
    }

    fn depth_options() -> Value {
        json!({
            "limit": 1,
            "restpaths": {"1": {"enabled": true, "prefix": "environment", "label": "depth.alarm", "value": 3.5}}
        })
    }

    fn depth_host() -> AppState {
        test_host(depth_options())
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });
        (status, value)
    }

    #[tokio::test]
    async fn test_discovery() {
        let (status, body) = send(router(depth_host()), Method::GET, "/signalk", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoints"]["v1"]["signalk-http"], "/signalk/v1/api");
    }

    #[tokio::test]
    async fn test_get_path() {
        let (status, body) = send(
            router(depth_host()),
            Method::GET,
            "/signalk/v1/api/vessels/self/environment/depth/alarm",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], 3.5);

        let (status, _) = send(
            router(depth_host()),
            Method::GET,
            "/signalk/v1/api/vessels/self/environment/nothing",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_accepted() {
        let host = depth_host();
        let (status, body) = send(
            router(host.clone()),
            Method::PUT,
            "/signalk/v1/api/vessels/self/environment/depth/alarm",
            Some(json!({"value": 4.0})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "COMPLETED");
        assert_eq!(body["statusCode"], 200);
        assert!(body["requestId"].is_string());
        assert_eq!(host.get_self_path("environment.depth.alarm").unwrap()["value"], 4.0);
    }

    #[tokio::test]
    async fn test_put_type_mismatch() {
        let (status, body) = send(
            router(depth_host()),
            Method::PUT,
            "/signalk/v1/api/vessels/self/environment/depth/alarm",
            Some(json!({"value": "deep"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["message"], "Type mismatch: 'string' doesn't match 'number'");
    }

    #[tokio::test]
    async fn test_put_unregistered_and_malformed() {
        let (status, body) = send(
            router(depth_host()),
            Method::PUT,
            "/signalk/v1/api/vessels/self/environment/other",
            Some(json!({"value": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["state"], "FAILED");

        let (status, _) = send(
            router(depth_host()),
            Method::PUT,
            "/signalk/v1/api/environment/depth/alarm",
            Some(json!({"value": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_vessel_addressed_by_urn() {
        let urn = "vessels.urn:mrn:signalk:uuid:c0d79334-4e25-4245-8892-54e8ccc8021d";
        let host = host_for(urn, depth_options());
        let uri = "/signalk/v1/api/vessels/urn:mrn:signalk:uuid:c0d79334-4e25-4245-8892-54e8ccc8021d/environment/depth/alarm";

        let (status, body) = send(router(host.clone()), Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], 3.5);

        let (status, body) = send(
            router(host.clone()),
            Method::PUT,
            uri,
            Some(json!({"value": 5.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "COMPLETED");
        assert_eq!(host.get_self_path("environment.depth.alarm").unwrap()["value"], 5.0);

        let (status, body) = send(
            router(host),
            Method::GET,
            "/signalk/v1/api/vessels/urn:mrn:signalk:uuid:c0d79334-4e25-4245-8892-54e8ccc8021d",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["environment"]["depth"]["alarm"]["value"], 5.0);
    }

    #[test]
    fn test_address_parse() {
        assert_eq!(
            Address::parse("vessels/urn:mrn:signalk:uuid:a-b/navigation/anchor").unwrap(),
            Address::Vessel {
                context: "vessels.urn:mrn:signalk:uuid:a-b".to_string(),
                path: Some(Path::new("navigation.anchor")),
            }
        );
        assert_eq!(Address::parse("/vessels/self/").unwrap().full_path(), "vessels.self");
        assert_eq!(Address::parse("sources").unwrap(), Address::Other(Path::new("sources")));
        assert!(Address::parse("vessels/self/bad segment").is_err());
    }

    #[tokio::test]
    async fn test_plugin_config_round_trip() {
        let host = test_host(json!({"limit": 0}));

        let (status, body) =
            send(router(host.clone()), Method::GET, "/skServer/plugins", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], PLUGIN_ID);
        assert_eq!(body[0]["statusMessage"], "Started");
        assert!(body[0]["schema"]["properties"].get("restpaths").is_none());

        let (status, _) = send(
            router(host.clone()),
            Method::POST,
            "/skServer/plugins/rest-provider-signalk/config",
            Some(json!({
                "enabled": true,
                "configuration": {
                    "limit": 1,
                    "restpaths": {"1": {"enabled": true, "prefix": "sensors", "label": "bilge.level"}}
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(host.get_self_path("sensors.bilge.level").unwrap()["value"], "waiting ...");

        let (_, body) = send(router(host), Method::GET, "/skServer/plugins", None).await;
        assert_eq!(body[0]["data"]["limit"], 1);
        assert!(body[0]["schema"]["properties"]["restpaths"]["properties"]["1"].is_object());
    }

    #[tokio::test]
    async fn test_plugin_config_unknown_plugin() {
        let (status, _) = send(
            router(depth_host()),
            Method::POST,
            "/skServer/plugins/nope/config",
            Some(json!({"enabled": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
