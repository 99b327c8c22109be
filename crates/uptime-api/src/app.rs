use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;
use crate::routes;
use crate::state::AppState;

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// `["*"]` (or any list containing `*`) means every origin.
    pub fn from_config(origins: &[String]) -> Self {
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::List(origins.to_vec())
        }
    }

    fn layer(&self) -> CorsLayer {
        match self {
            Self::Any => CorsLayer::permissive(),
            Self::List(origins) => {
                let allowed: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|o| match HeaderValue::from_str(o) {
                        Ok(v) => Some(v),
                        Err(_) => {
                            tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                            None
                        }
                    })
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(allowed))
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_credentials(true)
            }
        }
    }
}

impl Default for CorsOrigins {
    fn default() -> Self {
        Self::Any
    }
}

pub fn build_app(state: AppState, cors: &CorsOrigins) -> Router {
    let api_v1 = routes::router();

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/", get(root))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors.layer())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "uptime-monitor" }))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_means_any_origin() {
        assert_eq!(CorsOrigins::from_config(&["*".to_string()]), CorsOrigins::Any);
        assert_eq!(CorsOrigins::from_config(&[]), CorsOrigins::Any);
    }

    #[test]
    fn explicit_origins_are_kept() {
        let origins = vec!["https://status.acme.example".to_string()];
        assert_eq!(
            CorsOrigins::from_config(&origins),
            CorsOrigins::List(origins.clone())
        );
    }
}
