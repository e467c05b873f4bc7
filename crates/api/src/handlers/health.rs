//! Health check endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthParams {
    #[serde(default)]
    pub deep: bool,
}

/// GET /health
///
/// The shallow probe answers from memory. `?deep=true` verifies database
/// connectivity (fatal when broken) and the optional cache (degradation
/// only; the limiter falls back to in-process state).
pub async fn health(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> Json<Value> {
    let mut body = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if !params.deep {
        return Json(body);
    }

    let mut checks = serde_json::Map::new();

    match provtrack_db::health_check(&state.pool).await {
        Ok(()) => {
            checks.insert("database".to_string(), json!("ok"));
        }
        Err(e) => {
            checks.insert("database".to_string(), json!(format!("error: {e}")));
            body["status"] = json!("degraded");
        }
    }

    let cache_status = match &state.config.cache_url {
        None => json!("not_configured"),
        Some(url) => match ping_cache(url).await {
            Ok(()) => json!("ok"),
            Err(e) => json!(format!("unavailable: {e}")),
        },
    };
    checks.insert("cache".to_string(), cache_status);

    body["checks"] = Value::Object(checks);
    Json(body)
}

async fn ping_cache(url: &str) -> Result<(), redis::RedisError> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING").query_async::<()>(&mut conn).await
}
