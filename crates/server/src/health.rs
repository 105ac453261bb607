use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use basketbot_db::DbPool;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

/// Set while the Telegram polling loop is running.
#[derive(Clone, Debug, Default)]
pub struct PollingFlag(Arc<AtomicBool>);

impl PollingFlag {
    pub fn set(&self, running: bool) {
        self.0.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    polling: PollingFlag,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub telegram: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, polling: PollingFlag) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, polling })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    polling: PollingFlag,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, polling)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Ready when the database answers and polling is running. A stopped poller reports
/// `degraded` so an orchestrator can restart the process.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let telegram = if state.polling.is_running() {
        HealthCheck { status: "ready", detail: "long polling active".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "long polling is not running".to_string() }
    };
    let ready = database.status == "ready" && telegram.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "basketbot-server runtime initialized".to_string(),
        },
        database,
        telegram,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::{extract::State, Json};
    use basketbot_db::connect_with_settings;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState, PollingFlag};

    fn running() -> PollingFlag {
        let flag = PollingFlag::default();
        flag.set(true);
        flag
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_and_polling_are_up() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), polling: running() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.telegram.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, polling: running() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn stopped_polling_degrades_the_route() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let app = router(pool.clone(), PollingFlag::default());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(payload["telegram"]["status"], "degraded");
        assert_eq!(payload["database"]["status"], "ready");

        pool.close().await;
    }
}
