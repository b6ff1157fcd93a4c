use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a room store is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_room_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "room store health check failed");
                return HealthResponse::degraded();
            }
        }
        Err(_) => warn!("room store unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, GameConfig},
        services::test_support::test_state,
        state::AppState,
    };

    #[tokio::test]
    async fn status_reflects_the_room_store() {
        let healthy = test_state(GameConfig::default()).await;
        assert_eq!(health_status(&healthy).await.status, "ok");

        let degraded = AppState::new(AppConfig::default());
        assert_eq!(health_status(&degraded).await.status, "degraded");
    }
}
