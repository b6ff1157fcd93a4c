use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a room store installed in the shared state.
///
/// Connects with exponential backoff, then polls the store health. While the
/// store is unreachable the application runs in degraded mode.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_room_store(store.clone()).await;
                info!("room store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;
                warn!("room store lost; connecting again");
            }
            Err(err) => {
                warn!(error = %err, "room store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it stays unreachable after every reconnect attempt.
async fn watch_health(state: &SharedState, store: &dyn RoomStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("room store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "room store health check failed");
                if !reconnect(state, store).await {
                    warn!("exhausted room store reconnect attempts; staying in degraded mode");
                    return;
                }
                state.update_degraded(false);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn RoomStore) -> bool {
    let mut backoff = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "room store reconnected");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "room store reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "room store reconnect failed");
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{ChatEntity, RoomEntity},
            room_store::memory::MemoryRoomStore,
            storage::StorageResult,
        },
        state::AppState,
    };

    /// Memory store whose reachability is toggled by the test.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryRoomStore,
        down: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn reachability(&self) -> StorageResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(StorageError::unavailable(
                    "store is down".into(),
                    std::io::Error::other("connection refused"),
                ))
            } else {
                Ok(())
            }
        }
    }

    impl RoomStore for FlakyStore {
        fn load_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.load_room(room_id)
        }

        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_room(room)
        }

        fn load_chat(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<ChatEntity>>> {
            self.inner.load_chat(room_id)
        }

        fn save_chat(&self, chat: ChatEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_chat(chat)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = self.reachability();
            Box::pin(async move { result })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = self.reachability();
            Box::pin(async move { result })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_mode_follows_store_health() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());

        let store = Arc::new(FlakyStore::default());
        let down = store.down.clone();
        let supervisor = {
            let store = store.clone();
            tokio::spawn(run(state.clone(), move || {
                let store: Arc<dyn RoomStore> = store.clone();
                async move { Ok(store) }
            }))
        };

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());
        assert!(state.require_room_store().await.is_ok());

        down.store(true, Ordering::SeqCst);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded());
        assert!(state.require_room_store().await.is_err());

        down.store(false, Ordering::SeqCst);
        sleep(MAX_DELAY * 3).await;
        assert!(!state.is_degraded());

        supervisor.abort();
    }
}
