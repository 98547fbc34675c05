use crate::application::ports::connectivity::{ConnectivitySource, ConnectivityState};
use crate::application::services::sync::{PassTrigger, SyncEngine};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// オンライン復帰で同期を起動し、オフライン化で予約済みの同期を取り消す
///
/// The watcher never runs a pass itself; it only asks the engine, whose
/// guard keeps passes from overlapping.
pub struct ConnectivityWatcher {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityWatcher {
    pub fn spawn(
        source: Arc<dyn ConnectivitySource>,
        engine: Arc<SyncEngine>,
        settle_delay: Duration,
    ) -> Self {
        let receiver = source.subscribe();
        let handle = tokio::spawn(watch_loop(source, engine, receiver, settle_delay));
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    pub fn stop(&self) {
        if let Ok(mut slot) = self.handle.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }
}

impl Drop for ConnectivityWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn watch_loop(
    source: Arc<dyn ConnectivitySource>,
    engine: Arc<SyncEngine>,
    mut receiver: watch::Receiver<ConnectivityState>,
    settle_delay: Duration,
) {
    while receiver.changed().await.is_ok() {
        let state = *receiver.borrow_and_update();
        match state {
            ConnectivityState::Online => {
                tracing::debug!(
                    target: "offline::connectivity",
                    settle_ms = settle_delay.as_millis() as u64,
                    "back online, waiting for the network to settle"
                );
                match settle(&mut receiver, settle_delay).await {
                    Settle::Stable if source.is_online() => {
                        tracing::info!(target: "offline::connectivity", "network settled, triggering sync");
                        engine.trigger(PassTrigger::Connectivity);
                    }
                    Settle::Stable => {}
                    Settle::WentOffline => went_offline(&engine),
                    Settle::Closed => break,
                }
            }
            ConnectivityState::Offline => went_offline(&engine),
        }
    }
    tracing::debug!(target: "offline::connectivity", "connectivity source closed");
}

enum Settle {
    Stable,
    WentOffline,
    Closed,
}

async fn settle(receiver: &mut watch::Receiver<ConnectivityState>, delay: Duration) -> Settle {
    let deadline = Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return Settle::Stable,
            changed = receiver.changed() => {
                if changed.is_err() {
                    return Settle::Closed;
                }
                if !receiver.borrow_and_update().is_online() {
                    return Settle::WentOffline;
                }
            }
        }
    }
}

fn went_offline(engine: &SyncEngine) {
    tracing::info!(target: "offline::connectivity", "offline, cancelling scheduled sync");
    engine.cancel_scheduled();
}
