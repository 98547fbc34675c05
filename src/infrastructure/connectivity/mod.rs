use crate::application::ports::connectivity::{ConnectivitySource, ConnectivityState};
use tokio::sync::watch;

/// Connectivity source fed by the platform layer.
///
/// The host calls `set_online` from its own network callbacks; subscribers
/// only see actual transitions.
#[derive(Debug)]
pub struct NetworkMonitor {
    sender: watch::Sender<ConnectivityState>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(ConnectivityState::from_online(initially_online));
        Self { sender }
    }

    /// 状態が変わったときだけ通知する。戻り値は遷移が起きたかどうか
    pub fn set_online(&self, online: bool) -> bool {
        let next = ConnectivityState::from_online(online);
        let changed = self.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!(target: "offline::connectivity", state = ?next, "connectivity changed");
        }
        changed
    }

    pub fn state(&self) -> ConnectivityState {
        *self.sender.borrow()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySource for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.state().is_online()
    }

    fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.sender.subscribe()
    }
}
