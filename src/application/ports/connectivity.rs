use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

/// オンライン/オフライン遷移の通知元
pub trait ConnectivitySource: Send + Sync {
    fn is_online(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<ConnectivityState>;
}
