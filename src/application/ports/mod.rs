pub mod clock;
pub mod connectivity;
pub mod offline_store;
pub mod remote_backend;

pub use clock::Clock;
pub use connectivity::{ConnectivitySource, ConnectivityState};
pub use offline_store::{OfflineStore, Partition};
pub use remote_backend::{ObjectStorage, RemoteWriteApi, StorageObject};
