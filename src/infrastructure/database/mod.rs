pub mod connection_pool;

pub use connection_pool::ConnectionPool;
pub(crate) use connection_pool::is_memory_url;
