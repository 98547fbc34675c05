use chrono::{DateTime, Utc};
use std::fmt;

/// Wall-clock source, injected so backoff windows can be tested.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}
