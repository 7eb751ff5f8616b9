//! The Cache & Availability Layer (§4.7): shared key-value cache,
//! distributed locks, singleflight dedup, and the availability cache
//! built on top.

pub mod availability;
pub mod distributed_lock;
pub mod key_builder;
pub mod kv;
pub mod singleflight;

pub use availability::{AvailabilityCache, CentralHubClient};
pub use distributed_lock::{DistributedLock, LockGuard};
pub use key_builder::KeyBuilder;
pub use kv::{InMemoryKvCache, KvCache, RedisKvCache};
pub use singleflight::{SingleFlight, SingleFlightError};
