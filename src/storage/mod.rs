//! State store backends.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;
