//! Rate limiting logic and state management.

mod backend;
mod clock;
mod limiter;
mod state;
mod store;
mod sweeper;
mod tokens;

pub use backend::Limiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{LimiterSettings, RateLimiter};
pub use state::CounterRecord;
pub use store::StateStore;
pub use sweeper::CleanupSweeper;
pub use tokens::{TokenLimitList, TokenLimitResolver};
