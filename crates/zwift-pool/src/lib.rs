//! Multi-credential connection pool for the Zwift services
//!
//! Holds one bearer-auth client and one cookie-auth client per credential,
//! with independent round-robin cursors per client type.
//!
//! Selection:
//! 1. `next_api()` / `next_power()` rotate exposure without touching auth state
//! 2. `next_api_authenticated()` / `next_power_authenticated()` probe the ring
//!    starting after the cursor, lazily authenticating, and fail with
//!    `Exhausted` after exactly one full rotation
//! 3. A successful probe parks the cursor on the winning slot, so load keeps
//!    rotating across credentials between calls

pub mod error;
pub mod pool;

pub use error::{Error, Result};
pub use pool::{ConnectionPool, PoolOptions};
