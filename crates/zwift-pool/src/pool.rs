//! Round-robin connection pool with failover-on-authenticate
//!
//! One bearer client and one cookie client per credential, built at
//! construction. `next_*` rotates exposure of already-constructed clients;
//! `next_*_authenticated` probes the ring for the first candidate that
//! authenticates, so a locked-out or rate-limited primary credential fails
//! over to a secondary within one rotation.
//!
//! Cursors are plain atomics: concurrent callers may interleave updates, which
//! perturbs fairness but never selection validity (every value is reduced
//! modulo the pool size).

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Credentials, PoolConfig};
use tracing::{debug, info, warn};
use zwift_api::{ZwiftApi, ZwiftApiOptions};
use zwiftpower_api::{ZwiftPowerApi, ZwiftPowerOptions};

use crate::error::{Error, Result};

/// Construction options for a pool, mostly useful to point the clients at
/// non-production hosts.
#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    pub api: ZwiftApiOptions,
    pub power: ZwiftPowerOptions,
}

/// Multi-credential connection pool for both services.
#[derive(Debug)]
pub struct ConnectionPool {
    api_clients: Vec<ZwiftApi>,
    power_clients: Vec<ZwiftPowerApi>,
    api_cursor: AtomicUsize,
    power_cursor: AtomicUsize,
}

impl ConnectionPool {
    /// Build one client pair per credential. Fails with `NoCredentials` when
    /// the slice is empty.
    pub fn new(credentials: &[Credentials]) -> Result<Self> {
        Self::with_options(credentials, PoolOptions::default())
    }

    pub fn with_options(credentials: &[Credentials], options: PoolOptions) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::NoCredentials);
        }

        let mut api_clients = Vec::with_capacity(credentials.len());
        let mut power_clients = Vec::with_capacity(credentials.len());
        for creds in credentials {
            api_clients.push(
                ZwiftApi::with_options(
                    creds.username.clone(),
                    creds.password.expose().clone(),
                    options.api.clone(),
                )
                .map_err(|e| Error::Client(e.to_string()))?,
            );
            power_clients.push(
                ZwiftPowerApi::with_options(
                    creds.username.clone(),
                    creds.password.expose().clone(),
                    options.power.clone(),
                )
                .map_err(|e| Error::Client(e.to_string()))?,
            );
        }

        info!(connections = api_clients.len(), "connection pool constructed");
        Ok(Self {
            api_clients,
            power_clients,
            api_cursor: AtomicUsize::new(0),
            power_cursor: AtomicUsize::new(0),
        })
    }

    /// Build a pool from a loaded configuration file.
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::new(&config.credentials)
    }

    /// Number of credential slots.
    pub fn len(&self) -> usize {
        self.api_clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.api_clients.is_empty()
    }

    /// Rotate to the next bearer client. No authentication side effect.
    pub fn next_api(&self) -> ZwiftApi {
        let idx = advance(&self.api_cursor, self.api_clients.len());
        debug!(index = idx, "returning API connection");
        self.api_clients[idx].clone()
    }

    /// Rotate to the next cookie client. No authentication side effect.
    pub fn next_power(&self) -> ZwiftPowerApi {
        let idx = advance(&self.power_cursor, self.power_clients.len());
        debug!(index = idx, "returning power connection");
        self.power_clients[idx].clone()
    }

    /// First bearer client in rotation order that authenticates.
    pub async fn next_api_authenticated(&self) -> Result<ZwiftApi> {
        probe_ring(&self.api_clients, &self.api_cursor).await
    }

    /// First cookie client in rotation order that authenticates.
    pub async fn next_power_authenticated(&self) -> Result<ZwiftPowerApi> {
        probe_ring(&self.power_clients, &self.power_cursor).await
    }
}

/// Advance a cursor to `(cursor + 1) % n` and return the new index.
fn advance(cursor: &AtomicUsize, n: usize) -> usize {
    let next = (cursor.load(Ordering::Relaxed) + 1) % n;
    cursor.store(next, Ordering::Relaxed);
    next
}

/// A pool slot that can be probed for liveness.
trait PoolClient: Clone {
    fn label(&self) -> &str;
    async fn is_live(&self) -> bool;
    async fn try_authenticate(&self) -> bool;
}

impl PoolClient for ZwiftApi {
    fn label(&self) -> &str {
        self.username()
    }

    async fn is_live(&self) -> bool {
        self.is_authenticated().await
    }

    async fn try_authenticate(&self) -> bool {
        match self.authenticate(None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(username = self.username(), error = %e, "pool candidate failed to authenticate");
                false
            }
        }
    }
}

impl PoolClient for ZwiftPowerApi {
    fn label(&self) -> &str {
        self.username()
    }

    async fn is_live(&self) -> bool {
        self.is_authenticated().await
    }

    async fn try_authenticate(&self) -> bool {
        match self.authenticate(None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(username = self.username(), error = %e, "pool candidate failed to authenticate");
                false
            }
        }
    }
}

/// Probe up to `n` candidates starting after the cursor; the first that is
/// already live or freshly authenticates becomes the cursor position. One
/// full rotation without success exhausts the pool; the loop is bounded and
/// no slot is probed twice.
async fn probe_ring<C: PoolClient>(clients: &[C], cursor: &AtomicUsize) -> Result<C> {
    let n = clients.len();
    let start = (cursor.load(Ordering::Relaxed) + 1) % n;

    for offset in 0..n {
        let idx = (start + offset) % n;
        let client = &clients[idx];
        if client.is_live().await || client.try_authenticate().await {
            cursor.store(idx, Ordering::Relaxed);
            debug!(index = idx, username = client.label(), "pool candidate authenticated");
            return Ok(client.clone());
        }
        debug!(index = idx, username = client.label(), "trying next pool candidate");
    }

    Err(Error::Exhausted { tried: n })
}
