// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expired Login Sweeper
//!
//! Background task that removes abandoned GitHub logins.
//!
//! ## Strategy
//!
//! Every `sweep_interval` (default 5 min) the sweeper drops OAuth states whose
//! expiry has passed. The callback already rejects expired states, so the
//! sweep only bounds table growth when users never come back from GitHub.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, shared with the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{DocumentStore, OAuthStateRepository};

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct OAuthStateSweeper {
    store: Arc<DocumentStore>,
    sweep_interval: Duration,
}

impl OAuthStateSweeper {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "OAuth state sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("OAuth state sweeper shutting down");
                    return;
                }
            }

            self.sweep_once();
        }
    }

    /// Execute one sweep. Returns the number of removed states.
    pub fn sweep_once(&self) -> usize {
        match OAuthStateRepository::new(&self.store).purge_expired(Utc::now()) {
            Ok(purged) => {
                if purged > 0 {
                    debug!(purged, "Swept expired OAuth states");
                }
                purged
            }
            Err(e) => {
                warn!(error = %e, "OAuth state sweep failed");
                0
            }
        }
    }
}
