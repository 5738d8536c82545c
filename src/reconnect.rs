// src/reconnect.rs - Bounded, cancellable reconnection to the upstream transport
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ReconnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconnector {
    backoff: Duration,
    max_attempts: u32,
}

impl Reconnector {
    pub fn new(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.reconnect_backoff(), settings.reconnect_attempts)
    }

    /// Call `attempt` until it succeeds, sleeping `backoff` between failures.
    /// Setting `shutdown` to true aborts both an in-flight attempt and the wait.
    pub async fn connect<F, Fut, T, E>(
        &self,
        mut attempt: F,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<T, ReconnectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut last_error = String::new();

        for n in 1..=self.max_attempts {
            if *shutdown.borrow() {
                return Err(ReconnectError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancelled(shutdown) => return Err(ReconnectError::Cancelled),
                outcome = attempt() => outcome,
            };

            match outcome {
                Ok(connection) => {
                    info!(attempt = n, "connected to upstream");
                    return Ok(connection);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        attempt = n,
                        max_attempts = self.max_attempts,
                        "connection failed: {}. Retrying in {:?}",
                        last_error,
                        self.backoff
                    );
                }
            }

            if n < self.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancelled(shutdown) => return Err(ReconnectError::Cancelled),
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }
        }

        Err(ReconnectError::GaveUp {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
