use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::binding::RefreshableBinding;
use crate::ConfigResult;

/// Result of a successful refresh, as reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub changed_keys: Vec<String>,
    pub generation: u64,
    pub elapsed_ms: u64,
}

/// Counters describing past refresh attempts
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStats {
    pub attempts: u64,
    pub failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Externally invoked operation that refreshes the binding on demand
pub struct RefreshTrigger {
    binding: Arc<RefreshableBinding>,
    attempts: AtomicU64,
    failures: AtomicU64,
    last: RwLock<(Option<DateTime<Utc>>, Option<String>)>,
}

impl RefreshTrigger {
    pub fn new(binding: Arc<RefreshableBinding>) -> Self {
        Self {
            binding,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last: RwLock::new((None, None)),
        }
    }

    pub fn binding(&self) -> &Arc<RefreshableBinding> {
        &self.binding
    }

    pub async fn trigger(&self) -> ConfigResult<RefreshReport> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        match self.binding.refresh().await {
            Ok(outcome) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(
                    generation = outcome.generation,
                    changed = ?outcome.changed_keys,
                    elapsed_ms,
                    "配置刷新完成"
                );
                self.last.write().await.0 = Some(Utc::now());

                Ok(RefreshReport {
                    changed_keys: outcome.changed_keys,
                    generation: outcome.generation,
                    elapsed_ms,
                })
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %err,
                    kind = err.kind(),
                    generation = self.binding.generation(),
                    "配置刷新失败，保留当前配置"
                );
                self.last.write().await.1 = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn stats(&self) -> RefreshStats {
        let last = self.last.read().await;
        RefreshStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_success: last.0,
            last_error: last.1.clone(),
        }
    }
}
