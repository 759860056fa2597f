//! Change gate
//!
//! Policy hook that can freeze mutations. Uploads consult it before reading
//! the request body.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::config::ChangeGateConfig;
use crate::error::ToolsError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ChangeBlocked(pub String);

impl From<ChangeBlocked> for ToolsError {
    fn from(err: ChangeBlocked) -> Self {
        ToolsError::ChangeBlocked(err.0)
    }
}

#[async_trait]
pub trait ChangeGate: Send + Sync {
    async fn check_allowed(&self) -> Result<(), ChangeBlocked>;
}

/// Gate whose state comes from configuration and can be flipped at runtime
#[derive(Debug)]
pub struct ConfigChangeGate {
    blocked: AtomicBool,
    message: RwLock<String>,
}

impl ConfigChangeGate {
    pub fn new(config: &ChangeGateConfig) -> Self {
        Self {
            blocked: AtomicBool::new(config.blocked),
            message: RwLock::new(config.message.clone()),
        }
    }

    pub fn block(&self, message: impl Into<String>) {
        *self.message.write() = message.into();
        self.blocked.store(true, Ordering::SeqCst);
        tracing::info!("Agent binary changes blocked");
    }

    pub fn unblock(&self) {
        self.blocked.store(false, Ordering::SeqCst);
        tracing::info!("Agent binary changes allowed");
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeGate for ConfigChangeGate {
    async fn check_allowed(&self) -> Result<(), ChangeBlocked> {
        if self.is_blocked() {
            return Err(ChangeBlocked(self.message.read().clone()));
        }
        Ok(())
    }
}
