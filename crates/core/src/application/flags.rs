// Feature Flag Evaluator
// One active provider at a time; provider trouble degrades to catalog defaults

use crate::domain::{FlagContext, FlagKey};
use crate::error::{AppError, Result};
use crate::port::{FlagOverrides, FlagProvider, LocalFlagProvider};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

struct ProviderSlot {
    provider: Arc<dyn FlagProvider>,
    initialized: bool,
}

/// Flag evaluation entry point
pub struct FlagEvaluator {
    slot: RwLock<ProviderSlot>,
    /// Held across `initialize` so concurrent first callers init once
    init_lock: Mutex<()>,
    overrides: FlagOverrides,
}

impl FlagEvaluator {
    /// Evaluator backed by the local provider over `overrides`
    pub fn new(overrides: FlagOverrides) -> Self {
        let local = Arc::new(LocalFlagProvider::new(overrides.clone()));
        Self::with_provider(overrides, local)
    }

    pub fn with_provider(overrides: FlagOverrides, provider: Arc<dyn FlagProvider>) -> Self {
        Self {
            slot: RwLock::new(ProviderSlot {
                provider,
                initialized: false,
            }),
            init_lock: Mutex::new(()),
            overrides,
        }
    }

    /// Swap the active provider; it is initialized on next use
    pub fn set_provider(&self, provider: Arc<dyn FlagProvider>) {
        info!(provider = provider.name(), "Flag provider set");
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = ProviderSlot {
            provider,
            initialized: false,
        };
    }

    pub fn provider_name(&self) -> String {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .provider
            .name()
            .to_string()
    }

    /// Initialize the active provider once; on failure fall back to the local one
    async fn ensure_initialized(&self) -> Arc<dyn FlagProvider> {
        if let Some(ready) = self.initialized_provider() {
            return ready;
        }

        let _init_guard = self.init_lock.lock().await;
        // Another caller may have finished while we waited
        if let Some(ready) = self.initialized_provider() {
            return ready;
        }
        let provider = Arc::clone(
            &self
                .slot
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .provider,
        );

        let init = provider.initialize().await;

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // Provider replaced while initializing: leave the new one alone
        if !Arc::ptr_eq(&slot.provider, &provider) {
            return provider;
        }
        match init {
            Ok(()) => {
                slot.initialized = true;
                provider
            }
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "Flag provider init failed, using defaults"
                );
                let local: Arc<dyn FlagProvider> =
                    Arc::new(LocalFlagProvider::new(self.overrides.clone()));
                slot.provider = Arc::clone(&local);
                slot.initialized = true;
                local
            }
        }
    }

    fn initialized_provider(&self) -> Option<Arc<dyn FlagProvider>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.initialized.then(|| Arc::clone(&slot.provider))
    }

    /// Evaluate through the active provider; errors yield the catalog default
    pub async fn is_enabled(&self, key: FlagKey, ctx: &FlagContext) -> bool {
        let provider = self.ensure_initialized().await;
        let default_value = key.definition().default_value;
        match provider
            .evaluate_boolean(key.as_str(), default_value, ctx)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(flag = %key, error = %e, "Flag evaluation failed, using default");
                default_value
            }
        }
    }

    /// Recognised environment override, else catalog default; never touches the provider
    pub fn is_enabled_sync(&self, key: FlagKey) -> bool {
        self.overrides
            .strict_boolean(key.as_str())
            .unwrap_or_else(|| key.definition().default_value)
    }

    pub async fn get_flag_string(&self, key: &str, default_value: &str, ctx: &FlagContext) -> String {
        let provider = self.ensure_initialized().await;
        provider
            .evaluate_string(key, default_value, ctx)
            .await
            .unwrap_or_else(|e| {
                warn!(flag = key, error = %e, "Flag evaluation failed, using default");
                default_value.to_string()
            })
    }

    pub async fn get_flag_number(&self, key: &str, default_value: f64, ctx: &FlagContext) -> f64 {
        let provider = self.ensure_initialized().await;
        provider
            .evaluate_number(key, default_value, ctx)
            .await
            .unwrap_or_else(|e| {
                warn!(flag = key, error = %e, "Flag evaluation failed, using default");
                default_value
            })
    }

    /// Gate an operation on a flag
    ///
    /// # Errors
    /// `AppError::Forbidden` when the flag is off
    pub async fn require_flag(&self, key: FlagKey, ctx: &FlagContext) -> Result<()> {
        if self.is_enabled(key, ctx).await {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "Feature \"{}\" is not enabled",
            key
        )))
    }

    pub async fn check_flag(&self, key: FlagKey, ctx: &FlagContext) -> bool {
        self.is_enabled(key, ctx).await
    }

    /// Shut the active provider down
    pub async fn shutdown(&self) -> Result<()> {
        let provider = Arc::clone(
            &self
                .slot
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .provider,
        );
        info!(provider = provider.name(), "Shutting down flag provider");
        provider.shutdown().await
    }
}
