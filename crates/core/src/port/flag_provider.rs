// Feature Flag Provider Port
// Swap flag backends (environment, remote service) without touching call sites

use crate::domain::flag::{env_var_for, FlagContext, FlagKey};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Flag evaluation backend
///
/// Implementations:
/// - LocalFlagProvider: environment overrides + catalog defaults, no I/O
#[async_trait]
pub trait FlagProvider: Send + Sync {
    /// Provider name (for logs)
    fn name(&self) -> &str;

    /// One-time setup (connect, warm cache)
    async fn initialize(&self) -> Result<()>;

    async fn evaluate_boolean(
        &self,
        key: &str,
        default_value: bool,
        ctx: &FlagContext,
    ) -> Result<bool>;

    async fn evaluate_string(
        &self,
        key: &str,
        default_value: &str,
        ctx: &FlagContext,
    ) -> Result<String>;

    async fn evaluate_number(&self, key: &str, default_value: f64, ctx: &FlagContext)
        -> Result<f64>;

    /// Release resources
    async fn shutdown(&self) -> Result<()>;
}

/// Raw `FLAG_<KEY>` values captured from the environment at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    values: HashMap<String, String>,
}

impl FlagOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every `FLAG_*` variable of the process environment
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars().filter(|(k, _)| k.starts_with("FLAG_")))
    }

    /// Build from `(ENV_VAR_NAME, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set an override for a flag key (builder style)
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(env_var_for(key), value.into());
        self
    }

    /// Raw override for a flag key; empty values count as unset
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values
            .get(&env_var_for(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// `true`/`1` enable, anything else disables
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.raw(key).map(|v| v == "true" || v == "1")
    }

    /// `true`/`1` and `false`/`0` only; any other value is no override
    pub fn strict_boolean(&self, key: &str) -> Option<bool> {
        match self.raw(key)? {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Environment-variable provider: deterministic, always available
pub struct LocalFlagProvider {
    overrides: FlagOverrides,
}

impl LocalFlagProvider {
    pub fn new(overrides: FlagOverrides) -> Self {
        Self { overrides }
    }
}

#[async_trait]
impl FlagProvider for LocalFlagProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn evaluate_boolean(
        &self,
        key: &str,
        default_value: bool,
        _ctx: &FlagContext,
    ) -> Result<bool> {
        if let Some(value) = self.overrides.boolean(key) {
            return Ok(value);
        }
        Ok(key
            .parse::<FlagKey>()
            .map(|k| k.definition().default_value)
            .unwrap_or(default_value))
    }

    async fn evaluate_string(
        &self,
        key: &str,
        default_value: &str,
        _ctx: &FlagContext,
    ) -> Result<String> {
        Ok(self
            .overrides
            .raw(key)
            .unwrap_or(default_value)
            .to_string())
    }

    async fn evaluate_number(
        &self,
        key: &str,
        default_value: f64,
        _ctx: &FlagContext,
    ) -> Result<f64> {
        Ok(self
            .overrides
            .raw(key)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .unwrap_or(default_value))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Remote-style provider with fixed answers and configurable faults
    pub struct StaticFlagProvider {
        name: String,
        booleans: HashMap<String, bool>,
        fail_init: bool,
        fail_evaluate: bool,
        init_delay: Option<Duration>,
        init_calls: AtomicU32,
        shutdown_calls: AtomicU32,
    }

    impl StaticFlagProvider {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                booleans: HashMap::new(),
                fail_init: false,
                fail_evaluate: false,
                init_delay: None,
                init_calls: AtomicU32::new(0),
                shutdown_calls: AtomicU32::new(0),
            }
        }

        pub fn with_flag(mut self, key: FlagKey, value: bool) -> Self {
            self.booleans.insert(key.as_str().to_string(), value);
            self
        }

        pub fn failing_init(mut self) -> Self {
            self.fail_init = true;
            self
        }

        /// Make `initialize` take a while, to overlap concurrent callers
        pub fn with_init_delay(mut self, delay: Duration) -> Self {
            self.init_delay = Some(delay);
            self
        }

        pub fn failing_evaluate(mut self) -> Self {
            self.fail_evaluate = true;
            self
        }

        pub fn init_calls(&self) -> u32 {
            self.init_calls.load(Ordering::SeqCst)
        }

        pub fn shutdown_calls(&self) -> u32 {
            self.shutdown_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FlagProvider for StaticFlagProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn initialize(&self) -> Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.init_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_init {
                return Err(AppError::Internal("flag service unreachable".to_string()));
            }
            Ok(())
        }

        async fn evaluate_boolean(
            &self,
            key: &str,
            default_value: bool,
            _ctx: &FlagContext,
        ) -> Result<bool> {
            if self.fail_evaluate {
                return Err(AppError::Internal("evaluation failed".to_string()));
            }
            Ok(self.booleans.get(key).copied().unwrap_or(default_value))
        }

        async fn evaluate_string(
            &self,
            _key: &str,
            default_value: &str,
            _ctx: &FlagContext,
        ) -> Result<String> {
            if self.fail_evaluate {
                return Err(AppError::Internal("evaluation failed".to_string()));
            }
            Ok(default_value.to_string())
        }

        async fn evaluate_number(
            &self,
            _key: &str,
            default_value: f64,
            _ctx: &FlagContext,
        ) -> Result<f64> {
            if self.fail_evaluate {
                return Err(AppError::Internal("evaluation failed".to_string()));
            }
            Ok(default_value)
        }

        async fn shutdown(&self) -> Result<()> {
            self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
