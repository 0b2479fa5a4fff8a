// Handler registry: job type -> handler, last registration wins
use crate::domain::JobType;
use crate::port::JobHandler;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<JobType, Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the handler's own job type, replacing any previous one
    pub fn register(&self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type();
        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_type.clone(), handler)
            .is_some();

        if replaced {
            warn!(job_type = %job_type, "Replaced existing job handler");
        } else {
            info!(job_type = %job_type, "Registered job handler");
        }
    }

    pub fn get(&self, job_type: &JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_type)
            .cloned()
    }

    /// Registered job types, sorted
    pub fn job_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job_handler::mocks::MockJobHandler;

    #[test]
    fn test_last_registration_wins() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(MockJobHandler::new_success("a"));
        let second = Arc::new(MockJobHandler::new_fail("a", "nope"));
        let second_counter = second.counter();

        registry.register(first);
        registry.register(second);

        assert_eq!(registry.job_types(), vec![JobType::new("a")]);
        let handler = registry.get(&JobType::new("a")).unwrap();
        let payload = crate::domain::JobPayload::new("org", "actor");
        let result = tokio_test::block_on(handler.handle(&payload, "job-1"));
        assert!(result.is_err());
        assert_eq!(second_counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_type() {
        assert!(HandlerRegistry::new().get(&JobType::new("missing")).is_none());
    }
}
