//! Process-wide function registry (§4.8, §9). Populated during registration before
//! `start()`, then read-only — modeled as an owned map on the worker instance, not
//! truly global, so a host running multiple worker instances per process keeps each
//! one's registry independent (§9 design note).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use je_protocol::PackedBytes;

use crate::error::WorkerError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered function: takes packed args, returns packed resolution bytes or a
/// packed rejection payload. Errors are captured by the task queue, not here.
pub trait RegisteredFn: Send + Sync {
    fn call(&self, args: PackedBytes) -> BoxFuture<'static, Result<PackedBytes, PackedBytes>>;
}

impl<F, Fut> RegisteredFn for F
where
    F: Fn(PackedBytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PackedBytes, PackedBytes>> + Send + 'static,
{
    fn call(&self, args: PackedBytes) -> BoxFuture<'static, Result<PackedBytes, PackedBytes>> {
        Box::pin(self(args))
    }
}

#[derive(Clone)]
pub struct FunctionEntry {
    pub service: String,
    pub idempotent: bool,
    pub retry_count_on_stall: Option<i32>,
    pub handler: Arc<dyn RegisteredFn>,
}

/// Function names are globally unique within a worker process (§4.8 open question,
/// resolved as: a process registers each name at most once, regardless of service).
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        service: impl Into<String>,
        name: impl Into<String>,
        idempotent: bool,
        retry_count_on_stall: Option<i32>,
        handler: impl RegisteredFn + 'static,
    ) -> Result<(), WorkerError> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(WorkerError::NameAlreadyRegistered(name));
        }

        self.functions.insert(
            name,
            FunctionEntry {
                service: service.into(),
                idempotent,
                retry_count_on_stall,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    /// The `{name, idempotent, retryConfig}` projection for one service, sent on
    /// each poll so the control plane can upsert the service definition (§4.2).
    pub fn projection_for_service(&self, service: &str) -> Vec<je_protocol::FunctionDeclarationWire> {
        self.functions
            .iter()
            .filter(|(_, entry)| entry.service == service)
            .map(|(name, entry)| je_protocol::FunctionDeclarationWire {
                name: name.clone(),
                idempotent: entry.idempotent,
                rate: None,
                cache_ttl_seconds: None,
                retry_count_on_stall: entry.retry_count_on_stall,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo(args: PackedBytes) -> Result<PackedBytes, PackedBytes> {
        Ok(args)
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = FunctionRegistry::new();
        registry.register("svc", "hello", false, None, echo).unwrap();
        let err = registry.register("svc", "hello", false, None, echo).unwrap_err();
        assert!(matches!(err, WorkerError::NameAlreadyRegistered(name) if name == "hello"));
    }

    #[test]
    fn projection_only_includes_matching_service() {
        let mut registry = FunctionRegistry::new();
        registry.register("svc-a", "one", true, Some(3), echo).unwrap();
        registry.register("svc-b", "two", false, None, echo).unwrap();

        let projection = registry.projection_for_service("svc-a");
        assert_eq!(projection.len(), 1);
        assert_eq!(projection[0].name, "one");
        assert!(projection[0].idempotent);
    }
}
