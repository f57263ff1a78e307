//! Executor registry for operator-type dispatch

use crate::executor::builtin;
use crate::executor::operator::{OperatorError, OperatorExecutor};
use crate::graph::OperatorType;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map from operator type to executor.
///
/// Registration is meant for startup. Lookups during a run take a cheap
/// `Arc` clone and never hold a map guard across an await point.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: DashMap<OperatorType, Arc<dyn OperatorExecutor>>,
}

impl ExecutorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in utility operators
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::register_builtins(&registry);
        registry
    }

    /// Register an executor for a type. A later registration for the same
    /// type replaces the earlier one.
    pub fn register(
        &self,
        operator_type: impl Into<OperatorType>,
        executor: Arc<dyn OperatorExecutor>,
    ) {
        let operator_type = operator_type.into();
        if self
            .executors
            .insert(operator_type.clone(), executor)
            .is_some()
        {
            tracing::debug!("Replaced executor for operator type: {}", operator_type);
        } else {
            tracing::info!("Registered executor: {}", operator_type);
        }
    }

    /// Convenience wrapper over [`register`](Self::register) for owned values.
    pub fn register_executor<E>(&self, operator_type: impl Into<OperatorType>, executor: E)
    where
        E: OperatorExecutor + 'static,
    {
        self.register(operator_type, Arc::new(executor));
    }

    /// Look up the executor for a type.
    pub fn resolve(
        &self,
        operator_type: &OperatorType,
    ) -> Result<Arc<dyn OperatorExecutor>, OperatorError> {
        self.get(operator_type)
            .ok_or_else(|| OperatorError::NoExecutor(operator_type.to_string()))
    }

    pub fn get(&self, operator_type: &OperatorType) -> Option<Arc<dyn OperatorExecutor>> {
        self.executors
            .get(operator_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, operator_type: &OperatorType) -> bool {
        self.executors.contains_key(operator_type)
    }

    pub fn unregister(&self, operator_type: &OperatorType) -> Option<Arc<dyn OperatorExecutor>> {
        self.executors.remove(operator_type).map(|(_, executor)| executor)
    }

    /// Registered type names, sorted
    pub fn list_types(&self) -> Vec<OperatorType> {
        let mut types: Vec<OperatorType> = self
            .executors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}
