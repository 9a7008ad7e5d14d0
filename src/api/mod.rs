//! Bound external APIs, looked up by name from inside job bodies.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;

/// An external service an application talks to.
#[async_trait]
pub trait Api: Send + Sync + 'static {
    /// Name used by [`ApiTable::get`].
    fn name(&self) -> &str;

    /// Submit a GET request for `resource`.
    async fn get(&self, resource: &str) -> anyhow::Result<Value>;

    /// Submit a POST request with `data` to `resource`.
    async fn post(&self, resource: &str, data: &Value) -> anyhow::Result<Value>;
}

/// Name-keyed table of bound APIs, built once per runner start.
#[derive(Default, Clone)]
pub struct ApiTable {
    apis: Vec<Arc<dyn Api>>,
}

impl ApiTable {
    pub fn new(apis: Vec<Arc<dyn Api>>) -> Self {
        Self { apis }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Api>, CoreError> {
        self.apis
            .iter()
            .find(|api| api.name() == name)
            .cloned()
            .ok_or_else(|| CoreError::ApiNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.apis.iter().map(|api| api.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

type ApiFactory = Box<dyn Fn() -> Arc<dyn Api> + Send + Sync>;

/// Factories for every API the runner binds at startup.
#[derive(Default)]
pub struct ApiRegistry {
    factories: Vec<ApiFactory>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, A>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Api,
    {
        self.factories
            .push(Box::new(move || Arc::new(factory()) as Arc<dyn Api>));
        self
    }

    /// Build a fresh table, one instance per factory.
    pub fn build(&self) -> ApiTable {
        let apis: Vec<Arc<dyn Api>> = self.factories.iter().map(|f| f()).collect();
        for api in &apis {
            debug!(api = %api.name(), "API loaded");
        }
        ApiTable::new(apis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Api for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn get(&self, resource: &str) -> anyhow::Result<Value> {
            Ok(Value::String(resource.to_string()))
        }

        async fn post(&self, _resource: &str, data: &Value) -> anyhow::Result<Value> {
            Ok(data.clone())
        }
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let mut registry = ApiRegistry::new();
        registry.register(|| Echo("Github")).register(|| Echo("Slack"));
        let table = registry.build();

        assert_eq!(table.names(), vec!["Github", "Slack"]);
        let api = table.get("Slack").unwrap();
        assert_eq!(api.get("channels").await.unwrap(), Value::from("channels"));
        assert!(matches!(table.get("Jira"), Err(CoreError::ApiNotFound(_))));
    }

    #[test]
    fn test_build_creates_fresh_instances() {
        let mut registry = ApiRegistry::new();
        registry.register(|| Echo("Github"));
        let a = registry.build().get("Github").unwrap();
        let b = registry.build().get("Github").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
