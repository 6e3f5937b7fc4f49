use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Durable key/value storage that outlives the coordinator process.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, keys: &[&str]) -> Result<()>;
}
