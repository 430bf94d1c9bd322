use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::RpcError;
use crate::identity::Identity;

/// A dispatchable handler object. One handler serves every operation
/// registered under its identity.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, operation: &str, params: &[u8]) -> Result<Vec<u8>, RpcError>;
}

pub trait HandlerRegistry: Send + Sync {
    fn insert(&self, identity: Identity, handler: Arc<dyn Handler>);
    fn get(&self, identity: &Identity) -> Option<Arc<dyn Handler>>;
    fn remove(&self, identity: &Identity) -> Option<Arc<dyn Handler>>;
    fn identities(&self) -> Vec<Identity>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}

#[derive(Clone)]
pub struct SharedHandlerRegistry {
    inner: Arc<RwLock<HashMap<Identity, Arc<dyn Handler>>>>,
}

impl SharedHandlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for SharedHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry for SharedHandlerRegistry {
    fn insert(&self, identity: Identity, handler: Arc<dyn Handler>) {
        let mut registry = self.inner.write().unwrap();
        registry.insert(identity, handler);
    }

    fn get(&self, identity: &Identity) -> Option<Arc<dyn Handler>> {
        let registry = self.inner.read().unwrap();
        registry.get(identity).cloned()
    }

    fn remove(&self, identity: &Identity) -> Option<Arc<dyn Handler>> {
        let mut registry = self.inner.write().unwrap();
        registry.remove(identity)
    }

    fn identities(&self) -> Vec<Identity> {
        let registry = self.inner.read().unwrap();
        registry.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        let registry = self.inner.read().unwrap();
        registry.len()
    }

    fn is_empty(&self) -> bool {
        let registry = self.inner.read().unwrap();
        registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, _operation: &str, params: &[u8]) -> Result<Vec<u8>, RpcError> {
            Ok(params.to_vec())
        }
    }

    #[test]
    fn test_insert_and_get() {
        let registry = SharedHandlerRegistry::new();
        registry.insert(Identity::new("obj-1"), Arc::new(EchoHandler));

        assert!(registry.get(&Identity::new("obj-1")).is_some());
        assert!(registry.get(&Identity::new("obj-2")).is_none());
    }

    #[test]
    fn test_remove() {
        let registry = SharedHandlerRegistry::new();
        registry.insert(Identity::new("obj-1"), Arc::new(EchoHandler));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(&Identity::new("obj-1"));
        assert!(removed.is_some());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_identities() {
        let registry = SharedHandlerRegistry::new();
        registry.insert(Identity::new("obj-1"), Arc::new(EchoHandler));
        registry.insert(Identity::new("obj-2"), Arc::new(EchoHandler));

        let mut identities = registry.identities();
        identities.sort();
        assert_eq!(
            identities,
            vec![Identity::new("obj-1"), Identity::new("obj-2")]
        );
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let registry = Arc::new(SharedHandlerRegistry::new());
        let mut handles = vec![];

        for i in 0..10 {
            let reg = registry.clone();
            let handle = thread::spawn(move || {
                for j in 0..10 {
                    let id = format!("obj-{}-{}", i, j);
                    reg.insert(Identity::new(id), Arc::new(EchoHandler));
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn test_clone_shares_data() {
        let registry = SharedHandlerRegistry::new();
        let cloned = registry.clone();

        registry.insert(Identity::new("obj-1"), Arc::new(EchoHandler));

        assert_eq!(cloned.len(), 1);
        assert!(cloned.get(&Identity::new("obj-1")).is_some());
    }

    #[test]
    fn test_is_empty() {
        let registry = SharedHandlerRegistry::new();
        assert!(registry.is_empty());

        registry.insert(Identity::new("obj-1"), Arc::new(EchoHandler));
        assert!(!registry.is_empty());

        registry.remove(&Identity::new("obj-1"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_through_registry() {
        let registry = SharedHandlerRegistry::new();
        registry.insert(Identity::new("echo"), Arc::new(EchoHandler));

        let handler = registry.get(&Identity::new("echo")).unwrap();
        let result = handler.handle("any", b"payload").await.unwrap();
        assert_eq!(result, b"payload");
    }
}
