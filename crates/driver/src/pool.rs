//! Namespace pool and network allocator boundaries.

/// Pre-warmed containers whose network, ipc and pid namespaces a task can join.
pub trait PoolAllocator: Send + Sync {
    /// Borrow a pooled container id. An error or empty id means none is free.
    fn alloc_pool_id(&self) -> anyhow::Result<String>;

    fn free_pool_id(&self, id: &str);
}

/// Pre-existing named networks a task can attach to.
pub trait NetworkAllocator: Send + Sync {
    fn alloc_network(&self) -> Option<String>;

    fn free_network(&self, id: &str);
}

/// What the network configuration step borrowed. At most one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants {
    pub pool_id: Option<String>,
    pub network_id: Option<String>,
}
