//! Object-store and interface-listing seams.
//!
//! The provisioner talks to the remote store only through [`ObjectStore`]
//! and learns about interfaces only through [`PortSource`]. Both calls are
//! awaited to completion before the provisioner proceeds.

use async_trait::async_trait;
use sonic_qos_codec::StoreObject;
use thiserror::Error;

/// Operation carried by one element of a transaction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnOp {
    Create,
    Set,
    Delete,
}

impl TxnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnOp::Create => "create",
            TxnOp::Set => "set",
            TxnOp::Delete => "delete",
        }
    }
}

/// Failure reported by the store or port source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The batch was rejected as a whole.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The store is not answering yet.
    #[error("store unavailable")]
    Unavailable,

    /// A query could not be served.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Remote, schema-typed object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns every instance matching the attributes bound in `template`.
    async fn query(&self, template: &StoreObject) -> Result<Vec<StoreObject>, StoreError>;

    /// Applies all operations atomically; returns the resulting objects in
    /// submission order.
    async fn transact(&self, ops: Vec<(TxnOp, StoreObject)>) -> Result<Vec<StoreObject>, StoreError>;
}

/// Interface class a port-discovery pass lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceClass {
    FrontPanel,
    Cpu,
}

impl InterfaceClass {
    /// Interface type string reported by the platform.
    pub fn if_type(&self) -> &'static str {
        match self {
            InterfaceClass::FrontPanel => "ianaift:ethernetCsmacd",
            InterfaceClass::Cpu => "base-if:cpu",
        }
    }
}

/// One interface as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortInfo {
    pub name: String,
    pub ifindex: u32,
    pub if_type: String,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, ifindex: u32, class: InterfaceClass) -> Self {
        Self {
            name: name.into(),
            ifindex,
            if_type: class.if_type().to_string(),
        }
    }

    pub fn is_class(&self, class: InterfaceClass) -> bool {
        self.if_type == class.if_type()
    }
}

/// Source of interface listings.
#[async_trait]
pub trait PortSource: Send + Sync {
    /// Lists interfaces of `class` currently known to the platform.
    async fn list_ports(&self, class: InterfaceClass) -> Result<Vec<PortInfo>, StoreError>;

    /// Resolves an interface name across all classes.
    async fn resolve(&self, name: &str) -> Result<Option<PortInfo>, StoreError> {
        for class in [InterfaceClass::FrontPanel, InterfaceClass::Cpu] {
            if let Some(port) = self
                .list_ports(class)
                .await?
                .into_iter()
                .find(|p| p.name == name)
            {
                return Ok(Some(port));
            }
        }
        Ok(None)
    }
}
