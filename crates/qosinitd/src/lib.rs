//! QoS initialization daemon for SONiC.
//!
//! This crate implements `qosinitd`, which provisions the switch's QoS
//! objects from a declarative configuration when the platform comes up.
//!
//! # Responsibilities
//!
//! - Create attribute map tables (dot1p/dscp/tc/queue/priority-group) and
//!   scheduler profiles, remembering the ids the store assigns
//! - Bind maps to the ingress and egress side of every port
//! - Discover each port's scheduler groups, address them by
//!   `(level, ordinal)` and bind profiles and child lists per the
//!   declared scheduler tree
//! - Keep listing ports until no new port appears, so ports created while
//!   the run is in progress are provisioned too
//!
//! # Object classes
//!
//! | Class | Key | Touched by |
//! |-------|-----|------------|
//! | `base-qos/<map>` | id | global phase |
//! | `base-qos/scheduler-profile` | id | global phase |
//! | `base-qos/port-ingress`, `port-egress` | port-id | map binding |
//! | `base-qos/scheduler-group` | id | scheduler tree |
//! | `base-qos/queue` | port-id, type, queue-number | scheduler tree |
//!
//! # Example
//!
//! ```ignore
//! use sonic_qosinitd::{MemoryStore, Provisioner, ProvisionerConfig, QosInitConfig};
//!
//! let store = MemoryStore::new(0);
//! let config = QosInitConfig::load(path)?;
//! let report = Provisioner::new(&store, &store, ProvisionerConfig::default())
//!     .run(&config)
//!     .await;
//! ```

pub mod config;
mod context;
mod error;
pub mod maps;
mod memory;
pub mod objects;
pub mod ports;
mod provision;
mod report;
pub mod scheduler;
mod store;

pub use config::{QosInitConfig, DEFAULT_CONFIG_PATH};
pub use context::RunContext;
pub use error::{LookupKind, QosInitError, QosInitResult};
pub use maps::MapTable;
pub use memory::{MemoryStore, SimPort, SimTopology};
pub use objects::{PortDirection, QueueKey};
pub use ports::PortTracker;
pub use provision::{Provisioner, ProvisionerConfig, DEFAULT_POLL_INTERVAL};
pub use report::{Outcome, OutcomeStatus, PhaseReport, RunReport};
pub use scheduler::{SchedulerApi, SchedulerGroupIndex};
pub use store::{InterfaceClass, ObjectStore, PortInfo, PortSource, StoreError, TxnOp};
