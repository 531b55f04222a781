//! Port discovery and per-port map binding.

use std::collections::HashSet;

use sonic_qos_codec::{AttrCodec, MapType};
use tracing::debug;

use crate::config::{MapBindings, PortNode};
use crate::context::RunContext;
use crate::error::{QosInitError, QosInitResult};
use crate::objects::PortDirection;
use crate::report::PhaseReport;
use crate::store::{InterfaceClass, ObjectStore, PortInfo, TxnOp};

/// Tracks which ports of one interface class a run has already handled.
///
/// A listing pass converges once at least one port has been seen and the
/// pass brings no new port. An empty listing before any port appeared means
/// the platform has not populated its ports yet.
#[derive(Debug, Clone)]
pub struct PortTracker {
    class: InterfaceClass,
    seen: HashSet<u32>,
}

impl PortTracker {
    pub fn new(class: InterfaceClass) -> Self {
        Self {
            class,
            seen: HashSet::new(),
        }
    }

    pub fn class(&self) -> InterfaceClass {
        self.class
    }

    /// Returns the ports of `listing` not seen before and marks them seen.
    /// Ports of another class are ignored.
    pub fn admit(&mut self, listing: Vec<PortInfo>) -> Vec<PortInfo> {
        listing
            .into_iter()
            .filter(|port| port.is_class(self.class) && self.seen.insert(port.ifindex))
            .collect()
    }

    /// Whether a pass that admitted `new_ports` ports ends discovery.
    pub fn converged(&self, new_ports: usize) -> bool {
        new_ports == 0 && !self.seen.is_empty()
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// Binds the maps named by a port node to one port, ingress first, each
/// direction in declaration order.
///
/// Each binding is its own transaction; failures are recorded in `report`
/// and the remaining bindings still run.
pub async fn bind_port_maps<S: ObjectStore + ?Sized>(
    store: &S,
    codec: AttrCodec,
    switch_id: u32,
    ctx: &RunContext,
    port: &PortInfo,
    node: &PortNode,
    report: &mut PhaseReport,
) {
    for (direction, bindings) in [
        (PortDirection::Ingress, &node.ingress),
        (PortDirection::Egress, &node.egress),
    ] {
        bind_direction(store, codec, switch_id, ctx, port, direction, bindings, report).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn bind_direction<S: ObjectStore + ?Sized>(
    store: &S,
    codec: AttrCodec,
    switch_id: u32,
    ctx: &RunContext,
    port: &PortInfo,
    direction: PortDirection,
    bindings: &MapBindings,
    report: &mut PhaseReport,
) {
    for (map_type, tag) in bindings {
        let target = format!("{} {} {} {}", port.name, direction, map_type, tag);
        if !map_type.provisionable() {
            report.skipped(target, "map type is not provisioned at init");
            continue;
        }
        let result = bind_map(store, codec, switch_id, ctx, port, direction, *map_type, tag).await;
        report.record(target, result);
    }
}

#[allow(clippy::too_many_arguments)]
async fn bind_map<S: ObjectStore + ?Sized>(
    store: &S,
    codec: AttrCodec,
    switch_id: u32,
    ctx: &RunContext,
    port: &PortInfo,
    direction: PortDirection,
    map_type: MapType,
    tag: &str,
) -> QosInitResult<()> {
    let map_id = ctx.map_id(tag)?;
    let mut obj = direction.port_object(codec, switch_id, port.ifindex)?;
    obj.set(map_type.name(), map_id)?;
    debug!("Binding {} {:#x} to {} {}", map_type, map_id, port.name, direction);

    store
        .transact(vec![(TxnOp::Set, obj.into_data())])
        .await
        .map_err(|e| QosInitError::transaction(format!("{} {} {}", port.name, direction, map_type), e))?;
    Ok(())
}
