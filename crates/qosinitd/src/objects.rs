//! Typed builders for the object classes the provisioner touches.

use std::collections::BTreeMap;
use std::fmt;

use sonic_qos_codec::{AttrCodec, AuthoredObject, CodecResult, ObjectClass};

/// Scheduler group with a known store id.
pub fn scheduler_group(codec: AttrCodec, switch_id: u32, id: u64) -> CodecResult<AuthoredObject> {
    let mut obj = AuthoredObject::new(codec, ObjectClass::SchedulerGroup);
    obj.set("switch-id", switch_id)?.set("id", id)?;
    Ok(obj)
}

/// Query template matching every scheduler group of a port.
pub fn port_scheduler_groups(codec: AttrCodec, switch_id: u32, port_id: u32) -> CodecResult<AuthoredObject> {
    let mut obj = AuthoredObject::new(codec, ObjectClass::SchedulerGroup);
    obj.set("switch-id", switch_id)?.set("port-id", port_id)?;
    Ok(obj)
}

/// A scheduler profile carrying the given attributes, written as
/// configuration text.
pub fn scheduler_profile(
    codec: AttrCodec,
    switch_id: u32,
    attrs: &BTreeMap<String, String>,
) -> CodecResult<AuthoredObject> {
    let mut obj = AuthoredObject::new(codec, ObjectClass::SchedulerProfile);
    obj.set("switch-id", switch_id)?;
    for (attr, text) in attrs {
        obj.set_text(attr, text)?;
    }
    Ok(obj)
}

/// Addresses one queue of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub port_id: u32,
    pub queue_type: String,
    pub number: u32,
}

impl QueueKey {
    pub fn new(port_id: u32, queue_type: impl Into<String>, number: u32) -> Self {
        Self {
            port_id,
            queue_type: queue_type.into(),
            number,
        }
    }

    pub fn object(&self, codec: AttrCodec, switch_id: u32) -> CodecResult<AuthoredObject> {
        let mut obj = AuthoredObject::new(codec, ObjectClass::Queue);
        obj.set("switch-id", switch_id)?
            .set("port-id", self.port_id)?
            .set("type", self.queue_type.as_str())?
            .set("queue-number", self.number)?;
        Ok(obj)
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue {}:{}:{}", self.port_id, self.queue_type, self.number)
    }
}

/// Traffic direction of a per-port QoS object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Ingress,
    Egress,
}

impl PortDirection {
    pub fn class(&self) -> ObjectClass {
        match self {
            PortDirection::Ingress => ObjectClass::PortIngress,
            PortDirection::Egress => ObjectClass::PortEgress,
        }
    }

    /// Per-port QoS object for this direction.
    pub fn port_object(&self, codec: AttrCodec, switch_id: u32, port_id: u32) -> CodecResult<AuthoredObject> {
        let mut obj = AuthoredObject::new(codec, self.class());
        obj.set("switch-id", switch_id)?.set("port-id", port_id)?;
        Ok(obj)
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Ingress => f.write_str("ingress"),
            PortDirection::Egress => f.write_str("egress"),
        }
    }
}
