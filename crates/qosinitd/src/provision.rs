//! Top-level provisioning run.
//!
//! A run walks the configuration nodes in order. The global phase creates
//! map tables and scheduler profiles and records their ids in a
//! [`RunContext`]; each port phase binds maps and the scheduler tree to every
//! port of an interface class, including ports that show up while the run
//! is in progress.

use std::time::Duration;

use sonic_qos_codec::AttrCodec;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigNode, GlobalsNode, MapNode, PortNode, QosInitConfig, SchedulerProfileNode};
use crate::context::RunContext;
use crate::error::{QosInitError, QosInitResult};
use crate::maps::MapTable;
use crate::objects::PortDirection;
use crate::ports::{bind_port_maps, PortTracker};
use crate::report::{PhaseReport, RunReport};
use crate::scheduler::SchedulerApi;
use crate::store::{InterfaceClass, ObjectStore, PortInfo, PortSource};

/// Default interval between polls of the port source and the store.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runtime knobs of the provisioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub switch_id: u32,
    pub poll_interval: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            switch_id: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProvisionerConfig {
    pub fn with_switch_id(mut self, switch_id: u32) -> Self {
        self.switch_id = switch_id;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Drives one provisioning run against a store and a port source.
pub struct Provisioner<'a, S: ObjectStore + ?Sized, P: PortSource + ?Sized> {
    store: &'a S,
    ports: &'a P,
    codec: AttrCodec,
    config: ProvisionerConfig,
}

impl<'a, S: ObjectStore + ?Sized, P: PortSource + ?Sized> Provisioner<'a, S, P> {
    pub fn new(store: &'a S, ports: &'a P, config: ProvisionerConfig) -> Self {
        Self {
            store,
            ports,
            codec: AttrCodec::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    fn scheduler(&self) -> SchedulerApi<'a, S> {
        SchedulerApi::new(self.store, self.codec, self.config.switch_id)
    }

    async fn pause(&self) {
        tokio::time::sleep(self.config.poll_interval).await;
    }

    /// Waits until the platform lists a front-panel port and the store
    /// answers queries about it. Returns the port used for the check.
    pub async fn wait_for_register(&self) -> PortInfo {
        let port = loop {
            match self.ports.list_ports(InterfaceClass::FrontPanel).await {
                Ok(mut listing) => {
                    if let Some(port) = listing.pop() {
                        break port;
                    }
                    debug!("No front-panel interfaces listed yet");
                }
                Err(e) => warn!("Interface listing failed: {}", e),
            }
            self.pause().await;
        };

        loop {
            let template = PortDirection::Ingress.port_object(self.codec, self.config.switch_id, port.ifindex);
            match template {
                Ok(template) => match self.store.query(template.data()).await {
                    Ok(_) => break,
                    Err(e) => debug!("Store not answering for {} yet: {}", port.name, e),
                },
                Err(e) => warn!("Cannot build registration query for {}: {}", port.name, e),
            }
            self.pause().await;
        }

        info!("Store is answering, checked through {}", port.name);
        port
    }

    /// Provisions everything the configuration declares.
    pub async fn run(&self, config: &QosInitConfig) -> RunReport {
        let mut ctx = RunContext::new();
        let mut report = RunReport::new();

        for node in &config.nodes {
            match node {
                ConfigNode::SwitchGlobals(globals) => {
                    report.push(self.init_switch_globals(&mut ctx, globals).await);
                }
                ConfigNode::FrontPanelPorts(port_node) | ConfigNode::CpuPort(port_node) => {
                    let Some(class) = node.interface_class() else {
                        continue;
                    };
                    for phase in self.init_ports_of_class(&ctx, class, port_node).await {
                        report.push(phase);
                    }
                }
            }
        }

        info!("QoS initialization finished: {}", report);
        report
    }

    /// Creates the map tables and scheduler profiles of a globals node.
    pub async fn init_switch_globals(&self, ctx: &mut RunContext, globals: &GlobalsNode) -> PhaseReport {
        let mut phase = PhaseReport::new("switch globals");

        for map in &globals.maps {
            let target = format!("{} {}", map.map_type, map.tag);
            if !map.map_type.provisionable() {
                phase.skipped(target, "map type is not provisioned at init");
                continue;
            }
            if let Some(map_id) = phase.record(target, self.create_map(map).await) {
                ctx.insert_map(map.tag.as_str(), map_id);
            }
        }

        self.create_profiles(ctx, &globals.scheduler_profiles, &mut phase).await;
        info!(
            "Created {} maps and {} scheduler profiles",
            ctx.map_count(),
            ctx.profile_count()
        );
        phase
    }

    async fn create_map(&self, map: &MapNode) -> QosInitResult<u64> {
        let mut table = MapTable::create(self.store, self.codec, map.map_type, self.config.switch_id).await?;
        for entry in &map.entries {
            table.add_entries(&entry.to_authored(), map.range())?;
        }
        table.commit().await?;
        Ok(table.map_id())
    }

    async fn create_profiles(&self, ctx: &mut RunContext, profiles: &[SchedulerProfileNode], phase: &mut PhaseReport) {
        let scheduler = self.scheduler();
        for profile in profiles {
            let result = scheduler.create_profile(&profile.tag, &profile.attr_text()).await;
            if let Some(id) = phase.record(format!("scheduler profile {}", profile.tag), result) {
                ctx.insert_profile(profile.tag.as_str(), id);
            }
        }
    }

    /// Provisions every port of `class`, re-listing until a pass finds no
    /// new port.
    #[instrument(skip(self, ctx, node))]
    pub async fn init_ports_of_class(
        &self,
        ctx: &RunContext,
        class: InterfaceClass,
        node: &PortNode,
    ) -> Vec<PhaseReport> {
        let mut tracker = PortTracker::new(class);
        let mut phases = Vec::new();

        loop {
            let listing = match self.ports.list_ports(class).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Listing {:?} interfaces failed: {}", class, e);
                    self.pause().await;
                    continue;
                }
            };

            let new_ports = tracker.admit(listing);
            if tracker.converged(new_ports.len()) {
                break;
            }
            if new_ports.is_empty() {
                debug!("No {:?} interfaces yet", class);
                self.pause().await;
                continue;
            }

            for port in &new_ports {
                phases.push(self.init_port(ctx, port, node).await);
            }
        }

        info!("Initialized {} {:?} interfaces", tracker.seen(), class);
        phases
    }

    /// Binds maps and the scheduler tree of `node` to one port.
    pub async fn init_port(&self, ctx: &RunContext, port: &PortInfo, node: &PortNode) -> PhaseReport {
        info!("Initializing QoS on {} (ifindex {})", port.name, port.ifindex);
        let mut phase = PhaseReport::new(format!("port {}", port.name));

        bind_port_maps(self.store, self.codec, self.config.switch_id, ctx, port, node, &mut phase).await;
        if let Some(tree) = &node.scheduler_tree {
            self.scheduler().apply_tree(ctx, port, tree, &mut phase).await;
        }
        phase
    }

    /// Re-applies the front-panel scheduler tree to the named interfaces only.
    ///
    /// Scheduler profiles are created afresh; maps are left alone. Every name
    /// is resolved before anything is applied, and an unknown name fails the
    /// whole rerun.
    pub async fn init_interfaces(&self, config: &QosInitConfig, names: &[String]) -> QosInitResult<RunReport> {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let port = self
                .ports
                .resolve(name)
                .await
                .map_err(|e| QosInitError::query(format!("interface {}", name), e))?
                .ok_or_else(|| QosInitError::PortUnavailable { name: name.clone() })?;
            targets.push(port);
        }

        let mut ctx = RunContext::new();
        let mut report = RunReport::new();
        let mut profiles = PhaseReport::new("scheduler profiles");
        for globals in config.globals() {
            self.create_profiles(&mut ctx, &globals.scheduler_profiles, &mut profiles).await;
        }
        report.push(profiles);

        let tree = config
            .port_node(InterfaceClass::FrontPanel)
            .and_then(|node| node.scheduler_tree.as_ref());
        for port in &targets {
            let mut phase = PhaseReport::new(format!("interface {}", port.name));
            match tree {
                Some(tree) => self.scheduler().apply_tree(&ctx, port, tree, &mut phase).await,
                None => phase.skipped(port.name.as_str(), "no front-panel scheduler tree configured"),
            }
            report.push(phase);
        }

        info!("Interface rerun finished: {}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::report::OutcomeStatus;
    use pretty_assertions::assert_eq;
    use sonic_qos_codec::ObjectClass;

    fn fast() -> ProvisionerConfig {
        ProvisionerConfig::default().with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_config_defaults() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.switch_id, 0);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.with_switch_id(2).switch_id, 2);
    }

    #[tokio::test]
    async fn test_globals_skip_and_record() {
        let store = MemoryStore::new(0);
        let config = QosInitConfig::parse(
            r#"{ "nodes": [ { "node": "switch-globals",
                "maps": [
                    { "type": "tc-color-to-dscp-map", "tag": "remark" },
                    { "type": "tc-to-queue-map", "tag": "tcq", "entries": [ [0, "UCAST", 0] ] }
                ],
                "scheduler-profiles": [ { "tag": "bad", "attrs": { "algorithm": "FIFO" } } ] } ] }"#,
        )
        .unwrap();
        let provisioner = Provisioner::new(&store, &store, fast());
        let report = provisioner.run(&config).await;

        let phase = report.phase("switch globals").unwrap();
        assert!(matches!(
            phase.outcome("tc-color-to-dscp-map remark"),
            Some(OutcomeStatus::Skipped(_))
        ));
        assert_eq!(phase.outcome("tc-to-queue-map tcq"), Some(&OutcomeStatus::Applied));
        assert!(matches!(
            phase.outcome("scheduler profile bad"),
            Some(OutcomeStatus::Failed(QosInitError::Codec(_)))
        ));
        assert!(!report.succeeded());
        assert_eq!(store.objects(ObjectClass::MapTable(sonic_qos_codec::MapType::TcToQueue)).len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_register_polls() {
        let store = MemoryStore::new(0);
        store.add_port_objects(9).unwrap();
        store.script_ports(
            InterfaceClass::FrontPanel,
            vec![
                vec![],
                vec![
                    PortInfo::new("Ethernet0", 5, InterfaceClass::FrontPanel),
                    PortInfo::new("Ethernet4", 9, InterfaceClass::FrontPanel),
                ],
            ],
        );
        store.unavailable_for(2);

        let provisioner = Provisioner::new(&store, &store, fast());
        let port = provisioner.wait_for_register().await;
        assert_eq!(port.name, "Ethernet4");
        assert_eq!(store.list_calls(InterfaceClass::FrontPanel), 2);
    }

    #[tokio::test]
    async fn test_interfaces_rerun_unknown_name() {
        let store = MemoryStore::new(0);
        store.set_ports(
            InterfaceClass::FrontPanel,
            vec![PortInfo::new("Ethernet0", 1, InterfaceClass::FrontPanel)],
        );
        let provisioner = Provisioner::new(&store, &store, fast());
        let err = provisioner
            .init_interfaces(&QosInitConfig::default(), &["Ethernet8".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, QosInitError::PortUnavailable { name: "Ethernet8".to_string() });
        assert!(err.is_fatal());
        assert!(store.transactions().is_empty());
    }
}
