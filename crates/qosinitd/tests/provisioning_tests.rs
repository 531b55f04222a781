//! Integration tests for qosinitd provisioning
//!
//! Runs whole provisioning passes against the in-process store:
//! - Map table creation and read-back
//! - Scheduler tree binding, re-binding and partial failure
//! - Port discovery convergence
//! - Interface-restricted reruns and configuration loading

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sonic_qos_codec::{AttrCodec, AttrValue, AuthoredEntry, MapType, ObjectClass};
use sonic_qosinitd::{
    InterfaceClass, MapTable, MemoryStore, OutcomeStatus, PortInfo, Provisioner, ProvisionerConfig,
    QosInitConfig, QosInitError, QueueKey, RunContext, SchedulerApi, SimPort, SimTopology,
};

const TREE_CONFIG: &str = r#"{
    "nodes": [
        { "node": "switch-globals",
          "maps": [ { "type": "dot1p-to-tc-map", "tag": "dot1p", "min": 0, "max": 7,
                      "entries": [ ["all", 0] ] } ],
          "scheduler-profiles": [
            { "tag": "strict", "attrs": { "algorithm": "SP" } },
            { "tag": "wdrr", "attrs": { "algorithm": "WDRR", "weight": 20 } }
          ] },
        { "node": "front-panel-ports",
          "ingress": { "dot1p-to-tc-map": "dot1p" },
          "scheduler-tree": { "levels": [
            { "level": 0, "groups": [ { "number": 0, "scheduler-profile": "strict", "children": [0, 1] } ] },
            { "level": 1, "groups": [
                { "number": 0, "scheduler-profile": "LEVEL1_ORDINAL0", "children": [0] },
                { "number": 1, "scheduler-profile": "wdrr", "children": [1] } ] },
            { "level": 2, "leaf": true, "queues": [
                { "type": "UCAST", "number": 0, "scheduler-profile": "wdrr" },
                { "type": "UCAST", "number": 1, "scheduler-profile": "wdrr" } ] }
          ] } }
    ]
}"#;

fn fast() -> ProvisionerConfig {
    ProvisionerConfig::default().with_poll_interval(Duration::from_millis(1))
}

fn front_panel(name: &str, ifindex: u32) -> PortInfo {
    PortInfo::new(name, ifindex, InterfaceClass::FrontPanel)
}

fn sim_port(name: &str, ifindex: u32, scheduler_groups: Vec<usize>) -> SimPort {
    SimPort {
        name: name.to_string(),
        ifindex,
        cpu: false,
        scheduler_groups,
        unicast_queues: 2,
        multicast_queues: 0,
    }
}

/// Store seeded with one front-panel port carrying a 1-2 scheduler tree.
fn one_port_store() -> MemoryStore {
    let topology = SimTopology {
        ports: vec![sim_port("Ethernet0", 1, vec![1, 2])],
    };
    MemoryStore::from_topology(0, &topology).unwrap()
}

/// Config with the level 1 ordinal 0 profile set to `profile`.
fn tree_config(profile: &str) -> QosInitConfig {
    QosInitConfig::parse(&TREE_CONFIG.replace("LEVEL1_ORDINAL0", profile)).unwrap()
}

fn profile_id(store: &MemoryStore, algorithm: &str) -> u64 {
    let profile = store
        .find(ObjectClass::SchedulerProfile, &[("algorithm", AttrValue::from(algorithm))])
        .unwrap();
    AttrCodec::new()
        .decode_u64(ObjectClass::SchedulerProfile, "id", &profile)
        .unwrap()
        .unwrap()
}

fn group_attr(store: &MemoryStore, sg_id: u64, attr: &str) -> Option<AttrValue> {
    let sg = store
        .find(ObjectClass::SchedulerGroup, &[("id", AttrValue::Uint(sg_id))])
        .unwrap();
    AttrCodec::new().decode(ObjectClass::SchedulerGroup, attr, &sg).unwrap()
}

#[tokio::test]
async fn test_map_table_reads_back_entries_with_id() {
    let store = MemoryStore::new(0);
    let mut table = MapTable::create(&store, AttrCodec::new(), MapType::Dot1pToTc, 0)
        .await
        .unwrap();
    table.add_entries(&AuthoredEntry::positional(["0", "0"]), None).unwrap();
    table.add_entries(&AuthoredEntry::positional(["1", "1"]), None).unwrap();
    table.commit().await.unwrap();

    let entries = table.read().await.unwrap();
    assert_eq!(entries.len(), 2);
    for (value, entry) in entries.iter().enumerate() {
        let value = value as u64;
        assert_eq!(entry.map_id, Some(table.map_id()));
        assert_eq!(
            entry.fields,
            vec![("dot1p", AttrValue::Uint(value)), ("tc", AttrValue::Uint(value))]
        );
    }
}

#[tokio::test]
async fn test_full_run_binds_tree() {
    let store = one_port_store();
    let provisioner = Provisioner::new(&store, &store, fast());
    let report = provisioner.run(&tree_config("wdrr")).await;
    assert!(report.succeeded(), "{:?}", report);

    let api = SchedulerApi::new(&store, AttrCodec::new(), 0);
    let index = api.read_groups(&front_panel("Ethernet0", 1)).await.unwrap();
    let strict = profile_id(&store, "SP");
    let wdrr = profile_id(&store, "WDRR");

    let root = index.get(0, 0).unwrap();
    assert_eq!(group_attr(&store, root, "scheduler-profile-id"), Some(AttrValue::Uint(strict)));
    assert_eq!(
        group_attr(&store, root, "child-list"),
        Some(AttrValue::List(index.level(1).to_vec()))
    );
    assert_eq!(group_attr(&store, root, "child_count"), Some(AttrValue::Uint(2)));

    let q0 = api.queue_id(&QueueKey::new(1, "UCAST", 0)).await.unwrap().unwrap();
    let q1 = api.queue_id(&QueueKey::new(1, "UCAST", 1)).await.unwrap().unwrap();
    assert_eq!(group_attr(&store, index.get(1, 0).unwrap(), "child-list"), Some(AttrValue::List(vec![q0])));
    assert_eq!(group_attr(&store, index.get(1, 1).unwrap(), "child-list"), Some(AttrValue::List(vec![q1])));
    assert_eq!(api.parent_group(1, q1).await.unwrap(), index.get(1, 1));

    let queue = store
        .find(ObjectClass::Queue, &[("id", AttrValue::Uint(q0))])
        .unwrap();
    assert_eq!(
        AttrCodec::new()
            .decode_u64(ObjectClass::Queue, "scheduler-profile-id", &queue)
            .unwrap(),
        Some(wdrr)
    );

    let ingress = store
        .find(ObjectClass::PortIngress, &[("port-id", AttrValue::Uint(1))])
        .unwrap();
    assert!(AttrCodec::new()
        .decode_u64(ObjectClass::PortIngress, "dot1p-to-tc-map", &ingress)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_binding_twice_is_stable() {
    let store = one_port_store();
    let config = tree_config("wdrr");
    let provisioner = Provisioner::new(&store, &store, fast());

    let mut ctx = RunContext::new();
    let globals = config.globals().next().unwrap();
    assert!(provisioner.init_switch_globals(&mut ctx, globals).await.succeeded());

    let node = config.port_node(InterfaceClass::FrontPanel).unwrap();
    let port = front_panel("Ethernet0", 1);

    assert!(provisioner.init_port(&ctx, &port, node).await.succeeded());
    let first_groups = store.objects(ObjectClass::SchedulerGroup);
    let first_queues = store.objects(ObjectClass::Queue);

    assert!(provisioner.init_port(&ctx, &port, node).await.succeeded());
    assert_eq!(store.objects(ObjectClass::SchedulerGroup), first_groups);
    assert_eq!(store.objects(ObjectClass::Queue), first_queues);
}

#[tokio::test]
async fn test_failed_binding_does_not_stop_siblings() {
    let store = one_port_store();
    let provisioner = Provisioner::new(&store, &store, fast());
    let report = provisioner.run(&tree_config("no-such-profile")).await;

    assert!(!report.succeeded());
    assert_eq!(report.failure_count(), 1);

    let phase = report.phase("port Ethernet0").unwrap();
    assert!(matches!(
        phase.outcome("Ethernet0 sg 1/0 profile no-such-profile"),
        Some(OutcomeStatus::Failed(QosInitError::LookupMiss { .. }))
    ));
    assert_eq!(phase.outcome("Ethernet0 sg 1/1 profile wdrr"), Some(&OutcomeStatus::Applied));

    let api = SchedulerApi::new(&store, AttrCodec::new(), 0);
    let index = api.read_groups(&front_panel("Ethernet0", 1)).await.unwrap();
    assert_eq!(
        group_attr(&store, index.get(1, 1).unwrap(), "scheduler-profile-id"),
        Some(AttrValue::Uint(profile_id(&store, "WDRR")))
    );
    assert_eq!(group_attr(&store, index.get(1, 0).unwrap(), "scheduler-profile-id"), None);
}

#[tokio::test]
async fn test_group_discovery_failure_still_binds_queues() {
    let store = one_port_store();
    let config = tree_config("wdrr");
    let provisioner = Provisioner::new(&store, &store, fast());

    let mut ctx = RunContext::new();
    let globals = config.globals().next().unwrap();
    assert!(provisioner.init_switch_globals(&mut ctx, globals).await.succeeded());

    let node = config.port_node(InterfaceClass::FrontPanel).unwrap();
    store.unavailable_for(1);
    let phase = provisioner.init_port(&ctx, &front_panel("Ethernet0", 1), node).await;

    assert!(matches!(
        phase.outcome("Ethernet0 scheduler groups"),
        Some(OutcomeStatus::Failed(QosInitError::QueryFailed { .. }))
    ));
    assert!(matches!(phase.outcome("Ethernet0 sg 0/0"), Some(OutcomeStatus::Skipped(_))));
    assert!(matches!(phase.outcome("Ethernet0 sg 1/1"), Some(OutcomeStatus::Skipped(_))));

    let wdrr = profile_id(&store, "WDRR");
    let api = SchedulerApi::new(&store, AttrCodec::new(), 0);
    for number in 0..2 {
        let key = QueueKey::new(1, "UCAST", number);
        let target = format!("Ethernet0 {} profile wdrr", key);
        assert_eq!(phase.outcome(&target), Some(&OutcomeStatus::Applied));

        let id = api.queue_id(&key).await.unwrap().unwrap();
        let queue = store.find(ObjectClass::Queue, &[("id", AttrValue::Uint(id))]).unwrap();
        assert_eq!(
            AttrCodec::new()
                .decode_u64(ObjectClass::Queue, "scheduler-profile-id", &queue)
                .unwrap(),
            Some(wdrr)
        );
    }
    assert!(phase.outcome("Ethernet0 ingress dot1p-to-tc-map dot1p").is_some());
}

#[tokio::test]
async fn test_discovery_stops_after_repeat_pass() {
    let store = one_port_store();
    let port = front_panel("Ethernet0", 1);
    store.script_ports(InterfaceClass::FrontPanel, vec![vec![], vec![port.clone()], vec![port]]);

    let provisioner = Provisioner::new(&store, &store, fast());
    let report = provisioner.run(&tree_config("wdrr")).await;

    assert!(report.succeeded());
    assert_eq!(store.list_calls(InterfaceClass::FrontPanel), 3);
    assert_eq!(store.list_calls(InterfaceClass::Cpu), 0);
    assert_eq!(
        report.phases.iter().filter(|p| p.phase == "port Ethernet0").count(),
        1
    );
}

#[tokio::test]
async fn test_discovery_picks_up_late_port() {
    let topology = SimTopology {
        ports: vec![sim_port("Ethernet0", 1, vec![1, 2]), sim_port("Ethernet4", 2, vec![1, 2])],
    };
    let store = MemoryStore::from_topology(0, &topology).unwrap();
    let first = front_panel("Ethernet0", 1);
    let second = front_panel("Ethernet4", 2);
    store.script_ports(
        InterfaceClass::FrontPanel,
        vec![vec![first.clone()], vec![first.clone(), second.clone()], vec![first, second]],
    );

    let provisioner = Provisioner::new(&store, &store, fast());
    let report = provisioner.run(&tree_config("wdrr")).await;

    assert!(report.succeeded());
    assert!(report.phase("port Ethernet0").is_some());
    assert!(report.phase("port Ethernet4").is_some());
    assert_eq!(store.list_calls(InterfaceClass::FrontPanel), 3);
}

const SHORT_TREE: &str = r#"{
    "nodes": [
        { "node": "switch-globals",
          "scheduler-profiles": [ { "tag": "wdrr", "attrs": { "algorithm": "WDRR" } } ] },
        { "node": "front-panel-ports",
          "scheduler-tree": { "levels": [
            { "level": 1, "platform-may-omit": OMIT, "groups": [
                { "number": 0, "scheduler-profile": "wdrr" },
                { "number": 1, "scheduler-profile": "wdrr" } ] }
          ] } }
    ]
}"#;

#[tokio::test]
async fn test_missing_group_is_shortfall() {
    let topology = SimTopology {
        ports: vec![sim_port("Ethernet0", 1, vec![1, 1])],
    };
    let store = MemoryStore::from_topology(0, &topology).unwrap();
    let provisioner = Provisioner::new(&store, &store, fast());

    let strict = QosInitConfig::parse(&SHORT_TREE.replace("OMIT", "false")).unwrap();
    let report = provisioner.run(&strict).await;
    assert!(!report.succeeded());
    let phase = report.phase("port Ethernet0").unwrap();
    assert_eq!(phase.outcome("Ethernet0 sg 1/0 profile wdrr"), Some(&OutcomeStatus::Applied));
    assert_eq!(
        phase.outcome("Ethernet0 sg 1/1"),
        Some(&OutcomeStatus::Failed(QosInitError::SchedulerGroupShortfall {
            port: "Ethernet0".to_string(),
            level: 1,
            ordinal: 1,
            discovered: 1,
        }))
    );

    let lenient = QosInitConfig::parse(&SHORT_TREE.replace("OMIT", "true")).unwrap();
    let report = provisioner.run(&lenient).await;
    assert!(report.succeeded());
    assert!(matches!(
        report.phase("port Ethernet0").unwrap().outcome("Ethernet0 sg 1/1"),
        Some(OutcomeStatus::Skipped(_))
    ));
}

#[tokio::test]
async fn test_interface_rerun() {
    let store = one_port_store();
    let provisioner = Provisioner::new(&store, &store, fast());
    let config = tree_config("wdrr");

    let report = provisioner
        .init_interfaces(&config, &["Ethernet0".to_string()])
        .await
        .unwrap();
    assert!(report.succeeded());
    assert!(report.phase("interface Ethernet0").is_some());
    assert!(store.objects(ObjectClass::MapTable(MapType::Dot1pToTc)).is_empty());
    assert_eq!(store.objects(ObjectClass::SchedulerProfile).len(), 2);

    let err = provisioner
        .init_interfaces(&config, &["Ethernet0".to_string(), "Ethernet99".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err, QosInitError::PortUnavailable { name: "Ethernet99".to_string() });
}

#[test]
fn test_config_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TREE_CONFIG.as_bytes()).unwrap();

    let config = QosInitConfig::load(file.path()).unwrap();
    assert_eq!(config.nodes.len(), 2);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        QosInitConfig::load(&missing),
        Err(QosInitError::Config { .. })
    ));

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    bad.write_all(br#"{ "nodes": [ { "node": "front-panel-ports", "ingress": { "bogus-map": "x" } } ] }"#)
        .unwrap();
    let err = QosInitConfig::load(bad.path()).unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_shipped_config_against_simulated_topology() {
    let conf = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("conf");
    let config = QosInitConfig::load(&conf.join("base_qos_init.json")).unwrap();
    let topology = SimTopology::load(&conf.join("sim_topology.json")).unwrap();
    let store = MemoryStore::from_topology(0, &topology).unwrap();

    let provisioner = Provisioner::new(&store, &store, fast());
    assert_eq!(provisioner.wait_for_register().await.name, "Ethernet4");

    let report = provisioner.run(&config).await;
    assert!(report.succeeded(), "{}", report);
    assert!(report.phase("port cpu0").is_some());
    assert_eq!(store.objects(ObjectClass::MapEntry(MapType::DscpToTc)).len(), 64);
    assert_eq!(store.objects(ObjectClass::SchedulerProfile).len(), 4);
}
