//! Global enum table.
//!
//! Keys have the form `base-qos:<family>:<SYMBOL>`. Each family is a small,
//! dense set of codes starting at 1, so reverse lookup is a linear scan
//! restricted to the family prefix.

use crate::error::{CodecError, CodecResult};

pub const METER_TYPE: &str = "base-qos:meter-type:";
pub const METER_MODE: &str = "base-qos:meter-mode:";
pub const METER_COLOR_SOURCE: &str = "base-qos:meter-color-source:";
pub const POLICER_ACTION: &str = "base-qos:policer-action:";
pub const PACKET_COLOR: &str = "base-qos:packet-color:";
pub const QUEUE_TYPE: &str = "base-qos:queue-type:";
pub const PACKET_DROP_TYPE: &str = "base-qos:packet-drop-type:";
pub const SCHEDULING_TYPE: &str = "base-qos:scheduling-type:";
pub const FLOW_CONTROL: &str = "base-qos:flow-control:";
pub const BUFFER_POOL_TYPE: &str = "base-qos:buffer-pool-type:";
pub const BUFFER_THRESHOLD_MODE: &str = "base-qos:buffer-threshold-mode:";

static BASE_QOS_ENUMS: &[(&str, u32)] = &[
    ("base-qos:meter-type:PACKET", 1),
    ("base-qos:meter-type:BYTE", 2),
    ("base-qos:meter-mode:Sr_TCM", 1),
    ("base-qos:meter-mode:Tr_TCM", 2),
    ("base-qos:meter-mode:Sr_TWO_COLOR", 3),
    ("base-qos:meter-mode:STORM_CONTROL", 4),
    ("base-qos:meter-color-source:BLIND", 1),
    ("base-qos:meter-color-source:AWARE", 2),
    ("base-qos:policer-action:FORWARD", 1),
    ("base-qos:policer-action:DROP", 2),
    ("base-qos:packet-color:GREEN", 1),
    ("base-qos:packet-color:YELLOW", 2),
    ("base-qos:packet-color:RED", 3),
    ("base-qos:queue-type:NONE", 1),
    ("base-qos:queue-type:UCAST", 2),
    ("base-qos:queue-type:MULTICAST", 3),
    ("base-qos:packet-drop-type:TAIL", 1),
    ("base-qos:packet-drop-type:WRED", 2),
    ("base-qos:scheduling-type:SP", 1),
    ("base-qos:scheduling-type:WRR", 2),
    ("base-qos:scheduling-type:WDRR", 3),
    ("base-qos:flow-control:DISABLE", 1),
    ("base-qos:flow-control:TX-ONLY", 2),
    ("base-qos:flow-control:RX-ONLY", 3),
    ("base-qos:flow-control:BOTH-ENABLE", 4),
    ("base-qos:buffer-pool-type:INGRESS", 1),
    ("base-qos:buffer-pool-type:EGRESS", 2),
    ("base-qos:buffer-threshold-mode:STATIC", 1),
    ("base-qos:buffer-threshold-mode:DYNAMIC", 2),
];

/// A static table of enum keys and their integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumTable {
    entries: &'static [(&'static str, u32)],
}

impl EnumTable {
    pub const fn new(entries: &'static [(&'static str, u32)]) -> Self {
        Self { entries }
    }

    /// The `base-qos` enum table used by every QoS object class.
    pub const fn base_qos() -> Self {
        Self::new(BASE_QOS_ENUMS)
    }

    /// Resolves a full key (prefix + symbol) to its code.
    pub fn code(&self, key: &str) -> CodecResult<u32> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, code)| *code)
            .ok_or_else(|| CodecError::UnknownEnumSymbol {
                key: key.to_string(),
            })
    }

    /// Resolves `symbol` within the family named by `prefix`.
    pub fn encode(&self, prefix: &str, symbol: &str) -> CodecResult<u32> {
        self.code(&format!("{}{}", prefix, symbol))
    }

    /// Finds the symbol carrying `code` within the family named by `prefix`.
    pub fn symbol(&self, prefix: &str, code: u32) -> CodecResult<&'static str> {
        self.entries
            .iter()
            .filter(|(_, c)| *c == code)
            .find_map(|(k, _)| k.strip_prefix(prefix))
            .ok_or_else(|| CodecError::UnknownEnumCode {
                family: prefix.trim_end_matches(':').to_string(),
                code,
            })
    }

    /// All symbols of one family, in table order.
    pub fn family(&self, prefix: &'static str) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.entries
            .iter()
            .filter_map(move |(k, c)| k.strip_prefix(prefix).map(|s| (s, *c)))
    }
}

impl Default for EnumTable {
    fn default() -> Self {
        Self::base_qos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILIES: &[&str] = &[
        METER_TYPE,
        METER_MODE,
        METER_COLOR_SOURCE,
        POLICER_ACTION,
        PACKET_COLOR,
        QUEUE_TYPE,
        PACKET_DROP_TYPE,
        SCHEDULING_TYPE,
        FLOW_CONTROL,
        BUFFER_POOL_TYPE,
        BUFFER_THRESHOLD_MODE,
    ];

    #[test]
    fn test_code_lookup() {
        let table = EnumTable::base_qos();
        assert_eq!(table.encode(QUEUE_TYPE, "UCAST").unwrap(), 2);
        assert_eq!(table.encode(SCHEDULING_TYPE, "WDRR").unwrap(), 3);
        assert_eq!(table.code("base-qos:packet-color:RED").unwrap(), 3);
    }

    #[test]
    fn test_unknown_symbol() {
        let table = EnumTable::base_qos();
        let err = table.encode(QUEUE_TYPE, "ANYCAST").unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownEnumSymbol {
                key: "base-qos:queue-type:ANYCAST".to_string()
            }
        );
    }

    #[test]
    fn test_symbol_stable_within_family() {
        let table = EnumTable::base_qos();
        for &prefix in FAMILIES {
            let members: Vec<_> = table.family(prefix).collect();
            assert!(!members.is_empty(), "empty family {}", prefix);
            for (symbol, code) in &members {
                assert_eq!(table.encode(prefix, symbol).unwrap(), *code);
                assert_eq!(table.symbol(prefix, *code).unwrap(), *symbol);
                let same_code = members.iter().filter(|(_, c)| c == code).count();
                assert_eq!(same_code, 1, "duplicate code {} in {}", code, prefix);
            }
        }
    }

    #[test]
    fn test_symbol_does_not_cross_families() {
        let table = EnumTable::base_qos();
        // Code 4 exists for flow-control but not for queue-type.
        assert_eq!(table.symbol(FLOW_CONTROL, 4).unwrap(), "BOTH-ENABLE");
        assert!(matches!(
            table.symbol(QUEUE_TYPE, 4),
            Err(CodecError::UnknownEnumCode { code: 4, .. })
        ));
    }
}
