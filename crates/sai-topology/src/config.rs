//! Topology configuration file support.
//!
//! Loads the T0 layout from TOML. Every field has a default, so an empty
//! file (or none at all) yields the reference topology: VLAN 10 on ports
//! 1-8, VLAN 20 on ports 9-16, four two-port LAGs on ports 17-24, routes
//! over each LAG and an ECMP route over all of them.

use crate::configurer::SettlePolicy;
use crate::error::{Result, TopologyError};
use itertools::Itertools;
use sai_client::api::{HashAlgorithm, NativeHashField};
use sai_types::VlanId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// One VLAN and its member ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub vlan_id: VlanId,
    pub ports: Vec<usize>,
    /// Members carry the tag on egress.
    #[serde(default)]
    pub tagged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSection {
    /// Strip the default VLAN's members before creating VLANs
    #[serde(default = "default_true")]
    pub reset_default_vlan: bool,

    #[serde(default = "default_vlans")]
    pub vlans: Vec<VlanSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagSection {
    /// Member ports per LAG; LAG *i* is the i-th entry, counting from 1
    #[serde(default = "default_lags")]
    pub lags: Vec<Vec<usize>>,

    /// Create and bind the IPv4 LAG hash object
    #[serde(default = "default_true")]
    pub configure_hash: bool,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    #[serde(default = "default_hash_seed")]
    pub hash_seed: u32,

    #[serde(default = "default_hash_fields")]
    pub hash_fields: Vec<NativeHashField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSection {
    #[serde(default = "default_true")]
    pub create_default_route: bool,

    /// Ports that get a port router interface
    #[serde(default = "default_port_rifs")]
    pub port_rifs: Vec<usize>,

    /// Bind every configured VLAN into the default virtual router
    #[serde(default = "default_true")]
    pub vlan_rifs: bool,

    #[serde(default)]
    pub loopback: bool,

    /// Route a server subnet over each LAG
    #[serde(default = "default_true")]
    pub route_for_lag: bool,

    /// Route a server subnet over an ECMP group spanning all LAGs
    #[serde(default = "default_true")]
    pub route_for_nexthop_group: bool,

    /// Build the ECMP group from the LAG routes' next-hops instead of new ones
    #[serde(default = "default_true")]
    pub reuse_lag_nexthop: bool,

    #[serde(default = "default_v4_prefix_len")]
    pub v4_prefix_len: u8,

    #[serde(default = "default_v6_prefix_len")]
    pub v6_prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbSection {
    /// Install static entries for the servers behind each VLAN
    #[serde(default = "default_true")]
    pub create: bool,

    /// Fixed wait when the device gives no convergence signal
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,
}

/// Sizes of the simulated peer tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSection {
    #[serde(default = "default_server_groups")]
    pub server_groups: usize,

    #[serde(default = "default_t1_groups")]
    pub t1_groups: usize,

    #[serde(default = "default_devices_per_group")]
    pub devices_per_group: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub vlan: VlanSection,

    #[serde(default)]
    pub lag: LagSection,

    #[serde(default)]
    pub route: RouteSection,

    #[serde(default)]
    pub fdb: FdbSection,

    #[serde(default)]
    pub devices: DeviceSection,
}

fn default_true() -> bool {
    true
}

fn default_vlans() -> Vec<VlanSpec> {
    [(10, 1..=8), (20, 9..=16)]
        .into_iter()
        .filter_map(|(id, ports)| {
            VlanId::new(id).ok().map(|vlan_id| VlanSpec {
                vlan_id,
                ports: ports.collect(),
                tagged: false,
            })
        })
        .collect()
}

fn default_lags() -> Vec<Vec<usize>> {
    vec![vec![17, 18], vec![19, 20], vec![21, 22], vec![23, 24]]
}

fn default_hash_seed() -> u32 {
    400
}

fn default_hash_fields() -> Vec<NativeHashField> {
    NativeHashField::DEFAULT_V4.to_vec()
}

fn default_port_rifs() -> Vec<usize> {
    vec![0]
}

fn default_v4_prefix_len() -> u8 {
    24
}

fn default_v6_prefix_len() -> u8 {
    112
}

fn default_settle_delay() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    50
}

fn default_settle_timeout() -> u64 {
    2000
}

fn default_server_groups() -> usize {
    61
}

fn default_t1_groups() -> usize {
    5
}

fn default_devices_per_group() -> usize {
    101
}

impl Default for VlanSection {
    fn default() -> Self {
        Self {
            reset_default_vlan: default_true(),
            vlans: default_vlans(),
        }
    }
}

impl Default for LagSection {
    fn default() -> Self {
        Self {
            lags: default_lags(),
            configure_hash: default_true(),
            hash_algorithm: HashAlgorithm::default(),
            hash_seed: default_hash_seed(),
            hash_fields: default_hash_fields(),
        }
    }
}

impl Default for RouteSection {
    fn default() -> Self {
        Self {
            create_default_route: default_true(),
            port_rifs: default_port_rifs(),
            vlan_rifs: default_true(),
            loopback: false,
            route_for_lag: default_true(),
            route_for_nexthop_group: default_true(),
            reuse_lag_nexthop: default_true(),
            v4_prefix_len: default_v4_prefix_len(),
            v6_prefix_len: default_v6_prefix_len(),
        }
    }
}

impl Default for FdbSection {
    fn default() -> Self {
        Self {
            create: default_true(),
            settle_delay_ms: default_settle_delay(),
            poll_interval_ms: default_poll_interval(),
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            server_groups: default_server_groups(),
            t1_groups: default_t1_groups(),
            devices_per_group: default_devices_per_group(),
        }
    }
}

/// Server group holding the ECMP route's destination.
pub(crate) const ECMP_SERVER_GROUP: usize = 60;
/// Server groups 11.. hold the per-LAG route destinations.
pub(crate) const LAG_SERVER_GROUP_BASE: usize = 10;
/// Index of the T1 peer used as next-hop in each T1 group.
pub(crate) const T1_NEXTHOP_INDEX: usize = 100;

impl TopologyConfig {
    /// Load configuration from file, falling back to defaults if the file is
    /// not found.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|e| match e {
                TopologyError::Config(msg) => {
                    TopologyError::Config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(TopologyError::Io(e)),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TopologyError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TopologyError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            delay: Duration::from_millis(self.fdb.settle_delay_ms),
            poll_interval: Duration::from_millis(self.fdb.poll_interval_ms),
            timeout: Duration::from_millis(self.fdb.settle_timeout_ms),
        }
    }

    /// Highest port index the layout refers to.
    pub fn max_port_index(&self) -> Option<usize> {
        self.vlan
            .vlans
            .iter()
            .flat_map(|v| v.ports.iter())
            .chain(self.lag.lags.iter().flatten())
            .chain(self.route.port_rifs.iter())
            .copied()
            .max()
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TopologyError::Config(msg));

        if let Some(dup) = self.vlan.vlans.iter().map(|v| v.vlan_id).duplicates().next() {
            return fail(format!("vlan {} configured twice", dup));
        }
        if self.vlan.vlans.iter().any(|v| v.vlan_id.is_default()) {
            return fail("vlan 1 is the default vlan and cannot be configured".to_string());
        }
        if self.lag.lags.iter().any(|ports| ports.is_empty()) {
            return fail("every lag needs at least one member port".to_string());
        }

        // Ports are exclusive between LAGs and between VLANs. A LAG member
        // must not sit in a VLAN either.
        let member_ports = self
            .vlan
            .vlans
            .iter()
            .flat_map(|v| v.ports.iter())
            .chain(self.lag.lags.iter().flatten());
        if let Some(port) = member_ports.duplicates().next() {
            return fail(format!("port {} is a member of more than one vlan or lag", port));
        }

        if self.route.v4_prefix_len > 32 {
            return fail("v4_prefix_len must be 0-32".to_string());
        }
        if self.route.v6_prefix_len > 128 {
            return fail("v6_prefix_len must be 0-128".to_string());
        }
        if self.fdb.settle_timeout_ms > 0 && self.fdb.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be > 0 when settle_timeout_ms is set".to_string());
        }

        let devices = &self.devices;
        if devices.server_groups > 256 || devices.t1_groups > 256 || devices.devices_per_group > 256 {
            return fail("device tables are limited to 256 groups of 256".to_string());
        }
        if self.route.route_for_lag || self.route.route_for_nexthop_group {
            if devices.t1_groups <= self.lag.lags.len() {
                return fail(format!(
                    "t1_groups must exceed the lag count {}",
                    self.lag.lags.len()
                ));
            }
            if devices.devices_per_group <= T1_NEXTHOP_INDEX {
                return fail(format!("devices_per_group must exceed {}", T1_NEXTHOP_INDEX));
            }
        }
        if self.route.route_for_lag && devices.server_groups <= LAG_SERVER_GROUP_BASE + self.lag.lags.len() {
            return fail("server_groups too small for per-lag routes".to_string());
        }
        if self.route.route_for_nexthop_group {
            if devices.server_groups <= ECMP_SERVER_GROUP {
                return fail(format!("server_groups must exceed {}", ECMP_SERVER_GROUP));
            }
            if self.lag.lags.is_empty() {
                return fail("next-hop group route needs at least one lag".to_string());
            }
        }
        if self.fdb.create {
            if devices.server_groups <= self.vlan.vlans.len() {
                return fail("server_groups too small for the fdb entries".to_string());
            }
            if let Some(vlan) = self
                .vlan
                .vlans
                .iter()
                .find(|v| v.ports.len() >= devices.devices_per_group)
            {
                return fail(format!(
                    "vlan {} has more ports than devices per group",
                    vlan.vlan_id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = TopologyConfig::default();
        assert!(config.vlan.reset_default_vlan);
        assert_eq!(config.vlan.vlans.len(), 2);
        assert_eq!(config.vlan.vlans[0].vlan_id.as_u16(), 10);
        assert_eq!(config.vlan.vlans[1].ports, (9..=16).collect::<Vec<_>>());
        assert_eq!(config.lag.lags.len(), 4);
        assert_eq!(config.lag.hash_seed, 400);
        assert_eq!(config.route.v4_prefix_len, 24);
        assert_eq!(config.route.v6_prefix_len, 112);
        assert_eq!(config.max_port_index(), Some(24));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(TopologyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_port_in_vlan_and_lag() {
        let mut config = TopologyConfig::default();
        config.lag.lags[0] = vec![8, 17];
        assert!(matches!(config.validate(), Err(TopologyError::Config(_))));
    }

    #[test]
    fn test_validate_duplicate_vlan() {
        let mut config = TopologyConfig::default();
        config.vlan.vlans[1].vlan_id = config.vlan.vlans[0].vlan_id;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_prefix_len() {
        let mut config = TopologyConfig::default();
        config.route.v4_prefix_len = 33;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_device_tables() {
        let mut config = TopologyConfig::default();
        config.devices.server_groups = 40;
        assert!(config.validate().is_err());
        config.route.route_for_nexthop_group = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_settle_policy_durations() {
        let policy = TopologyConfig::default().settle_policy();
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert_eq!(policy.poll_interval, Duration::from_millis(50));
        assert_eq!(policy.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[vlan]
reset_default_vlan = false

[[vlan.vlans]]
vlan_id = 100
ports = [1, 2]
tagged = true

[lag]
lags = [[3, 4]]
hash_algorithm = "xor"

[route]
loopback = true
"#;
        let config = TopologyConfig::from_toml_str(toml_str).unwrap();
        assert!(!config.vlan.reset_default_vlan);
        assert_eq!(config.vlan.vlans.len(), 1);
        assert!(config.vlan.vlans[0].tagged);
        assert_eq!(config.lag.lags, vec![vec![3, 4]]);
        assert_eq!(config.lag.hash_algorithm, HashAlgorithm::Xor);
        assert!(config.route.loopback);
        // Unspecified values fall back to defaults
        assert_eq!(config.lag.hash_seed, 400);
        assert_eq!(config.fdb.settle_delay_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_vlan_id_rejected() {
        let toml_str = r#"
[[vlan.vlans]]
vlan_id = 4095
ports = [1]
"#;
        assert!(matches!(
            TopologyConfig::from_toml_str(toml_str),
            Err(TopologyError::Config(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t0.toml");
        let mut config = TopologyConfig::default();
        config.fdb.create = false;
        config.route.port_rifs = vec![0, 25];

        config.save(&path).unwrap();
        let loaded = TopologyConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = TopologyConfig::load_or_default("/nonexistent/t0.toml").unwrap();
        assert_eq!(config, TopologyConfig::default());
    }
}
