//! In-memory switch implementing [`SaiClient`].

use log::debug;
use sai_client::api::{
    BridgePortAttr, BridgePortAttribute, FdbConfig, FdbEntry, HashAlgorithm, HashAttr,
    HashAttribute, LagMemberConfig, NativeHashField, NeighborConfig, NeighborEntry,
    NextHopConfig, NextHopGroupMemberConfig, NextHopGroupType, PortAttr, PortAttribute,
    RifTarget, RouteAttr, RouteAttribute, RouteConfig, RouteEntry, RouteTarget,
    RouterInterfaceAttr, RouterInterfaceAttribute, RouterInterfaceConfig, SwitchAttr,
    SwitchAttribute, VlanAttr, VlanAttribute, VlanMemberConfig, VlanTaggingMode,
};
use sai_client::{
    BridgePortOid, HashOid, LagMemberOid, LagOid, NextHopGroupMemberOid, NextHopGroupOid,
    NextHopOid, PortOid, RouterInterfaceOid, SaiClient, SaiError, SaiObjectId, SaiObjectKind,
    SaiResult, SaiStatus, SwitchOid, VirtualRouterOid, VlanMemberOid, VlanOid,
};
use sai_types::{MacAddress, VlanId};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

/// Mutating calls, as recorded in the journal and targeted by failure
/// injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimOp {
    SetSwitchAttribute,
    SetPortAttribute,
    CreateVlan,
    RemoveVlan,
    CreateVlanMember,
    RemoveVlanMember,
    CreateLag,
    RemoveLag,
    CreateLagMember,
    RemoveLagMember,
    CreateHash,
    RemoveHash,
    SetHashAttribute,
    CreateRouterInterface,
    RemoveRouterInterface,
    SetRouterInterfaceAttribute,
    CreateNeighborEntry,
    RemoveNeighborEntry,
    CreateNextHop,
    RemoveNextHop,
    CreateNextHopGroup,
    RemoveNextHopGroup,
    CreateNextHopGroupMember,
    RemoveNextHopGroupMember,
    CreateRouteEntry,
    RemoveRouteEntry,
    CreateFdbEntry,
    RemoveFdbEntry,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub port_count: usize,
    pub router_mac: MacAddress,
    /// Answer [`SaiClient::fdb_converged`] instead of reporting it
    /// unsupported.
    pub report_fdb_convergence: bool,
    /// Convergence polls answered `false` before entries count as settled.
    /// `None` never settles.
    pub fdb_converge_after_polls: Option<usize>,
    pub default_mtu: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            port_count: 32,
            router_mac: MacAddress::new([0x00, 0x77, 0x66, 0x55, 0x44, 0x00]),
            report_fdb_convergence: true,
            fdb_converge_after_polls: Some(0),
            default_mtu: 9100,
        }
    }
}

/// Object type tags placed in the top 16 bits of every id the sim hands out.
#[derive(Clone, Copy)]
#[repr(u64)]
enum ObjType {
    Port = 0x01,
    Lag = 0x02,
    VirtualRouter = 0x03,
    NextHop = 0x04,
    NextHopGroup = 0x05,
    RouterInterface = 0x06,
    LagMember = 0x1b,
    Hash = 0x1c,
    Switch = 0x21,
    Vlan = 0x26,
    VlanMember = 0x27,
    NextHopGroupMember = 0x2d,
    BridgePort = 0x3a,
}

#[derive(Debug, Clone)]
pub(crate) struct VlanState {
    pub(crate) vlan_id: u16,
    pub(crate) members: Vec<VlanMemberOid>,
}

#[derive(Debug, Clone)]
pub(crate) struct RifState {
    pub(crate) config: RouterInterfaceConfig,
    pub(crate) src_mac: MacAddress,
    pub(crate) mtu: u32,
}

#[derive(Debug)]
pub(crate) struct SimState {
    next_raw: u64,
    journal: Vec<SimOp>,
    failures: Vec<(SimOp, SaiStatus)>,

    pub(crate) switch_id: SwitchOid,
    pub(crate) default_vr: VirtualRouterOid,
    pub(crate) default_vlan: VlanOid,
    pub(crate) router_mac: MacAddress,
    pub(crate) lag_hash_algorithm: HashAlgorithm,
    pub(crate) lag_hash_seed: u32,
    pub(crate) lag_hash_ipv4: HashOid,

    pub(crate) ports: Vec<PortOid>,
    pub(crate) port_vlan_ids: HashMap<PortOid, u16>,
    pub(crate) bridge_ports: BTreeMap<BridgePortOid, PortOid>,

    pub(crate) vlans: BTreeMap<VlanOid, VlanState>,
    pub(crate) vlan_members: BTreeMap<VlanMemberOid, VlanMemberConfig>,
    pub(crate) lags: BTreeMap<LagOid, Vec<LagMemberOid>>,
    pub(crate) lag_members: BTreeMap<LagMemberOid, LagMemberConfig>,
    pub(crate) hashes: BTreeMap<HashOid, Vec<NativeHashField>>,
    pub(crate) rifs: BTreeMap<RouterInterfaceOid, RifState>,
    pub(crate) neighbors: BTreeMap<NeighborEntry, NeighborConfig>,
    pub(crate) next_hops: BTreeMap<NextHopOid, NextHopConfig>,
    pub(crate) groups: BTreeMap<NextHopGroupOid, Vec<NextHopGroupMemberOid>>,
    pub(crate) group_members: BTreeMap<NextHopGroupMemberOid, NextHopGroupMemberConfig>,
    pub(crate) routes: BTreeMap<RouteEntry, RouteConfig>,
    pub(crate) fdb: BTreeMap<FdbEntry, FdbConfig>,
    pub(crate) fdb_polls: usize,
}

fn status_err(status: SaiStatus) -> SaiError {
    SaiError::from_status(status)
}

fn ensure(cond: bool, status: SaiStatus) -> SaiResult<()> {
    if cond {
        Ok(())
    } else {
        Err(status_err(status))
    }
}

impl SimState {
    fn new(config: &SimConfig) -> Self {
        let mut state = SimState {
            next_raw: 1,
            journal: Vec::new(),
            failures: Vec::new(),
            switch_id: SwitchOid::NULL,
            default_vr: VirtualRouterOid::NULL,
            default_vlan: VlanOid::NULL,
            router_mac: config.router_mac,
            lag_hash_algorithm: HashAlgorithm::Crc,
            lag_hash_seed: 0,
            lag_hash_ipv4: HashOid::NULL,
            ports: Vec::new(),
            port_vlan_ids: HashMap::new(),
            bridge_ports: BTreeMap::new(),
            vlans: BTreeMap::new(),
            vlan_members: BTreeMap::new(),
            lags: BTreeMap::new(),
            lag_members: BTreeMap::new(),
            hashes: BTreeMap::new(),
            rifs: BTreeMap::new(),
            neighbors: BTreeMap::new(),
            next_hops: BTreeMap::new(),
            groups: BTreeMap::new(),
            group_members: BTreeMap::new(),
            routes: BTreeMap::new(),
            fdb: BTreeMap::new(),
            fdb_polls: 0,
        };

        state.switch_id = state.alloc(ObjType::Switch);
        state.default_vr = state.alloc(ObjType::VirtualRouter);
        state.default_vlan = state.alloc(ObjType::Vlan);

        let mut default_members = Vec::new();
        for _ in 0..config.port_count {
            let port: PortOid = state.alloc(ObjType::Port);
            let bridge_port: BridgePortOid = state.alloc(ObjType::BridgePort);
            let member: VlanMemberOid = state.alloc(ObjType::VlanMember);
            state.ports.push(port);
            state.port_vlan_ids.insert(port, VlanId::DEFAULT.as_u16());
            state.bridge_ports.insert(bridge_port, port);
            state.vlan_members.insert(
                member,
                VlanMemberConfig {
                    vlan: state.default_vlan,
                    bridge_port,
                    tagging: VlanTaggingMode::Untagged,
                },
            );
            default_members.push(member);
        }
        state.vlans.insert(
            state.default_vlan,
            VlanState {
                vlan_id: VlanId::DEFAULT.as_u16(),
                members: default_members,
            },
        );
        state
    }

    fn alloc<K: SaiObjectKind>(&mut self, ty: ObjType) -> SaiObjectId<K> {
        let raw = ((ty as u64) << 48) | self.next_raw;
        self.next_raw += 1;
        SaiObjectId::from_raw_unchecked(raw)
    }

    fn take_failure(&mut self, op: SimOp) -> Option<SaiStatus> {
        let pos = self.failures.iter().position(|(o, _)| *o == op)?;
        Some(self.failures.remove(pos).1)
    }

    pub(crate) fn port_of_bridge_port(&self, bridge_port: BridgePortOid) -> Option<PortOid> {
        self.bridge_ports.get(&bridge_port).copied()
    }

    pub(crate) fn lag_of_port(&self, port: PortOid) -> Option<LagOid> {
        self.lag_members
            .values()
            .find(|m| m.port == port)
            .map(|m| m.lag)
    }

    fn rif_in_use(&self, rif: RouterInterfaceOid) -> bool {
        self.neighbors.keys().any(|n| n.rif == rif)
            || self.next_hops.values().any(|nh| nh.rif == rif)
            || self
                .routes
                .values()
                .any(|r| r.target == RouteTarget::RouterInterface(rif))
    }

    fn rif_target_exists(&self, target: &RifTarget) -> bool {
        match target {
            RifTarget::Port(port) => self.ports.contains(port),
            RifTarget::Lag(lag) => self.lags.contains_key(lag),
            RifTarget::Vlan(vlan) => self.vlans.contains_key(vlan),
            RifTarget::Bridge(bp) => self.bridge_ports.contains_key(bp),
            RifTarget::Loopback => true,
        }
    }

    fn route_target_exists(&self, target: &RouteTarget) -> bool {
        match target {
            RouteTarget::None => true,
            RouteTarget::RouterInterface(rif) => self.rifs.contains_key(rif),
            RouteTarget::NextHop(nh) => self.next_hops.contains_key(nh),
            RouteTarget::NextHopGroup(g) => self.groups.contains_key(g),
        }
    }
}

/// Live user-created objects, for asserting that teardown left nothing
/// behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimInventory {
    pub vlans: usize,
    pub vlan_members: usize,
    pub lags: usize,
    pub lag_members: usize,
    pub hashes: usize,
    pub router_interfaces: usize,
    pub neighbors: usize,
    pub next_hops: usize,
    pub next_hop_groups: usize,
    pub next_hop_group_members: usize,
    pub routes: usize,
    pub fdb_entries: usize,
}

impl SimInventory {
    pub fn is_empty(&self) -> bool {
        *self == SimInventory::default()
    }
}

/// A switch held entirely in memory.
///
/// Boots with `port_count` ports, one bridge port each, every bridge port
/// an untagged member of VLAN 1, and a default virtual router.
pub struct SimSwitch {
    config: SimConfig,
    pub(crate) state: RefCell<SimState>,
}

impl Default for SimSwitch {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimSwitch {
    pub fn new(config: SimConfig) -> Self {
        let state = RefCell::new(SimState::new(&config));
        Self { config, state }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn router_mac(&self) -> MacAddress {
        self.state.borrow().router_mac
    }

    /// Port at front-panel `index`.
    pub fn port(&self, index: usize) -> Option<PortOid> {
        self.state.borrow().ports.get(index).copied()
    }

    pub fn port_index(&self, port: PortOid) -> Option<usize> {
        self.state.borrow().ports.iter().position(|p| *p == port)
    }

    /// Make the next `op` call fail with `status`.
    pub fn fail_next(&self, op: SimOp, status: SaiStatus) {
        self.state.borrow_mut().failures.push((op, status));
    }

    /// Successful mutating calls, in order.
    pub fn journal(&self) -> Vec<SimOp> {
        self.state.borrow().journal.clone()
    }

    pub fn count(&self, op: SimOp) -> usize {
        self.state.borrow().journal.iter().filter(|o| **o == op).count()
    }

    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    pub fn route(&self, entry: &RouteEntry) -> Option<RouteConfig> {
        self.state.borrow().routes.get(entry).copied()
    }

    pub fn neighbor(&self, entry: &NeighborEntry) -> Option<NeighborConfig> {
        self.state.borrow().neighbors.get(entry).copied()
    }

    pub fn next_hop(&self, next_hop: NextHopOid) -> Option<NextHopConfig> {
        self.state.borrow().next_hops.get(&next_hop).copied()
    }

    pub fn router_interface(&self, rif: RouterInterfaceOid) -> Option<RouterInterfaceConfig> {
        self.state.borrow().rifs.get(&rif).map(|r| r.config)
    }

    pub fn group_members(&self, group: NextHopGroupOid) -> Vec<NextHopOid> {
        let state = self.state.borrow();
        state
            .groups
            .get(&group)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| state.group_members.get(m).map(|c| c.next_hop))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn fdb_entry(&self, entry: &FdbEntry) -> Option<FdbConfig> {
        self.state.borrow().fdb.get(entry).copied()
    }

    pub fn inventory(&self) -> SimInventory {
        let s = self.state.borrow();
        SimInventory {
            vlans: s.vlans.len() - 1,
            vlan_members: s
                .vlan_members
                .values()
                .filter(|m| m.vlan != s.default_vlan)
                .count(),
            lags: s.lags.len(),
            lag_members: s.lag_members.len(),
            hashes: s.hashes.len(),
            router_interfaces: s.rifs.len(),
            neighbors: s.neighbors.len(),
            next_hops: s.next_hops.len(),
            next_hop_groups: s.groups.len(),
            next_hop_group_members: s.group_members.len(),
            routes: s.routes.len(),
            fdb_entries: s.fdb.len(),
        }
    }

    /// Runs a mutating call: applies pending injected failures, then `f`,
    /// and journals `op` if it succeeded.
    fn mutate<T>(&self, op: SimOp, f: impl FnOnce(&mut SimState) -> SaiResult<T>) -> SaiResult<T> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.take_failure(op) {
            debug!("{:?}: injected {}", op, status);
            return Err(status_err(status));
        }
        let value = f(&mut state)?;
        state.journal.push(op);
        Ok(value)
    }
}

impl SaiClient for SimSwitch {
    fn switch_id(&self) -> SwitchOid {
        self.state.borrow().switch_id
    }

    fn get_switch_attribute(&self, attr: SwitchAttr) -> SaiResult<SwitchAttribute> {
        let s = self.state.borrow();
        Ok(match attr {
            SwitchAttr::DefaultVirtualRouterId => SwitchAttribute::DefaultVirtualRouterId(s.default_vr),
            SwitchAttr::DefaultVlanId => SwitchAttribute::DefaultVlanId(s.default_vlan),
            SwitchAttr::PortList => SwitchAttribute::PortList(s.ports.clone()),
            SwitchAttr::BridgePortList => {
                SwitchAttribute::BridgePortList(s.bridge_ports.keys().copied().collect())
            }
            SwitchAttr::SrcMacAddress => SwitchAttribute::SrcMacAddress(s.router_mac),
            SwitchAttr::LagDefaultHashAlgorithm => {
                SwitchAttribute::LagDefaultHashAlgorithm(s.lag_hash_algorithm)
            }
            SwitchAttr::LagDefaultHashSeed => SwitchAttribute::LagDefaultHashSeed(s.lag_hash_seed),
            SwitchAttr::LagHashIpv4 => SwitchAttribute::LagHashIpv4(s.lag_hash_ipv4),
        })
    }

    fn set_switch_attribute(&self, attr: SwitchAttribute) -> SaiResult<()> {
        self.mutate(SimOp::SetSwitchAttribute, |s| {
            match attr {
                SwitchAttribute::SrcMacAddress(mac) => s.router_mac = mac,
                SwitchAttribute::LagDefaultHashAlgorithm(algo) => s.lag_hash_algorithm = algo,
                SwitchAttribute::LagDefaultHashSeed(seed) => s.lag_hash_seed = seed,
                SwitchAttribute::LagHashIpv4(hash) => {
                    ensure(hash.is_null() || s.hashes.contains_key(&hash), SaiStatus::InvalidObjectId)?;
                    s.lag_hash_ipv4 = hash;
                }
                other => {
                    return Err(SaiError::invalid_parameter(format!(
                        "{:?} is read-only",
                        other.id()
                    )))
                }
            }
            Ok(())
        })
    }

    fn get_port_attribute(&self, port: PortOid, attr: PortAttr) -> SaiResult<PortAttribute> {
        let s = self.state.borrow();
        let pvid = s
            .port_vlan_ids
            .get(&port)
            .copied()
            .ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
        match attr {
            PortAttr::PortVlanId => Ok(PortAttribute::PortVlanId(pvid)),
        }
    }

    fn set_port_attribute(&self, port: PortOid, attr: PortAttribute) -> SaiResult<()> {
        self.mutate(SimOp::SetPortAttribute, |s| {
            let slot = s
                .port_vlan_ids
                .get_mut(&port)
                .ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
            match attr {
                PortAttribute::PortVlanId(id) => *slot = id,
            }
            Ok(())
        })
    }

    fn get_bridge_port_attribute(
        &self,
        bridge_port: BridgePortOid,
        attr: BridgePortAttr,
    ) -> SaiResult<BridgePortAttribute> {
        let port = self
            .state
            .borrow()
            .port_of_bridge_port(bridge_port)
            .ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
        match attr {
            BridgePortAttr::PortId => Ok(BridgePortAttribute::PortId(port)),
        }
    }

    fn create_vlan(&self, vlan_id: VlanId) -> SaiResult<VlanOid> {
        self.mutate(SimOp::CreateVlan, |s| {
            let tag = vlan_id.as_u16();
            ensure(
                !s.vlans.values().any(|v| v.vlan_id == tag),
                SaiStatus::ItemAlreadyExists,
            )?;
            let oid = s.alloc(ObjType::Vlan);
            s.vlans.insert(
                oid,
                VlanState {
                    vlan_id: tag,
                    members: Vec::new(),
                },
            );
            debug!("created vlan {} as {:?}", tag, oid);
            Ok(oid)
        })
    }

    fn remove_vlan(&self, vlan: VlanOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveVlan, |s| {
            ensure(vlan != s.default_vlan, SaiStatus::InvalidParameter)?;
            let state = s.vlans.get(&vlan).ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            let referenced = !state.members.is_empty()
                || s.rifs.values().any(|r| r.config.target == RifTarget::Vlan(vlan))
                || s.fdb.keys().any(|f| f.bv_id == vlan);
            ensure(!referenced, SaiStatus::ObjectInUse)?;
            s.vlans.remove(&vlan);
            Ok(())
        })
    }

    fn get_vlan_attribute(&self, vlan: VlanOid, attr: VlanAttr) -> SaiResult<VlanAttribute> {
        let s = self.state.borrow();
        let state = s.vlans.get(&vlan).ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
        Ok(match attr {
            VlanAttr::VlanId => VlanAttribute::VlanId(state.vlan_id),
            VlanAttr::MemberList => VlanAttribute::MemberList(state.members.clone()),
        })
    }

    fn create_vlan_member(&self, config: &VlanMemberConfig) -> SaiResult<VlanMemberOid> {
        self.mutate(SimOp::CreateVlanMember, |s| {
            ensure(s.vlans.contains_key(&config.vlan), SaiStatus::InvalidObjectId)?;
            ensure(
                s.bridge_ports.contains_key(&config.bridge_port),
                SaiStatus::InvalidObjectId,
            )?;
            let duplicate = s
                .vlan_members
                .values()
                .any(|m| m.vlan == config.vlan && m.bridge_port == config.bridge_port);
            ensure(!duplicate, SaiStatus::ItemAlreadyExists)?;

            let oid = s.alloc(ObjType::VlanMember);
            s.vlan_members.insert(oid, *config);
            if let Some(vlan) = s.vlans.get_mut(&config.vlan) {
                vlan.members.push(oid);
            }
            Ok(oid)
        })
    }

    fn remove_vlan_member(&self, member: VlanMemberOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveVlanMember, |s| {
            let config = s
                .vlan_members
                .remove(&member)
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            if let Some(vlan) = s.vlans.get_mut(&config.vlan) {
                vlan.members.retain(|m| *m != member);
            }
            Ok(())
        })
    }

    fn create_lag(&self) -> SaiResult<LagOid> {
        self.mutate(SimOp::CreateLag, |s| {
            let oid = s.alloc(ObjType::Lag);
            s.lags.insert(oid, Vec::new());
            Ok(oid)
        })
    }

    fn remove_lag(&self, lag: LagOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveLag, |s| {
            let members = s.lags.get(&lag).ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            let referenced = !members.is_empty()
                || s.rifs.values().any(|r| r.config.target == RifTarget::Lag(lag));
            ensure(!referenced, SaiStatus::ObjectInUse)?;
            s.lags.remove(&lag);
            Ok(())
        })
    }

    fn create_lag_member(&self, config: &LagMemberConfig) -> SaiResult<LagMemberOid> {
        self.mutate(SimOp::CreateLagMember, |s| {
            ensure(s.lags.contains_key(&config.lag), SaiStatus::InvalidObjectId)?;
            ensure(s.ports.contains(&config.port), SaiStatus::InvalidPortNumber)?;
            ensure(s.lag_of_port(config.port).is_none(), SaiStatus::InvalidPortMember)?;
            let oid = s.alloc(ObjType::LagMember);
            s.lag_members.insert(oid, *config);
            if let Some(members) = s.lags.get_mut(&config.lag) {
                members.push(oid);
            }
            Ok(oid)
        })
    }

    fn remove_lag_member(&self, member: LagMemberOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveLagMember, |s| {
            let config = s
                .lag_members
                .remove(&member)
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            if let Some(members) = s.lags.get_mut(&config.lag) {
                members.retain(|m| *m != member);
            }
            Ok(())
        })
    }

    fn create_hash(&self, fields: &[NativeHashField]) -> SaiResult<HashOid> {
        self.mutate(SimOp::CreateHash, |s| {
            let oid = s.alloc(ObjType::Hash);
            s.hashes.insert(oid, fields.to_vec());
            Ok(oid)
        })
    }

    fn remove_hash(&self, hash: HashOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveHash, |s| {
            ensure(s.lag_hash_ipv4 != hash, SaiStatus::ObjectInUse)?;
            s.hashes
                .remove(&hash)
                .map(|_| ())
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))
        })
    }

    fn get_hash_attribute(&self, hash: HashOid, attr: HashAttr) -> SaiResult<HashAttribute> {
        let s = self.state.borrow();
        let fields = s.hashes.get(&hash).ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
        match attr {
            HashAttr::NativeHashFieldList => Ok(HashAttribute::NativeHashFieldList(fields.clone())),
        }
    }

    fn set_hash_attribute(&self, hash: HashOid, attr: HashAttribute) -> SaiResult<()> {
        self.mutate(SimOp::SetHashAttribute, |s| {
            let fields = s
                .hashes
                .get_mut(&hash)
                .ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
            match attr {
                HashAttribute::NativeHashFieldList(list) => *fields = list,
            }
            Ok(())
        })
    }

    fn create_router_interface(
        &self,
        config: &RouterInterfaceConfig,
    ) -> SaiResult<RouterInterfaceOid> {
        let default_mtu = self.config.default_mtu;
        self.mutate(SimOp::CreateRouterInterface, |s| {
            ensure(config.vrf == s.default_vr, SaiStatus::InvalidObjectId)?;
            ensure(s.rif_target_exists(&config.target), SaiStatus::InvalidObjectId)?;
            let oid = s.alloc(ObjType::RouterInterface);
            let src_mac = config.src_mac.unwrap_or(s.router_mac);
            let mtu = config.mtu.unwrap_or(default_mtu);
            s.rifs.insert(
                oid,
                RifState {
                    config: *config,
                    src_mac,
                    mtu,
                },
            );
            debug!("created rif {:?} on {:?}", oid, config.target);
            Ok(oid)
        })
    }

    fn remove_router_interface(&self, rif: RouterInterfaceOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveRouterInterface, |s| {
            ensure(s.rifs.contains_key(&rif), SaiStatus::ItemNotFound)?;
            ensure(!s.rif_in_use(rif), SaiStatus::ObjectInUse)?;
            s.rifs.remove(&rif);
            Ok(())
        })
    }

    fn get_router_interface_attribute(
        &self,
        rif: RouterInterfaceOid,
        attr: RouterInterfaceAttr,
    ) -> SaiResult<RouterInterfaceAttribute> {
        let s = self.state.borrow();
        let r = s.rifs.get(&rif).ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
        Ok(match attr {
            RouterInterfaceAttr::Type => RouterInterfaceAttribute::Type(r.config.target.rif_type()),
            RouterInterfaceAttr::VirtualRouterId => {
                RouterInterfaceAttribute::VirtualRouterId(r.config.vrf)
            }
            RouterInterfaceAttr::SrcMacAddress => RouterInterfaceAttribute::SrcMacAddress(r.src_mac),
            RouterInterfaceAttr::Mtu => RouterInterfaceAttribute::Mtu(r.mtu),
            RouterInterfaceAttr::AdminV4State => {
                RouterInterfaceAttribute::AdminV4State(r.config.admin_v4_state)
            }
            RouterInterfaceAttr::AdminV6State => {
                RouterInterfaceAttribute::AdminV6State(r.config.admin_v6_state)
            }
        })
    }

    fn set_router_interface_attribute(
        &self,
        rif: RouterInterfaceOid,
        attr: RouterInterfaceAttribute,
    ) -> SaiResult<()> {
        self.mutate(SimOp::SetRouterInterfaceAttribute, |s| {
            let r = s
                .rifs
                .get_mut(&rif)
                .ok_or_else(|| status_err(SaiStatus::InvalidObjectId))?;
            match attr {
                RouterInterfaceAttribute::SrcMacAddress(mac) => r.src_mac = mac,
                RouterInterfaceAttribute::Mtu(mtu) => r.mtu = mtu,
                RouterInterfaceAttribute::AdminV4State(up) => r.config.admin_v4_state = up,
                RouterInterfaceAttribute::AdminV6State(up) => r.config.admin_v6_state = up,
                RouterInterfaceAttribute::Type(_) | RouterInterfaceAttribute::VirtualRouterId(_) => {
                    return Err(SaiError::invalid_parameter("create-only attribute"))
                }
            }
            Ok(())
        })
    }

    fn create_neighbor_entry(
        &self,
        entry: &NeighborEntry,
        config: &NeighborConfig,
    ) -> SaiResult<()> {
        self.mutate(SimOp::CreateNeighborEntry, |s| {
            ensure(s.rifs.contains_key(&entry.rif), SaiStatus::InvalidObjectId)?;
            ensure(!s.neighbors.contains_key(entry), SaiStatus::ItemAlreadyExists)?;
            s.neighbors.insert(*entry, *config);
            debug!("created neighbor {} -> {}", entry, config.dst_mac);
            Ok(())
        })
    }

    fn remove_neighbor_entry(&self, entry: &NeighborEntry) -> SaiResult<()> {
        self.mutate(SimOp::RemoveNeighborEntry, |s| {
            s.neighbors
                .remove(entry)
                .map(|_| ())
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))
        })
    }

    fn create_next_hop(&self, config: &NextHopConfig) -> SaiResult<NextHopOid> {
        self.mutate(SimOp::CreateNextHop, |s| {
            ensure(s.rifs.contains_key(&config.rif), SaiStatus::InvalidObjectId)?;
            let oid = s.alloc(ObjType::NextHop);
            s.next_hops.insert(oid, *config);
            Ok(oid)
        })
    }

    fn remove_next_hop(&self, next_hop: NextHopOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveNextHop, |s| {
            ensure(s.next_hops.contains_key(&next_hop), SaiStatus::ItemNotFound)?;
            let referenced = s.group_members.values().any(|m| m.next_hop == next_hop)
                || s.routes.values().any(|r| r.target == RouteTarget::NextHop(next_hop));
            ensure(!referenced, SaiStatus::ObjectInUse)?;
            s.next_hops.remove(&next_hop);
            Ok(())
        })
    }

    fn create_next_hop_group(&self, group_type: NextHopGroupType) -> SaiResult<NextHopGroupOid> {
        self.mutate(SimOp::CreateNextHopGroup, |s| {
            ensure(group_type == NextHopGroupType::Ecmp, SaiStatus::NotSupported)?;
            let oid = s.alloc(ObjType::NextHopGroup);
            s.groups.insert(oid, Vec::new());
            Ok(oid)
        })
    }

    fn remove_next_hop_group(&self, group: NextHopGroupOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveNextHopGroup, |s| {
            let members = s.groups.get(&group).ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            let referenced = !members.is_empty()
                || s.routes.values().any(|r| r.target == RouteTarget::NextHopGroup(group));
            ensure(!referenced, SaiStatus::ObjectInUse)?;
            s.groups.remove(&group);
            Ok(())
        })
    }

    fn create_next_hop_group_member(
        &self,
        config: &NextHopGroupMemberConfig,
    ) -> SaiResult<NextHopGroupMemberOid> {
        self.mutate(SimOp::CreateNextHopGroupMember, |s| {
            ensure(s.groups.contains_key(&config.group), SaiStatus::InvalidObjectId)?;
            ensure(s.next_hops.contains_key(&config.next_hop), SaiStatus::InvalidObjectId)?;
            let oid = s.alloc(ObjType::NextHopGroupMember);
            s.group_members.insert(oid, *config);
            if let Some(members) = s.groups.get_mut(&config.group) {
                members.push(oid);
            }
            Ok(oid)
        })
    }

    fn remove_next_hop_group_member(&self, member: NextHopGroupMemberOid) -> SaiResult<()> {
        self.mutate(SimOp::RemoveNextHopGroupMember, |s| {
            let config = s
                .group_members
                .remove(&member)
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
            if let Some(members) = s.groups.get_mut(&config.group) {
                members.retain(|m| *m != member);
            }
            Ok(())
        })
    }

    fn create_route_entry(&self, entry: &RouteEntry, config: &RouteConfig) -> SaiResult<()> {
        self.mutate(SimOp::CreateRouteEntry, |s| {
            config.validate()?;
            ensure(entry.vrf == s.default_vr, SaiStatus::InvalidObjectId)?;
            ensure(s.route_target_exists(&config.target), SaiStatus::InvalidObjectId)?;
            ensure(!s.routes.contains_key(entry), SaiStatus::ItemAlreadyExists)?;
            s.routes.insert(*entry, *config);
            debug!("created route {} {:?} {:?}", entry, config.action, config.target);
            Ok(())
        })
    }

    fn remove_route_entry(&self, entry: &RouteEntry) -> SaiResult<()> {
        self.mutate(SimOp::RemoveRouteEntry, |s| {
            s.routes
                .remove(entry)
                .map(|_| ())
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))
        })
    }

    fn get_route_entry_attribute(
        &self,
        entry: &RouteEntry,
        attr: RouteAttr,
    ) -> SaiResult<RouteAttribute> {
        let s = self.state.borrow();
        let route = s.routes.get(entry).ok_or_else(|| status_err(SaiStatus::ItemNotFound))?;
        Ok(match attr {
            RouteAttr::PacketAction => RouteAttribute::PacketAction(route.action),
            RouteAttr::NextHopId => RouteAttribute::NextHopId(route.target),
        })
    }

    fn create_fdb_entry(&self, entry: &FdbEntry, config: &FdbConfig) -> SaiResult<()> {
        self.mutate(SimOp::CreateFdbEntry, |s| {
            ensure(entry.switch_id == s.switch_id, SaiStatus::InvalidObjectId)?;
            ensure(s.vlans.contains_key(&entry.bv_id), SaiStatus::InvalidObjectId)?;
            ensure(
                s.bridge_ports.contains_key(&config.bridge_port),
                SaiStatus::InvalidObjectId,
            )?;
            ensure(!s.fdb.contains_key(entry), SaiStatus::ItemAlreadyExists)?;
            s.fdb.insert(*entry, *config);
            Ok(())
        })
    }

    fn remove_fdb_entry(&self, entry: &FdbEntry) -> SaiResult<()> {
        self.mutate(SimOp::RemoveFdbEntry, |s| {
            s.fdb
                .remove(entry)
                .map(|_| ())
                .ok_or_else(|| status_err(SaiStatus::ItemNotFound))
        })
    }

    fn fdb_converged(&self, entries: &[FdbEntry]) -> SaiResult<Option<bool>> {
        if !self.config.report_fdb_convergence {
            return Ok(None);
        }
        let mut s = self.state.borrow_mut();
        s.fdb_polls += 1;
        let waited = match self.config.fdb_converge_after_polls {
            Some(polls) => s.fdb_polls > polls,
            None => false,
        };
        Ok(Some(waited && entries.iter().all(|e| s.fdb.contains_key(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_client::api::{FdbEntryType, PacketAction};
    use sai_client::SaiClientExt;

    #[test]
    fn test_boot_state() {
        let sim = SimSwitch::new(SimConfig {
            port_count: 4,
            ..SimConfig::default()
        });
        assert!(sim.default_virtual_router().unwrap().is_valid());
        let default_vlan = sim.default_vlan().unwrap();
        assert_eq!(sim.vlan_members(default_vlan).unwrap().len(), 4);
        assert_eq!(sim.vlan_tag(default_vlan).unwrap(), 1);
        assert_eq!(sim.port_list().unwrap().len(), 4);

        let bridge_ports = sim.bridge_port_list().unwrap();
        assert_eq!(sim.bridge_port_port(bridge_ports[2]).unwrap(), sim.port(2).unwrap());
        assert_eq!(sim.port_vlan_id(sim.port(0).unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_ids_carry_object_type() {
        let sim = SimSwitch::default();
        let lag = sim.create_lag().unwrap();
        assert_eq!(lag.as_raw() >> 48, ObjType::Lag as u64);
    }

    #[test]
    fn test_injected_failure_is_not_journaled() {
        let sim = SimSwitch::default();
        sim.fail_next(SimOp::CreateLag, SaiStatus::TableFull);
        assert_eq!(sim.create_lag().unwrap_err().status(), SaiStatus::TableFull);
        assert!(sim.create_lag().is_ok());
        assert_eq!(sim.journal(), vec![SimOp::CreateLag]);
    }

    #[test]
    fn test_remove_vlan_with_members_is_in_use() {
        let sim = SimSwitch::default();
        let vlan = sim.create_vlan(VlanId::new(10).unwrap()).unwrap();
        let bp = sim.bridge_port_list().unwrap()[1];
        let member = sim
            .create_vlan_member(&VlanMemberConfig {
                vlan,
                bridge_port: bp,
                tagging: VlanTaggingMode::Untagged,
            })
            .unwrap();

        assert_eq!(sim.remove_vlan(vlan).unwrap_err().status(), SaiStatus::ObjectInUse);
        sim.remove_vlan_member(member).unwrap();
        sim.remove_vlan(vlan).unwrap();
    }

    #[test]
    fn test_duplicate_vlan_tag_rejected() {
        let sim = SimSwitch::default();
        sim.create_vlan(VlanId::new(20).unwrap()).unwrap();
        let err = sim.create_vlan(VlanId::new(20).unwrap()).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ItemAlreadyExists);
    }

    #[test]
    fn test_rif_in_use_by_next_hop() {
        let sim = SimSwitch::default();
        let vr = sim.default_virtual_router().unwrap();
        let rif = sim
            .create_router_interface(&RouterInterfaceConfig::new(
                vr,
                RifTarget::Port(sim.port(0).unwrap()),
            ))
            .unwrap();
        let nh = sim
            .create_next_hop(&NextHopConfig {
                ip: "10.0.0.1".parse().unwrap(),
                rif,
            })
            .unwrap();

        assert_eq!(
            sim.remove_router_interface(rif).unwrap_err().status(),
            SaiStatus::ObjectInUse
        );
        sim.remove_next_hop(nh).unwrap();
        sim.remove_router_interface(rif).unwrap();
        assert!(sim.inventory().is_empty());
    }

    #[test]
    fn test_fdb_convergence_probe() {
        let sim = SimSwitch::default();
        let vlan = sim.default_vlan().unwrap();
        let entry = FdbEntry {
            switch_id: sim.switch_id(),
            mac: "00:99:66:55:01:01".parse().unwrap(),
            bv_id: vlan,
        };
        assert_eq!(sim.fdb_converged(&[entry]).unwrap(), Some(false));

        let silent = SimSwitch::new(SimConfig {
            report_fdb_convergence: false,
            ..SimConfig::default()
        });
        assert_eq!(silent.fdb_converged(&[entry]).unwrap(), None);
    }

    #[test]
    fn test_fdb_convergence_after_polls() {
        let sim = SimSwitch::new(SimConfig {
            fdb_converge_after_polls: Some(2),
            ..SimConfig::default()
        });
        let entry = FdbEntry {
            switch_id: sim.switch_id(),
            mac: "00:99:66:55:01:01".parse().unwrap(),
            bv_id: sim.default_vlan().unwrap(),
        };
        let config = FdbConfig {
            entry_type: FdbEntryType::Static,
            bridge_port: sim.bridge_port_list().unwrap()[1],
            action: PacketAction::Forward,
            allow_mac_move: true,
        };
        sim.create_fdb_entry(&entry, &config).unwrap();
        let answers: Vec<_> = (0..3).map(|_| sim.fdb_converged(&[entry]).unwrap()).collect();
        assert_eq!(answers, vec![Some(false), Some(false), Some(true)]);
    }
}
