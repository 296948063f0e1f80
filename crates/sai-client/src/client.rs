//! The device control capability consumed by the topology layer.

use crate::api::{
    BridgePortAttr, BridgePortAttribute, FdbConfig, FdbEntry, HashAttr, HashAttribute,
    LagMemberConfig, NativeHashField, NeighborConfig, NeighborEntry, NextHopConfig,
    NextHopGroupMemberConfig, NextHopGroupType, PacketAction, PortAttr, PortAttribute,
    RouteAttr, RouteAttribute, RouteConfig, RouteEntry, RouteTarget, RouterInterfaceAttr,
    RouterInterfaceAttribute, RouterInterfaceConfig, SwitchAttr, SwitchAttribute, VlanAttr,
    VlanAttribute, VlanMemberConfig,
};
use crate::error::{SaiError, SaiResult};
use crate::types::{
    BridgePortOid, HashOid, LagMemberOid, LagOid, NextHopGroupMemberOid, NextHopGroupOid,
    NextHopOid, PortOid, RouterInterfaceOid, SwitchOid, VirtualRouterOid, VlanMemberOid, VlanOid,
};
use log::warn;
use sai_types::{MacAddress, VlanId};

/// Blocking create/remove/get/set calls against one switch.
///
/// Every call reports the device status; callers surface failures and do
/// not retry. Methods take `&self` so a client can be shared by several
/// configurers during one setup pass.
pub trait SaiClient {
    fn switch_id(&self) -> SwitchOid;

    fn get_switch_attribute(&self, attr: SwitchAttr) -> SaiResult<SwitchAttribute>;
    fn set_switch_attribute(&self, attr: SwitchAttribute) -> SaiResult<()>;

    fn get_port_attribute(&self, port: PortOid, attr: PortAttr) -> SaiResult<PortAttribute>;
    fn set_port_attribute(&self, port: PortOid, attr: PortAttribute) -> SaiResult<()>;
    fn get_bridge_port_attribute(
        &self,
        bridge_port: BridgePortOid,
        attr: BridgePortAttr,
    ) -> SaiResult<BridgePortAttribute>;

    fn create_vlan(&self, vlan_id: VlanId) -> SaiResult<VlanOid>;
    fn remove_vlan(&self, vlan: VlanOid) -> SaiResult<()>;
    fn get_vlan_attribute(&self, vlan: VlanOid, attr: VlanAttr) -> SaiResult<VlanAttribute>;
    fn create_vlan_member(&self, config: &VlanMemberConfig) -> SaiResult<VlanMemberOid>;
    fn remove_vlan_member(&self, member: VlanMemberOid) -> SaiResult<()>;

    fn create_lag(&self) -> SaiResult<LagOid>;
    fn remove_lag(&self, lag: LagOid) -> SaiResult<()>;
    fn create_lag_member(&self, config: &LagMemberConfig) -> SaiResult<LagMemberOid>;
    fn remove_lag_member(&self, member: LagMemberOid) -> SaiResult<()>;

    fn create_hash(&self, fields: &[NativeHashField]) -> SaiResult<HashOid>;
    fn remove_hash(&self, hash: HashOid) -> SaiResult<()>;
    fn get_hash_attribute(&self, hash: HashOid, attr: HashAttr) -> SaiResult<HashAttribute>;
    fn set_hash_attribute(&self, hash: HashOid, attr: HashAttribute) -> SaiResult<()>;

    fn create_router_interface(
        &self,
        config: &RouterInterfaceConfig,
    ) -> SaiResult<RouterInterfaceOid>;
    fn remove_router_interface(&self, rif: RouterInterfaceOid) -> SaiResult<()>;
    fn get_router_interface_attribute(
        &self,
        rif: RouterInterfaceOid,
        attr: RouterInterfaceAttr,
    ) -> SaiResult<RouterInterfaceAttribute>;
    fn set_router_interface_attribute(
        &self,
        rif: RouterInterfaceOid,
        attr: RouterInterfaceAttribute,
    ) -> SaiResult<()>;

    fn create_neighbor_entry(&self, entry: &NeighborEntry, config: &NeighborConfig)
        -> SaiResult<()>;
    fn remove_neighbor_entry(&self, entry: &NeighborEntry) -> SaiResult<()>;

    fn create_next_hop(&self, config: &NextHopConfig) -> SaiResult<NextHopOid>;
    fn remove_next_hop(&self, next_hop: NextHopOid) -> SaiResult<()>;

    fn create_next_hop_group(&self, group_type: NextHopGroupType) -> SaiResult<NextHopGroupOid>;
    fn remove_next_hop_group(&self, group: NextHopGroupOid) -> SaiResult<()>;
    fn create_next_hop_group_member(
        &self,
        config: &NextHopGroupMemberConfig,
    ) -> SaiResult<NextHopGroupMemberOid>;
    fn remove_next_hop_group_member(&self, member: NextHopGroupMemberOid) -> SaiResult<()>;

    fn create_route_entry(&self, entry: &RouteEntry, config: &RouteConfig) -> SaiResult<()>;
    fn remove_route_entry(&self, entry: &RouteEntry) -> SaiResult<()>;
    fn get_route_entry_attribute(
        &self,
        entry: &RouteEntry,
        attr: RouteAttr,
    ) -> SaiResult<RouteAttribute>;

    fn create_fdb_entry(&self, entry: &FdbEntry, config: &FdbConfig) -> SaiResult<()>;
    fn remove_fdb_entry(&self, entry: &FdbEntry) -> SaiResult<()>;

    /// Whether the given entries are programmed into the forwarding tables.
    ///
    /// `Ok(None)` means the device exposes no such signal and the caller
    /// should fall back to a bounded wait.
    fn fdb_converged(&self, entries: &[FdbEntry]) -> SaiResult<Option<bool>> {
        let _ = entries;
        Ok(None)
    }
}

fn unexpected<T: std::fmt::Debug>(asked: impl std::fmt::Debug, got: T) -> SaiError {
    warn!("attribute {:?} answered with {:?}", asked, got);
    SaiError::internal(format!("unexpected value for {:?}", asked))
}

/// Typed getters and setters over the attribute enums.
pub trait SaiClientExt: SaiClient {
    fn default_virtual_router(&self) -> SaiResult<VirtualRouterOid> {
        match self.get_switch_attribute(SwitchAttr::DefaultVirtualRouterId)? {
            SwitchAttribute::DefaultVirtualRouterId(vr) => Ok(vr),
            other => Err(unexpected(SwitchAttr::DefaultVirtualRouterId, other)),
        }
    }

    fn default_vlan(&self) -> SaiResult<VlanOid> {
        match self.get_switch_attribute(SwitchAttr::DefaultVlanId)? {
            SwitchAttribute::DefaultVlanId(vlan) => Ok(vlan),
            other => Err(unexpected(SwitchAttr::DefaultVlanId, other)),
        }
    }

    fn port_list(&self) -> SaiResult<Vec<PortOid>> {
        match self.get_switch_attribute(SwitchAttr::PortList)? {
            SwitchAttribute::PortList(ports) => Ok(ports),
            other => Err(unexpected(SwitchAttr::PortList, other)),
        }
    }

    fn bridge_port_list(&self) -> SaiResult<Vec<BridgePortOid>> {
        match self.get_switch_attribute(SwitchAttr::BridgePortList)? {
            SwitchAttribute::BridgePortList(ports) => Ok(ports),
            other => Err(unexpected(SwitchAttr::BridgePortList, other)),
        }
    }

    fn switch_src_mac(&self) -> SaiResult<MacAddress> {
        match self.get_switch_attribute(SwitchAttr::SrcMacAddress)? {
            SwitchAttribute::SrcMacAddress(mac) => Ok(mac),
            other => Err(unexpected(SwitchAttr::SrcMacAddress, other)),
        }
    }

    fn lag_hash_ipv4(&self) -> SaiResult<HashOid> {
        match self.get_switch_attribute(SwitchAttr::LagHashIpv4)? {
            SwitchAttribute::LagHashIpv4(hash) => Ok(hash),
            other => Err(unexpected(SwitchAttr::LagHashIpv4, other)),
        }
    }

    fn bridge_port_port(&self, bridge_port: BridgePortOid) -> SaiResult<PortOid> {
        match self.get_bridge_port_attribute(bridge_port, BridgePortAttr::PortId)? {
            BridgePortAttribute::PortId(port) => Ok(port),
        }
    }

    fn port_vlan_id(&self, port: PortOid) -> SaiResult<u16> {
        match self.get_port_attribute(port, PortAttr::PortVlanId)? {
            PortAttribute::PortVlanId(id) => Ok(id),
        }
    }

    fn set_port_vlan_id(&self, port: PortOid, vlan_id: u16) -> SaiResult<()> {
        self.set_port_attribute(port, PortAttribute::PortVlanId(vlan_id))
    }

    fn vlan_members(&self, vlan: VlanOid) -> SaiResult<Vec<VlanMemberOid>> {
        match self.get_vlan_attribute(vlan, VlanAttr::MemberList)? {
            VlanAttribute::MemberList(members) => Ok(members),
            other => Err(unexpected(VlanAttr::MemberList, other)),
        }
    }

    fn vlan_tag(&self, vlan: VlanOid) -> SaiResult<u16> {
        match self.get_vlan_attribute(vlan, VlanAttr::VlanId)? {
            VlanAttribute::VlanId(id) => Ok(id),
            other => Err(unexpected(VlanAttr::VlanId, other)),
        }
    }

    fn hash_fields(&self, hash: HashOid) -> SaiResult<Vec<NativeHashField>> {
        match self.get_hash_attribute(hash, HashAttr::NativeHashFieldList)? {
            HashAttribute::NativeHashFieldList(fields) => Ok(fields),
        }
    }

    fn router_interface_src_mac(&self, rif: RouterInterfaceOid) -> SaiResult<MacAddress> {
        match self.get_router_interface_attribute(rif, RouterInterfaceAttr::SrcMacAddress)? {
            RouterInterfaceAttribute::SrcMacAddress(mac) => Ok(mac),
            other => Err(unexpected(RouterInterfaceAttr::SrcMacAddress, other)),
        }
    }

    fn router_interface_mtu(&self, rif: RouterInterfaceOid) -> SaiResult<u32> {
        match self.get_router_interface_attribute(rif, RouterInterfaceAttr::Mtu)? {
            RouterInterfaceAttribute::Mtu(mtu) => Ok(mtu),
            other => Err(unexpected(RouterInterfaceAttr::Mtu, other)),
        }
    }

    fn route_packet_action(&self, entry: &RouteEntry) -> SaiResult<PacketAction> {
        match self.get_route_entry_attribute(entry, RouteAttr::PacketAction)? {
            RouteAttribute::PacketAction(action) => Ok(action),
            other => Err(unexpected(RouteAttr::PacketAction, other)),
        }
    }

    fn route_target(&self, entry: &RouteEntry) -> SaiResult<RouteTarget> {
        match self.get_route_entry_attribute(entry, RouteAttr::NextHopId)? {
            RouteAttribute::NextHopId(target) => Ok(target),
            other => Err(unexpected(RouteAttr::NextHopId, other)),
        }
    }
}

impl<C: SaiClient + ?Sized> SaiClientExt for C {}
