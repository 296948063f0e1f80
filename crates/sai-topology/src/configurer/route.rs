//! Router interfaces, neighbors, next-hops, next-hop groups and routes.
//!
//! A forwarding path is built in layers, each idempotent or recorded at its
//! own level:
//!
//! 1. [`RouteConfigurer::create_router_interface`] binds a [`NetInterface`]
//!    into a virtual router, reusing an earlier binding unless asked not to.
//! 2. [`RouteConfigurer::create_neighbor_by_rif`] resolves a peer's
//!    addresses to its MAC on that interface.
//! 3. [`RouteConfigurer::create_nexthop_by_rif`] creates one next-hop per
//!    address family towards the peer.
//! 4. The `create_route_by_*` operations install a v4/v6 route pair to a
//!    destination device via an interface, a next-hop pair or a group pair.
//!
//! Nothing but the default drop routes can be installed before
//! [`RouteConfigurer::create_default_route`] has run.

use crate::dut::Dut;
use crate::entity::{
    Device, DeviceNeighbors, NeighborMode, NetInterface, Nexthop, NexthopGroup,
    NexthopGroupMember, NexthopPair, Resolved, RifList,
};
use crate::error::{DeviceCall, Result, TopologyError};
use itertools::Itertools;
use sai_client::api::{
    NeighborConfig, NeighborEntry, NextHopConfig, NextHopGroupMemberConfig, NextHopGroupType,
    RifTarget, RouteConfig, RouteEntry, RouteTarget, RouterInterfaceAttribute,
    RouterInterfaceConfig,
};
use sai_client::{
    NextHopGroupOid, NextHopOid, RouterInterfaceOid, SaiClient, SaiClientExt, VirtualRouterOid,
};
use sai_types::{AddressFamily, IpPrefix, MacAddress};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RifOptions {
    /// Return the interface's existing binding in the same virtual router
    /// instead of creating another.
    pub reuse: bool,
    /// Bind the port's bridge port rather than the port. Ports only.
    pub is_bridge: bool,
}

impl Default for RifOptions {
    fn default() -> Self {
        Self {
            reuse: true,
            is_bridge: false,
        }
    }
}

impl RifOptions {
    /// Always create a new interface.
    pub const fn fresh() -> Self {
        Self {
            reuse: false,
            is_bridge: false,
        }
    }

    pub const fn bridge() -> Self {
        Self {
            reuse: true,
            is_bridge: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutePair {
    pub v4: RouteEntry,
    pub v6: RouteEntry,
}

impl RoutePair {
    pub fn get(&self, family: AddressFamily) -> RouteEntry {
        match family {
            AddressFamily::V4 => self.v4,
            AddressFamily::V6 => self.v6,
        }
    }
}

/// Everything built for one destination by the route-path helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePath {
    pub rif: RouterInterfaceOid,
    pub nexthops: Option<NexthopPair>,
    pub routes: RoutePair,
}

fn other_family(family: AddressFamily) -> AddressFamily {
    match family {
        AddressFamily::V4 => AddressFamily::V6,
        AddressFamily::V6 => AddressFamily::V4,
    }
}

fn rif_target(dut: &Dut, ni: NetInterface, is_bridge: bool) -> Result<RifTarget> {
    Ok(match ni {
        NetInterface::Port(idx) => {
            let port = dut.port(idx)?;
            if is_bridge {
                RifTarget::Bridge(port.bridge_port)
            } else {
                RifTarget::Port(port.oid)
            }
        }
        NetInterface::Vlan(id) => RifTarget::Vlan(dut.vlan(id)?.vlan_oid),
        NetInterface::Lag(idx) => RifTarget::Lag(dut.lag(idx)?.lag_id),
        NetInterface::Loopback => RifTarget::Loopback,
    })
}

fn rif_list_mut(dut: &mut Dut, ni: NetInterface, is_bridge: bool) -> Result<&mut RifList> {
    Ok(match ni {
        NetInterface::Port(idx) => {
            let port = dut.port_mut(idx)?;
            if is_bridge {
                &mut port.bridge_rifs
            } else {
                &mut port.rifs
            }
        }
        NetInterface::Vlan(id) => &mut dut.vlan_mut(id)?.rifs,
        NetInterface::Lag(idx) => &mut dut.lag_mut(idx)?.rifs,
        NetInterface::Loopback => &mut dut.loopback_rifs,
    })
}

/// Builds forwarding paths.
pub struct RouteConfigurer<'a, C: SaiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SaiClient + ?Sized> RouteConfigurer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Installs 0.0.0.0/0 and ::/0 with drop action in the switch's default
    /// virtual router, and records that router on `dut`.
    pub fn create_default_route(&self, dut: &mut Dut) -> Result<RoutePair> {
        let vrf = self
            .client
            .default_virtual_router()
            .during("get default virtual router")?;
        if vrf.is_null() {
            return Err(TopologyError::uninitialized(
                "switch reports a null default virtual router",
            ));
        }
        dut.default_vrf = vrf;

        let v4 = RouteEntry::new(vrf, IpPrefix::default_route(AddressFamily::V4));
        let v6 = RouteEntry::new(vrf, IpPrefix::default_route(AddressFamily::V6));
        for entry in [v4, v6] {
            self.client
                .create_route_entry(&entry, &RouteConfig::drop())
                .during(&format!("create default route {}", entry))?;
            match entry.destination.family() {
                AddressFamily::V4 => dut.default_routev4 = Some(entry),
                AddressFamily::V6 => dut.default_routev6 = Some(entry),
            }
        }
        info!("installed default drop routes in vrf {}", vrf);
        Ok(RoutePair { v4, v6 })
    }

    fn require_default_routes(&self, dut: &Dut) -> Result<()> {
        if dut.has_default_routes() {
            Ok(())
        } else {
            Err(TopologyError::uninitialized(
                "default routes must be installed before any other route",
            ))
        }
    }

    /// `vr` if given, else the default virtual router.
    pub fn choose_virtual_router(
        &self,
        dut: &Dut,
        vr: Option<VirtualRouterOid>,
    ) -> Result<VirtualRouterOid> {
        match vr {
            Some(vr) if vr.is_valid() => Ok(vr),
            _ if dut.default_vrf.is_valid() => Ok(dut.default_vrf),
            _ => Err(TopologyError::uninitialized(
                "no virtual router given and the default one is unknown",
            )),
        }
    }

    /// Binds `ni` into virtual router `vr`.
    ///
    /// With `reuse`, an interface already bound into the same router is
    /// returned as is and no device call is made.
    pub fn create_router_interface(
        &self,
        dut: &mut Dut,
        ni: NetInterface,
        vr: Option<VirtualRouterOid>,
        options: RifOptions,
    ) -> Result<Resolved<RouterInterfaceOid>> {
        if options.is_bridge && !matches!(ni, NetInterface::Port(_)) {
            return Err(TopologyError::precondition(format!(
                "bridge router interface requested on {}",
                ni
            )));
        }
        let vrf = self.choose_virtual_router(dut, vr)?;
        let target = rif_target(dut, ni, options.is_bridge)?;

        if options.reuse {
            if let Some(oid) = rif_list_mut(dut, ni, options.is_bridge)?.latest_for(vrf) {
                debug!("reusing router interface {} on {}", oid, ni);
                return Ok(Resolved::reused(oid));
            }
        }

        let oid = self
            .client
            .create_router_interface(&RouterInterfaceConfig::new(vrf, target))
            .during(&format!("create router interface on {}", ni))?;
        rif_list_mut(dut, ni, options.is_bridge)?.push(oid, vrf);
        match ni {
            NetInterface::Loopback => {}
            NetInterface::Port(_) if options.is_bridge => dut.bridge_port_rif_list.push(oid),
            _ => dut.port_rif_list.push(oid),
        }
        debug!("created router interface {} on {}", oid, ni);
        Ok(Resolved::created(oid))
    }

    pub fn create_default_loopback_interface(
        &self,
        dut: &mut Dut,
    ) -> Result<Resolved<RouterInterfaceOid>> {
        self.create_router_interface(dut, NetInterface::Loopback, None, RifOptions::default())
    }

    pub fn set_router_interface_src_mac(
        &self,
        rif: RouterInterfaceOid,
        mac: MacAddress,
    ) -> Result<()> {
        self.client
            .set_router_interface_attribute(rif, RouterInterfaceAttribute::SrcMacAddress(mac))
            .during(&format!("set src mac of router interface {}", rif))
    }

    pub fn set_router_interface_mtu(&self, rif: RouterInterfaceOid, mtu: u32) -> Result<()> {
        self.client
            .set_router_interface_attribute(rif, RouterInterfaceAttribute::Mtu(mtu))
            .during(&format!("set mtu of router interface {}", rif))
    }

    pub fn set_router_interface_admin_state(
        &self,
        rif: RouterInterfaceOid,
        family: AddressFamily,
        up: bool,
    ) -> Result<()> {
        let attr = match family {
            AddressFamily::V4 => RouterInterfaceAttribute::AdminV4State(up),
            AddressFamily::V6 => RouterInterfaceAttribute::AdminV6State(up),
        };
        self.client
            .set_router_interface_attribute(rif, attr)
            .during(&format!("set {} admin state of router interface {}", family, rif))
    }

    /// Resolves each of the device's addresses to its MAC on `rif`.
    ///
    /// `no_host` entries install no host route, so the device is reachable
    /// only through explicit routes. A device's entries share one mode.
    pub fn create_neighbor_by_rif(
        &self,
        dut: &mut Dut,
        device: &mut Device,
        rif: RouterInterfaceOid,
        no_host: bool,
    ) -> Result<DeviceNeighbors> {
        let mode = NeighborMode::from_no_host(no_host);
        if let Some(existing) = device.neighbors {
            if existing.mode != mode {
                return Err(TopologyError::precondition(format!(
                    "{} already has {:?} neighbors, {:?} requested",
                    device.key, existing.mode, mode
                )));
            }
        }
        if device.ipv4.is_none() && device.ipv6.is_none() {
            return Err(TopologyError::precondition(format!(
                "{} has no address to resolve",
                device.key
            )));
        }

        let mut neighbors = device.neighbors.unwrap_or(DeviceNeighbors {
            mode,
            v4: None,
            v6: None,
        });
        let config = NeighborConfig {
            dst_mac: device.mac,
            no_host_route: no_host,
        };
        for family in AddressFamily::BOTH {
            let Some(ip) = device.ip(family) else {
                continue;
            };
            let entry = NeighborEntry::new(rif, ip);
            self.client
                .create_neighbor_entry(&entry, &config)
                .during(&format!("create neighbor {}", entry))?;
            neighbors.set(family, entry);
            device.neighbors = Some(neighbors);
            dut.record_neighbor(entry);
            debug!("neighbor {} -> {} ({:?})", entry, device.mac, mode);
        }
        Ok(neighbors)
    }

    /// Resolves the router interface for `ni`, then the device's neighbors on
    /// it. Entries already present on that interface are returned as is.
    pub fn create_neighbor(
        &self,
        dut: &mut Dut,
        device: &mut Device,
        ni: NetInterface,
        vr: Option<VirtualRouterOid>,
        no_host: bool,
    ) -> Result<DeviceNeighbors> {
        let rif = self
            .create_router_interface(dut, ni, vr, RifOptions::default())?
            .oid;

        let mode = NeighborMode::from_no_host(no_host);
        if let Some(existing) = device.neighbors.filter(|n| n.mode == mode) {
            if existing.v4.iter().chain(existing.v6.iter()).any(|e| e.rif == rif) {
                debug!("{} already resolved on {}", device.key, ni);
                return Ok(existing);
            }
        }

        let neighbors = self.create_neighbor_by_rif(dut, device, rif, no_host)?;
        if let NetInterface::Lag(idx) = ni {
            dut.lag_mut(idx)?.neighbor_mac = Some(device.mac);
        }
        Ok(neighbors)
    }

    fn build_nexthops(
        &self,
        dut: &mut Dut,
        rif: RouterInterfaceOid,
        device: &mut Device,
        bind_device: bool,
        lag: Option<usize>,
        port_idx: Option<usize>,
    ) -> Result<NexthopPair> {
        let addresses = [
            device.route_prefix(AddressFamily::V4)?,
            device.route_prefix(AddressFamily::V6)?,
        ];

        let mut built = Vec::with_capacity(2);
        for address in addresses {
            let oid = self
                .client
                .create_next_hop(&NextHopConfig {
                    ip: *address.address(),
                    rif,
                })
                .during(&format!("create next hop {} on {}", address, rif))?;
            if bind_device {
                match address.family() {
                    AddressFamily::V4 => device.nexthopv4 = Some(oid),
                    AddressFamily::V6 => device.nexthopv6 = Some(oid),
                }
            }
            let nexthop = Nexthop {
                oid,
                address,
                device: bind_device.then_some(device.key),
                rif,
                lag,
                port_idx,
            };
            dut.record_nexthop(nexthop.clone());
            debug!("next hop {} -> {} on {}", oid, address, rif);
            built.push(nexthop);
        }

        let (v4, v6) = built
            .into_iter()
            .collect_tuple()
            .ok_or_else(|| TopologyError::precondition("next hop pair incomplete"))?;
        Ok(NexthopPair { v4, v6 })
    }

    /// One next-hop per family towards `device` over `rif`.
    ///
    /// Without `bind_device` the next-hops are not attributed to the device,
    /// so several route paths can share them.
    pub fn create_nexthop_by_rif(
        &self,
        dut: &mut Dut,
        rif: RouterInterfaceOid,
        device: &mut Device,
        bind_device: bool,
    ) -> Result<NexthopPair> {
        self.build_nexthops(dut, rif, device, bind_device, None, None)
    }

    /// Resolves the router interface for `ni`, then builds next-hops over it
    /// and records them on the interface they came from.
    pub fn create_nexthop(
        &self,
        dut: &mut Dut,
        ni: NetInterface,
        device: &mut Device,
        vr: Option<VirtualRouterOid>,
        options: RifOptions,
    ) -> Result<NexthopPair> {
        let rif = self.create_router_interface(dut, ni, vr, options)?.oid;
        let (lag, port_idx) = match ni {
            NetInterface::Lag(idx) => (Some(idx), None),
            NetInterface::Port(idx) => (None, Some(idx)),
            NetInterface::Vlan(_) | NetInterface::Loopback => (None, None),
        };
        let pair = self.build_nexthops(dut, rif, device, true, lag, port_idx)?;
        let (v4, v6) = (pair.v4.oid, pair.v6.oid);

        match ni {
            NetInterface::Lag(idx) => {
                let lag = dut.lag_mut(idx)?;
                lag.nexthopv4 = Some(v4);
                lag.nexthopv6 = Some(v6);
            }
            NetInterface::Vlan(id) => {
                let vlan = dut.vlan_mut(id)?;
                vlan.nexthopv4 = Some(v4);
                vlan.nexthopv6 = Some(v6);
            }
            NetInterface::Port(_) if options.is_bridge => {
                dut.bridge_port_nhop_v4_list.push(v4);
                dut.bridge_port_nhop_v6_list.push(v6);
            }
            NetInterface::Port(_) => {
                dut.port_nhop_v4_list.push(v4);
                dut.port_nhop_v6_list.push(v6);
            }
            NetInterface::Loopback => {}
        }
        Ok(pair)
    }

    fn check_nexthop_family(&self, dut: &Dut, nh: NextHopOid, family: AddressFamily) -> Result<()> {
        match dut.nexthop(nh) {
            Some(known) if known.family() != family => Err(TopologyError::precondition(format!(
                "next hop {} is {}, expected {}",
                nh,
                known.family(),
                family
            ))),
            _ => Ok(()),
        }
    }

    fn check_group_family(
        &self,
        dut: &Dut,
        group: NextHopGroupOid,
        family: AddressFamily,
    ) -> Result<()> {
        match dut.nexthop_group(group) {
            Some(known) if known.family != family => Err(TopologyError::precondition(format!(
                "next hop group {} is {}, expected {}",
                group, known.family, family
            ))),
            _ => Ok(()),
        }
    }

    fn install_routes(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        vr: Option<VirtualRouterOid>,
        targets: [RouteTarget; 2],
    ) -> Result<RoutePair> {
        self.require_default_routes(dut)?;
        let vrf = self.choose_virtual_router(dut, vr)?;
        let v4 = RouteEntry::new(vrf, dest.route_prefix(AddressFamily::V4)?);
        let v6 = RouteEntry::new(vrf, dest.route_prefix(AddressFamily::V6)?);

        for (entry, target) in [v4, v6].into_iter().zip(targets) {
            self.client
                .create_route_entry(&entry, &RouteConfig::forward(target))
                .during(&format!("create route {}", entry))?;
            dut.record_route(entry);
            match entry.destination.family() {
                AddressFamily::V4 => dest.routev4 = Some(entry),
                AddressFamily::V6 => dest.routev6 = Some(entry),
            }
            debug!("route {} -> {:?}", entry, target);
        }
        info!(
            "routes to {} ({}, {}) installed",
            dest.key, v4.destination, v6.destination
        );
        Ok(RoutePair { v4, v6 })
    }

    /// Routes the device's prefixes straight at `rif`.
    pub fn create_route_by_rif(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        rif: RouterInterfaceOid,
        vr: Option<VirtualRouterOid>,
    ) -> Result<RoutePair> {
        let target = RouteTarget::RouterInterface(rif);
        self.install_routes(dut, dest, vr, [target, target])
    }

    pub fn create_route_by_nexthop(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        nexthop_v4: NextHopOid,
        nexthop_v6: NextHopOid,
        vr: Option<VirtualRouterOid>,
    ) -> Result<RoutePair> {
        self.check_nexthop_family(dut, nexthop_v4, AddressFamily::V4)?;
        self.check_nexthop_family(dut, nexthop_v6, AddressFamily::V6)?;
        self.install_routes(
            dut,
            dest,
            vr,
            [RouteTarget::NextHop(nexthop_v4), RouteTarget::NextHop(nexthop_v6)],
        )
    }

    pub fn create_route_by_nexthop_group(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        group_v4: NextHopGroupOid,
        group_v6: NextHopGroupOid,
        vr: Option<VirtualRouterOid>,
    ) -> Result<RoutePair> {
        self.check_group_family(dut, group_v4, AddressFamily::V4)?;
        self.check_group_family(dut, group_v6, AddressFamily::V6)?;
        self.install_routes(
            dut,
            dest,
            vr,
            [
                RouteTarget::NextHopGroup(group_v4),
                RouteTarget::NextHopGroup(group_v6),
            ],
        )
    }

    /// Routes `dest` via `nexthop_device`, reached over `ni`: interface,
    /// no-host neighbors, next-hops, then the route pair.
    pub fn create_route_path_by_nexthop(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        nexthop_device: &mut Device,
        ni: NetInterface,
        vr: Option<VirtualRouterOid>,
    ) -> Result<RoutePath> {
        self.require_default_routes(dut)?;
        self.create_neighbor(dut, nexthop_device, ni, vr, true)?;
        let nexthops = self.create_nexthop(dut, ni, nexthop_device, vr, RifOptions::default())?;
        let routes = self.create_route_by_nexthop(dut, dest, nexthops.v4.oid, nexthops.v6.oid, vr)?;
        if let NetInterface::Lag(idx) = ni {
            dest.l3_lag = Some(idx);
        }
        Ok(RoutePath {
            rif: nexthops.v4.rif,
            nexthops: Some(nexthops),
            routes,
        })
    }

    /// Routes `dest`, directly attached on `ni`, at the interface itself.
    pub fn create_route_path_by_rif(
        &self,
        dut: &mut Dut,
        dest: &mut Device,
        ni: NetInterface,
        vr: Option<VirtualRouterOid>,
    ) -> Result<RoutePath> {
        self.require_default_routes(dut)?;
        let rif = self
            .create_router_interface(dut, ni, vr, RifOptions::default())?
            .oid;
        self.create_neighbor(dut, dest, ni, vr, true)?;
        let routes = self.create_route_by_rif(dut, dest, rif, vr)?;
        if let NetInterface::Lag(idx) = ni {
            dest.l3_lag = Some(idx);
        }
        Ok(RoutePath {
            rif,
            nexthops: None,
            routes,
        })
    }

    /// Builds an ECMP group per family from next-hops paired by position,
    /// binds both groups onto the contributing LAGs and routes `dest` at
    /// them.
    pub fn create_nexthop_group_by_nexthops(
        &self,
        dut: &mut Dut,
        nexthops_v4: &[NextHopOid],
        nexthops_v6: &[NextHopOid],
        lags: &[usize],
        dest: &mut Device,
        vr: Option<VirtualRouterOid>,
    ) -> Result<(NextHopGroupOid, NextHopGroupOid)> {
        if nexthops_v4.is_empty() || nexthops_v4.len() != nexthops_v6.len() {
            return Err(TopologyError::precondition(format!(
                "next hop lists must be non-empty and equal in length, got {} and {}",
                nexthops_v4.len(),
                nexthops_v6.len()
            )));
        }
        self.require_default_routes(dut)?;
        for nh in nexthops_v4 {
            self.check_nexthop_family(dut, *nh, AddressFamily::V4)?;
        }
        for nh in nexthops_v6 {
            self.check_nexthop_family(dut, *nh, AddressFamily::V6)?;
        }
        dest.route_prefix(AddressFamily::V4)?;
        dest.route_prefix(AddressFamily::V6)?;
        let member_port_indexs: Vec<usize> = lags
            .iter()
            .map(|idx| dut.lag(*idx).map(|lag| lag.member_port_indexs.clone()))
            .flatten_ok()
            .collect::<Result<_>>()?;

        let group_v4 = self
            .client
            .create_next_hop_group(NextHopGroupType::Ecmp)
            .during("create v4 next hop group")?;
        dut.nhop_groupv4_list.push(NexthopGroup {
            oid: group_v4,
            family: AddressFamily::V4,
            peer: NextHopGroupOid::NULL,
            members: Vec::new(),
            member_port_indexs: member_port_indexs.clone(),
            removed: Vec::new(),
        });
        let group_v6 = self
            .client
            .create_next_hop_group(NextHopGroupType::Ecmp)
            .during("create v6 next hop group")?;
        dut.nhop_groupv6_list.push(NexthopGroup {
            oid: group_v6,
            family: AddressFamily::V6,
            peer: group_v4,
            members: Vec::new(),
            member_port_indexs,
            removed: Vec::new(),
        });
        if let Some(record) = dut.nexthop_group_mut(group_v4) {
            record.peer = group_v6;
        }

        let lag_per_position = lags.len() == nexthops_v4.len();
        for (position, (nh4, nh6)) in nexthops_v4.iter().zip_eq(nexthops_v6).enumerate() {
            let lag = dut.nexthop(*nh4).and_then(|nh| nh.lag).or_else(|| {
                if lag_per_position {
                    lags.get(position).copied()
                } else {
                    None
                }
            });
            for (group, next_hop) in [(group_v4, *nh4), (group_v6, *nh6)] {
                let oid = self
                    .client
                    .create_next_hop_group_member(&NextHopGroupMemberConfig::new(group, next_hop))
                    .during(&format!("add next hop {} to group {}", next_hop, group))?;
                if let Some(record) = dut.nexthop_group_mut(group) {
                    record.members.push(NexthopGroupMember { oid, next_hop, lag });
                }
            }
        }

        for idx in lags {
            let lag = dut.lag_mut(*idx)?;
            lag.nexthop_groupv4 = Some(group_v4);
            lag.nexthop_groupv6 = Some(group_v6);
        }

        self.create_route_by_nexthop_group(dut, dest, group_v4, group_v6, vr)?;
        info!(
            "next hop groups {} / {} with {} members over lags {:?}",
            group_v4,
            group_v6,
            nexthops_v4.len(),
            lags
        );
        Ok((group_v4, group_v6))
    }

    /// Removes the members contributed by LAG `lag_idx` from `group` and its
    /// peer, and drops the LAG's ports from both groups' egress ports. The
    /// removed members stay on the group records for
    /// [`add_nexthop_group_member_by_lag`](Self::add_nexthop_group_member_by_lag).
    /// Returns the number of members removed.
    pub fn remove_nexthop_group_member_by_lag(
        &self,
        dut: &mut Dut,
        group: NextHopGroupOid,
        lag_idx: usize,
    ) -> Result<usize> {
        let peer = dut
            .nexthop_group(group)
            .ok_or_else(|| TopologyError::unknown("next hop group", group))?
            .peer;
        let ports = dut.lag(lag_idx)?.member_port_indexs.clone();

        let mut plan = Vec::with_capacity(2);
        for gid in [group, peer] {
            let targets: Vec<NexthopGroupMember> = dut
                .nexthop_group(gid)
                .ok_or_else(|| TopologyError::unknown("next hop group", gid))?
                .members
                .iter()
                .filter(|m| m.lag == Some(lag_idx))
                .copied()
                .collect();
            if targets.is_empty() {
                return Err(TopologyError::precondition(format!(
                    "group {} has no member from lag{}",
                    gid, lag_idx
                )));
            }
            plan.push((gid, targets));
        }

        let mut removed = 0;
        for (gid, targets) in plan {
            for member in targets {
                self.client
                    .remove_next_hop_group_member(member.oid)
                    .during(&format!("remove lag{} member from group {}", lag_idx, gid))?;
                if let Some(record) = dut.nexthop_group_mut(gid) {
                    record.members.retain(|m| m.oid != member.oid);
                    record.removed.push(member);
                }
                removed += 1;
            }
            if let Some(record) = dut.nexthop_group_mut(gid) {
                record.member_port_indexs.retain(|p| !ports.contains(p));
            }
        }

        let lag = dut.lag_mut(lag_idx)?;
        let ours = |bound: Option<NextHopGroupOid>| bound == Some(group) || bound == Some(peer);
        if ours(lag.nexthop_groupv4) {
            lag.nexthop_groupv4 = None;
        }
        if ours(lag.nexthop_groupv6) {
            lag.nexthop_groupv6 = None;
        }
        info!("lag{} left next hop group {}", lag_idx, group);
        Ok(removed)
    }

    /// Adds LAG `lag_idx` back to `group` and its peer. Members taken out by
    /// [`remove_nexthop_group_member_by_lag`](Self::remove_nexthop_group_member_by_lag)
    /// are restored with the same next-hops; a LAG that never belonged
    /// joins with its own next-hops.
    pub fn add_nexthop_group_member_by_lag(
        &self,
        dut: &mut Dut,
        group: NextHopGroupOid,
        lag_idx: usize,
    ) -> Result<()> {
        let record = dut
            .nexthop_group(group)
            .ok_or_else(|| TopologyError::unknown("next hop group", group))?;
        let (family, peer) = (record.family, record.peer);
        let lag = dut.lag(lag_idx)?;
        let ports = lag.member_port_indexs.clone();

        let mut plan = Vec::with_capacity(2);
        for (gid, fam) in [(group, family), (peer, other_family(family))] {
            let record = dut
                .nexthop_group(gid)
                .ok_or_else(|| TopologyError::unknown("next hop group", gid))?;
            if record.members.iter().any(|m| m.lag == Some(lag_idx)) {
                return Err(TopologyError::precondition(format!(
                    "lag{} is already a member of group {}",
                    lag_idx, gid
                )));
            }
            let mut next_hops: Vec<NextHopOid> =
                record.removed_by_lag(lag_idx).map(|m| m.next_hop).collect();
            if next_hops.is_empty() {
                let own = lag.nexthop(fam).ok_or_else(|| {
                    TopologyError::precondition(format!("lag{} has no {} next hop", lag_idx, fam))
                })?;
                next_hops.push(own);
            }
            plan.push((gid, fam, next_hops));
        }

        for (gid, fam, next_hops) in plan {
            for next_hop in next_hops {
                let oid = self
                    .client
                    .create_next_hop_group_member(&NextHopGroupMemberConfig::new(gid, next_hop))
                    .during(&format!("add lag{} next hop to group {}", lag_idx, gid))?;
                if let Some(record) = dut.nexthop_group_mut(gid) {
                    record
                        .removed
                        .retain(|m| !(m.lag == Some(lag_idx) && m.next_hop == next_hop));
                    record.members.push(NexthopGroupMember {
                        oid,
                        next_hop,
                        lag: Some(lag_idx),
                    });
                }
            }
            if let Some(record) = dut.nexthop_group_mut(gid) {
                record.member_port_indexs.extend(ports.iter().copied());
            }
            let lag = dut.lag_mut(lag_idx)?;
            match fam {
                AddressFamily::V4 => lag.nexthop_groupv4 = Some(gid),
                AddressFamily::V6 => lag.nexthop_groupv6 = Some(gid),
            }
        }
        info!("lag{} rejoined next hop group {}", lag_idx, group);
        Ok(())
    }
}
