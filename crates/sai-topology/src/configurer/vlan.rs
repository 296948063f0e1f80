use crate::dut::Dut;
use crate::entity::Vlan;
use crate::error::{DeviceCall, Result, TopologyError};
use sai_client::api::{VlanMemberConfig, VlanTaggingMode};
use sai_client::{SaiClient, SaiClientExt, VlanMemberOid, VlanOid};
use sai_types::VlanId;
use tracing::{debug, info};

/// Creates and removes VLANs and their membership.
pub struct VlanConfigurer<'a, C: SaiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SaiClient + ?Sized> VlanConfigurer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates VLAN `vlan_id` with one member per port index and sets each
    /// member port's PVID to the tag.
    pub fn create_vlan<'d>(
        &self,
        dut: &'d mut Dut,
        vlan_id: VlanId,
        ports: &[usize],
        tagging: VlanTaggingMode,
    ) -> Result<&'d Vlan> {
        if dut.vlans.contains_key(&vlan_id) {
            return Err(TopologyError::precondition(format!(
                "vlan {} already exists",
                vlan_id
            )));
        }
        dut.bridge_ports(ports)?;

        let vlan_oid = self
            .client
            .create_vlan(vlan_id)
            .during(&format!("create vlan {}", vlan_id))?;
        dut.vlans.insert(vlan_id, Vlan::new(vlan_id, vlan_oid));

        self.create_vlan_members(dut, vlan_id, ports, tagging)?;
        info!("created vlan {} with ports {:?}", vlan_id, ports);
        dut.vlan(vlan_id)
    }

    /// Adds `ports` to an existing VLAN.
    pub fn create_vlan_members(
        &self,
        dut: &mut Dut,
        vlan_id: VlanId,
        ports: &[usize],
        tagging: VlanTaggingMode,
    ) -> Result<Vec<VlanMemberOid>> {
        let bridge_ports = dut.bridge_ports(ports)?;
        let vlan_oid = dut.vlan(vlan_id)?.vlan_oid;

        let mut members = Vec::with_capacity(ports.len());
        for (&index, bridge_port) in ports.iter().zip(bridge_ports) {
            let member = self
                .client
                .create_vlan_member(&VlanMemberConfig {
                    vlan: vlan_oid,
                    bridge_port,
                    tagging,
                })
                .during(&format!("create vlan {} member port{}", vlan_id, index))?;

            let vlan = dut.vlan_mut(vlan_id)?;
            vlan.member_port_indexs.push(index);
            vlan.vlan_mport_oids.push(member);
            members.push(member);

            let port = dut.port(index)?.oid;
            self.client
                .set_port_vlan_id(port, vlan_id.as_u16())
                .during(&format!("set port{} pvid {}", index, vlan_id))?;
            debug!("port{} joined vlan {} as {:?}", index, vlan_id, tagging);
        }
        Ok(members)
    }

    pub fn get_default_vlan(&self) -> Result<VlanOid> {
        self.client.default_vlan().during("get default vlan")
    }

    pub fn get_vlan_members(&self, vlan: VlanOid) -> Result<Vec<VlanMemberOid>> {
        self.client
            .vlan_members(vlan)
            .during(&format!("get members of vlan {}", vlan))
    }

    pub fn remove_vlan_members(&self, members: &[VlanMemberOid]) -> Result<()> {
        for member in members {
            self.client
                .remove_vlan_member(*member)
                .during(&format!("remove vlan member {}", member))?;
        }
        Ok(())
    }

    /// Removes the VLAN object. Its members must already be gone.
    pub fn remove_vlan(&self, vlan: VlanOid) -> Result<()> {
        self.client
            .remove_vlan(vlan)
            .during(&format!("remove vlan {}", vlan))
    }

    /// Removes a registered VLAN, members first, and forgets it.
    pub fn destroy_vlan(&self, dut: &mut Dut, vlan_id: VlanId) -> Result<()> {
        let vlan = dut.vlan(vlan_id)?;
        let (members, oid) = (vlan.vlan_mport_oids.clone(), vlan.vlan_oid);
        self.remove_vlan_members(&members)?;
        dut.vlan_mut(vlan_id)?.vlan_mport_oids.clear();
        self.remove_vlan(oid)?;
        dut.vlans.remove(&vlan_id);
        info!("removed vlan {}", vlan_id);
        Ok(())
    }

    /// Strips every member from the switch's default VLAN so later VLANs own
    /// their ports exclusively. Returns the number of members removed.
    pub fn reset_default_vlan(&self, dut: &mut Dut) -> Result<usize> {
        let default_vlan = self.get_default_vlan()?;
        let members = self.get_vlan_members(default_vlan)?;
        self.remove_vlan_members(&members)?;
        dut.default_vlan = default_vlan;
        info!("removed {} members from default vlan", members.len());
        Ok(members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sai_client::SaiStatus;
    use sai_sim::{SimConfig, SimOp, SimSwitch};

    fn setup() -> (SimSwitch, Dut) {
        let sim = SimSwitch::new(SimConfig {
            port_count: 16,
            ..SimConfig::default()
        });
        let dut = Dut::discover(&sim).unwrap();
        (sim, dut)
    }

    #[test]
    fn test_create_vlan_sets_members_and_pvid() {
        let (sim, mut dut) = setup();
        let cfg = VlanConfigurer::new(&sim);
        let ports: Vec<usize> = (1..=8).collect();
        let vid = VlanId::new(10).unwrap();

        let vlan = cfg
            .create_vlan(&mut dut, vid, &ports, VlanTaggingMode::Untagged)
            .unwrap();
        assert_eq!(vlan.vlan_mport_oids.len(), 8);
        assert_eq!(vlan.member_port_indexs, ports);
        assert_eq!(sim.vlan_members(vlan.vlan_oid).unwrap(), vlan.vlan_mport_oids);
        assert_eq!(sim.vlan_tag(vlan.vlan_oid).unwrap(), 10);
        for idx in &ports {
            assert_eq!(sim.port_vlan_id(sim.port(*idx).unwrap()).unwrap(), 10);
        }
        assert_eq!(sim.port_vlan_id(sim.port(9).unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_vlan_is_precondition() {
        let (sim, mut dut) = setup();
        let cfg = VlanConfigurer::new(&sim);
        let vid = VlanId::new(20).unwrap();
        cfg.create_vlan(&mut dut, vid, &[1], VlanTaggingMode::Untagged)
            .unwrap();
        sim.clear_journal();

        let err = cfg
            .create_vlan(&mut dut, vid, &[2], VlanTaggingMode::Untagged)
            .unwrap_err();
        assert!(matches!(err, TopologyError::Precondition(_)));
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_device_rejection_propagates() {
        let (sim, mut dut) = setup();
        let cfg = VlanConfigurer::new(&sim);
        sim.fail_next(SimOp::CreateVlanMember, SaiStatus::InsufficientResources);

        let err = cfg
            .create_vlan(&mut dut, VlanId::new(30).unwrap(), &[1, 2], VlanTaggingMode::Tagged)
            .unwrap_err();
        assert_eq!(
            err.device_error().map(|e| e.status()),
            Some(SaiStatus::InsufficientResources)
        );
        // The VLAN itself was created and stays registered for teardown.
        assert!(dut.vlans.contains_key(&VlanId::new(30).unwrap()));
    }

    #[test]
    fn test_reset_default_vlan_then_destroy() {
        let (sim, mut dut) = setup();
        let cfg = VlanConfigurer::new(&sim);
        assert_eq!(cfg.reset_default_vlan(&mut dut).unwrap(), 16);
        assert!(cfg.get_vlan_members(dut.default_vlan).unwrap().is_empty());

        let vid = VlanId::new(10).unwrap();
        cfg.create_vlan(&mut dut, vid, &[1, 2, 3], VlanTaggingMode::Untagged)
            .unwrap();
        cfg.destroy_vlan(&mut dut, vid).unwrap();
        assert!(dut.vlans.is_empty());
        assert!(sim.inventory().is_empty());
    }
}
