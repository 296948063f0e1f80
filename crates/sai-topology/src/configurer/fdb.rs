use crate::dut::Dut;
use crate::entity::Device;
use crate::error::{DeviceCall, Result, TopologyError};
use sai_client::api::{FdbConfig, FdbEntry, FdbEntryType, PacketAction};
use sai_client::{BridgePortOid, SaiClient, VlanOid};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdbOptions {
    pub entry_type: FdbEntryType,
    pub action: PacketAction,
    pub allow_mac_move: bool,
}

impl Default for FdbOptions {
    fn default() -> Self {
        Self {
            entry_type: FdbEntryType::Static,
            action: PacketAction::Forward,
            allow_mac_move: true,
        }
    }
}

/// How long to wait for newly created entries to reach the forwarding
/// tables.
///
/// Devices that report convergence are polled every `poll_interval` until
/// `timeout`; others get a fixed wait of `delay`, since hardware table
/// programming completes asynchronously to the create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub delay: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(2),
        }
    }
}

impl SettlePolicy {
    /// No waiting at all.
    pub const fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }
}

/// Installs MAC-to-port entries so L2 forwarding does not depend on
/// learning.
pub struct FdbConfigurer<'a, C: SaiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SaiClient + ?Sized> FdbConfigurer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Binds each device's MAC to the bridge port at the same position in
    /// VLAN `vlan`, then waits for the entries to settle.
    pub fn create_fdb_entries(
        &self,
        dut: &mut Dut,
        devices: &[Device],
        bridge_ports: &[BridgePortOid],
        vlan: VlanOid,
        options: FdbOptions,
        settle: SettlePolicy,
    ) -> Result<Vec<FdbEntry>> {
        if devices.len() != bridge_ports.len() {
            return Err(TopologyError::precondition(format!(
                "{} devices but {} bridge ports",
                devices.len(),
                bridge_ports.len()
            )));
        }

        let mut entries = Vec::with_capacity(devices.len());
        for (device, bridge_port) in devices.iter().zip(bridge_ports) {
            let entry = FdbEntry {
                switch_id: dut.switch_id,
                mac: device.mac,
                bv_id: vlan,
            };
            let config = FdbConfig {
                entry_type: options.entry_type,
                bridge_port: *bridge_port,
                action: options.action,
                allow_mac_move: options.allow_mac_move,
            };
            self.client
                .create_fdb_entry(&entry, &config)
                .during(&format!("create fdb entry {} for {}", entry, device.key))?;
            dut.fdb_entries.push(entry);
            entries.push(entry);
            debug!("fdb {} -> {}", entry, bridge_port);
        }

        self.settle(&entries, settle)?;
        info!("installed {} fdb entries in {}", entries.len(), vlan);
        Ok(entries)
    }

    pub fn remove_fdb_entries(&self, dut: &mut Dut, entries: &[FdbEntry]) -> Result<()> {
        for entry in entries {
            self.client
                .remove_fdb_entry(entry)
                .during(&format!("remove fdb entry {}", entry))?;
            dut.fdb_entries.retain(|e| e != entry);
        }
        Ok(())
    }

    fn settle(&self, entries: &[FdbEntry], policy: SettlePolicy) -> Result<()> {
        let started = Instant::now();
        loop {
            match self
                .client
                .fdb_converged(entries)
                .during("query fdb convergence")?
            {
                Some(true) => {
                    debug!("fdb converged after {:?}", started.elapsed());
                    return Ok(());
                }
                Some(false) if started.elapsed() >= policy.timeout => {
                    warn!("fdb not converged after {:?}", policy.timeout);
                    return Err(TopologyError::SettleTimeout(policy.timeout));
                }
                Some(false) => thread::sleep(policy.poll_interval),
                None => {
                    debug!("no convergence signal, waiting {:?}", policy.delay);
                    thread::sleep(policy.delay);
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DeviceKey;
    use pretty_assertions::assert_eq;
    use sai_client::{SaiClientExt, SaiStatus};
    use sai_sim::{SimConfig, SimOp, SimSwitch};

    fn devices(n: u8) -> Vec<Device> {
        let base: sai_types::MacAddress = "00:99:66:55:00:00".parse().unwrap();
        (1..=n)
            .map(|i| {
                let mac = base.with_suffix(0x0100 | u16::from(i));
                Device::new(DeviceKey::server(1, i), mac)
            })
            .collect()
    }

    #[test]
    fn test_entries_bound_to_bridge_ports() {
        let sim = SimSwitch::default();
        let mut dut = Dut::discover(&sim).unwrap();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = dut.bridge_ports(&[1, 2, 3]).unwrap();

        let entries = FdbConfigurer::new(&sim)
            .create_fdb_entries(
                &mut dut,
                &devices(3),
                &bridge_ports,
                vlan,
                FdbOptions::default(),
                SettlePolicy::default(),
            )
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(dut.fdb_entries, entries);
        let programmed = sim.fdb_entry(&entries[1]).unwrap();
        assert_eq!(programmed.bridge_port, bridge_ports[1]);
        assert_eq!(programmed.entry_type, FdbEntryType::Static);
    }

    #[test]
    fn test_length_mismatch_is_precondition() {
        let sim = SimSwitch::default();
        let mut dut = Dut::discover(&sim).unwrap();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = dut.bridge_ports(&[1]).unwrap();

        let err = FdbConfigurer::new(&sim)
            .create_fdb_entries(
                &mut dut,
                &devices(2),
                &bridge_ports,
                vlan,
                FdbOptions::default(),
                SettlePolicy::immediate(),
            )
            .unwrap_err();
        assert!(matches!(err, TopologyError::Precondition(_)));
        assert_eq!(sim.count(SimOp::CreateFdbEntry), 0);
    }

    #[test]
    fn test_fixed_wait_without_convergence_signal() {
        let sim = SimSwitch::new(SimConfig {
            report_fdb_convergence: false,
            ..SimConfig::default()
        });
        let mut dut = Dut::discover(&sim).unwrap();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = dut.bridge_ports(&[4]).unwrap();
        let policy = SettlePolicy {
            delay: Duration::from_millis(20),
            ..SettlePolicy::immediate()
        };

        let started = Instant::now();
        let cfg = FdbConfigurer::new(&sim);
        let entries = cfg
            .create_fdb_entries(
                &mut dut,
                &devices(1),
                &bridge_ports,
                vlan,
                FdbOptions::default(),
                policy,
            )
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));

        cfg.remove_fdb_entries(&mut dut, &entries).unwrap();
        assert!(dut.fdb_entries.is_empty());
        assert!(sim.inventory().is_empty());
    }

    fn polling(after_polls: Option<usize>) -> (SimSwitch, Dut, Vec<BridgePortOid>, VlanOid) {
        let sim = SimSwitch::new(SimConfig {
            fdb_converge_after_polls: after_polls,
            ..SimConfig::default()
        });
        let dut = Dut::discover(&sim).unwrap();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = dut.bridge_ports(&[2]).unwrap();
        (sim, dut, bridge_ports, vlan)
    }

    #[test]
    fn test_polls_until_converged() {
        let (sim, mut dut, bridge_ports, vlan) = polling(Some(3));
        let policy = SettlePolicy {
            delay: Duration::from_secs(60),
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_secs(60),
        };

        let started = Instant::now();
        let entries = FdbConfigurer::new(&sim)
            .create_fdb_entries(
                &mut dut,
                &devices(1),
                &bridge_ports,
                vlan,
                FdbOptions::default(),
                policy,
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn test_settle_timeout_when_never_converged() {
        let (sim, mut dut, bridge_ports, vlan) = polling(None);
        let policy = SettlePolicy {
            delay: Duration::ZERO,
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(30),
        };

        let err = FdbConfigurer::new(&sim)
            .create_fdb_entries(
                &mut dut,
                &devices(1),
                &bridge_ports,
                vlan,
                FdbOptions::default(),
                policy,
            )
            .unwrap_err();
        assert!(
            matches!(err, TopologyError::SettleTimeout(t) if t == Duration::from_millis(30)),
            "{:?}",
            err
        );
        // The entries stay programmed and registered for teardown.
        assert_eq!(dut.fdb_entries.len(), 1);
        assert_eq!(sim.count(SimOp::CreateFdbEntry), 1);
    }

    #[test]
    fn test_failed_create_keeps_earlier_entries_registered() {
        let sim = SimSwitch::default();
        let mut dut = Dut::discover(&sim).unwrap();
        let vlan = sim.default_vlan().unwrap();
        let bridge_ports = dut.bridge_ports(&[1, 2]).unwrap();

        let devs = devices(2);
        let cfg = FdbConfigurer::new(&sim);
        let opts = FdbOptions::default();
        let now = SettlePolicy::immediate();
        cfg.create_fdb_entries(&mut dut, &devs[..1], &bridge_ports[..1], vlan, opts, now)
            .unwrap();

        sim.fail_next(SimOp::CreateFdbEntry, SaiStatus::TableFull);
        let err = cfg
            .create_fdb_entries(&mut dut, &devs[1..], &bridge_ports[1..], vlan, opts, now)
            .unwrap_err();
        assert!(err.device_error().is_some());
        assert_eq!(dut.fdb_entries.len(), 1);
    }
}
