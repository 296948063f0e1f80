//! Verification helpers for forwarding tests
//!
//! Sends frames through a [`SimSwitch`] and checks where and how they leave.

use sai_sim::{DropReason, Egress, SimSwitch, TestPacket, Verdict};
use sai_types::AddressFamily;
use std::collections::BTreeMap;
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

/// Share of the even split every ECMP/LAG port must reach.
pub const BALANCE_TOLERANCE: f64 = 0.8;

/// Verification error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("{device} has no {family} address")]
    MissingAddress {
        device: String,
        family: AddressFamily,
    },

    #[error("packet from port {ingress} dropped: {reason:?}")]
    Dropped { ingress: usize, reason: DropReason },

    #[error("expected a drop, but the packet left on port {port}")]
    NotDropped { port: usize },

    #[error("packet left on port {actual}, expected one of {expected:?}")]
    WrongPort { expected: Vec<usize>, actual: usize },

    #[error("{field} mismatch: expected '{expected}', got '{actual}'")]
    FieldMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("port {port} carried {count} of {total} packets, below the minimum of {min}")]
    Imbalance {
        port: usize,
        count: usize,
        total: usize,
        min: usize,
    },

    #[error("{count} packet(s) left on port {port}, which should carry none")]
    UnexpectedPort { port: usize, count: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Packets seen per egress port.
pub type EgressCounts = BTreeMap<usize, usize>;

fn check_field<T: PartialEq + Display>(field: &'static str, expected: T, actual: T) -> VerifyResult<()> {
    if expected != actual {
        return Err(VerificationError::FieldMismatch {
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Compares the fields the forwarding model rewrites or carries through.
pub fn assert_packet_eq(expected: &TestPacket, actual: &TestPacket) -> VerifyResult<()> {
    check_field("eth_dst", expected.eth_dst, actual.eth_dst)?;
    check_field("eth_src", expected.eth_src, actual.eth_src)?;
    check_field("ip_src", expected.ip_src, actual.ip_src)?;
    check_field("ip_dst", expected.ip_dst, actual.ip_dst)?;
    check_field("ttl", expected.ttl, actual.ttl)?;
    check_field("ip_proto", expected.ip_proto, actual.ip_proto)?;
    check_field("l4_src_port", expected.l4_src_port, actual.l4_src_port)?;
    check_field("l4_dst_port", expected.l4_dst_port, actual.l4_dst_port)?;
    if expected.vlan != actual.vlan {
        return Err(VerificationError::FieldMismatch {
            field: "vlan",
            expected: format!("{:?}", expected.vlan),
            actual: format!("{:?}", actual.vlan),
        });
    }
    Ok(())
}

/// Checks that every port in `ports` carried at least `tolerance` of an even
/// split of `counts`, and that nothing left elsewhere.
pub fn assert_balanced(counts: &EgressCounts, ports: &[usize], tolerance: f64) -> VerifyResult<()> {
    let total: usize = counts.values().sum();
    if let Some((&port, &count)) = counts.iter().find(|(p, _)| !ports.contains(p)) {
        return Err(VerificationError::UnexpectedPort { port, count });
    }
    if ports.is_empty() {
        return Ok(());
    }
    let min = (total as f64 / ports.len() as f64 * tolerance).floor() as usize;
    for &port in ports {
        let count = counts.get(&port).copied().unwrap_or(0);
        if count < min {
            return Err(VerificationError::Imbalance {
                port,
                count,
                total,
                min,
            });
        }
    }
    Ok(())
}

/// Checks that none of `excluded` carried traffic.
pub fn assert_excluded(counts: &EgressCounts, excluded: &[usize]) -> VerifyResult<()> {
    match excluded
        .iter()
        .find_map(|p| counts.get(p).filter(|c| **c > 0).map(|c| (*p, *c)))
    {
        Some((port, count)) => Err(VerificationError::UnexpectedPort { port, count }),
        None => Ok(()),
    }
}

/// Traffic verifier over a simulated switch
pub struct TrafficVerifier<'a> {
    sim: &'a SimSwitch,
}

impl<'a> TrafficVerifier<'a> {
    pub fn new(sim: &'a SimSwitch) -> Self {
        Self { sim }
    }

    /// Sends `pkt` on `ingress`, failing if the switch drops it.
    pub fn send(&self, ingress: usize, pkt: &TestPacket) -> VerifyResult<Egress> {
        match self.sim.send(ingress, pkt) {
            Verdict::Forwarded(egress) => Ok(egress),
            Verdict::Dropped(reason) => Err(VerificationError::Dropped { ingress, reason }),
        }
    }

    /// Verifies that `pkt` leaves on one of `ports` looking exactly like
    /// `expected`. Returns the egress port.
    pub fn assert_forwarded(
        &self,
        ingress: usize,
        pkt: &TestPacket,
        ports: &[usize],
        expected: &TestPacket,
    ) -> VerifyResult<usize> {
        let egress = self.send(ingress, pkt)?;
        if !ports.contains(&egress.port_index) {
            return Err(VerificationError::WrongPort {
                expected: ports.to_vec(),
                actual: egress.port_index,
            });
        }
        assert_packet_eq(expected, &egress.packet)?;
        debug!("{} -> {} verified", ingress, egress.port_index);
        Ok(egress.port_index)
    }

    /// Verifies that `pkt` is dropped and returns why.
    pub fn assert_dropped(&self, ingress: usize, pkt: &TestPacket) -> VerifyResult<DropReason> {
        match self.sim.send(ingress, pkt) {
            Verdict::Dropped(reason) => Ok(reason),
            Verdict::Forwarded(egress) => Err(VerificationError::NotDropped {
                port: egress.port_index,
            }),
        }
    }

    /// Sends every packet on `ingress` and tallies egress ports. Any drop
    /// fails the whole run.
    pub fn count_egress<I>(&self, ingress: usize, packets: I) -> VerifyResult<EgressCounts>
    where
        I: IntoIterator<Item = TestPacket>,
    {
        let mut counts = EgressCounts::new();
        for pkt in packets {
            let egress = self.send(ingress, &pkt)?;
            *counts.entry(egress.port_index).or_insert(0) += 1;
        }
        debug!("egress distribution from port {}: {:?}", ingress, counts);
        Ok(counts)
    }
}
