use crate::dut::Dut;
use crate::entity::Lag;
use crate::error::{DeviceCall, Result, TopologyError};
use sai_client::api::{HashAlgorithm, HashAttribute, LagMemberConfig, NativeHashField, SwitchAttribute};
use sai_client::{HashOid, SaiClient};
use tracing::{debug, info};

/// Creates LAGs and their members, and configures switch-wide LAG hashing.
pub struct LagConfigurer<'a, C: SaiClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SaiClient + ?Sized> LagConfigurer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates a LAG over `ports`. LAGs are indexed from 1 in creation
    /// order.
    pub fn create_lag<'d>(&self, dut: &'d mut Dut, ports: &[usize]) -> Result<&'d Lag> {
        let port_oids = ports
            .iter()
            .map(|idx| dut.port(*idx).map(|p| p.oid))
            .collect::<Result<Vec<_>>>()?;
        let index = dut.lags.keys().next_back().map_or(1, |last| last + 1);

        let lag_id = self
            .client
            .create_lag()
            .during(&format!("create lag{}", index))?;
        dut.lags.insert(index, Lag::new(index, lag_id));

        for (&port_idx, port) in ports.iter().zip(port_oids) {
            let member = self
                .client
                .create_lag_member(&LagMemberConfig { lag: lag_id, port })
                .during(&format!("create lag{} member port{}", index, port_idx))?;
            let lag = dut.lag_mut(index)?;
            lag.lag_members.push(member);
            lag.member_port_indexs.push(port_idx);
            debug!("port{} joined lag{}", port_idx, index);
        }

        info!("created lag{} with ports {:?}", index, ports);
        dut.lag(index)
    }

    pub fn set_lag_hash_algorithm(&self, algorithm: HashAlgorithm) -> Result<()> {
        self.client
            .set_switch_attribute(SwitchAttribute::LagDefaultHashAlgorithm(algorithm))
            .during("set lag hash algorithm")
    }

    /// Creates the IPv4 LAG hash object and binds it to the switch, or
    /// rewrites the field list of `existing` in place.
    ///
    /// `fields` defaults to src-ip, dst-ip, ip-protocol, l4-dst-port and
    /// l4-src-port.
    pub fn setup_lag_v4_hash(
        &self,
        dut: &mut Dut,
        fields: Option<&[NativeHashField]>,
        existing: Option<HashOid>,
    ) -> Result<HashOid> {
        let fields = fields.unwrap_or(&NativeHashField::DEFAULT_V4);

        if let Some(hash) = existing {
            self.client
                .set_hash_attribute(hash, HashAttribute::NativeHashFieldList(fields.to_vec()))
                .during("update lag ipv4 hash fields")?;
            debug!("updated lag hash {} fields {:?}", hash, fields);
            return Ok(hash);
        }

        let hash = self.client.create_hash(fields).during("create lag ipv4 hash")?;
        // Registered before binding so teardown can reclaim it either way.
        dut.lag_hash_ipv4 = Some(hash);
        self.client
            .set_switch_attribute(SwitchAttribute::LagHashIpv4(hash))
            .during("bind lag ipv4 hash")?;
        info!("bound lag ipv4 hash {} fields {:?}", hash, fields);
        Ok(hash)
    }

    pub fn set_lag_hash_seed(&self, seed: u32) -> Result<()> {
        self.client
            .set_switch_attribute(SwitchAttribute::LagDefaultHashSeed(seed))
            .during("set lag hash seed")
    }

    /// Removes the member of LAG `index` on port `port_idx`.
    pub fn remove_lag_member(&self, dut: &mut Dut, index: usize, port_idx: usize) -> Result<()> {
        let lag = dut.lag_mut(index)?;
        let pos = lag
            .member_port_indexs
            .iter()
            .position(|p| *p == port_idx)
            .ok_or_else(|| TopologyError::unknown("lag member", format!("lag{} port{}", index, port_idx)))?;

        self.client
            .remove_lag_member(lag.lag_members[pos])
            .during(&format!("remove lag{} member port{}", index, port_idx))?;
        lag.lag_members.remove(pos);
        lag.member_port_indexs.remove(pos);
        Ok(())
    }

    pub fn remove_all_lag_members(&self, dut: &mut Dut, index: usize) -> Result<()> {
        let ports = dut.lag(index)?.member_port_indexs.clone();
        for port_idx in ports {
            self.remove_lag_member(dut, index, port_idx)?;
        }
        Ok(())
    }

    /// Removes LAG `index` and forgets it. Its members must already be gone.
    pub fn remove_lag(&self, dut: &mut Dut, index: usize) -> Result<()> {
        let lag = dut.lag(index)?;
        if !lag.lag_members.is_empty() {
            return Err(TopologyError::precondition(format!(
                "lag{} still has {} members",
                index,
                lag.lag_members.len()
            )));
        }
        self.client
            .remove_lag(lag.lag_id)
            .during(&format!("remove lag{}", index))?;
        dut.lags.remove(&index);
        info!("removed lag{}", index);
        Ok(())
    }
}
