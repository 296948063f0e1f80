//! t0-sim - builds the T0 topology on a simulated switch
//!
//! Loads a topology file, programs it into an in-memory switch, optionally
//! probes the ECMP route with a flow sweep, tears it down and prints a JSON
//! report.

use anyhow::{bail, Context};
use clap::Parser;
use sai_sim::{SimConfig, SimInventory, SimSwitch};
use sai_test_harness::fixtures::{flow_sweep, routed_tcp};
use sai_test_harness::{EgressCounts, TrafficVerifier};
use sai_topology::{DutSummary, T0Topology, TopologyConfig};
use sai_types::AddressFamily;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Build the SAI T0 test topology on a simulated switch
#[derive(Parser, Debug)]
#[command(name = "t0-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Topology file (TOML). Defaults apply when absent.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of front-panel ports on the simulated switch
    #[arg(short = 'p', long, default_value = "32")]
    ports: usize,

    /// Send this many flows at the ECMP destination and report the spread
    #[arg(long, default_value = "0")]
    probe_flows: usize,

    /// Include the full topology in the report
    #[arg(long)]
    dump: bool,

    /// Leave the topology in place instead of tearing it down
    #[arg(long)]
    keep: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Serialize)]
struct Report {
    summary: DutSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    ecmp_egress: Option<EgressCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topology: Option<serde_json::Value>,
    /// Objects still on the switch after teardown.
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<SimInventory>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(Some(report)) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("failed to serialize report: {}", e);
                ExitCode::FAILURE
            }
        },
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<TopologyConfig> {
    let config = match &args.config {
        Some(path) => TopologyConfig::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TopologyConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> anyhow::Result<Option<Report>> {
    let config = load_config(args)?;
    if let Some(path) = &args.write_config {
        config
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote configuration to {}", path.display());
        return Ok(None);
    }

    let sim = SimSwitch::new(SimConfig {
        port_count: args.ports,
        ..SimConfig::default()
    });
    let mut t0 = T0Topology::setup(&sim, &config).context("building t0 topology")?;
    let summary = t0.dut.summary();

    let ecmp_egress = match args.probe_flows {
        0 => None,
        flows => Some(probe_ecmp(&sim, &t0, &config, flows)?),
    };
    let topology = if args.dump {
        Some(serde_json::to_value(&t0)?)
    } else {
        None
    };

    let remaining = if args.keep {
        None
    } else {
        t0.teardown(&sim).context("tearing down t0 topology")?;
        Some(sim.inventory())
    };

    Ok(Some(Report {
        summary,
        ecmp_egress,
        topology,
        remaining,
    }))
}

/// Sweeps `flows` TCP flows from the first port interface toward the ECMP
/// destination.
fn probe_ecmp(
    sim: &SimSwitch,
    t0: &T0Topology,
    config: &TopologyConfig,
    flows: usize,
) -> anyhow::Result<EgressCounts> {
    if t0.ecmp_groups.is_none() {
        bail!("the topology has no ECMP route to probe");
    }
    let Some(&ingress) = config.route.port_rifs.first() else {
        bail!("probing needs a port router interface to inject on");
    };
    let src = t0.server(0, 1)?;
    let base = routed_tcp(sim.router_mac(), src, t0.ecmp_destination()?, AddressFamily::V4)?;
    let counts = TrafficVerifier::new(sim).count_egress(ingress, flow_sweep(base, flows))?;
    info!("ecmp probe: {} flows over {} ports", flows, counts.len());
    Ok(counts)
}
