//! FlowGuard - Main Entry Point
//!
//! Builds the engine from the environment, replays a packet source through
//! it and drains cleanly on Ctrl-C or end of input.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flowguard_core::api;
use flowguard_core::constants;
use flowguard_core::logic::capture::{JsonlPacketSource, PacketSource, SyntheticTraffic};
use flowguard_core::logic::config::EngineConfig;
use flowguard_core::logic::engine::{DetectionEngine, PacketOutcome};
use flowguard_core::logic::maintenance;
use flowguard_core::logic::model::{OnnxScorer, RuleScorer, Scorer, SessionCache};
use flowguard_core::logic::response::{DryRunFirewall, Firewall, IptablesFirewall};

const SYNTHETIC_PACKETS: u64 = 20_000;
const SYNTHETIC_SEED: u64 = 7;

fn load_scorers(config: &EngineConfig) -> Vec<Box<dyn Scorer>> {
    let mut scorers: Vec<Box<dyn Scorer>> = Vec::new();

    if let Some(dir) = constants::get_model_dir() {
        let cache = Arc::new(SessionCache::new());
        for id in [constants::RANDOM_FOREST_ID, constants::DEEP_LEARNING_ID] {
            match OnnxScorer::from_dir(&dir, id, Arc::clone(&cache)) {
                Ok(scorer) => {
                    log::info!("Loaded scorer '{}' from {}", id, dir.display());
                    scorers.push(Box::new(scorer));
                }
                Err(e) => log::warn!("Scorer '{}' unavailable: {}", id, e),
            }
        }
    }

    if scorers.is_empty() {
        match RuleScorer::new(config.schema) {
            Ok(scorer) => {
                log::info!("No ONNX scorers loaded - using rule scorer");
                scorers.push(Box::new(scorer));
            }
            Err(e) => log::error!("Rule scorer unavailable: {}", e),
        }
    }
    scorers
}

fn open_source(replay: Option<&Path>) -> Box<dyn PacketSource> {
    if let Some(path) = replay {
        match JsonlPacketSource::open(path) {
            Ok(source) => {
                log::info!("Replaying packets from {}", path.display());
                return Box::new(source);
            }
            Err(e) => log::warn!("Cannot open {}: {}. Falling back to synthetic traffic.", path.display(), e),
        }
    }
    log::info!("Generating {} synthetic packets", SYNTHETIC_PACKETS);
    Box::new(SyntheticTraffic::new(SYNTHETIC_SEED, SYNTHETIC_PACKETS))
}

fn replay(engine: &DetectionEngine, source: Box<dyn PacketSource>) -> u64 {
    let mut alerts = 0u64;
    for packet in source {
        match engine.process_packet(packet) {
            PacketOutcome::Rejected => break,
            PacketOutcome::Scored(flow) if flow.alert_id.is_some() => alerts += 1,
            _ => {}
        }
    }
    alerts
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    let config = EngineConfig::from_env();
    if let Some(dir) = &config.data_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("Cannot create data dir {}: {}", dir.display(), e);
        }
    }

    let scorers = load_scorers(&config);
    let firewall: Arc<dyn Firewall> = if constants::use_iptables() {
        log::warn!("Blocks will be enforced through iptables");
        Arc::new(IptablesFirewall)
    } else {
        Arc::new(DryRunFirewall::new())
    };

    let engine = Arc::new(DetectionEngine::builder(config).scorers(scorers).firewall(firewall).build()?);

    let maintenance = maintenance::spawn(
        Arc::clone(&engine),
        Duration::from_secs(constants::get_maintenance_interval()),
    );

    let replay_path = std::env::args().nth(1).map(std::path::PathBuf::from).or_else(constants::get_replay_file);
    let source = open_source(replay_path.as_deref());

    let worker = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || replay(&engine, source))
    };

    tokio::select! {
        result = worker => match result {
            Ok(alerts) => log::info!("Packet source exhausted, {} alerts raised", alerts),
            Err(e) => log::error!("Replay task failed: {}", e),
        },
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupt received, draining...");
        }
    }

    engine.drain();
    let passes = maintenance.stop();
    log::info!("Maintenance stopped after {} passes", passes);

    let status = api::get_engine_status(&engine)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
