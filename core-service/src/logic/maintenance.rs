//! Maintenance Loop - background housekeeping off the packet path
//!
//! Lifts expired blocks, applies alert retention and evicts idle flows on
//! a fixed interval until stopped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::logic::engine::DetectionEngine;

pub struct MaintenanceHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<u64>>,
}

impl MaintenanceHandle {
    /// Signal the loop and wait for it; returns completed passes
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        let _ = self.stop.send(());
        match self.thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::error!("Maintenance thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

pub fn spawn(engine: Arc<DetectionEngine>, interval: Duration) -> MaintenanceHandle {
    let (stop, stopped) = mpsc::channel::<()>();

    let thread = thread::spawn(move || {
        log::info!("Maintenance loop started (every {:?})", interval);
        let mut passes = 0u64;
        loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let report = engine.run_maintenance(Utc::now());
            passes += 1;
            if !report.unblocked.is_empty() || report.alerts_pruned > 0 || report.flows_evicted > 0 {
                log::info!(
                    "Maintenance: unblocked {:?}, pruned {} alerts, evicted {} flows",
                    report.unblocked,
                    report.alerts_pruned,
                    report.flows_evicted
                );
            }
        }
        log::info!("Maintenance loop stopped after {} passes", passes);
        passes
    });

    MaintenanceHandle {
        stop,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::EngineConfig;
    use crate::logic::features::FeatureSchema;
    use crate::logic::model::RuleScorer;

    #[test]
    fn test_runs_and_stops() {
        let engine = Arc::new(
            DetectionEngine::builder(EngineConfig::default())
                .scorer(Box::new(RuleScorer::new(FeatureSchema::Ciciot37).unwrap()))
                .build()
                .unwrap(),
        );

        let handle = spawn(Arc::clone(&engine), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        let passes = handle.stop();
        assert!(passes >= 1);
    }
}
