//! In-process thread pool standing in for an out-of-scope RPC transport:
//! real workers would be remote processes reached over some name service,
//! but the core only cares about two messages, "give me work" and "here's a
//! result", so a handful of OS threads and channels reproduce that contract
//! locally for the demo harness.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use mfes_core::{Configuration, ConfigurationSpace};
use mfes_testfunctions::MultiFidelityObjective;
use rand::{rngs::StdRng, SeedableRng};

/// `(iteration, budget_index, running_index)`.
pub type ConfigId = (u64, u64, u64);

struct WorkItem {
    config_id: ConfigId,
    config: Configuration,
    budget: u64,
}

struct WorkResult {
    config_id: ConfigId,
    loss: f64,
}

struct InFlight {
    config_id: ConfigId,
    config: Configuration,
    budget: u64,
    dispatched_at: Instant,
}

/// Sentinel loss attached to a job whose worker is declared lost.
/// Worst-possible, so it never wins promotion.
const LOST_WORKER_SENTINEL_LOSS: f64 = f64::MAX;

/// Drives `num_workers` worker threads evaluating `objective`, enforcing
/// `time_limit_per_trial` as a per-trial deadline.
pub struct WorkerPool {
    job_tx: mpsc::Sender<WorkItem>,
    result_rx: mpsc::Receiver<WorkResult>,
    time_limit: Duration,
    next_config_id: u64,
    in_flight: Vec<InFlight>,
}

impl WorkerPool {
    pub fn new(
        num_workers: usize,
        space: ConfigurationSpace,
        objective: Arc<dyn MultiFidelityObjective>,
        max_budget: u64,
        seed: u64,
        time_limit: Duration,
    ) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<WorkItem>();
        let (result_tx, result_rx) = mpsc::channel::<WorkResult>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        for worker_id in 0..num_workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let objective = Arc::clone(&objective);
            let space = space.clone();

            thread::Builder::new()
                .name(format!("mfes-worker-{worker_id}"))
                .spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker_id as u64));
                    loop {
                        let item = {
                            let rx = job_rx.lock().unwrap();
                            rx.recv()
                        };
                        let Ok(item) = item else { break };
                        let row = space.encode(&item.config).to_vec();
                        let loss = objective.evaluate(&row, item.budget, max_budget, &mut rng);
                        if result_tx.send(WorkResult { config_id: item.config_id, loss }).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn worker thread");
        }

        Self { job_tx, result_rx, time_limit, next_config_id: 0, in_flight: Vec::new() }
    }

    fn fresh_config_id(&mut self, budget_index: u64) -> ConfigId {
        let id = (self.next_config_id, budget_index, self.next_config_id);
        self.next_config_id += 1;
        id
    }

    pub fn dispatch(&mut self, config: Configuration, budget: u64, budget_index: u64) {
        let config_id = self.fresh_config_id(budget_index);
        info!("dispatching {config_id:?} at budget {budget}");
        self.in_flight.push(InFlight {
            config_id,
            config: config.clone(),
            budget,
            dispatched_at: Instant::now(),
        });
        let _ = self.job_tx.send(WorkItem { config_id, config, budget });
    }

    /// Blocks for the next completed trial, or declares the
    /// longest-outstanding in-flight job lost once its deadline has passed.
    pub fn collect(&mut self) -> (Configuration, u64, f64) {
        loop {
            let deadline = self
                .in_flight
                .iter()
                .map(|w| w.dispatched_at + self.time_limit)
                .min()
                .unwrap_or_else(|| Instant::now() + self.time_limit);
            let wait = deadline.saturating_duration_since(Instant::now());

            match self.result_rx.recv_timeout(wait) {
                Ok(result) => {
                    if let Some(pos) = self.in_flight.iter().position(|w| w.config_id == result.config_id) {
                        let entry = self.in_flight.remove(pos);
                        return (entry.config, entry.budget, result.loss);
                    }
                    // Result for a job we no longer track (already timed
                    // out); keep waiting for a live one.
                }
                Err(_) => {
                    let oldest_idx = self
                        .in_flight
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, w)| w.dispatched_at)
                        .map(|(i, _)| i);
                    if let Some(idx) = oldest_idx {
                        let entry = self.in_flight.remove(idx);
                        warn!("worker for {:?} timed out after {:?}", entry.config_id, self.time_limit);
                        return (entry.config, entry.budget, LOST_WORKER_SENTINEL_LOSS);
                    }
                }
            }
        }
    }
}
