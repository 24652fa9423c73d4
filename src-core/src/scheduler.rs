//! Bracket Scheduler (ASHA-style asynchronous successive halving).
//!
//! Maintains per-rung job state and promotion under concurrent worker
//! arrivals. Only one bracket is active: "iterations" are
//! logical markers produced by the Coordinator, not separate brackets.

use std::collections::HashSet;

use crate::config_space::Configuration;
use crate::error::CoreError;

/// Lifecycle state of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Promoted,
}

/// One `(config, budget, status, loss?)` record, identified implicitly by
/// its position `(rung_id, index_within_rung)`.
#[derive(Debug, Clone)]
pub struct Job {
    pub config: Configuration,
    pub status: JobStatus,
    pub loss: Option<f64>,
}

/// Jobs sharing one budget level, plus the set of configs present there.
/// `configs` always equals `{j.config for j in jobs}`.
#[derive(Debug, Default)]
pub struct Rung {
    jobs: Vec<Job>,
    configs: HashSet<Configuration>,
    /// Indices into `jobs`, in the order each entered COMPLETED (including
    /// ones later promoted) — used for ASHA's rank + tie-break-by-insertion
    /// rule, independent of `jobs`' own creation order.
    completion_order: Vec<usize>,
}

impl Rung {
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn configs(&self) -> &HashSet<Configuration> {
        &self.configs
    }

    fn push_running(&mut self, config: Configuration) {
        self.configs.insert(config.clone());
        self.jobs.push(Job { config, status: JobStatus::Running, loss: None });
    }

    /// Rank-ordered (ascending loss, ties by earlier completion) indices of
    /// every job that has ever completed at this rung, regardless of
    /// whether it has since been promoted.
    fn ranked_completed(&self) -> Vec<usize> {
        let mut ranked: Vec<usize> = self.completion_order.clone();
        ranked.sort_by(|&a, &b| {
            let la = self.jobs[a].loss.unwrap_or(f64::INFINITY);
            let lb = self.jobs[b].loss.unwrap_or(f64::INFINITY);
            la.partial_cmp(&lb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let pa = self.completion_order.iter().position(|&x| x == a).unwrap();
                    let pb = self.completion_order.iter().position(|&x| x == b).unwrap();
                    pa.cmp(&pb)
                })
        });
        ranked
    }

    /// Index (within `jobs`) of the best-ranked COMPLETED-but-not-yet-PROMOTED
    /// job, if the promotion quota admits one.
    fn promotion_candidate(&self, eta: f64) -> Option<usize> {
        let n_completed = self.completion_order.len();
        let top_k = (n_completed as f64 / eta).floor() as usize;
        if top_k == 0 {
            return None;
        }
        self.ranked_completed()
            .into_iter()
            .take(top_k)
            .find(|&idx| self.jobs[idx].status == JobStatus::Completed)
    }
}

/// The single active bracket: an ordered list of rungs, lowest budget first.
pub struct BracketScheduler {
    ladder: Vec<u64>,
    eta: f64,
    rungs: Vec<Rung>,
}

impl BracketScheduler {
    pub fn new(ladder: Vec<u64>, eta: f64) -> Self {
        let rungs = ladder.iter().map(|_| Rung::default()).collect();
        Self { ladder, eta, rungs }
    }

    pub fn ladder(&self) -> &[u64] {
        &self.ladder
    }

    pub fn s_max(&self) -> usize {
        self.ladder.len() - 1
    }

    pub fn rung(&self, idx: usize) -> &Rung {
        &self.rungs[idx]
    }

    fn rung_index_of_budget(&self, budget: u64) -> Option<usize> {
        self.ladder.iter().position(|&b| b == budget)
    }

    /// Register a fresh RUNNING job at rung 0 (or whichever rung index the
    /// caller names — used by the Coordinator when sampling at `r_0`).
    pub fn start_job(&mut self, rung_idx: usize, config: Configuration) {
        self.rungs[rung_idx].push_running(config);
    }

    /// Mark the RUNNING job matching `config` at `budget` as COMPLETED with
    /// `loss`. Errors with `UnknownJob` if no such RUNNING job exists.
    pub fn observe(&mut self, config: &Configuration, budget: u64, loss: f64) -> Result<(), CoreError> {
        let rung_idx = self
            .rung_index_of_budget(budget)
            .ok_or(CoreError::UnknownJob { budget })?;
        let rung = &mut self.rungs[rung_idx];
        let job_idx = rung
            .jobs
            .iter()
            .position(|j| j.status == JobStatus::Running && &j.config == config)
            .ok_or(CoreError::UnknownJob { budget })?;
        rung.jobs[job_idx].status = JobStatus::Completed;
        rung.jobs[job_idx].loss = Some(loss);
        rung.completion_order.push(job_idx);
        Ok(())
    }

    /// Walk rungs from highest to lowest looking for a promotion-eligible
    /// job. On success, promotes it in
    /// place and starts the corresponding RUNNING job at rung+1, returning
    /// `(config, budget_of_next_rung)`.
    pub fn try_promote(&mut self) -> Option<(Configuration, u64)> {
        // i == s_max has no rung i+1 to promote into.
        for i in (0..self.s_max()).rev() {
            if let Some(job_idx) = self.rungs[i].promotion_candidate(self.eta) {
                self.rungs[i].jobs[job_idx].status = JobStatus::Promoted;
                let config = self.rungs[i].jobs[job_idx].config.clone();
                let next_budget = self.ladder[i + 1];
                self.rungs[i + 1].push_running(config.clone());
                return Some((config, next_budget));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_space::Value;

    fn cfg(tag: i64) -> Configuration {
        Configuration { values: vec![Value::Int(tag)] }
    }

    /// R=9, eta=3 => ladder {1,3,9}. After 9 completions at budget 1
    /// with losses 0..8, the next 3 `try_promote` calls must yield the
    /// three lowest-loss configs paired with budget 3, in ascending loss
    /// order.
    #[test]
    fn promotion_order_matches_loss_rank() {
        let mut sched = BracketScheduler::new(vec![1, 3, 9], 3.0);
        for i in 0..9 {
            sched.start_job(0, cfg(i));
        }
        for i in 0..9 {
            sched.observe(&cfg(i), 1, i as f64).unwrap();
        }
        let mut promoted = Vec::new();
        while let Some((config, budget)) = sched.try_promote() {
            promoted.push((config, budget));
        }
        assert_eq!(promoted.len(), 3);
        for (idx, (config, budget)) in promoted.iter().enumerate() {
            assert_eq!(*budget, 3);
            assert_eq!(*config, cfg(idx as i64));
        }
    }

    #[test]
    fn configs_set_matches_jobs() {
        let mut sched = BracketScheduler::new(vec![1, 3, 9], 3.0);
        for i in 0..5 {
            sched.start_job(0, cfg(i));
        }
        let rung = sched.rung(0);
        let from_jobs: HashSet<Configuration> = rung.jobs().iter().map(|j| j.config.clone()).collect();
        assert_eq!(&from_jobs, rung.configs());
    }

    #[test]
    fn promoted_config_completed_at_prior_rung() {
        let mut sched = BracketScheduler::new(vec![1, 3, 9], 3.0);
        sched.start_job(0, cfg(0));
        sched.observe(&cfg(0), 1, 0.1).unwrap();
        let (config, budget) = sched.try_promote().unwrap();
        assert_eq!(budget, 3);
        let rung0 = sched.rung(0);
        let original = rung0.jobs().iter().find(|j| j.config == config).unwrap();
        assert_eq!(original.status, JobStatus::Promoted);
    }

    #[test]
    fn observe_unknown_job_errors() {
        let mut sched = BracketScheduler::new(vec![1, 3, 9], 3.0);
        let result = sched.observe(&cfg(0), 1, 1.0);
        assert!(matches!(result, Err(CoreError::UnknownJob { budget: 1 })));
    }

    #[test]
    fn ties_broken_by_completion_order() {
        let mut sched = BracketScheduler::new(vec![1, 3], 2.0);
        sched.start_job(0, cfg(0));
        sched.start_job(0, cfg(1));
        // Equal losses: cfg(1) completes first, so on a tie it ranks first.
        sched.observe(&cfg(1), 1, 5.0).unwrap();
        sched.observe(&cfg(0), 1, 5.0).unwrap();
        let (config, _budget) = sched.try_promote().unwrap();
        assert_eq!(config, cfg(1));
    }

    #[test]
    fn no_promotion_from_top_rung() {
        let mut sched = BracketScheduler::new(vec![1, 3], 2.0);
        sched.start_job(1, cfg(0));
        sched.observe(&cfg(0), 3, 0.1).unwrap();
        assert!(sched.try_promote().is_none());
    }
}
