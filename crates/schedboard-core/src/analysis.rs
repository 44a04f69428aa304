//! Progress and risk aggregation
//!
//! Read-only computations over the task and milestone tables that feed the
//! dashboard charts and CLI tables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::status::StatusCounts;
use crate::{Milestone, Task, TaskStatus};

// ============================================================================
// Risk
// ============================================================================

/// Qualitative risk bucket for a delayed task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// `|variance| == 0` is low, up to 7 days medium, beyond that high
    pub fn from_variance(variance_days: i64) -> Self {
        match variance_days.unsigned_abs() {
            0 => RiskTier::Low,
            1..=7 => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DelayRisk<'a> {
    pub task: &'a Task,
    pub tier: RiskTier,
}

/// Delayed tasks with their risk tier, in table order
pub fn delay_risks(tasks: &[Task]) -> Vec<DelayRisk<'_>> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Delay)
        .map(|task| DelayRisk {
            task,
            tier: RiskTier::from_variance(task.variance_days),
        })
        .collect()
}

/// Number of delayed tasks per tier
pub fn risk_histogram(tasks: &[Task]) -> BTreeMap<RiskTier, usize> {
    let mut histogram = BTreeMap::new();
    for risk in delay_risks(tasks) {
        *histogram.entry(risk.tier).or_insert(0) += 1;
    }
    histogram
}

// ============================================================================
// Owner Workload
// ============================================================================

/// Per-owner status counts and average completion
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnerWorkload {
    pub owner: String,
    pub counts: StatusCounts,
    /// Mean of `progress_pct` over the owner's tasks
    pub avg_progress_pct: f64,
}

impl OwnerWorkload {
    pub fn pending(&self) -> usize {
        self.counts.total - self.counts.done
    }

    /// Done tasks as a share of the owner's total, 0-100
    pub fn completion_rate(&self) -> f64 {
        self.counts.done_pct()
    }
}

/// Workload for every non-blank owner, largest total first. Ties keep owner
/// name order.
pub fn owner_workload(tasks: &[Task]) -> Vec<OwnerWorkload> {
    let mut grouped: BTreeMap<&str, (StatusCounts, f64)> = BTreeMap::new();
    for task in tasks {
        let owner = task.owner.trim();
        if owner.is_empty() {
            continue;
        }
        let entry = grouped.entry(owner).or_default();
        entry.0.add(&task.status);
        entry.1 += task.progress_pct;
    }

    let mut workloads: Vec<_> = grouped
        .into_iter()
        .map(|(owner, (counts, progress_sum))| OwnerWorkload {
            owner: owner.to_string(),
            avg_progress_pct: progress_sum / counts.total as f64,
            counts,
        })
        .collect();
    workloads.sort_by(|a, b| b.counts.total.cmp(&a.counts.total));
    workloads
}

// ============================================================================
// Progress
// ============================================================================

/// Mean `progress_pct` across the table; 0 for an empty table
pub fn overall_progress(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    tasks.iter().map(|t| t.progress_pct).sum::<f64>() / tasks.len() as f64
}

/// Band used to colour area progress bars
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBand {
    /// At least 70%
    OnTrack,
    /// At least 30%
    Partial,
    Lagging,
}

impl ProgressBand {
    pub fn from_pct(pct: f64) -> Self {
        if pct >= 70.0 {
            ProgressBand::OnTrack
        } else if pct >= 30.0 {
            ProgressBand::Partial
        } else {
            ProgressBand::Lagging
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AreaProgress {
    pub area: String,
    pub completion_pct: f64,
    pub band: ProgressBand,
}

/// Completion of each area heading row, in sheet order
pub fn area_progress(milestones: &[Milestone]) -> Vec<AreaProgress> {
    milestones
        .iter()
        .filter(|m| m.is_area())
        .map(|m| AreaProgress {
            area: m.name.clone(),
            completion_pct: m.completion_pct,
            band: ProgressBand::from_pct(m.completion_pct),
        })
        .collect()
}
