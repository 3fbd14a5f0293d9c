//! Barracks troop training.
//!
//! Each barracks runs one independent pipeline per troop type: a FIFO
//! queue of pending troops and at most one troop in training. Pipelines
//! advance concurrently, so a bear and a penguin train side by side.
//!
//! Time is tracked in simulated milliseconds for deterministic results.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::components::TroopKind;

/// A troop waiting in a queue or being trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingItem {
    /// Troop being trained.
    pub kind: TroopKind,
    /// Total training time in milliseconds, captured when queued.
    pub train_time_ms: u32,
    /// Milliseconds left; may go negative on the completing tick.
    pub remaining_ms: i64,
}

impl TrainingItem {
    /// Create a queued item with its full training time remaining.
    #[must_use]
    pub fn new(kind: TroopKind, train_time_ms: u32) -> Self {
        Self {
            kind,
            train_time_ms,
            remaining_ms: i64::from(train_time_ms),
        }
    }

    /// Milliseconds of training already done.
    #[must_use]
    pub fn elapsed_ms(&self) -> u32 {
        let elapsed = i64::from(self.train_time_ms) - self.remaining_ms.max(0);
        u32::try_from(elapsed.max(0)).unwrap_or(self.train_time_ms)
    }
}

/// Training progress of one pipeline, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Milliseconds trained so far; zero when idle.
    pub elapsed_ms: u32,
    /// Total milliseconds for the current troop; zero when idle.
    pub total_ms: u32,
}

impl TrainingProgress {
    /// Progress as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total_ms == 0 {
            0
        } else {
            (u64::from(self.elapsed_ms) * 100 / u64::from(self.total_ms))
                .try_into()
                .unwrap_or(100)
        }
    }
}

/// Per-troop-type training pipelines of one barracks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrainingQueues {
    queues: [VecDeque<TrainingItem>; 3],
    slots: [Option<TrainingItem>; 3],
}

impl TrainingQueues {
    /// Create idle pipelines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a troop to its type's queue.
    pub fn enqueue(&mut self, kind: TroopKind, train_time_ms: u32) {
        self.queues[kind.index()].push_back(TrainingItem::new(kind, train_time_ms));
    }

    /// Troops waiting behind the one in training.
    #[must_use]
    pub fn queued(&self, kind: TroopKind) -> usize {
        self.queues[kind.index()].len()
    }

    /// Troop currently in training for a type.
    #[must_use]
    pub fn in_progress(&self, kind: TroopKind) -> Option<&TrainingItem> {
        self.slots[kind.index()].as_ref()
    }

    /// Whether nothing is queued or in training.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(Option::is_none) && self.queues.iter().all(VecDeque::is_empty)
    }

    /// Progress of the troop in training for a type.
    #[must_use]
    pub fn progress(&self, kind: TroopKind) -> TrainingProgress {
        self.in_progress(kind)
            .map(|item| TrainingProgress {
                elapsed_ms: item.elapsed_ms(),
                total_ms: item.train_time_ms,
            })
            .unwrap_or_default()
    }

    /// Advance every pipeline by `delta_ms`.
    ///
    /// An empty slot pulls the head of its queue and starts counting down
    /// in the same call. Pipelines are visited in [`TroopKind::ALL`] order
    /// and only the first troop finishing in this call is returned; any
    /// other troop finishing in the same call leaves its slot without being
    /// reported.
    pub fn update(&mut self, delta_ms: u64) -> Option<TroopKind> {
        let delta = i64::try_from(delta_ms).unwrap_or(i64::MAX);
        let mut completed: Option<TroopKind> = None;

        for kind in TroopKind::ALL {
            let i = kind.index();
            if self.slots[i].is_none() {
                self.slots[i] = self.queues[i].pop_front();
            }

            let Some(item) = self.slots[i].as_mut() else {
                continue;
            };
            item.remaining_ms = item.remaining_ms.saturating_sub(delta);
            if item.remaining_ms > 0 {
                continue;
            }

            self.slots[i] = None;
            match completed {
                None => completed = Some(kind),
                Some(first) => {
                    warn!(?kind, reported = ?first, "Training completion dropped; only one is reported per tick");
                }
            }
        }

        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_troop_completes_after_train_time() {
        let mut queues = TrainingQueues::new();
        queues.enqueue(TroopKind::Bear, 3000);

        assert_eq!(queues.update(1000), None);
        assert_eq!(queues.progress(TroopKind::Bear), TrainingProgress { elapsed_ms: 1000, total_ms: 3000 });
        assert_eq!(queues.update(1000), None);
        assert_eq!(queues.update(1000), Some(TroopKind::Bear));
        assert!(queues.is_idle());
        assert_eq!(queues.progress(TroopKind::Bear), TrainingProgress::default());
    }

    #[test]
    fn test_fifo_within_type() {
        let mut queues = TrainingQueues::new();
        queues.enqueue(TroopKind::Rabbit, 500);
        queues.enqueue(TroopKind::Rabbit, 500);
        assert_eq!(queues.queued(TroopKind::Rabbit), 2);

        assert_eq!(queues.update(500), Some(TroopKind::Rabbit));
        assert_eq!(queues.queued(TroopKind::Rabbit), 0);
        assert!(queues.in_progress(TroopKind::Rabbit).is_none());

        // Second rabbit starts on the next update
        assert_eq!(queues.update(500), Some(TroopKind::Rabbit));
        assert!(queues.is_idle());
    }

    #[test]
    fn test_types_train_concurrently() {
        let mut queues = TrainingQueues::new();
        queues.enqueue(TroopKind::Bear, 3000);
        queues.enqueue(TroopKind::Penguin, 7000);

        assert_eq!(queues.update(3000), Some(TroopKind::Bear));
        assert_eq!(queues.progress(TroopKind::Penguin).elapsed_ms, 3000);
        assert_eq!(queues.update(4000), Some(TroopKind::Penguin));
    }

    #[test]
    fn test_same_tick_completion_reports_first_only() {
        let mut queues = TrainingQueues::new();
        queues.enqueue(TroopKind::Rabbit, 1000);
        queues.enqueue(TroopKind::Bear, 1000);

        assert_eq!(queues.update(1000), Some(TroopKind::Bear));
        // The rabbit finished too but is gone, not deferred
        assert!(queues.is_idle());
        assert_eq!(queues.update(1000), None);
    }

    #[test]
    fn test_overshoot_completes() {
        let mut queues = TrainingQueues::new();
        queues.enqueue(TroopKind::Penguin, 7000);
        assert_eq!(queues.update(10_000), Some(TroopKind::Penguin));
    }

    #[test]
    fn test_progress_percentage() {
        let progress = TrainingProgress { elapsed_ms: 1500, total_ms: 3000 };
        assert_eq!(progress.percentage(), 50);
        assert_eq!(TrainingProgress::default().percentage(), 0);
    }
}
