// SPDX-License-Identifier: MIT OR Apache-2.0
//! Periodic preset switching.
//!
//! Two per-observer schedulers that pick which preset plays next:
//! - A random pool, re-rolled every interval
//! - A sequence of entries, each held for its own number of ticks
//!
//! The switchers only decide names. Playing the chosen preset is left to the
//! caller, which builds a fresh timeline for it.

use crate::observer::ObserverId;
use crate::scheduler::{TaskHandle, TaskKind, TickScheduler};
use indexmap::{IndexMap, IndexSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// One entry of a running sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceStep {
    /// Preset to play
    pub preset: String,
    /// How long to hold it, in ticks
    pub ticks: u64,
}

impl SequenceStep {
    /// Create a new step
    pub fn new(preset: impl Into<String>, ticks: u64) -> Self {
        Self {
            preset: preset.into(),
            ticks,
        }
    }
}

#[derive(Debug)]
struct RandomPool {
    names: Vec<String>,
    task: Option<TaskHandle>,
}

#[derive(Debug)]
struct SequenceRun {
    steps: Vec<SequenceStep>,
    index: usize,
    looping: bool,
    task: Option<TaskHandle>,
}

/// Random-pool and sequence switchers for all observers
#[derive(Debug)]
pub struct Switchers {
    scheduler: Arc<TickScheduler>,
    rng: StdRng,
    pools: IndexMap<ObserverId, RandomPool>,
    sequences: IndexMap<ObserverId, SequenceRun>,
}

impl Switchers {
    /// Create switchers with an entropy-seeded random source
    pub fn new(scheduler: Arc<TickScheduler>) -> Self {
        Self::with_rng(scheduler, StdRng::from_entropy())
    }

    /// Create switchers with a given random source
    pub fn with_rng(scheduler: Arc<TickScheduler>, rng: StdRng) -> Self {
        Self {
            scheduler,
            rng,
            pools: IndexMap::new(),
            sequences: IndexMap::new(),
        }
    }

    /// Start a random pool for `observer`, replacing any previous one.
    ///
    /// Returns the preset to play now, or `None` for an empty pool, which
    /// leaves the previous pool running. A re-roll task is only scheduled when
    /// there is more than one distinct name.
    pub fn start_random(
        &mut self,
        observer: ObserverId,
        names: impl IntoIterator<Item = String>,
        interval_ticks: u64,
    ) -> Option<String> {
        let names: Vec<String> = names.into_iter().collect::<IndexSet<_>>().into_iter().collect();
        let first = names.choose(&mut self.rng)?.clone();
        self.stop_random(observer);

        let task = (names.len() > 1).then(|| {
            self.scheduler
                .schedule_repeating(TaskKind::RandomSwitch(observer), interval_ticks, interval_ticks)
        });
        tracing::debug!(
            "Random pool of {} presets started for {}",
            names.len(),
            observer
        );
        self.pools.insert(observer, RandomPool { names, task });
        Some(first)
    }

    /// Draw the next preset from `observer`'s pool. The previous pick may come
    /// up again.
    pub fn reroll(&mut self, observer: ObserverId) -> Option<String> {
        let pool = self.pools.get(&observer)?;
        let pick = pool.names.choose(&mut self.rng)?.clone();
        tracing::debug!("Random pool for {} switched to {}", observer, pick);
        Some(pick)
    }

    /// Stop `observer`'s random pool. Returns `false` if none was running.
    pub fn stop_random(&mut self, observer: ObserverId) -> bool {
        match self.pools.shift_remove(&observer) {
            Some(pool) => {
                if let Some(task) = pool.task {
                    self.scheduler.cancel(task);
                }
                true
            }
            None => false,
        }
    }

    /// Preset names in `observer`'s pool
    pub fn random_pool(&self, observer: ObserverId) -> Option<&[String]> {
        self.pools.get(&observer).map(|p| p.names.as_slice())
    }

    /// Start a sequence for `observer`, replacing any previous one.
    ///
    /// Returns the first preset to play, or `None` for no steps, which leaves
    /// the previous sequence running. A looping sequence of one entry
    /// schedules nothing.
    pub fn start_sequence(
        &mut self,
        observer: ObserverId,
        steps: Vec<SequenceStep>,
        looping: bool,
    ) -> Option<String> {
        let first = steps.first()?;
        let preset = first.preset.clone();
        let first_ticks = first.ticks;
        self.stop_sequence(observer);

        let task = (steps.len() > 1 || !looping)
            .then(|| self.scheduler.schedule_once(TaskKind::SequenceStep(observer), first_ticks));
        tracing::debug!("Sequence of {} entries started for {}", steps.len(), observer);
        self.sequences.insert(
            observer,
            SequenceRun {
                steps,
                index: 0,
                looping,
                task,
            },
        );
        Some(preset)
    }

    /// Move `observer`'s sequence to its next entry.
    ///
    /// Returns the preset to play, or `None` once a non-looping sequence has
    /// run out, in which case the run is removed.
    pub fn advance_sequence(&mut self, observer: ObserverId) -> Option<String> {
        let run = self.sequences.get_mut(&observer)?;
        if let Some(task) = run.task.take() {
            self.scheduler.cancel(task);
        }
        let next = run.index + 1;
        if next >= run.steps.len() && !run.looping {
            tracing::debug!("Sequence finished for {}", observer);
            self.sequences.shift_remove(&observer);
            return None;
        }
        run.index = next % run.steps.len();
        let step = &run.steps[run.index];
        run.task = Some(
            self.scheduler
                .schedule_once(TaskKind::SequenceStep(observer), step.ticks),
        );
        Some(step.preset.clone())
    }

    /// Stop `observer`'s sequence. Returns `false` if none was running.
    pub fn stop_sequence(&mut self, observer: ObserverId) -> bool {
        match self.sequences.shift_remove(&observer) {
            Some(run) => {
                if let Some(task) = run.task {
                    self.scheduler.cancel(task);
                }
                true
            }
            None => false,
        }
    }

    /// Index of the entry `observer`'s sequence is on
    pub fn sequence_index(&self, observer: ObserverId) -> Option<usize> {
        self.sequences.get(&observer).map(|r| r.index)
    }

    /// Stop both switchers for `observer`
    pub fn stop_all(&mut self, observer: ObserverId) {
        self.stop_random(observer);
        self.stop_sequence(observer);
    }

    /// Stop every switcher of every observer
    pub fn cleanup_all(&mut self) {
        let observers: Vec<ObserverId> = self
            .pools
            .keys()
            .chain(self.sequences.keys())
            .copied()
            .collect();
        for observer in observers {
            self.stop_all(observer);
        }
    }

    /// Number of observers with a running switcher of either kind
    pub fn active_count(&self) -> usize {
        self.pools.len() + self.sequences.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockMode;

    fn switchers() -> (Arc<TickScheduler>, Switchers) {
        let scheduler = Arc::new(TickScheduler::new(50, ClockMode::Ticks));
        let switchers = Switchers::with_rng(scheduler.clone(), StdRng::seed_from_u64(7));
        (scheduler, switchers)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_name_pool_schedules_nothing() {
        let (scheduler, mut switchers) = switchers();
        let observer = ObserverId::new();
        let pick = switchers.start_random(observer, names(&["a", "a"]), 20);
        assert_eq!(pick.as_deref(), Some("a"));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(switchers.random_pool(observer).unwrap().len(), 1);
    }

    #[test]
    fn test_two_name_pool_rerolls_both() {
        let (scheduler, mut switchers) = switchers();
        let observer = ObserverId::new();
        switchers.start_random(observer, names(&["a", "b"]), 20).unwrap();
        assert_eq!(scheduler.pending_of(TaskKind::RandomSwitch(observer)), 1);

        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..1000 {
            match switchers.reroll(observer).as_deref() {
                Some("a") => seen_a = true,
                Some("b") => seen_b = true,
                other => panic!("unexpected pick {other:?}"),
            }
        }
        assert!(seen_a && seen_b);

        assert!(switchers.stop_random(observer));
        assert_eq!(scheduler.pending_count(), 0);
        assert!(switchers.reroll(observer).is_none());
    }

    #[test]
    fn test_empty_pool() {
        let (scheduler, mut switchers) = switchers();
        assert!(switchers.start_random(ObserverId::new(), Vec::new(), 20).is_none());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_empty_start_keeps_running_switchers() {
        let (scheduler, mut switchers) = switchers();
        let observer = ObserverId::new();
        switchers.start_random(observer, names(&["a", "b"]), 20).unwrap();
        let steps = vec![SequenceStep::new("a", 2), SequenceStep::new("b", 3)];
        switchers.start_sequence(observer, steps, true).unwrap();

        assert!(switchers.start_random(observer, Vec::new(), 20).is_none());
        assert!(switchers.start_sequence(observer, Vec::new(), true).is_none());

        assert_eq!(switchers.random_pool(observer).unwrap().len(), 2);
        assert_eq!(switchers.sequence_index(observer), Some(0));
        assert_eq!(scheduler.pending_of(TaskKind::RandomSwitch(observer)), 1);
        assert_eq!(scheduler.pending_of(TaskKind::SequenceStep(observer)), 1);
    }

    #[test]
    fn test_looping_sequence_wraps() {
        let (scheduler, mut switchers) = switchers();
        let observer = ObserverId::new();
        let steps = vec![SequenceStep::new("a", 2), SequenceStep::new("b", 3)];
        assert_eq!(switchers.start_sequence(observer, steps, true).as_deref(), Some("a"));

        let mut fired = Vec::new();
        for _ in 0..10 {
            for task in scheduler.advance() {
                if scheduler.claim(&task) {
                    fired.push(switchers.advance_sequence(observer).unwrap());
                }
            }
        }
        assert_eq!(fired, ["b", "a", "b", "a"]);
        assert_eq!(switchers.sequence_index(observer), Some(0));
    }

    #[test]
    fn test_finite_sequence_ends() {
        let (scheduler, mut switchers) = switchers();
        let observer = ObserverId::new();
        let steps = vec![SequenceStep::new("a", 1), SequenceStep::new("b", 1)];
        switchers.start_sequence(observer, steps, false);
        assert_eq!(switchers.advance_sequence(observer).as_deref(), Some("b"));
        assert_eq!(switchers.advance_sequence(observer), None);
        assert_eq!(switchers.sequence_index(observer), None);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(switchers.advance_sequence(observer).is_none());
    }

    #[test]
    fn test_cleanup_all_cancels_everything() {
        let (scheduler, mut switchers) = switchers();
        for _ in 0..3 {
            let observer = ObserverId::new();
            switchers.start_random(observer, names(&["a", "b", "c"]), 5);
            switchers.start_sequence(observer, vec![SequenceStep::new("a", 4), SequenceStep::new("b", 4)], true);
        }
        assert_eq!(scheduler.pending_count(), 6);
        switchers.cleanup_all();
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(switchers.active_count(), 0);
    }
}
