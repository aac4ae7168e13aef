// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-period tick scheduler.
//!
//! Tasks are plain data ([`TaskKind`]) rather than closures. The owner of a
//! task holds its [`TaskHandle`] and revokes it with [`TickScheduler::cancel`].
//! The host loop calls [`TickScheduler::advance`] once per tick and runs each
//! due task only if [`TickScheduler::claim`] still reports it live, so a task
//! cancelled by an earlier task in the same tick never runs.

use crate::config::ClockMode;
use crate::observer::ObserverId;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::time::Instant;

/// What a scheduled task does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Advance the observer's playback by one tick
    PlaybackTick(ObserverId),
    /// Clear the observer's cue text
    ClearText(ObserverId),
    /// Draw a new preset from the observer's random pool
    RandomSwitch(ObserverId),
    /// Move the observer's sequence to its next entry
    SequenceStep(ObserverId),
}

/// Scheduler-assigned task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Revocable handle to a scheduled task, owned by whoever scheduled it
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    id: TaskId,
}

impl TaskHandle {
    /// Task identifier
    pub fn id(&self) -> TaskId {
        self.id
    }
}

/// A task that became due during [`TickScheduler::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTask {
    /// Task identifier
    pub id: TaskId,
    /// What to run
    pub kind: TaskKind,
}

#[derive(Debug)]
struct Entry {
    kind: TaskKind,
    due_tick: u64,
    period: Option<u64>,
    fired: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    current_tick: u64,
    next_id: u64,
    tasks: IndexMap<TaskId, Entry>,
}

/// Tick clock with delayed and repeating tasks
#[derive(Debug)]
pub struct TickScheduler {
    period_ms: u64,
    clock: ClockMode,
    origin: Instant,
    state: Mutex<SchedulerState>,
}

impl TickScheduler {
    /// Create a scheduler with the given tick period
    pub fn new(period_ms: u64, clock: ClockMode) -> Self {
        Self {
            period_ms: period_ms.max(1),
            clock,
            origin: Instant::now(),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Tick period in milliseconds
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Number of ticks advanced so far
    pub fn current_tick(&self) -> u64 {
        self.state.lock().current_tick
    }

    /// Milliseconds since the scheduler started, per the configured clock
    pub fn now_ms(&self) -> u64 {
        match self.clock {
            ClockMode::Wall => u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX),
            ClockMode::Ticks => self.current_tick() * self.period_ms,
        }
    }

    /// Whole ticks in `ms`. Sub-period remainders are truncated.
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms / self.period_ms
    }

    /// Run `kind` once, `delay_ticks` from now. The earliest a task can run is
    /// the next tick, so a delay of 0 behaves like 1.
    pub fn schedule_once(&self, kind: TaskKind, delay_ticks: u64) -> TaskHandle {
        self.insert(kind, delay_ticks, None)
    }

    /// Run `kind` after `delay_ticks`, then every `period_ticks`
    pub fn schedule_repeating(&self, kind: TaskKind, delay_ticks: u64, period_ticks: u64) -> TaskHandle {
        self.insert(kind, delay_ticks, Some(period_ticks.max(1)))
    }

    fn insert(&self, kind: TaskKind, delay_ticks: u64, period: Option<u64>) -> TaskHandle {
        let mut state = self.state.lock();
        let id = TaskId(state.next_id);
        state.next_id += 1;
        let due_tick = state.current_tick + delay_ticks.max(1);
        state.tasks.insert(
            id,
            Entry {
                kind,
                due_tick,
                period,
                fired: false,
            },
        );
        TaskHandle { id }
    }

    /// Revoke a task. Cancelling a finished task is harmless.
    pub fn cancel(&self, handle: TaskHandle) {
        self.state.lock().tasks.shift_remove(&handle.id);
    }

    /// Task is still scheduled
    pub fn is_scheduled(&self, handle: &TaskHandle) -> bool {
        self.state.lock().tasks.contains_key(&handle.id)
    }

    /// Number of live tasks
    pub fn pending_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Number of live tasks of a given kind
    pub fn pending_of(&self, kind: TaskKind) -> usize {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|e| e.kind == kind && !e.fired)
            .count()
    }

    /// Move to the next tick and return the tasks due on it, in scheduling order
    pub fn advance(&self) -> Vec<DueTask> {
        let mut state = self.state.lock();
        state.current_tick += 1;
        let tick = state.current_tick;

        let mut due = Vec::new();
        for (&id, entry) in state.tasks.iter_mut() {
            if entry.fired || entry.due_tick > tick {
                continue;
            }
            match entry.period {
                Some(period) => entry.due_tick = tick + period,
                None => entry.fired = true,
            }
            due.push(DueTask {
                id,
                kind: entry.kind,
            });
        }
        due
    }

    /// Move the clock forward `ticks` without running anything, as when the
    /// host loop falls behind. Tasks that came due meanwhile run once on the
    /// next [`advance`](Self::advance).
    pub fn skip_ticks(&self, ticks: u64) {
        let mut state = self.state.lock();
        state.current_tick = state.current_tick.saturating_add(ticks);
    }

    /// Confirm a due task may run. Returns `false` if it was cancelled after
    /// becoming due. One-shot tasks are retired here.
    pub fn claim(&self, task: &DueTask) -> bool {
        let mut state = self.state.lock();
        match state.tasks.get(&task.id) {
            Some(entry) if entry.fired => {
                state.tasks.shift_remove(&task.id);
                true
            }
            Some(_) => true,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> TickScheduler {
        TickScheduler::new(50, ClockMode::Ticks)
    }

    fn run(scheduler: &TickScheduler) -> Vec<TaskKind> {
        scheduler
            .advance()
            .into_iter()
            .filter(|t| scheduler.claim(t))
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_once_fires_after_delay() {
        let scheduler = scheduler();
        let observer = ObserverId::new();
        let handle = scheduler.schedule_once(TaskKind::ClearText(observer), 3);
        assert!(run(&scheduler).is_empty());
        assert!(run(&scheduler).is_empty());
        assert_eq!(run(&scheduler), [TaskKind::ClearText(observer)]);
        assert!(!scheduler.is_scheduled(&handle));
        assert!(run(&scheduler).is_empty());
    }

    #[test]
    fn test_repeating_until_cancelled() {
        let scheduler = scheduler();
        let observer = ObserverId::new();
        let handle = scheduler.schedule_repeating(TaskKind::PlaybackTick(observer), 0, 2);
        assert_eq!(run(&scheduler).len(), 1);
        assert!(run(&scheduler).is_empty());
        assert_eq!(run(&scheduler).len(), 1);
        scheduler.cancel(handle);
        for _ in 0..5 {
            assert!(run(&scheduler).is_empty());
        }
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_cancelled_after_due_is_not_claimed() {
        let scheduler = scheduler();
        let a = scheduler.schedule_once(TaskKind::ClearText(ObserverId::new()), 1);
        let due = scheduler.advance();
        assert_eq!(due.len(), 1);
        scheduler.cancel(a);
        assert!(!scheduler.claim(&due[0]));
    }

    #[test]
    fn test_skipped_ticks_fire_overdue_once() {
        let scheduler = scheduler();
        let observer = ObserverId::new();
        scheduler.schedule_repeating(TaskKind::PlaybackTick(observer), 0, 1);
        scheduler.schedule_once(TaskKind::ClearText(observer), 2);
        assert_eq!(run(&scheduler), [TaskKind::PlaybackTick(observer)]);

        scheduler.skip_ticks(4);
        assert_eq!(scheduler.current_tick(), 5);
        assert_eq!(
            run(&scheduler),
            [TaskKind::PlaybackTick(observer), TaskKind::ClearText(observer)]
        );
        assert_eq!(run(&scheduler), [TaskKind::PlaybackTick(observer)]);
        assert_eq!(scheduler.now_ms(), 350);
    }

    #[test]
    fn test_tick_clock() {
        let scheduler = scheduler();
        assert_eq!(scheduler.now_ms(), 0);
        scheduler.advance();
        scheduler.advance();
        assert_eq!(scheduler.now_ms(), 100);
        assert_eq!(scheduler.ms_to_ticks(149), 2);
    }
}
