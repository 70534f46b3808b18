//! Deferred tasks of the round lifecycle.
//!
//! Tasks are scheduled relative to a virtual clock that the host advances explicitly. Every task
//! gets a handle that can be cancelled; cancelled tasks never fire.

use std::time::Duration;

/// Handle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Work the lifecycle controller defers to a later point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    /// Hand over from a finished round to the next one
    CompleteTransition,
    /// Start racing the round with the captured index, if it is still the current one
    ResumeRacing { round_index: usize },
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    handle: TaskHandle,
    due: Duration,
    event: ScheduledEvent,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    next_handle: u64,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler::default()
    }

    /// Current time of the virtual clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, event: ScheduledEvent) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.push(ScheduledTask {
            handle,
            due: self.now + delay,
            event,
        });
        handle
    }

    /// cancel removes the task, returns false if it already fired or was cancelled before.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let no_tasks = self.tasks.len();
        self.tasks.retain(|task| task.handle != handle);
        self.tasks.len() < no_tasks
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.tasks.iter().any(|task| task.handle == handle)
    }

    pub fn get_no_pending(&self) -> usize {
        self.tasks.len()
    }

    /// pop_due removes and returns the earliest task that is due at `until`. The clock is moved
    /// forward to the due time of the returned task. Tasks due at the same time fire in the order
    /// they were scheduled.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TaskHandle, ScheduledEvent)> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= until)
            .min_by_key(|(_, task)| (task.due, task.handle.0))
            .map(|(idx, _)| idx)?;

        let task = self.tasks.remove(idx);
        if task.due > self.now {
            self.now = task.due;
        }
        Some((task.handle, task.event))
    }

    /// advance_to moves the clock forward without firing anything.
    pub fn advance_to(&mut self, time: Duration) {
        if time > self.now {
            self.now = time;
        }
    }
}
