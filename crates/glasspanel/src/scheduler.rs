//! Deferred task scheduling.
//!
//! The registry and the panel never sleep or spawn. They hand tasks to a
//! [`Scheduler`] and the driver later asks it which tasks are due. The
//! [`FrameScheduler`] keeps virtual time, so the same implementation serves
//! as the fake clock in tests and as the timer queue behind the CLI.

use std::time::Duration;

/// When a scheduled task should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// On the next animation frame.
    NextFrame,
    /// After the given delay from now.
    After(Duration),
}

/// Handle for a scheduled task, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Schedule-once / cancel-pending primitive.
pub trait Scheduler<T> {
    /// Schedule `task` to run once at `wake`.
    fn schedule_once(&mut self, wake: Wake, task: T) -> TaskId;

    /// Cancel a pending task. Returns `false` if it already ran or was
    /// cancelled.
    fn cancel(&mut self, id: TaskId) -> bool;
}

#[derive(Debug)]
struct Timer<T> {
    id: TaskId,
    deadline: Duration,
    task: T,
}

/// Virtual-clock scheduler with a frame queue and a timer queue.
#[derive(Debug)]
pub struct FrameScheduler<T> {
    now: Duration,
    next_id: u64,
    frame: Vec<(TaskId, T)>,
    timers: Vec<Timer<T>>,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            frame: Vec::new(),
            timers: Vec::new(),
        }
    }
}

impl<T> FrameScheduler<T> {
    /// Create an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward and return timers that became due, ordered by
    /// deadline and then by scheduling order.
    pub fn advance(&mut self, by: Duration) -> Vec<T> {
        self.now += by;
        let now = self.now;

        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|t| t.deadline <= now);
        self.timers = pending;

        due.sort_by_key(|t| (t.deadline, t.id));
        due.into_iter().map(|t| t.task).collect()
    }

    /// Take every task queued for the next frame.
    pub fn take_frame(&mut self) -> Vec<T> {
        self.frame.drain(..).map(|(_, task)| task).collect()
    }

    /// Number of pending frame tasks and timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.frame.len() + self.timers.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl<T> Scheduler<T> for FrameScheduler<T> {
    fn schedule_once(&mut self, wake: Wake, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        match wake {
            Wake::NextFrame => self.frame.push((id, task)),
            Wake::After(delay) => self.timers.push(Timer {
                id,
                deadline: self.now + delay,
                task,
            }),
        }
        id
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(pos) = self.frame.iter().position(|(tid, _)| *tid == id) {
            self.frame.remove(pos);
            return true;
        }
        if let Some(pos) = self.timers.iter().position(|t| t.id == id) {
            self.timers.remove(pos);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_idle() {
        let sched: FrameScheduler<u32> = FrameScheduler::new();
        assert!(sched.is_idle());
        assert_eq!(sched.now(), Duration::ZERO);
    }

    #[test]
    fn test_frame_tasks_run_once() {
        let mut sched = FrameScheduler::new();
        sched.schedule_once(Wake::NextFrame, 1);
        sched.schedule_once(Wake::NextFrame, 2);

        assert_eq!(sched.take_frame(), vec![1, 2]);
        assert!(sched.take_frame().is_empty());
    }

    #[test]
    fn test_timer_fires_at_deadline() {
        let mut sched = FrameScheduler::new();
        sched.schedule_once(Wake::After(Duration::from_millis(100)), "a");

        assert!(sched.advance(Duration::from_millis(99)).is_empty());
        assert_eq!(sched.advance(Duration::from_millis(1)), vec!["a"]);
        assert!(sched.is_idle());
    }

    #[test]
    fn test_timers_ordered_by_deadline_then_schedule_order() {
        let mut sched = FrameScheduler::new();
        sched.schedule_once(Wake::After(Duration::from_millis(50)), "late");
        sched.schedule_once(Wake::After(Duration::from_millis(10)), "early");
        sched.schedule_once(Wake::After(Duration::from_millis(50)), "late2");

        assert_eq!(
            sched.advance(Duration::from_millis(60)),
            vec!["early", "late", "late2"]
        );
    }

    #[test]
    fn test_cancel_timer() {
        let mut sched = FrameScheduler::new();
        let id = sched.schedule_once(Wake::After(Duration::from_millis(10)), 7);

        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        assert!(sched.advance(Duration::from_millis(20)).is_empty());
    }

    #[test]
    fn test_cancel_frame_task() {
        let mut sched = FrameScheduler::new();
        let id = sched.schedule_once(Wake::NextFrame, 7);
        sched.schedule_once(Wake::NextFrame, 8);

        assert!(sched.cancel(id));
        assert_eq!(sched.take_frame(), vec![8]);
    }

    #[test]
    fn test_deadline_relative_to_current_time() {
        let mut sched = FrameScheduler::new();
        sched.advance(Duration::from_millis(500));
        sched.schedule_once(Wake::After(Duration::from_millis(20)), ());

        assert_eq!(sched.pending(), 1);
        assert!(sched.advance(Duration::from_millis(19)).is_empty());
        assert_eq!(sched.advance(Duration::from_millis(1)), vec![()]);
    }
}
