//! Admission-controlled task queue
//!
//! At most `max_in_flight` tasks execute concurrently; everything beyond
//! that waits in a FIFO backlog. Backlog entries carry their enqueue time:
//! when a completion frees a slot, entries that have already waited out
//! the whole task deadline are discarded unexecuted, one after another,
//! until a fresh one (or nothing) remains. The master's dispatch timeout
//! has long since resolved those tasks, so no result is sent for them.
//!
//! The queue is plain synchronous state; the runtime drives it from a
//! single loop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use snapfarm_ipc::TaskSpec;

/// A task released for execution, with the deadline budget it has left
#[derive(Debug)]
pub struct RunnableTask {
    pub task: TaskSpec,
    /// Task deadline minus time already spent waiting in the backlog
    pub remaining: Duration,
}

/// Outcome of offering a task to the queue
#[derive(Debug)]
pub enum Admission {
    /// A slot was free; execute now
    Execute(RunnableTask),
    /// All slots busy; the task joined the backlog
    Queued,
}

/// Outcome of completing a task
#[derive(Debug)]
pub struct Completion {
    /// Next backlog task to execute, if any survived the staleness sweep
    pub next: Option<RunnableTask>,
    /// Whether the backlog is now empty; reported to the master
    pub idle: bool,
    /// Ids of backlog tasks discarded unexecuted for staleness
    pub discarded: Vec<u64>,
}

struct QueueItem {
    task: TaskSpec,
    enqueued_at: Instant,
}

/// FIFO task queue with bounded concurrent execution
pub struct TaskQueue {
    max_in_flight: usize,
    deadline: Duration,
    in_flight: Vec<u64>,
    backlog: VecDeque<QueueItem>,
}

impl TaskQueue {
    pub fn new(max_in_flight: usize, deadline: Duration) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            deadline,
            in_flight: Vec::new(),
            backlog: VecDeque::new(),
        }
    }

    /// Offer a task; it either starts immediately or joins the backlog
    pub fn admit(&mut self, task: TaskSpec, now: Instant) -> Admission {
        if self.in_flight.len() >= self.max_in_flight {
            self.backlog.push_back(QueueItem {
                task,
                enqueued_at: now,
            });
            return Admission::Queued;
        }
        self.in_flight.push(task.id);
        Admission::Execute(RunnableTask {
            task,
            remaining: self.deadline,
        })
    }

    /// Record a task's completion and pop the next runnable backlog entry.
    ///
    /// Backlog entries that have waited `deadline` or longer are dropped
    /// without execution.
    pub fn complete(&mut self, task_id: u64, now: Instant) -> Completion {
        if let Some(pos) = self.in_flight.iter().position(|id| *id == task_id) {
            self.in_flight.swap_remove(pos);
        }

        let mut discarded = Vec::new();
        let next = loop {
            match self.backlog.pop_front() {
                Some(item) if now.duration_since(item.enqueued_at) >= self.deadline => {
                    discarded.push(item.task.id);
                }
                Some(item) => {
                    self.in_flight.push(item.task.id);
                    break Some(RunnableTask {
                        remaining: self.deadline - now.duration_since(item.enqueued_at),
                        task: item.task,
                    });
                }
                None => break None,
            }
        };

        Completion {
            next,
            idle: self.backlog.is_empty(),
            discarded,
        }
    }

    /// Number of tasks currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of tasks waiting in the backlog
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}
