//! Cooperative scheduler over three ordered work queues.
//!
//! Each queue runs strictly FIFO: only its front task is stepped, and the
//! next task starts after the front one reports [`Step::Done`]. Long tasks
//! return [`Step::Yield`] between bounded units of work so a turn stays within
//! its step and wall-clock budget. A task may also return
//! [`Step::WaitFor`] to stall its queue until another queue drains.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use grove_config::SchedulerConfig;
use tracing::trace;

/// The three work queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Chunk generation, village connection.
    Generation,
    /// Render-group merging.
    Consolidation,
    /// Texture preparation and other side work.
    Misc,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [Self::Generation, Self::Consolidation, Self::Misc];

    fn index(self) -> usize {
        match self {
            Self::Generation => 0,
            Self::Consolidation => 1,
            Self::Misc => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Consolidation => "consolidation",
            Self::Misc => "misc",
        }
    }
}

/// Outcome of one [`Task::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// More work remains; step again later.
    Yield,
    /// The task is complete.
    Done,
    /// Step again only once the given queue is empty. Waiting on the task's
    /// own queue is treated as [`Step::Yield`].
    WaitFor(QueueKind),
}

/// A resumable unit of work over a shared context `C`.
pub trait Task<C> {
    fn label(&self) -> &str;
    fn step(&mut self, ctx: &mut C, spawner: &mut Spawner<C>) -> Step;
}

/// Collects tasks created during a step; they are queued after the step returns.
pub struct Spawner<C> {
    spawned: Vec<(QueueKind, Box<dyn Task<C>>)>,
}

impl<C> Spawner<C> {
    fn new() -> Self {
        Self {
            spawned: Vec::new(),
        }
    }

    pub fn push(&mut self, queue: QueueKind, task: impl Task<C> + 'static) {
        self.spawned.push((queue, Box::new(task)));
    }
}

/// Counters for one [`Scheduler::turn`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub steps: u32,
    pub completed: u32,
    /// Queues that spent the turn waiting on another queue.
    pub stalled: u32,
}

pub struct Scheduler<C> {
    queues: [VecDeque<Box<dyn Task<C>>>; 3],
    gates: [Option<QueueKind>; 3],
    steps_per_turn: u32,
    turn_budget: Option<Duration>,
}

impl<C> Scheduler<C> {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            queues: std::array::from_fn(|_| VecDeque::new()),
            gates: [None; 3],
            steps_per_turn: config.steps_per_turn.max(1),
            turn_budget: (config.turn_budget_ms > 0)
                .then(|| Duration::from_millis(config.turn_budget_ms)),
        }
    }

    pub fn push(&mut self, queue: QueueKind, task: impl Task<C> + 'static) {
        self.queues[queue.index()].push_back(Box::new(task));
    }

    /// Tasks waiting or running in `queue`.
    pub fn len(&self, queue: QueueKind) -> usize {
        self.queues[queue.index()].len()
    }

    /// True when every queue is empty.
    pub fn is_idle(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Step each queue's front task until the queue empties, stalls, or its
    /// step or time budget for this turn runs out. Every non-empty queue gets
    /// at least one step per turn.
    pub fn turn(&mut self, ctx: &mut C) -> TurnReport {
        let mut report = TurnReport::default();

        for kind in QueueKind::ALL {
            let idx = kind.index();
            let start = Instant::now();
            let mut steps = 0;
            while steps < self.steps_per_turn
                && (steps == 0 || self.turn_budget.is_none_or(|b| start.elapsed() < b))
            {
                if let Some(gate) = self.gates[idx] {
                    if !self.queues[gate.index()].is_empty() {
                        report.stalled += 1;
                        break;
                    }
                    self.gates[idx] = None;
                }
                let Some(task) = self.queues[idx].front_mut() else {
                    break;
                };

                let mut spawner = Spawner::new();
                let step = task.step(ctx, &mut spawner);
                steps += 1;
                report.steps += 1;
                match step {
                    Step::Yield => {}
                    Step::Done => {
                        if let Some(done) = self.queues[idx].pop_front() {
                            trace!(queue = kind.name(), task = done.label(), "task done");
                        }
                        report.completed += 1;
                    }
                    Step::WaitFor(other) if other != kind => self.gates[idx] = Some(other),
                    Step::WaitFor(_) => {}
                }
                for (queue, task) in spawner.spawned {
                    self.queues[queue.index()].push_back(task);
                }
            }
        }
        report
    }
}
