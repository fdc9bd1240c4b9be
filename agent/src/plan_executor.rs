//! Bounded execution of a plan, one step at a time.
//!
//! A run moves between three phases:
//!
//! ```text
//!          advance               complete
//! Ready ───────────▶ Executing ───────────▶ Ready
//!   │
//!   └── advance (plan empty) ──▶ Done
//! ```
//!
//! `advance` is refused with [`AgentError::ExecutionOverrun`] once
//! `max_iterations` steps have started and the plan is not yet empty.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::executor::TaskExecutor;
use crate::orchestrator::OrchestratorEvent;
use crate::state::{NoteSet, PlanExecutionState, StepAnswer, StepTask};
use crate::task_definer::TaskDefiner;

/// Where a plan run stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting to start the next step.
    Ready,
    /// A step has a task and awaits execution. `failure` is set when the
    /// task could not be defined; the step is then recorded as failed
    /// without running.
    Executing {
        task: StepTask,
        failure: Option<StepAnswer>,
    },
    /// The plan is exhausted.
    Done,
}

/// One plan being executed.
#[derive(Debug, Clone)]
pub struct PlanRun {
    state: PlanExecutionState,
    phase: Phase,
    iterations: usize,
}

impl PlanRun {
    pub fn new(question: impl Into<String>, plan: Vec<String>) -> Self {
        Self {
            state: PlanExecutionState::new(question, plan),
            phase: Phase::Ready,
            iterations: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &PlanExecutionState {
        &self.state
    }

    /// Steps started so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn into_state(self) -> PlanExecutionState {
        self.state
    }
}

/// Drives a [`PlanRun`] through its phases.
pub struct PlanExecutor {
    definer: Arc<dyn TaskDefiner>,
    executor: Arc<dyn TaskExecutor>,
    max_iterations: usize,
    events: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl PlanExecutor {
    pub fn new(
        definer: Arc<dyn TaskDefiner>,
        executor: Arc<dyn TaskExecutor>,
        max_iterations: usize,
    ) -> Self {
        Self {
            definer,
            executor,
            max_iterations,
            events: None,
        }
    }

    /// Report each completed step on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Execute every step of `plan` in order.
    pub async fn execute(&self, question: &str, plan: Vec<String>) -> Result<PlanExecutionState> {
        let mut run = PlanRun::new(question, plan);
        loop {
            match run.phase {
                Phase::Ready => self.advance(&mut run).await?,
                Phase::Executing { .. } => self.complete(&mut run).await,
                Phase::Done => break,
            }
        }
        info!(steps = run.state.completed(), "Plan executed");
        Ok(run.into_state())
    }

    /// Ready to Executing: take the next step and define its task. Ready to
    /// Done when no steps remain. Does nothing in other phases.
    pub async fn advance(&self, run: &mut PlanRun) -> Result<()> {
        if run.phase != Phase::Ready {
            return Ok(());
        }
        if run.state.remaining.is_empty() {
            run.phase = Phase::Done;
            return Ok(());
        }
        if run.iterations >= self.max_iterations {
            warn!(
                max_iterations = self.max_iterations,
                remaining = run.state.remaining.len(),
                "Plan execution overran its iteration ceiling"
            );
            return Err(AgentError::ExecutionOverrun {
                max_iterations: self.max_iterations,
                remaining: run.state.remaining.len(),
                state: Box::new(run.state.clone()),
            });
        }

        let step = run.state.remaining.remove(0);
        run.iterations += 1;
        info!(index = run.iterations, step = %step, "Starting plan step");

        let memory = run.state.memory();
        let (task, failure) = match self
            .definer
            .define(&run.state.remaining, &step, &memory)
            .await
        {
            Ok(task) => (task, None),
            Err(e) => {
                warn!(index = run.iterations, "Task definition failed: {e}");
                (
                    StepTask::fallback(&step),
                    Some(StepAnswer::failed(format!("task definition failed: {e}"))),
                )
            }
        };

        run.state.current_step = Some(step);
        run.state.current_task = Some(task.clone());
        run.phase = Phase::Executing { task, failure };
        Ok(())
    }

    /// Executing to Ready: run the task and append its outcome to the
    /// state. Does nothing in other phases.
    pub async fn complete(&self, run: &mut PlanRun) {
        let (task, failure) = match std::mem::replace(&mut run.phase, Phase::Ready) {
            Phase::Executing { task, failure } => (task, failure),
            other => {
                run.phase = other;
                return;
            }
        };

        let (notes, answer) = match failure {
            Some(answer) => (NoteSet::default(), answer),
            None => self.executor.execute(&task).await,
        };
        let success = answer.success;
        run.state.record(task, notes, answer);
        run.state.current_step = None;
        run.state.current_task = None;

        let index = run.state.completed();
        info!(index, success, "Completed plan step");
        if let Some(events) = &self.events {
            let _ = events.send(OrchestratorEvent::StepCompleted { index, success });
        }
    }
}
