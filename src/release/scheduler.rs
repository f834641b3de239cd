//! Task scheduling for the publishing stage
//!
//! Inline tasks run on the calling thread and fail fast. Background tasks get
//! one named worker thread each; every worker reports a [`TaskOutcome`]
//! through a channel, and [`TaskScheduler::join`] only returns once every
//! scheduled task has been accounted for. A worker that panics is reported
//! as a panic, and one that never reports is reported as lost, so no
//! failure is ever mistaken for success. Outcomes are matched to workers by
//! schedule position, so tasks may share a name.

use crate::core::context::Concurrency;
use crate::core::error::{ReleaseError, ReleaseResult, TaskFailure, TaskFailureKind};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

type Work = Box<dyn FnOnce() -> ReleaseResult<()> + Send + 'static>;

/// A named unit of work; arguments are captured by the closure
pub struct Task {
  name: String,
  work: Work,
  mode: Concurrency,
}

impl Task {
  pub fn new<F>(name: impl Into<String>, mode: Concurrency, work: F) -> Self
  where
    F: FnOnce() -> ReleaseResult<()> + Send + 'static,
  {
    Self {
      name: name.into(),
      work: Box::new(work),
      mode,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

/// What a worker reports back to the scheduler
#[derive(Debug)]
pub struct TaskOutcome {
  /// Position of the worker in schedule order
  pub slot: usize,
  pub task: String,
  pub result: Result<(), TaskFailureKind>,
}

/// Tasks observed at the join barrier
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinSummary {
  pub completed: Vec<String>,
}

pub struct TaskScheduler {
  sender: Sender<TaskOutcome>,
  receiver: Receiver<TaskOutcome>,
  workers: Vec<(String, Option<JoinHandle<()>>)>,
  completed_inline: Vec<String>,
  #[cfg(test)]
  fail_spawn: Option<usize>,
}

impl TaskScheduler {
  pub fn new() -> Self {
    let (sender, receiver) = channel();
    Self {
      sender,
      receiver,
      workers: Vec::new(),
      completed_inline: Vec::new(),
      #[cfg(test)]
      fail_spawn: None,
    }
  }

  /// Run or launch `task` according to its concurrency mode.
  ///
  /// Inline failures are returned immediately. Background failures,
  /// including a worker thread that could not be started, surface at
  /// [`TaskScheduler::join`].
  pub fn schedule(&mut self, task: Task) -> ReleaseResult<()> {
    let Task { name, work, mode } = task;
    match mode {
      Concurrency::Inline => {
        info!(task = %name, "running inline");
        run_guarded(work).map_err(|kind| {
          ReleaseError::Publish(vec![TaskFailure {
            task: name.clone(),
            kind,
          }])
        })?;
        self.completed_inline.push(name);
        Ok(())
      }
      Concurrency::Background => {
        info!(task = %name, "starting background worker");
        let slot = self.workers.len();
        let sender = self.sender.clone();
        let task_name = name.clone();
        let spawned = self.spawn(slot, format!("publish-{}", name), move || {
          let result = run_guarded(work);
          // The receiver lives until join has collected every outcome
          let _ = sender.send(TaskOutcome {
            slot,
            task: task_name,
            result,
          });
        });

        match spawned {
          Ok(handle) => self.workers.push((name, Some(handle))),
          Err(e) => {
            // Reported at join alongside the outcomes of running siblings
            error!(task = %name, error = %e, "failed to start worker");
            let _ = self.sender.send(TaskOutcome {
              slot,
              task: name.clone(),
              result: Err(TaskFailureKind::Failed(format!("could not start worker: {}", e))),
            });
            self.workers.push((name, None));
          }
        }
        Ok(())
      }
    }
  }

  fn spawn<F>(&self, slot: usize, thread_name: String, f: F) -> std::io::Result<JoinHandle<()>>
  where
    F: FnOnce() + Send + 'static,
  {
    if self.spawn_blocked(slot) {
      return Err(std::io::Error::other("thread limit reached"));
    }
    thread::Builder::new().name(thread_name).spawn(f)
  }

  #[cfg(not(test))]
  fn spawn_blocked(&self, _slot: usize) -> bool {
    false
  }

  #[cfg(test)]
  fn spawn_blocked(&self, slot: usize) -> bool {
    self.fail_spawn == Some(slot)
  }

  /// Wait for every background task and aggregate failures.
  pub fn join(self) -> ReleaseResult<JoinSummary> {
    let TaskScheduler {
      sender,
      receiver,
      workers,
      completed_inline,
      ..
    } = self;
    // Only workers hold senders from here on, so the channel closes once
    // every worker has finished.
    drop(sender);

    let expected: Vec<String> = workers.iter().map(|(name, _)| name.clone()).collect();
    let outcomes = collect_outcomes(&expected, &receiver);

    for (name, handle) in workers {
      if let Some(handle) = handle
        && handle.join().is_err()
      {
        error!(task = %name, "worker thread terminated abnormally");
      }
    }

    let mut summary = JoinSummary {
      completed: completed_inline,
    };
    let mut failures = Vec::new();
    for outcome in outcomes {
      match outcome.result {
        Ok(()) => {
          debug!(task = %outcome.task, "task completed");
          summary.completed.push(outcome.task);
        }
        Err(kind) => {
          error!(task = %outcome.task, "task failed");
          failures.push(TaskFailure {
            task: outcome.task,
            kind,
          });
        }
      }
    }

    if failures.is_empty() {
      Ok(summary)
    } else {
      Err(ReleaseError::Publish(failures))
    }
  }

  /// Join the workers already started after `err` stopped scheduling.
  ///
  /// Task failures in `err` come first, followed by those found at the join.
  pub fn join_after(self, err: ReleaseError) -> ReleaseError {
    let late = match self.join() {
      Err(ReleaseError::Publish(failures)) => failures,
      _ => Vec::new(),
    };
    match err {
      ReleaseError::Publish(mut failures) => {
        failures.extend(late);
        ReleaseError::Publish(failures)
      }
      other => {
        for failure in &late {
          error!(task = %failure.task, "background task failed after scheduling stopped");
        }
        other
      }
    }
  }
}

impl Default for TaskScheduler {
  fn default() -> Self {
    Self::new()
  }
}

/// Receive outcomes until each expected slot reported or every sender is gone.
///
/// Slots with no outcome are reported as [`TaskFailureKind::OutcomeLost`].
/// The result is in `expected` order.
fn collect_outcomes(expected: &[String], receiver: &Receiver<TaskOutcome>) -> Vec<TaskOutcome> {
  let mut received: Vec<Option<TaskOutcome>> = expected.iter().map(|_| None).collect();
  let mut pending = expected.len();

  while pending > 0 {
    match receiver.recv() {
      Ok(outcome) => match received.get_mut(outcome.slot) {
        Some(entry @ None) => {
          *entry = Some(outcome);
          pending -= 1;
        }
        _ => error!(task = %outcome.task, slot = outcome.slot, "unexpected task outcome"),
      },
      Err(_) => break,
    }
  }

  expected
    .iter()
    .zip(received)
    .enumerate()
    .map(|(slot, (name, outcome))| {
      outcome.unwrap_or_else(|| TaskOutcome {
        slot,
        task: name.clone(),
        result: Err(TaskFailureKind::OutcomeLost),
      })
    })
    .collect()
}

fn run_guarded(work: Work) -> Result<(), TaskFailureKind> {
  match catch_unwind(AssertUnwindSafe(work)) {
    Ok(Ok(())) => Ok(()),
    Ok(Err(e)) => Err(TaskFailureKind::Failed(e.to_string())),
    Err(payload) => Err(TaskFailureKind::Panicked(panic_message(payload.as_ref()))),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
