//! Operation registry and batch runner
//!
//! Operations are registered once, by name, into an ordered table. A run
//! executes either the whole table in registration order or a caller-chosen
//! list of names in the caller's order. There is no dependency graph: the
//! operator decides the sequence.

use std::fmt;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{OperationError, RegistryError};

/// How an operation relates to chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Creates a contract; not idempotent.
    Deploy,
    /// Converges an on-chain setting; idempotent.
    Bind,
    /// Sends a transaction without a read-back.
    Submit,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Deploy => "deploy",
            OperationKind::Bind => "bind",
            OperationKind::Submit => "submit",
        };
        f.write_str(s)
    }
}

type OperationFn<C> = Box<
    dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), OperationError>> + Send + Sync,
>;

pub struct Operation<C> {
    pub name: &'static str,
    pub kind: OperationKind,
    run: OperationFn<C>,
}

impl<C> fmt::Debug for Operation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Ordered table of named operations over a context `C`.
pub struct Registry<C> {
    operations: Vec<Operation<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        name: &'static str,
        kind: OperationKind,
        run: F,
    ) -> Result<(), RegistryError>
    where
        F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), OperationError>>
            + Send
            + Sync
            + 'static,
    {
        if self.get(name).is_some() {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.operations.push(Operation {
            name,
            kind,
            run: Box::new(run),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Operation<C>> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Operations in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation<C>> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Result of one requested operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { duration: Duration },
    Failed { error: String, duration: Duration },
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<(String, Outcome)>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.len() - self.succeeded() - self.failed()
    }

    /// True when every requested operation ran and succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, o)| o.is_success())
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    pub fn log_summary(&self) {
        for (name, outcome) in &self.results {
            match outcome {
                Outcome::Succeeded { duration } => {
                    info!(operation = %name, elapsed_ms = duration.as_millis() as u64, "PASS")
                }
                Outcome::Failed { error, duration } => {
                    error!(operation = %name, elapsed_ms = duration.as_millis() as u64, error = %error, "FAIL")
                }
                Outcome::Skipped { reason } => {
                    warn!(operation = %name, reason = %reason, "SKIP")
                }
            }
        }
        info!(
            total = self.results.len(),
            succeeded = self.succeeded(),
            failed = self.failed(),
            skipped = self.skipped(),
            "Run finished"
        );
    }
}

/// Execute `names` (all operations when empty) against `ctx`, one at a time.
///
/// A failed operation is recorded and the batch continues, except when the
/// failure left local state unsaved or the run was cancelled; then every
/// remaining operation is reported as skipped.
pub async fn run<C: Send>(
    registry: &Registry<C>,
    ctx: &mut C,
    names: &[String],
    cancel: &CancellationToken,
) -> RunReport {
    let requested: Vec<String> = if names.is_empty() {
        registry.operations().map(|op| op.name.to_string()).collect()
    } else {
        names.to_vec()
    };

    let mut report = RunReport::default();
    let mut halted: Option<String> = None;

    for name in requested {
        if halted.is_none() && cancel.is_cancelled() {
            halted = Some("run cancelled".to_string());
        }
        if let Some(reason) = &halted {
            report.results.push((
                name,
                Outcome::Skipped {
                    reason: reason.clone(),
                },
            ));
            continue;
        }

        let Some(op) = registry.get(&name) else {
            error!(operation = %name, "Unknown operation");
            report.results.push((
                name,
                Outcome::Failed {
                    error: "unknown operation".to_string(),
                    duration: Duration::ZERO,
                },
            ));
            continue;
        };

        info!(operation = %name, kind = %op.kind, "Running operation");
        let started = Instant::now();
        let result = (op.run)(ctx).await;
        let duration = started.elapsed();

        match result {
            Ok(()) => {
                info!(operation = %name, elapsed_ms = duration.as_millis() as u64, "Operation succeeded");
                report.results.push((name, Outcome::Succeeded { duration }));
            }
            Err(e) => {
                error!(operation = %name, error = %e, "Operation failed");
                if e.halts_batch() {
                    halted = Some(format!("halted after `{name}` failed"));
                }
                report.results.push((
                    name,
                    Outcome::Failed {
                        error: e.to_string(),
                        duration,
                    },
                ));
            }
        }
    }

    report
}
