//! Spawns compiler/linker subprocesses in capped concurrent waves (spec AMBIENT
//! STACK's `ProcessRunner`, §5's wave-based concurrency policy): up to `cap`
//! processes run at once; `run_wave` blocks until every process in the batch has
//! exited before returning, so the caller's next substage only starts once this
//! wave is fully drained.

use std::io::Read;
use std::process::{Command, Stdio};

use sexpc_core::{ProcessInvocation, ProcessOutcome, ProcessRunner as ProcessRunnerTrait};

pub struct CappedProcessRunner {
    cap: usize,
}

impl CappedProcessRunner {
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1) }
    }

    /// Uses the host's reported recommended parallelism, same as the original's
    /// default cap, falling back to 1 if the host can't report one.
    pub fn host_recommended() -> Self {
        let cap = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::new(cap)
    }
}

impl Default for CappedProcessRunner {
    fn default() -> Self {
        Self::host_recommended()
    }
}

impl ProcessRunnerTrait for CappedProcessRunner {
    fn run_wave(&self, invocations: &[ProcessInvocation]) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::with_capacity(invocations.len());
        for batch in invocations.chunks(self.cap) {
            outcomes.extend(run_batch(batch));
        }
        outcomes
    }
}

/// Spawns every invocation in `batch` concurrently, then waits on all of them before
/// returning, so no process from the next batch starts until this one has fully
/// drained.
fn run_batch(batch: &[ProcessInvocation]) -> Vec<ProcessOutcome> {
    let mut children = Vec::with_capacity(batch.len());
    for invocation in batch {
        let spawned = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        children.push((invocation, spawned));
    }

    children
        .into_iter()
        .map(|(invocation, spawned)| match spawned {
            Ok(mut child) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                if let Some(mut out) = child.stdout.take() {
                    let _ = out.read_to_string(&mut stdout);
                }
                if let Some(mut err) = child.stderr.take() {
                    let _ = err.read_to_string(&mut stderr);
                }
                let status = child.wait();
                ProcessOutcome {
                    label: invocation.label.clone(),
                    success: status.map(|s| s.success()).unwrap_or(false),
                    stdout,
                    stderr,
                }
            }
            Err(err) => ProcessOutcome {
                label: invocation.label.clone(),
                success: false,
                stdout: String::new(),
                stderr: format!("failed to spawn '{}': {err}", invocation.program),
            },
        })
        .collect()
}
