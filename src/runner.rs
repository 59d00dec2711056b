//! Probe runner.
//!
//! Probes every configured endpoint once and forwards results to a
//! [`MetricSink`]. Invalid endpoints are reported and skipped; they never
//! prevent the remaining endpoints from being probed.

use std::collections::HashMap;
use std::time::Instant;

use tokio::task::{self, JoinSet};

use crate::probe::{EndpointError, EndpointSpec, ProbeResult, gather};
use crate::sink::MetricSink;

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Endpoints that produced a result.
    pub probed: usize,
    /// Endpoints rejected by validation.
    pub invalid: usize,
    /// Results the sink failed to accept.
    pub sink_failures: usize,
    /// Probe tasks that panicked or were cancelled before producing anything.
    pub failed_tasks: usize,
}

impl RunSummary {
    /// Endpoints accounted for; equals the number configured.
    pub fn total(&self) -> usize {
        self.probed + self.invalid + self.failed_tasks
    }
}

type Gathered = Vec<(String, Result<ProbeResult, EndpointError>)>;

/// Runs one probe per endpoint.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    endpoints: Vec<EndpointSpec>,
    concurrent: bool,
}

impl ProbeRunner {
    /// Create a runner; probes run concurrently by default.
    pub fn new(endpoints: Vec<EndpointSpec>) -> Self {
        Self {
            endpoints,
            concurrent: true,
        }
    }

    /// Choose between one task per endpoint and strictly sequential probing.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Configured endpoints.
    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.endpoints
    }

    /// Probe every endpoint once and emit each result to `sink`.
    pub async fn run(&self, sink: &dyn MetricSink) -> RunSummary {
        let start = Instant::now();
        tracing::debug!(
            endpoints = self.endpoints.len(),
            concurrent = self.concurrent,
            "Starting probe run"
        );

        let (outcomes, failed_tasks) = if self.concurrent {
            self.gather_concurrent().await
        } else {
            (self.gather_sequential().await, 0)
        };

        let mut summary = RunSummary {
            failed_tasks,
            ..RunSummary::default()
        };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    summary.probed += 1;
                    if let Err(e) = sink.emit(&result).await {
                        tracing::error!(name = %name, error = %e, "Failed to emit probe result");
                        summary.sink_failures += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(name = %name, error = %e, "Skipping invalid endpoint");
                    summary.invalid += 1;
                }
            }
        }

        tracing::info!(
            probed = summary.probed,
            invalid = summary.invalid,
            sink_failures = summary.sink_failures,
            failed_tasks = summary.failed_tasks,
            duration_ms = start.elapsed().as_millis(),
            "Probe run complete"
        );
        summary
    }

    async fn gather_sequential(&self) -> Gathered {
        let mut outcomes = Vec::with_capacity(self.endpoints.len());
        for spec in &self.endpoints {
            outcomes.push((spec.name.clone(), gather(spec).await));
        }
        outcomes
    }

    async fn gather_concurrent(&self) -> (Gathered, usize) {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for (index, spec) in self.endpoints.iter().cloned().enumerate() {
            let name = spec.name.clone();
            let handle = tasks.spawn(async move {
                let outcome = gather(&spec).await;
                (index, spec.name, outcome)
            });
            names.insert(handle.id(), name);
        }
        join_in_order(tasks, &names).await
    }
}

/// Drain `tasks` and return their outputs sorted by index, plus the number
/// of tasks that did not complete.
async fn join_in_order<T: 'static>(
    mut tasks: JoinSet<(usize, String, T)>,
    names: &HashMap<task::Id, String>,
) -> (Vec<(String, T)>, usize) {
    let mut outcomes = Vec::with_capacity(tasks.len());
    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => outcomes.push(entry),
            Err(e) => {
                let name = names.get(&e.id()).map(String::as_str).unwrap_or("unknown");
                tracing::error!(name = %name, error = %e, "Probe task failed");
                failed += 1;
            }
        }
    }

    // Emit in configuration order regardless of completion order.
    outcomes.sort_by_key(|(index, _, _)| *index);
    let outcomes = outcomes
        .into_iter()
        .map(|(_, name, outcome)| (name, outcome))
        .collect();
    (outcomes, failed)
}
