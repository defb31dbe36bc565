//! Job supervision: admission, launch, timeout, and cancellation.
//!
//! `LoadPanel` is the owned service object holding the sandbox record and the
//! job registry; it is constructed once per process and shared behind an
//! `Arc` by the HTTP layer. Each accepted job runs as its own tokio task that
//! waits on the worker exec and deregisters the target when the wait ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, oneshot};
use tokio::task::AbortHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{PanelError, Result};
use crate::registry::{JobHandle, JobRegistry};
use crate::sandbox::{self, ExecStream, SandboxRecord};
use crate::targets;
use crate::util::now_ts;
use crate::{DEFAULT_CONCURRENCY, DEFAULT_REQUESTS, WORKER_BIN};

/// Parameters of one start request, after defaults have been applied.
#[derive(Clone, Debug)]
pub struct StartParams {
    pub targets: Vec<String>,
    pub requests: u64,
    pub concurrency: u64,
    /// Wall-clock bound on each job's wait, in seconds; 0 means unbounded.
    pub duration_secs: u64,
}

impl Default for StartParams {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            duration_secs: 0,
        }
    }
}

/// Read-only snapshot for status reporting.
#[derive(Clone, Debug)]
pub struct PanelStatus {
    pub sandbox_id: Option<String>,
    pub busy_targets: Vec<String>,
}

/// The coordinating service: one sandbox, one registry.
#[derive(Debug, Default)]
pub struct LoadPanel {
    sandbox: RwLock<Option<SandboxRecord>>,
    registry: Arc<JobRegistry>,
}

impl LoadPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision the sandbox and record its identity. A second call while a
    /// sandbox is already recorded replaces the record and orphans the old
    /// container; callers are expected to provision once.
    pub async fn provision(&self) -> Result<SandboxRecord> {
        let record = sandbox::provision().await?;
        info!(sandbox_id = %record.id, image = %record.image, "sandbox provisioned");

        let mut guard = self.sandbox.write().await;
        if let Some(old) = guard.replace(record.clone()) {
            warn!(
                old_id = %old.id,
                new_id = %record.id,
                "sandbox was already provisioned; previous container is orphaned"
            );
        }
        Ok(record)
    }

    pub async fn sandbox_id(&self) -> Option<String> {
        self.sandbox.read().await.as_ref().map(|r| r.id.clone())
    }

    async fn require_sandbox(&self) -> Result<SandboxRecord> {
        self.sandbox
            .read()
            .await
            .clone()
            .ok_or_else(|| PanelError::Environment("sandbox is not provisioned yet".into()))
    }

    /// Launch one load worker per eligible target.
    ///
    /// Unknown names and targets that already have a live job are skipped
    /// silently. Returns the targets a launch was actually attempted for;
    /// completion is not reported back (fire and forget).
    pub async fn start_load(&self, params: StartParams) -> Result<Vec<String>> {
        let sandbox = self.require_sandbox().await?;

        if params.targets.is_empty() {
            return Err(PanelError::Validation("targets must be a non-empty list".into()));
        }
        if params.requests == 0 {
            return Err(PanelError::Validation("requests must be at least 1".into()));
        }
        if params.concurrency == 0 {
            return Err(PanelError::Validation("concurrency must be at least 1".into()));
        }

        let mut started = Vec::new();
        for name in &params.targets {
            let Some(port) = targets::port_for(name) else {
                debug!(target = %name, "skipping unknown target");
                continue;
            };
            if !self.registry.try_reserve(name) {
                info!(target = %name, "target already busy, skipping");
                continue;
            }

            let spec = JobSpec {
                target: name.clone(),
                url: targets::target_url(name, port),
                requests: params.requests,
                concurrency: params.concurrency,
                deadline_secs: params.duration_secs,
            };
            // The task attaches its own handle once the worker exec is up,
            // so a reserved slot is never overwritten from the request path.
            let (abort_tx, abort_rx) = oneshot::channel();
            let handle = tokio::spawn(run_job(
                self.registry.clone(),
                sandbox.id.clone(),
                spec,
                abort_rx,
            ));
            let _ = abort_tx.send(handle.abort_handle());
            started.push(name.clone());
        }

        info!(started = ?started, "load jobs launched");
        Ok(started)
    }

    /// Best-effort cancellation for the requested targets.
    ///
    /// The kill is sandbox-wide: `pkill -f ab` matches every running load
    /// worker regardless of which target it drives, mirroring how the panel
    /// has always behaved. Returns the names that were both requested and
    /// registered; an empty result means there was nothing to stop, which is
    /// a distinct outcome rather than an error.
    pub async fn stop_load(&self, targets: &[String]) -> Result<Vec<String>> {
        let sandbox = self.require_sandbox().await?;

        if targets.is_empty() {
            return Err(PanelError::Validation("targets must be a non-empty list".into()));
        }

        let mut stopped = Vec::new();
        for name in targets {
            if let Err(err) = sandbox::kill_matching(&sandbox.id, WORKER_BIN).await {
                warn!(target = %name, "failed to signal workers: {err}");
            }
            if self.registry.remove(name) {
                info!(target = %name, "load job stopped");
                stopped.push(name.clone());
            }
        }
        Ok(stopped)
    }

    /// Sandbox identity plus the busy targets. Pure read.
    pub async fn status(&self) -> PanelStatus {
        PanelStatus {
            sandbox_id: self.sandbox_id().await,
            busy_targets: self.registry.snapshot(),
        }
    }

    /// Record a sandbox without touching Docker. Test hook only.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn inject_sandbox(&self, record: SandboxRecord) {
        *self.sandbox.write().await = Some(record);
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

/// Everything one job needs to drive its target.
#[derive(Debug)]
struct JobSpec {
    target: String,
    url: String,
    requests: u64,
    concurrency: u64,
    deadline_secs: u64,
}

/// One job's lifetime: start the worker exec, attach the handle to the
/// reserved slot, wait for the worker (bounded by the deadline when one is
/// set), then deregister the target. Attaching happens here rather than in
/// the request path so only the slot's owning task ever touches it; removal
/// happens exactly once per job, and an explicit stop may race us, which the
/// idempotent `remove` absorbs.
async fn run_job(
    registry: Arc<JobRegistry>,
    container_id: String,
    spec: JobSpec,
    abort: oneshot::Receiver<AbortHandle>,
) {
    let JobSpec {
        target,
        url,
        requests,
        concurrency,
        deadline_secs,
    } = spec;

    match sandbox::start_worker(&container_id, worker_command(requests, concurrency, &url)).await {
        Ok((exec_id, stream)) => {
            debug!(target = %target, exec_id = %exec_id, "load worker started");
            if let Ok(abort) = abort.await {
                registry.attach(
                    &target,
                    JobHandle {
                        exec_id,
                        abort,
                        requests,
                        concurrency,
                        deadline_secs,
                        started_at: now_ts(),
                    },
                );
            }
            wait_for_worker(&container_id, &target, &url, stream, deadline_secs).await;
        }
        Err(err) => {
            error!(target = %target, "failed to start load worker: {err}");
        }
    }

    registry.remove(&target);
    info!(target = %target, "load job finished");
}

async fn wait_for_worker(
    container_id: &str,
    target: &str,
    url: &str,
    mut stream: ExecStream,
    deadline_secs: u64,
) {
    let drain = async {
        while stream.next().await.is_some() {}
    };

    if deadline_secs == 0 {
        drain.await;
        return;
    }

    if tokio::time::timeout(Duration::from_secs(deadline_secs), drain)
        .await
        .is_err()
    {
        warn!(target = %target, deadline_secs, "deadline exceeded, killing worker");
        // scoped to this target: the worker's command line contains the URL
        if let Err(err) = sandbox::kill_matching(container_id, url).await {
            warn!(target = %target, "failed to kill timed-out worker: {err}");
        }
    }
}

fn worker_command(requests: u64, concurrency: u64, url: &str) -> Vec<String> {
    vec![
        WORKER_BIN.to_string(),
        "-n".to_string(),
        requests.to_string(),
        "-c".to_string(),
        concurrency.to_string(),
        url.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sandbox() -> SandboxRecord {
        SandboxRecord {
            id: "deadbeef".into(),
            name: "loadpanel-sandbox-test".into(),
            image: "debian:bookworm-slim".into(),
            network: "loadpanel_net".into(),
            created_at: now_ts(),
        }
    }

    fn start_params(targets: &[&str]) -> StartParams {
        StartParams {
            targets: targets.iter().map(|s| s.to_string()).collect(),
            ..StartParams::default()
        }
    }

    #[tokio::test]
    async fn start_requires_sandbox() {
        let panel = LoadPanel::new();
        let err = panel.start_load(start_params(&["node1"])).await.unwrap_err();
        assert!(matches!(err, PanelError::Environment(_)));
    }

    #[tokio::test]
    async fn stop_requires_sandbox() {
        let panel = LoadPanel::new();
        let err = panel.stop_load(&["node1".to_string()]).await.unwrap_err();
        assert!(matches!(err, PanelError::Environment(_)));
    }

    #[tokio::test]
    async fn start_rejects_empty_targets() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;
        let err = panel.start_load(start_params(&[])).await.unwrap_err();
        assert!(matches!(err, PanelError::Validation(_)));
    }

    #[tokio::test]
    async fn start_rejects_zero_volume() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;
        let params = StartParams {
            requests: 0,
            ..start_params(&["node1"])
        };
        let err = panel.start_load(params).await.unwrap_err();
        assert!(matches!(err, PanelError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_targets_are_skipped() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;
        let started = panel
            .start_load(start_params(&["nodeX", "does-not-exist"]))
            .await
            .unwrap();
        assert!(started.is_empty());
    }

    #[tokio::test]
    async fn busy_target_is_skipped() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;
        assert!(panel.registry().try_reserve("node2"));

        let started = panel.start_load(start_params(&["node2"])).await.unwrap();
        assert!(started.is_empty());
    }

    #[tokio::test]
    async fn failed_launch_cannot_clobber_a_fresh_reservation() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;

        // No Docker daemon here: the job task fails to start its worker and
        // deregisters the target on its way out.
        let started = panel.start_load(start_params(&["node1"])).await.unwrap();
        assert_eq!(started, vec!["node1".to_string()]);
        for _ in 0..200 {
            if panel.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(panel.registry().is_empty());

        // A rival claim of the freed target must keep its reserved slot: the
        // dead job has no attach left to run against it.
        assert!(panel.registry().try_reserve("node1"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(panel.registry().exec_id_of("node1"), None);
        assert_eq!(panel.registry().snapshot(), vec!["node1".to_string()]);
    }

    #[tokio::test]
    async fn stop_with_no_active_jobs_is_not_an_error() {
        let panel = LoadPanel::new();
        panel.inject_sandbox(test_sandbox()).await;
        let stopped = panel.stop_load(&["node1".to_string()]).await.unwrap();
        assert!(stopped.is_empty());
    }

    #[tokio::test]
    async fn status_reports_sandbox_and_busy_targets() {
        let panel = LoadPanel::new();

        let status = panel.status().await;
        assert_eq!(status.sandbox_id, None);
        assert!(status.busy_targets.is_empty());

        panel.inject_sandbox(test_sandbox()).await;
        assert!(panel.registry().try_reserve("node1"));

        let status = panel.status().await;
        assert_eq!(status.sandbox_id.as_deref(), Some("deadbeef"));
        assert_eq!(status.busy_targets, vec!["node1".to_string()]);
    }

    #[test]
    fn worker_command_shape() {
        let cmd = worker_command(1000, 10, "http://node1:5001/");
        assert_eq!(cmd, vec!["ab", "-n", "1000", "-c", "10", "http://node1:5001/"]);
    }
}
