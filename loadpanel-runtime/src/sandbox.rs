//! Sandbox provisioning and in-sandbox process control.
//!
//! The panel provisions exactly one reusable Docker container and runs every
//! load worker inside it as a Docker exec. Teardown of the container itself
//! is manual (`auto_remove` reclaims it once the daemon stops it).

use std::pin::Pin;

use docktopus::DockerBuilder;
use docktopus::bollard::container::{Config as BollardConfig, LogOutput};
use docktopus::bollard::exec::{CreateExecOptions, StartExecResults};
use docktopus::bollard::models::HostConfig;
use docktopus::container::Container;
use tokio::sync::OnceCell as AsyncOnceCell;
use tokio_stream::{Stream, StreamExt};

use crate::config::RuntimeConfig;
use crate::error::{PanelError, Result};
use crate::util::{now_ts, tail};

/// Commands run inside a fresh sandbox before it is ready for load jobs.
/// `apache2-utils` ships `ab`, `procps` ships `pkill`.
const PREREQUISITE_STEPS: &[&[&str]] = &[
    &["apt-get", "update"],
    &["apt-get", "install", "-y", "apache2-utils", "procps"],
];

/// How much trailing diagnostic output a provisioning error carries.
const DIAGNOSTIC_TAIL_CHARS: usize = 2048;

static DOCKER_BUILDER: AsyncOnceCell<DockerBuilder> = AsyncOnceCell::const_new();
static IMAGE_PULLED: AsyncOnceCell<()> = AsyncOnceCell::const_new();

/// The single provisioned sandbox. Recorded by the supervisor once
/// provisioning succeeds; never destroyed by this subsystem.
#[derive(Clone, Debug)]
pub struct SandboxRecord {
    /// Docker container id — the sandbox identity reported by status.
    pub id: String,
    pub name: String,
    pub image: String,
    pub network: String,
    pub created_at: u64,
}

pub async fn docker_builder() -> Result<&'static DockerBuilder> {
    DOCKER_BUILDER
        .get_or_try_init(|| async {
            let config = RuntimeConfig::load();
            let builder = match config.docker_host.as_deref() {
                Some(host) => DockerBuilder::with_address(host).await.map_err(|err| {
                    PanelError::Docker(format!("failed to connect to docker at {host}: {err}"))
                })?,
                None => DockerBuilder::new().await.map_err(|err| {
                    PanelError::Docker(format!("failed to connect to docker: {err}"))
                })?,
            };
            Ok(builder)
        })
        .await
}

/// Ensure the sandbox image is available locally. Pulls once on first call
/// if `SANDBOX_PULL_IMAGE` is true. Subsequent calls are no-ops.
async fn ensure_image_pulled(builder: &DockerBuilder, image: &str) -> Result<()> {
    IMAGE_PULLED
        .get_or_try_init(|| async {
            let config = RuntimeConfig::load();
            if config.pull_image {
                builder.pull_image(image, None).await.map_err(|err| {
                    PanelError::Provisioning(format!("failed to pull image {image}: {err}"))
                })?;
            }
            Ok::<(), PanelError>(())
        })
        .await?;
    Ok(())
}

/// Create the sandbox container and install the load-generation tooling
/// inside it. Returns the record identifying the new sandbox.
///
/// Not idempotent at the Docker level: each successful call creates a fresh
/// container, so the caller is responsible for calling it at most once per
/// recorded sandbox.
pub async fn provision() -> Result<SandboxRecord> {
    let config = RuntimeConfig::load();
    let builder = docker_builder().await?;

    ensure_image_pulled(builder, &config.image).await?;

    let name = format!("loadpanel-sandbox-{}", uuid::Uuid::new_v4());
    let override_config = BollardConfig {
        // keep the container alive between execs
        cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
        host_config: Some(HostConfig {
            network_mode: Some(config.network.clone()),
            auto_remove: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut container = Container::new(builder.client(), config.image.clone())
        .with_name(name.clone())
        .config_override(override_config);

    container.start(false).await.map_err(|err| {
        PanelError::Provisioning(format!("failed to start sandbox container: {err}"))
    })?;

    let container_id = container
        .id()
        .ok_or_else(|| PanelError::Provisioning("missing container id".into()))?
        .to_string();

    install_prerequisites(&container_id).await?;

    Ok(SandboxRecord {
        id: container_id,
        name,
        image: config.image.clone(),
        network: config.network.clone(),
        created_at: now_ts(),
    })
}

async fn install_prerequisites(container_id: &str) -> Result<()> {
    for step in PREREQUISITE_STEPS {
        let cmd: Vec<String> = step.iter().map(|s| s.to_string()).collect();
        let pretty = step.join(" ");
        let outcome = exec_collect(container_id, cmd)
            .await
            .map_err(|err| PanelError::Provisioning(format!("`{pretty}`: {err}")))?;
        if outcome.exit_code != 0 {
            return Err(PanelError::Provisioning(format!(
                "`{pretty}` exited with {}: {}",
                outcome.exit_code,
                tail(&outcome.output, DIAGNOSTIC_TAIL_CHARS)
            )));
        }
    }
    Ok(())
}

/// Combined stdout/stderr stream of a running exec.
pub type ExecStream =
    Pin<Box<dyn Stream<Item = std::result::Result<LogOutput, docktopus::bollard::errors::Error>> + Send>>;

/// Outcome of an exec that was run to completion.
#[derive(Debug)]
pub struct ExecOutcome {
    pub exit_code: i64,
    pub output: String,
}

/// Start a command inside the sandbox and hand back its exec id plus the
/// output stream; the stream ends when the process exits.
pub async fn start_worker(container_id: &str, cmd: Vec<String>) -> Result<(String, ExecStream)> {
    let builder = docker_builder().await?;
    let client = builder.client();

    let exec = client
        .create_exec(
            container_id,
            CreateExecOptions {
                cmd: Some(cmd),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                ..Default::default()
            },
        )
        .await
        .map_err(|err| PanelError::Docker(format!("failed to create exec: {err}")))?;

    let stream: ExecStream = match client
        .start_exec(&exec.id, None)
        .await
        .map_err(|err| PanelError::Docker(format!("failed to start exec: {err}")))?
    {
        StartExecResults::Attached { output, .. } => output,
        StartExecResults::Detached => Box::pin(tokio_stream::empty()),
    };

    Ok((exec.id, stream))
}

/// Run a command inside the sandbox to completion, collecting its combined
/// output and exit code.
pub async fn exec_collect(container_id: &str, cmd: Vec<String>) -> Result<ExecOutcome> {
    let (exec_id, mut stream) = start_worker(container_id, cmd).await?;

    let mut output = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(log) => output.push_str(&log.to_string()),
            Err(err) => {
                return Err(PanelError::Docker(format!("exec stream failed: {err}")));
            }
        }
    }

    let builder = docker_builder().await?;
    let inspect = builder
        .client()
        .inspect_exec(&exec_id)
        .await
        .map_err(|err| PanelError::Docker(format!("failed to inspect exec: {err}")))?;

    Ok(ExecOutcome {
        exit_code: inspect.exit_code.unwrap_or(-1),
        output,
    })
}

/// Signal every process in the sandbox whose command line matches `pattern`
/// (`pkill -f`). A non-zero exit just means nothing matched, so only
/// transport failures surface as errors.
pub async fn kill_matching(container_id: &str, pattern: &str) -> Result<()> {
    exec_collect(
        container_id,
        vec!["pkill".to_string(), "-f".to_string(), pattern.to_string()],
    )
    .await
    .map(|_| ())
}
