/// Debug session orchestration: ensure the pod is up, then attach a shell
use tracing::{debug, info};

use crate::config::DebugConfig;
use crate::error::{Error, Result};
use crate::k8s::exec;
use crate::k8s::manifest::{DebugPod, HOST_MOUNT_PATH};
use crate::k8s::{PodManager, SessionContext};
use crate::utils::polling::PollingConfig;

/// Create-if-absent, wait for Running, then exec the configured shell
pub async fn run_session(
    session: &SessionContext,
    debug_pod: &DebugPod,
    config: &DebugConfig,
) -> Result<()> {
    debug!(
        "Debug pod {}/{} on {}",
        debug_pod.namespace,
        debug_pod.name,
        session.config().cluster_url
    );
    if debug_pod.is_privileged() && debug_pod.mounts_host() {
        info!(
            "Host mode: privileged container with the node root filesystem at {}",
            HOST_MOUNT_PATH
        );
    }

    let pods = PodManager::new(session.pods(&debug_pod.namespace), &debug_pod.namespace);

    prepare_pod(&pods, debug_pod, &polling_config(debug_pod, config)).await?;

    exec::exec_interactive(pods.api(), &debug_pod.name, &debug_pod.container, &config.shell).await
}

/// Make sure `debug_pod` exists and is Running; returns whether it was created
///
/// An existing pod is reused as-is, even if its spec differs from `debug_pod`.
pub async fn prepare_pod(
    pods: &PodManager,
    debug_pod: &DebugPod,
    polling: &PollingConfig,
) -> Result<bool> {
    let created = if pods.exists(&debug_pod.name).await? {
        false
    } else {
        pods.create(debug_pod).await?;
        true
    };

    tokio::select! {
        result = pods.wait_for_running(&debug_pod.name, polling) => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            return Err(Error::Interrupted(format!(
                "waiting for pod {} to become Running",
                debug_pod.name
            )));
        }
    }

    Ok(created)
}

fn polling_config(debug_pod: &DebugPod, config: &DebugConfig) -> PollingConfig {
    let description = match debug_pod.node_affinity() {
        Some(node) => format!(
            "Waiting for pod {} on node {} to become Running",
            debug_pod.name, node
        ),
        None => format!("Waiting for pod {} to become Running", debug_pod.name),
    };
    info!(
        "Polling every {}s for up to {}s",
        config.poll_interval_secs, config.wait_timeout_secs
    );

    PollingConfig::new(config.wait_timeout(), config.poll_interval(), description)
}
