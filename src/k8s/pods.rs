/// Debug pod lifecycle: existence check, creation and wait for Running
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, PostParams};
use kube::ResourceExt;
use tracing::info;

use super::manifest::DebugPod;
use crate::error::{Error, Result};
use crate::utils::polling::{Attempt, PollingConfig};

/// Phase reported once all containers have started
pub const RUNNING_PHASE: &str = "Running";

/// Pod operations within a single namespace
pub struct PodManager {
    api: Api<Pod>,
    namespace: String,
}

impl PodManager {
    pub fn new(api: Api<Pod>, namespace: impl Into<String>) -> Self {
        Self {
            api,
            namespace: namespace.into(),
        }
    }

    pub fn api(&self) -> &Api<Pod> {
        &self.api
    }

    /// Check whether a pod exists
    ///
    /// Only a 404 from the API server counts as absent; every other failure is returned.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let pod = self.api.get_opt(name).await.map_err(|source| Error::Lookup {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            source,
        })?;

        match pod {
            Some(_) => {
                info!("Found pod {} in namespace {}", name, self.namespace);
                Ok(true)
            }
            None => {
                info!("Pod {} in namespace {} not found", name, self.namespace);
                Ok(false)
            }
        }
    }

    /// Submit the manifest for `debug_pod`
    pub async fn create(&self, debug_pod: &DebugPod) -> Result<Pod> {
        let created = self
            .api
            .create(&PostParams::default(), &debug_pod.manifest())
            .await
            .map_err(|source| Error::Create {
                namespace: self.namespace.clone(),
                name: debug_pod.name.clone(),
                source,
            })?;

        info!("Pod successfully created: {}", created.name_any());

        Ok(created)
    }

    /// Poll the pod status until its phase is Running
    pub async fn wait_for_running(&self, name: &str, polling: &PollingConfig) -> Result<()> {
        polling
            .poll(|| async move {
                let pod = self.api.get(name).await.map_err(|source| Error::Poll {
                    namespace: self.namespace.clone(),
                    name: name.to_string(),
                    source,
                })?;

                let phase = pod_phase(&pod);
                if phase == RUNNING_PHASE {
                    info!("Pod '{}' is now in '{}' state", name, RUNNING_PHASE);
                    Ok::<_, Error>(Attempt::Ready(()))
                } else {
                    info!("Pod '{}' is in state '{}'", name, phase);
                    Ok::<_, Error>(Attempt::NotYet(phase))
                }
            })
            .await
    }
}

/// Current phase of a pod, `Unknown` until the status carries one
pub fn pod_phase(pod: &Pod) -> String {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}
