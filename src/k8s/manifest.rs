/// Debug pod descriptors and the manifests built from them
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::config::{DebugConfig, DEFAULT_CONTAINER, DEFAULT_IMAGE};

/// Node selector key pinning a pod to one node
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Where the node's root filesystem appears inside the container
pub const HOST_MOUNT_PATH: &str = "/host";

const HOST_VOLUME_NAME: &str = "host";
const HOST_ROOT_PATH: &str = "/";
const HOST_PATH_TYPE: &str = "Directory";

/// How the debug pod relates to the node it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodMode {
    /// Ordinary namespaced pod
    Plain,
    /// Privileged pod on `node` with the node root mounted at [`HOST_MOUNT_PATH`]
    Host { node: String },
}

/// Everything needed to create one debug pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugPod {
    pub name: String,
    pub namespace: String,
    pub container: String,
    pub image: String,
    pub command: Vec<String>,
    pub mode: PodMode,
}

impl DebugPod {
    /// Plain debug pod with default image and command
    pub fn plain(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            container: DEFAULT_CONTAINER.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            command: vec!["sleep".to_string(), "infinity".to_string()],
            mode: PodMode::Plain,
        }
    }

    /// Host-mode debug pod bound to `node`
    pub fn host(
        node: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            mode: PodMode::Host { node: node.into() },
            ..Self::plain(name, namespace)
        }
    }

    /// Apply image and container overrides from the defaults file
    pub fn with_config(mut self, config: &DebugConfig) -> Self {
        self.image = config.image.clone();
        self.container = config.container.clone();
        self
    }

    pub fn node_affinity(&self) -> Option<&str> {
        match &self.mode {
            PodMode::Plain => None,
            PodMode::Host { node } => Some(node),
        }
    }

    pub fn mounts_host(&self) -> bool {
        matches!(self.mode, PodMode::Host { .. })
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self.mode, PodMode::Host { .. })
    }

    /// Build the pod manifest submitted to the API server
    pub fn manifest(&self) -> Pod {
        let mut container = Container {
            name: self.container.clone(),
            image: Some(self.image.clone()),
            command: Some(self.command.clone()),
            ..Default::default()
        };
        let mut spec = PodSpec::default();

        if let PodMode::Host { node } = &self.mode {
            container.security_context = Some(SecurityContext {
                privileged: Some(true),
                ..Default::default()
            });
            container.volume_mounts = Some(vec![VolumeMount {
                name: HOST_VOLUME_NAME.to_string(),
                mount_path: HOST_MOUNT_PATH.to_string(),
                ..Default::default()
            }]);

            spec.node_selector = Some(BTreeMap::from([(
                HOSTNAME_LABEL.to_string(),
                node.clone(),
            )]));
            spec.volumes = Some(vec![Volume {
                name: HOST_VOLUME_NAME.to_string(),
                host_path: Some(HostPathVolumeSource {
                    path: HOST_ROOT_PATH.to_string(),
                    type_: Some(HOST_PATH_TYPE.to_string()),
                }),
                ..Default::default()
            }]);
        }

        spec.containers = vec![container];

        Pod {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(spec),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_container(pod: &Pod) -> &Container {
        let containers = &pod.spec.as_ref().unwrap().containers;
        assert_eq!(containers.len(), 1);
        &containers[0]
    }

    #[test]
    fn test_plain_manifest_has_no_host_access() {
        let debug_pod = DebugPod::plain("debug-pod", "default");
        assert_eq!(debug_pod.node_affinity(), None);
        assert!(!debug_pod.mounts_host());
        assert!(!debug_pod.is_privileged());

        let pod = debug_pod.manifest();
        let spec = pod.spec.as_ref().unwrap();
        assert!(spec.node_selector.is_none());
        assert!(spec.volumes.is_none());

        let container = only_container(&pod);
        assert_eq!(container.name, "main");
        assert_eq!(container.image.as_deref(), Some("digitalocean/doks-debug:latest"));
        assert_eq!(
            container.command,
            Some(vec!["sleep".to_string(), "infinity".to_string()])
        );
        assert!(container.security_context.is_none());
        assert!(container.volume_mounts.is_none());
    }

    #[test]
    fn test_host_manifest_sets_all_host_access_together() {
        let debug_pod = DebugPod::host("node-7", "debug-pod", "default");
        assert_eq!(debug_pod.node_affinity(), Some("node-7"));
        assert!(debug_pod.mounts_host());
        assert!(debug_pod.is_privileged());

        let pod = debug_pod.manifest();
        assert_eq!(pod.metadata.name.as_deref(), Some("debug-pod"));
        let spec = pod.spec.as_ref().unwrap();

        let selector = spec.node_selector.as_ref().unwrap();
        assert_eq!(selector.len(), 1);
        assert_eq!(selector.get("kubernetes.io/hostname").map(String::as_str), Some("node-7"));

        let volumes = spec.volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 1);
        let host_path = volumes[0].host_path.as_ref().unwrap();
        assert_eq!(host_path.path, "/");
        assert_eq!(host_path.type_.as_deref(), Some("Directory"));

        let container = only_container(&pod);
        assert_eq!(
            container.security_context.as_ref().and_then(|sc| sc.privileged),
            Some(true)
        );
        let mounts = container.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, volumes[0].name);
        assert_eq!(mounts[0].mount_path, "/host");
        assert_ne!(mounts[0].read_only, Some(true));
        assert_eq!(
            container.command,
            Some(vec!["sleep".to_string(), "infinity".to_string()])
        );
    }

    #[test]
    fn test_config_overrides_image_and_container() {
        let config = DebugConfig {
            image: "busybox:1.36".to_string(),
            container: "debug".to_string(),
            ..Default::default()
        };
        let pod = DebugPod::host("node-1", "dbg", "kube-system")
            .with_config(&config)
            .manifest();

        assert_eq!(pod.metadata.namespace.as_deref(), Some("kube-system"));
        let container = only_container(&pod);
        assert_eq!(container.name, "debug");
        assert_eq!(container.image.as_deref(), Some("busybox:1.36"));
    }
}
