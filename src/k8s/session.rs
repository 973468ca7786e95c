/// Cluster session resolution from kubeconfig
use std::path::PathBuf;

use k8s_openapi::api::core::v1::Pod;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Where to find cluster credentials
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Explicit kubeconfig path; `KUBECONFIG` or `~/.kube/config` otherwise
    pub kubeconfig: Option<PathBuf>,
    /// Context to use instead of the current one
    pub context: Option<String>,
}

/// Connection to one cluster, fixed for the lifetime of an invocation
#[derive(Clone)]
pub struct SessionContext {
    config: Config,
    client: Client,
}

impl SessionContext {
    /// Resolve kubeconfig and build a client from it
    ///
    /// No in-cluster fallback: a missing kubeconfig is an error.
    pub async fn resolve(options: &SessionOptions) -> Result<Self> {
        let config = load_config(options).await?;
        let client = Client::try_from(config.clone()).map_err(Error::Client)?;

        Ok(Self::new(config, client))
    }

    pub fn new(config: Config, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pod API scoped to `namespace`
    pub fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Read and parse the kubeconfig selected by `options`
pub async fn load_config(options: &SessionOptions) -> Result<Config> {
    let kubeconfig_error = |source| Error::Kubeconfig {
        path: options.kubeconfig.clone(),
        source,
    };

    let kubeconfig = match &options.kubeconfig {
        Some(path) => {
            debug!("Reading kubeconfig from {}", path.display());
            Kubeconfig::read_from(path).map_err(kubeconfig_error)?
        }
        None => Kubeconfig::read().map_err(kubeconfig_error)?,
    };

    let kube_options = KubeConfigOptions {
        context: options.context.clone(),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &kube_options)
        .await
        .map_err(kubeconfig_error)?;

    info!("Using cluster {}", config.cluster_url);

    Ok(config)
}
