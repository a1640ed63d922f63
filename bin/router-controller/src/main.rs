use anyhow::{bail, Result};
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use k8s_openapi::api::networking::v1::Ingress;
use router_api::IngressV1beta1;
use router_core::{KubeClusterClient, SyncConfig, SyncEngine, SyncMetrics};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod ingress_controller;
mod settings;

use ingress_controller::{preferred_shape, Context, IngressController, IngressShape};
use settings::{ControllerSettings, LogFormat};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Whether the cluster serves `K` at its group and version
async fn api_served<K>(client: &Client) -> Result<bool>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    let api: Api<K> = Api::all(client.clone());
    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = ControllerSettings::from_env()?;
    init_tracing(settings.log_format);

    info!("Starting router-controller...");

    let config = SyncConfig::from_env()?;
    config.validate()?;

    let client = Client::try_default().await?;
    let metrics = Arc::new(SyncMetrics::new()?);
    let engine = SyncEngine::new(
        Arc::new(KubeClusterClient::new(client.clone())),
        config,
        metrics.clone(),
    );
    info!(
        namespace = %engine.config().namespace,
        store = %engine.config().secret_name,
        ingress_class = %engine.config().ingress_class,
        "Projecting managed Ingresses"
    );

    let cancel = CancellationToken::new();
    let ctx = Arc::new(Context {
        engine,
        settings,
        cancel: cancel.clone(),
    });

    let v1_served = api_served::<Ingress>(&client).await?;
    let legacy_served = !v1_served && api_served::<IngressV1beta1>(&client).await?;

    let controller = match preferred_shape(v1_served, legacy_served) {
        Some(IngressShape::V1) => {
            let api: Api<Ingress> = Api::all(client.clone());
            tokio::spawn(IngressController::new(api, ctx.clone()).run())
        }
        Some(IngressShape::V1beta1) => {
            warn!("networking.k8s.io/v1 Ingress is not served, watching v1beta1");
            let api: Api<IngressV1beta1> = Api::all(client.clone());
            tokio::spawn(IngressController::new(api, ctx.clone()).run())
        }
        None => bail!("Cluster serves neither networking.k8s.io/v1 nor v1beta1 Ingress"),
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping controller...");
    cancel.cancel();

    if let Err(e) = controller.await {
        error!("Controller task failed: {}", e);
    }

    match metrics.gather() {
        Ok(text) => debug!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to gather metrics: {}", e),
    }

    Ok(())
}
