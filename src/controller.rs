use crate::api::{Connector, Stack};
use crate::metrics::ReconcileCounters;
use crate::resource::{VersionedResource, patch_version_status};
use crate::state::ControllerContext;
use crate::version::Collaborators;
use anyhow::{Context, bail};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use globset::GlobSet;
use kube::api::ListParams;
use kube::{Api, Client, Resource, ResourceExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type KindPass<'a> = (String, BoxFuture<'a, anyhow::Result<()>>);

pub async fn create_client() -> anyhow::Result<Client> {
    info!("Initializing K8s client");
    let client = Client::try_default().await?;
    let api_server_info = client.apiserver_version().await?;
    info!(
        "Connected to Kubernetes API server with version {}.{}",
        api_server_info.major, api_server_info.minor
    );
    Ok(client)
}

/// One controller pass: every matching Stack and Connector gets one version reconcile pass.
pub async fn run(ctx: ControllerContext) -> anyhow::Result<()> {
    let namespaces = ctx.config.reconcile.namespace_matcher()?;

    run_kinds(
        &ctx.ready,
        vec![
            (
                Stack::kind(&()).to_string(),
                reconcile_all::<Stack>(&ctx, &namespaces).boxed(),
            ),
            (
                Connector::kind(&()).to_string(),
                reconcile_all::<Connector>(&ctx, &namespaces).boxed(),
            ),
        ],
    )
    .await
}

/// Runs the pass of every kind, even after an earlier kind failed.
async fn run_kinds(ready: &AtomicBool, passes: Vec<KindPass<'_>>) -> anyhow::Result<()> {
    let mut failed = Vec::new();
    for (kind, pass) in passes {
        if let Err(e) = pass.await {
            error!("Failed to reconcile {} resources: {:?}", kind, e);
            failed.push(kind);
        }
    }

    if !ready.swap(true, Ordering::Relaxed) {
        info!("First controller pass completed");
    }

    if !failed.is_empty() {
        bail!("Controller pass failed for {}", failed.join(", "));
    }
    Ok(())
}

async fn reconcile_all<K: VersionedResource>(
    ctx: &ControllerContext,
    namespaces: &GlobSet,
) -> anyhow::Result<()> {
    let kind = K::kind(&());
    let kind = kind.as_ref();
    let api: Api<K> = Api::all(ctx.kube_client.clone());
    let resources: Vec<K> = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("Failed to list {} resources", kind))?
        .items
        .into_iter()
        .filter(|r| r.namespace().is_some_and(|ns| namespaces.is_match(ns)))
        .collect();

    info!("Reconciling versions of {} {} resources", resources.len(), kind);

    let timeout = Duration::from_secs(ctx.config.reconcile.timeout_seconds);
    futures::stream::iter(resources)
        .for_each_concurrent(ctx.config.reconcile.concurrency, |resource| async move {
            let name = resource.name_any();
            let namespace = resource.namespace().unwrap_or_default();

            let target = format!("{} {}/{}", kind, namespace, name);
            match guarded(&ctx.shutdown, timeout, reconcile_resource(ctx, resource)).await {
                Some(outcome) => {
                    record_outcome(&ctx.counters, &target, timeout, outcome);
                }
                None => info!("Shutdown requested, skipping {}", target),
            }
        })
        .await;

    Ok(())
}

/// Runs one version reconcile pass on a copy of the resource and persists the status when it changed.
async fn reconcile_resource<K: VersionedResource>(
    ctx: &ControllerContext,
    mut resource: K,
) -> anyhow::Result<Option<&'static str>> {
    let kind = K::kind(&());
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();

    let probe_interval = ctx.config.reconcile.probe_interval()?;
    let registry = resource.registry_client(ctx);
    let collaborators =
        Collaborators::new(&registry, ctx.clock.as_ref()).with_probe_interval(probe_interval);

    let updated = resource
        .version_reconciler(collaborators, ctx.counters.as_ref())
        .reconcile()
        .await
        .with_context(|| format!("Failed to resolve versions of {} {}/{}", kind, namespace, name))?;

    if updated.is_some() {
        let api: Api<K> = Api::namespaced(ctx.kube_client.clone(), &namespace);
        patch_version_status(&api, &name, &resource.status_patch()).await?;
    }

    Ok(updated)
}

/// Runs `pass` within `timeout`. Returns `None` when shutdown was requested first.
async fn guarded<F: Future>(
    shutdown: &CancellationToken,
    timeout: Duration,
    pass: F,
) -> Option<Result<F::Output, Elapsed>> {
    tokio::select! {
        _ = shutdown.cancelled() => None,
        outcome = tokio::time::timeout(timeout, pass) => Some(outcome),
    }
}

/// Logs the outcome of one resource pass and counts it. Returns whether the pass succeeded.
fn record_outcome(
    counters: &ReconcileCounters,
    target: &str,
    timeout: Duration,
    outcome: Result<anyhow::Result<Option<&'static str>>, Elapsed>,
) -> bool {
    let ok = match outcome {
        Ok(Ok(Some(updater))) => {
            info!(updater = updater, "Updated version status of {}", target);
            true
        }
        Ok(Ok(None)) => {
            debug!("Versions of {} are up to date", target);
            true
        }
        Ok(Err(e)) => {
            warn!("Version reconcile of {} failed, retrying on next run: {:?}", target, e);
            false
        }
        Err(_) => {
            warn!(
                "Version reconcile of {} timed out after {:?}, retrying on next run",
                target, timeout
            );
            false
        }
    };
    counters.pass_completed(ok);
    ok
}
