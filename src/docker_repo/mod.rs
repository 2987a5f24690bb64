// Container runtime access via bollard

mod stats;

use crate::models::{ContainerBrief, ContainerState, ContainerStatsSample};
use anyhow::Context;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use futures_util::StreamExt;

/// Narrow view of the container runtime consumed by the health monitor and
/// the status endpoint. Kept as a trait so the monitor is testable against a
/// fake runtime without a Docker daemon.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
    async fn container_state(&self, id: &str) -> anyhow::Result<ContainerState>;
    async fn container_stats(&self, id: &str) -> anyhow::Result<ContainerStatsSample>;
    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerBrief>>;
}

pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRepo {
    async fn ping(&self) -> anyhow::Result<()> {
        self.docker.ping().await.context("Docker ping failed")?;
        Ok(())
    }

    async fn container_state(&self, id: &str) -> anyhow::Result<ContainerState> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("inspect container {id}"))?;
        let status = inspect
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();
        Ok(ContainerState::from_docker(&status))
    }

    async fn container_stats(&self, id: &str) -> anyhow::Result<ContainerStatsSample> {
        // stream=false: the daemon samples twice so precpu is populated and a
        // CPU percentage can be derived from a single response.
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        let response = stream
            .next()
            .await
            .with_context(|| format!("no stats returned for container {id}"))?
            .with_context(|| format!("stats request failed for container {id}"))?;
        stats::sample_from_response(&response)
            .with_context(|| format!("incomplete stats for container {id}"))
    }

    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerBrief>> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("Docker list_containers failed")?;

        let mut out = Vec::with_capacity(containers.len());
        for c in containers {
            let id = c.id.unwrap_or_default();
            let name = c
                .names
                .as_ref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.clone());
            let state = c
                .state
                .map(|s| ContainerState::from_docker(&s.to_string()))
                .unwrap_or(ContainerState::Unknown);
            out.push(ContainerBrief { id, name, state });
        }
        Ok(out)
    }
}
