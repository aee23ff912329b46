//! In-memory [`crate::cluster::ClusterReader`] test double. Public so
//! `tests/` integration suites can build fixtures the same way unit tests
//! do (mirrors the teacher's `tests/common/mod.rs` builder pattern, widened
//! from pods alone to every resource kind Kogaro reads).

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolumeClaim, Pod, PodSpec, Secret, Service,
    ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::cluster::ClusterReader;

/// A fake cluster, built up field-by-field with plain `Vec::push` or the
/// `add_*` convenience methods. Never touches the network.
#[derive(Debug, Clone, Default)]
pub struct FakeClusterReader {
    pub pods: Vec<Pod>,
    pub deployments: Vec<Deployment>,
    pub statefulsets: Vec<StatefulSet>,
    pub daemonsets: Vec<DaemonSet>,
    pub jobs: Vec<Job>,
    pub cronjobs: Vec<CronJob>,
    pub services: Vec<Service>,
    pub endpoints: Vec<Endpoints>,
    pub ingresses: Vec<Ingress>,
    pub ingress_classes: Vec<IngressClass>,
    pub configmaps: Vec<ConfigMap>,
    pub secrets: Vec<Secret>,
    pub service_accounts: Vec<ServiceAccount>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub storage_classes: Vec<StorageClass>,
    pub network_policies: Vec<NetworkPolicy>,
    pub role_bindings: Vec<RoleBinding>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    pub nodes: Vec<Node>,
    pub namespaces: Vec<Namespace>,
}

impl FakeClusterReader {
    /// Add a bare pod with an empty `PodSpec`, optionally customized.
    pub fn add_pod(&mut self, namespace: &str, name: &str, customize: impl FnOnce(Pod) -> Pod) -> &mut Self {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec::default()),
            ..Default::default()
        };
        self.pods.push(customize(pod));
        self
    }

    pub fn add_service(&mut self, namespace: &str, name: &str, customize: impl FnOnce(Service) -> Service) -> &mut Self {
        let svc = Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.services.push(customize(svc));
        self
    }

    pub fn add_namespace(&mut self, name: &str) -> &mut Self {
        self.namespaces.push(Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }
}

impl ClusterReader for FakeClusterReader {
    async fn list_pods(&self) -> anyhow::Result<Vec<Pod>> {
        Ok(self.pods.clone())
    }
    async fn list_deployments(&self) -> anyhow::Result<Vec<Deployment>> {
        Ok(self.deployments.clone())
    }
    async fn list_statefulsets(&self) -> anyhow::Result<Vec<StatefulSet>> {
        Ok(self.statefulsets.clone())
    }
    async fn list_daemonsets(&self) -> anyhow::Result<Vec<DaemonSet>> {
        Ok(self.daemonsets.clone())
    }
    async fn list_jobs(&self) -> anyhow::Result<Vec<Job>> {
        Ok(self.jobs.clone())
    }
    async fn list_cronjobs(&self) -> anyhow::Result<Vec<CronJob>> {
        Ok(self.cronjobs.clone())
    }
    async fn list_services(&self) -> anyhow::Result<Vec<Service>> {
        Ok(self.services.clone())
    }
    async fn list_endpoints(&self) -> anyhow::Result<Vec<Endpoints>> {
        Ok(self.endpoints.clone())
    }
    async fn list_ingresses(&self) -> anyhow::Result<Vec<Ingress>> {
        Ok(self.ingresses.clone())
    }
    async fn list_ingress_classes(&self) -> anyhow::Result<Vec<IngressClass>> {
        Ok(self.ingress_classes.clone())
    }
    async fn list_configmaps(&self) -> anyhow::Result<Vec<ConfigMap>> {
        Ok(self.configmaps.clone())
    }
    async fn list_secrets(&self) -> anyhow::Result<Vec<Secret>> {
        Ok(self.secrets.clone())
    }
    async fn list_service_accounts(&self) -> anyhow::Result<Vec<ServiceAccount>> {
        Ok(self.service_accounts.clone())
    }
    async fn list_pvcs(&self) -> anyhow::Result<Vec<PersistentVolumeClaim>> {
        Ok(self.pvcs.clone())
    }
    async fn list_storage_classes(&self) -> anyhow::Result<Vec<StorageClass>> {
        Ok(self.storage_classes.clone())
    }
    async fn list_network_policies(&self) -> anyhow::Result<Vec<NetworkPolicy>> {
        Ok(self.network_policies.clone())
    }
    async fn list_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>> {
        Ok(self.role_bindings.clone())
    }
    async fn list_cluster_role_bindings(&self) -> anyhow::Result<Vec<ClusterRoleBinding>> {
        Ok(self.cluster_role_bindings.clone())
    }
    async fn list_nodes(&self) -> anyhow::Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
    async fn list_namespaces(&self) -> anyhow::Result<Vec<Namespace>> {
        Ok(self.namespaces.clone())
    }
}
