//! The cluster-read abstraction (spec.md §9): a narrow read-only port that
//! every validator depends on instead of a concrete `kube::Client`, so
//! validators are hermetically testable without a real cluster. The real
//! implementation lists against a live API server; [`crate::testing`]
//! provides an in-memory fake for tests.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolumeClaim, Pod, Secret, Service,
    ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::ListParams;
use kube::{Api, Client};

/// Read-only access to every resource kind Kogaro audits (spec.md §6
/// "Cluster access"). No write verbs — this is intentionally narrower than
/// `kube::Client`.
pub trait ClusterReader {
    async fn list_pods(&self) -> anyhow::Result<Vec<Pod>>;
    async fn list_deployments(&self) -> anyhow::Result<Vec<Deployment>>;
    async fn list_statefulsets(&self) -> anyhow::Result<Vec<StatefulSet>>;
    async fn list_daemonsets(&self) -> anyhow::Result<Vec<DaemonSet>>;
    async fn list_jobs(&self) -> anyhow::Result<Vec<Job>>;
    async fn list_cronjobs(&self) -> anyhow::Result<Vec<CronJob>>;
    async fn list_services(&self) -> anyhow::Result<Vec<Service>>;
    async fn list_endpoints(&self) -> anyhow::Result<Vec<Endpoints>>;
    async fn list_ingresses(&self) -> anyhow::Result<Vec<Ingress>>;
    async fn list_ingress_classes(&self) -> anyhow::Result<Vec<IngressClass>>;
    async fn list_configmaps(&self) -> anyhow::Result<Vec<ConfigMap>>;
    async fn list_secrets(&self) -> anyhow::Result<Vec<Secret>>;
    async fn list_service_accounts(&self) -> anyhow::Result<Vec<ServiceAccount>>;
    async fn list_pvcs(&self) -> anyhow::Result<Vec<PersistentVolumeClaim>>;
    async fn list_storage_classes(&self) -> anyhow::Result<Vec<StorageClass>>;
    async fn list_network_policies(&self) -> anyhow::Result<Vec<NetworkPolicy>>;
    async fn list_role_bindings(&self) -> anyhow::Result<Vec<RoleBinding>>;
    async fn list_cluster_role_bindings(&self) -> anyhow::Result<Vec<ClusterRoleBinding>>;
    async fn list_nodes(&self) -> anyhow::Result<Vec<Node>>;
    async fn list_namespaces(&self) -> anyhow::Result<Vec<Namespace>>;
}

/// The production [`ClusterReader`], backed by a real `kube::Client`.
/// Mirrors the teacher's `Api::all(client.clone()).list(&ListParams::default())`
/// calls in `commands/check.rs` / `commands/analyze.rs`.
#[derive(Clone)]
pub struct KubeClusterReader {
    client: Client,
}

impl KubeClusterReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

macro_rules! list_all {
    ($name:ident, $ty:ty) => {
        async fn $name(&self) -> anyhow::Result<Vec<$ty>> {
            let api: Api<$ty> = Api::all(self.client.clone());
            let list = api.list(&ListParams::default()).await?;
            Ok(list.items)
        }
    };
}

impl ClusterReader for KubeClusterReader {
    list_all!(list_pods, Pod);
    list_all!(list_deployments, Deployment);
    list_all!(list_statefulsets, StatefulSet);
    list_all!(list_daemonsets, DaemonSet);
    list_all!(list_jobs, Job);
    list_all!(list_cronjobs, CronJob);
    list_all!(list_services, Service);
    list_all!(list_endpoints, Endpoints);
    list_all!(list_ingresses, Ingress);
    list_all!(list_ingress_classes, IngressClass);
    list_all!(list_configmaps, ConfigMap);
    list_all!(list_secrets, Secret);
    list_all!(list_service_accounts, ServiceAccount);
    list_all!(list_pvcs, PersistentVolumeClaim);
    list_all!(list_storage_classes, StorageClass);
    list_all!(list_network_policies, NetworkPolicy);
    list_all!(list_role_bindings, RoleBinding);
    list_all!(list_cluster_role_bindings, ClusterRoleBinding);
    list_all!(list_nodes, Node);
    list_all!(list_namespaces, Namespace);
}

/// The per-scan working set (spec.md §3 "Cluster snapshot"). Populated once
/// per scan via [`ClusterSnapshot::load`]; validators read it but never
/// mutate it.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
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

impl ClusterSnapshot {
    /// List every resource kind sequentially, sharing the reader's own
    /// connection/cache (spec.md §5 — validators never hot-spot the API
    /// server by listing concurrently).
    pub async fn load<R: ClusterReader>(reader: &R) -> anyhow::Result<Self> {
        Ok(Self {
            pods: reader.list_pods().await?,
            deployments: reader.list_deployments().await?,
            statefulsets: reader.list_statefulsets().await?,
            daemonsets: reader.list_daemonsets().await?,
            jobs: reader.list_jobs().await?,
            cronjobs: reader.list_cronjobs().await?,
            services: reader.list_services().await?,
            endpoints: reader.list_endpoints().await?,
            ingresses: reader.list_ingresses().await?,
            ingress_classes: reader.list_ingress_classes().await?,
            configmaps: reader.list_configmaps().await?,
            secrets: reader.list_secrets().await?,
            service_accounts: reader.list_service_accounts().await?,
            pvcs: reader.list_pvcs().await?,
            storage_classes: reader.list_storage_classes().await?,
            network_policies: reader.list_network_policies().await?,
            role_bindings: reader.list_role_bindings().await?,
            cluster_role_bindings: reader.list_cluster_role_bindings().await?,
            nodes: reader.list_nodes().await?,
            namespaces: reader.list_namespaces().await?,
        })
    }

    pub fn find_service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.metadata.namespace.as_deref() == Some(namespace) && s.metadata.name.as_deref() == Some(name))
    }

    pub fn find_configmap(&self, namespace: &str, name: &str) -> Option<&ConfigMap> {
        self.configmaps
            .iter()
            .find(|c| c.metadata.namespace.as_deref() == Some(namespace) && c.metadata.name.as_deref() == Some(name))
    }

    pub fn find_secret(&self, namespace: &str, name: &str) -> Option<&Secret> {
        self.secrets
            .iter()
            .find(|s| s.metadata.namespace.as_deref() == Some(namespace) && s.metadata.name.as_deref() == Some(name))
    }

    pub fn find_pvc(&self, namespace: &str, name: &str) -> Option<&PersistentVolumeClaim> {
        self.pvcs
            .iter()
            .find(|p| p.metadata.namespace.as_deref() == Some(namespace) && p.metadata.name.as_deref() == Some(name))
    }

    pub fn find_storage_class(&self, name: &str) -> Option<&StorageClass> {
        self.storage_classes.iter().find(|s| s.metadata.name.as_deref() == Some(name))
    }

    pub fn find_ingress_class(&self, name: &str) -> Option<&IngressClass> {
        self.ingress_classes.iter().find(|c| c.metadata.name.as_deref() == Some(name))
    }

    pub fn find_service_account(&self, namespace: &str, name: &str) -> Option<&ServiceAccount> {
        self.service_accounts
            .iter()
            .find(|s| s.metadata.namespace.as_deref() == Some(namespace) && s.metadata.name.as_deref() == Some(name))
    }

    pub fn endpoints_for(&self, namespace: &str, name: &str) -> Option<&Endpoints> {
        self.endpoints
            .iter()
            .find(|e| e.metadata.namespace.as_deref() == Some(namespace) && e.metadata.name.as_deref() == Some(name))
    }
}
