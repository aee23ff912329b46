//! Shared traversal of `Deployment|StatefulSet|DaemonSet|Job|CronJob|Pod`.
//!
//! Reference, resource-limits, and security validators all need "every pod
//! spec in the cluster, together with the resource that should be reported
//! if something's wrong with it." A bare `Pod` reports itself; a pod spec
//! nested inside a controller's template reports the controller, never a
//! synthetic pod name (spec.md §4.2 edge case). Defining the traversal once
//! here keeps that rule in a single place instead of five validators
//! reimplementing it slightly differently.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Pod, PodSpec};

use crate::cluster::ClusterSnapshot;

/// A pod spec plus the identity of the resource that owns it, for reporting.
#[derive(Debug, Clone)]
pub struct PodSpecSource<'a> {
    pub kind: &'static str,
    pub name: String,
    pub namespace: String,
    pub spec: &'a PodSpec,
}

/// Extract every pod spec in the snapshot, tagged with its reportable owner.
pub fn extract_pod_templates(snapshot: &ClusterSnapshot) -> Vec<PodSpecSource<'_>> {
    let mut out = Vec::new();

    for pod in &snapshot.pods {
        if let Some(spec) = &pod.spec {
            out.push(PodSpecSource {
                kind: "Pod",
                name: pod.metadata.name.clone().unwrap_or_default(),
                namespace: pod.metadata.namespace.clone().unwrap_or_default(),
                spec,
            });
        }
    }

    for d in &snapshot.deployments {
        push_from_template(&mut out, "Deployment", d, |d: &Deployment| {
            d.spec.as_ref()?.template.spec.as_ref()
        });
    }
    for s in &snapshot.statefulsets {
        push_from_template(&mut out, "StatefulSet", s, |s: &StatefulSet| {
            s.spec.as_ref()?.template.spec.as_ref()
        });
    }
    for d in &snapshot.daemonsets {
        push_from_template(&mut out, "DaemonSet", d, |d: &DaemonSet| {
            d.spec.as_ref()?.template.spec.as_ref()
        });
    }
    for j in &snapshot.jobs {
        push_from_template(&mut out, "Job", j, |j: &Job| {
            j.spec.as_ref()?.template.spec.as_ref()
        });
    }
    for c in &snapshot.cronjobs {
        push_from_template(&mut out, "CronJob", c, |c: &CronJob| {
            c.spec.as_ref()?.job_template.spec.as_ref()?.template.spec.as_ref()
        });
    }

    out
}

fn push_from_template<'a, T, F>(
    out: &mut Vec<PodSpecSource<'a>>,
    kind: &'static str,
    resource: &'a T,
    get_spec: F,
) where
    T: k8s_openapi::Metadata<Ty = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta>,
    F: Fn(&'a T) -> Option<&'a PodSpec>,
{
    if let Some(spec) = get_spec(resource) {
        let meta = resource.metadata();
        out.push(PodSpecSource {
            kind,
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            spec,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClusterReader;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, StatefulSetSpec};
    use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

    fn pod_template(container_name: &str) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(ObjectMeta::default()),
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: container_name.to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_bare_pod_reports_itself() {
        let mut reader = FakeClusterReader::default();
        reader.add_pod("default", "standalone", |p| p);
        let snapshot = ClusterSnapshot::load(&reader).await.unwrap();
        let templates = extract_pod_templates(&snapshot);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].kind, "Pod");
        assert_eq!(templates[0].name, "standalone");
    }

    #[tokio::test]
    async fn test_deployment_template_reports_deployment_not_pod() {
        let mut reader = FakeClusterReader::default();
        reader.deployments.push(Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector::default(),
                template: pod_template("app"),
                ..Default::default()
            }),
            ..Default::default()
        });
        let snapshot = ClusterSnapshot::load(&reader).await.unwrap();
        let templates = extract_pod_templates(&snapshot);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].kind, "Deployment");
        assert_eq!(templates[0].name, "web");
    }

    #[tokio::test]
    async fn test_statefulset_template_extracted() {
        let mut reader = FakeClusterReader::default();
        reader.statefulsets.push(StatefulSet {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                selector: LabelSelector::default(),
                service_name: "db".to_string(),
                template: pod_template("db"),
                ..Default::default()
            }),
            ..Default::default()
        });
        let snapshot = ClusterSnapshot::load(&reader).await.unwrap();
        let templates = extract_pod_templates(&snapshot);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].kind, "StatefulSet");
    }

    #[tokio::test]
    async fn test_no_templates_on_empty_snapshot() {
        let reader = FakeClusterReader::default();
        let snapshot = ClusterSnapshot::load(&reader).await.unwrap();
        assert!(extract_pod_templates(&snapshot).is_empty());
    }

    #[tokio::test]
    async fn test_resource_without_spec_is_skipped() {
        let mut reader = FakeClusterReader::default();
        reader.deployments.push(Deployment {
            metadata: ObjectMeta {
                name: Some("broken".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: None,
            ..Default::default()
        });
        let snapshot = ClusterSnapshot::load(&reader).await.unwrap();
        assert!(extract_pod_templates(&snapshot).is_empty());
    }
}
