//! Reference Validator — `KOGARO-REF-xxx` (SPEC_FULL.md §4.4). Flags
//! references to objects that do not exist: ingress classes, TLS secrets,
//! backend services, configmap/secret volumes and env sources, PVCs,
//! storage classes, and service accounts.

use std::future::Future;
use std::pin::Pin;

use crate::errors::{codes, Severity, ValidationError};
use crate::registry::{ScanContext, Validator};
use crate::templates::extract_pod_templates;

pub struct ReferenceValidator;

impl Validator for ReferenceValidator {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>> {
        Box::pin(async move { Ok(check(ctx)) })
    }
}

fn check(ctx: &ScanContext) -> Vec<ValidationError> {
    let snapshot = &ctx.snapshot;
    let mut errors = Vec::new();

    for ingress in &snapshot.ingresses {
        let name = ingress.metadata.name.clone().unwrap_or_default();
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let Some(spec) = &ingress.spec else { continue };

        if let Some(class) = &spec.ingress_class_name {
            if snapshot.find_ingress_class(class).is_none() {
                errors.push(
                    ValidationError::new(
                        "Ingress",
                        &name,
                        &namespace,
                        "dangling_ingress_class",
                        format!("ingressClassName '{class}' does not exist"),
                        Severity::Error,
                        codes::reference::DANGLING_INGRESS_CLASS,
                    )
                    .with_remediation("create the IngressClass or fix ingressClassName"),
                );
            }
        }

        for tls in spec.tls.iter().flatten() {
            if let Some(secret_name) = &tls.secret_name {
                if snapshot.find_secret(&namespace, secret_name).is_none() {
                    errors.push(ValidationError::new(
                        "Ingress",
                        &name,
                        &namespace,
                        "dangling_tls_secret",
                        format!("tls secretName '{secret_name}' does not exist in namespace '{namespace}'"),
                        Severity::Error,
                        codes::reference::DANGLING_TLS_SECRET,
                    ));
                }
            }
        }

        for rule in spec.rules.iter().flatten() {
            let Some(http) = &rule.http else { continue };
            for path in &http.paths {
                if let Some(service) = &path.backend.service {
                    if snapshot.find_service(&namespace, &service.name).is_none() {
                        errors.push(ValidationError::new(
                            "Ingress",
                            &name,
                            &namespace,
                            "dangling_service_reference",
                            format!("backend service '{}' does not exist in namespace '{namespace}'", service.name),
                            Severity::Error,
                            codes::reference::DANGLING_SERVICE_REFERENCE,
                        ));
                    }
                }
            }
        }
    }

    for pvc in &snapshot.pvcs {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        let namespace = pvc.metadata.namespace.clone().unwrap_or_default();
        if let Some(spec) = &pvc.spec {
            if let Some(class) = &spec.storage_class_name {
                if !class.is_empty() && snapshot.find_storage_class(class).is_none() {
                    errors.push(ValidationError::new(
                        "PersistentVolumeClaim",
                        &name,
                        &namespace,
                        "dangling_storage_class",
                        format!("storageClassName '{class}' does not exist"),
                        Severity::Error,
                        codes::reference::DANGLING_STORAGE_CLASS,
                    ));
                }
            }
        }
    }

    for template in extract_pod_templates(snapshot) {
        let namespace = &template.namespace;
        let owner = (template.kind, template.name.as_str());

        if let Some(sa) = &template.spec.service_account_name {
            if sa != ctx.config.default_service_account() && snapshot.find_service_account(namespace, sa).is_none() {
                errors.push(ValidationError::new(
                    owner.0,
                    owner.1,
                    namespace,
                    "dangling_service_account",
                    format!("serviceAccountName '{sa}' does not exist in namespace '{namespace}'"),
                    Severity::Error,
                    codes::reference::DANGLING_SERVICE_ACCOUNT,
                ));
            }
        }

        for volume in template.spec.volumes.iter().flatten() {
            if let Some(cm) = &volume.config_map {
                let cm_name = cm.name.clone().unwrap_or_default();
                if snapshot.find_configmap(namespace, &cm_name).is_none() {
                    errors.push(ValidationError::new(
                        owner.0,
                        owner.1,
                        namespace,
                        "dangling_configmap_volume",
                        format!("volume references configMap '{cm_name}' which does not exist"),
                        Severity::Error,
                        codes::reference::DANGLING_CONFIGMAP_VOLUME,
                    ));
                }
            }
            if let Some(secret) = &volume.secret {
                let secret_name = secret.secret_name.clone().unwrap_or_default();
                if snapshot.find_secret(namespace, &secret_name).is_none() {
                    errors.push(ValidationError::new(
                        owner.0,
                        owner.1,
                        namespace,
                        "dangling_secret_volume",
                        format!("volume references secret '{secret_name}' which does not exist"),
                        Severity::Error,
                        codes::reference::DANGLING_SECRET_VOLUME,
                    ));
                }
            }
            if let Some(pvc_source) = &volume.persistent_volume_claim {
                if snapshot.find_pvc(namespace, &pvc_source.claim_name).is_none() {
                    errors.push(ValidationError::new(
                        owner.0,
                        owner.1,
                        namespace,
                        "dangling_pvc_reference",
                        format!("volume references PVC '{}' which does not exist", pvc_source.claim_name),
                        Severity::Error,
                        codes::reference::DANGLING_PVC_REFERENCE,
                    ));
                }
            }
        }

        for container in &template.spec.containers {
            for env_from in container.env_from.iter().flatten() {
                if let Some(cm) = &env_from.config_map_ref {
                    let cm_name = cm.name.clone().unwrap_or_default();
                    if snapshot.find_configmap(namespace, &cm_name).is_none() {
                        errors.push(ValidationError::new(
                            owner.0,
                            owner.1,
                            namespace,
                            "dangling_configmap_envfrom",
                            format!("envFrom references configMap '{cm_name}' which does not exist"),
                            Severity::Error,
                            codes::reference::DANGLING_CONFIGMAP_ENVFROM,
                        ));
                    }
                }
                if let Some(secret) = &env_from.secret_ref {
                    let secret_name = secret.name.clone().unwrap_or_default();
                    if snapshot.find_secret(namespace, &secret_name).is_none() {
                        errors.push(ValidationError::new(
                            owner.0,
                            owner.1,
                            namespace,
                            "dangling_secret_envfrom",
                            format!("envFrom references secret '{secret_name}' which does not exist"),
                            Severity::Error,
                            codes::reference::DANGLING_SECRET_ENVFROM,
                        ));
                    }
                }
            }

            for env in container.env.iter().flatten() {
                if let Some(value_from) = &env.value_from {
                    if let Some(secret_ref) = &value_from.secret_key_ref {
                        let secret_name = secret_ref.name.clone().unwrap_or_default();
                        if snapshot.find_secret(namespace, &secret_name).is_none() {
                            errors.push(ValidationError::new(
                                owner.0,
                                owner.1,
                                namespace,
                                "dangling_secret_env",
                                format!("env '{}' references secret '{secret_name}' which does not exist", env.name),
                                Severity::Error,
                                codes::reference::DANGLING_SECRET_ENV,
                            ));
                        }
                    }
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterSnapshot;
    use crate::config::SharedConfig;
    use crate::testing::FakeClusterReader;
    use k8s_openapi::api::core::v1::{
        ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, SecretKeySelector, SecretVolumeSource, Volume,
    };
    use std::sync::Arc;

    fn ctx(reader: &FakeClusterReader) -> ScanContext {
        let snapshot = futures::executor::block_on(ClusterSnapshot::load(reader)).unwrap();
        ScanContext {
            snapshot,
            config: Arc::new(SharedConfig::builder().build()),
            now: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_dangling_configmap_volume_detected() {
        let mut reader = FakeClusterReader::default();
        reader.add_pod("default", "web", |mut p| {
            p.spec.as_mut().unwrap().volumes = Some(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some("missing-config".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
            p
        });
        let errors = check(&ctx(&reader));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::reference::DANGLING_CONFIGMAP_VOLUME);
    }

    #[test]
    fn test_configmap_volume_with_existing_configmap_is_clean() {
        let mut reader = FakeClusterReader::default();
        reader.configmaps.push(k8s_openapi::api::core::v1::ConfigMap {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("present".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        reader.add_pod("default", "web", |mut p| {
            p.spec.as_mut().unwrap().volumes = Some(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: Some("present".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
            p
        });
        assert!(check(&ctx(&reader)).is_empty());
    }

    #[test]
    fn test_dangling_secret_volume_detected() {
        let mut reader = FakeClusterReader::default();
        reader.add_pod("default", "web", |mut p| {
            p.spec.as_mut().unwrap().volumes = Some(vec![Volume {
                name: "tls".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some("missing-secret".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
            p
        });
        let errors = check(&ctx(&reader));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::reference::DANGLING_SECRET_VOLUME);
    }

    #[test]
    fn test_dangling_secret_env_detected() {
        let mut reader = FakeClusterReader::default();
        reader.add_pod("default", "web", |mut p| {
            p.spec.as_mut().unwrap().containers = vec![Container {
                name: "app".to_string(),
                env: Some(vec![EnvVar {
                    name: "TOKEN".to_string(),
                    value_from: Some(EnvVarSource {
                        secret_key_ref: Some(SecretKeySelector {
                            name: Some("missing".to_string()),
                            key: "token".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }];
            p
        });
        let errors = check(&ctx(&reader));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::reference::DANGLING_SECRET_ENV);
    }

    #[test]
    fn test_controller_template_reports_controller_not_pod() {
        use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
        use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};

        let mut reader = FakeClusterReader::default();
        reader.deployments.push(Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector::default(),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta::default()),
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: "config".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: Some("missing".to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        containers: vec![Container { name: "app".to_string(), ..Default::default() }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        });
        let errors = check(&ctx(&reader));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, "Deployment");
        assert_eq!(errors[0].name, "web");
    }

    #[test]
    fn test_dangling_ingress_class_detected() {
        use k8s_openapi::api::networking::v1::{Ingress, IngressSpec};
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

        let mut reader = FakeClusterReader::default();
        reader.ingresses.push(Ingress {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some("missing-class".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let errors = check(&ctx(&reader));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, codes::reference::DANGLING_INGRESS_CLASS);
    }

    #[test]
    fn test_clean_cluster_yields_no_findings() {
        let reader = FakeClusterReader::default();
        assert!(check(&ctx(&reader)).is_empty());
    }
}
