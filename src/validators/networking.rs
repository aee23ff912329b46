//! Networking Validator — `KOGARO-NET-xxx` (SPEC_FULL.md §4.8). Verifies
//! the Service → Endpoints → Pod chain and the Ingress → Service chain, and
//! flags NetworkPolicy coverage gaps.

use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::core::v1::Pod;

use crate::cluster::ClusterSnapshot;
use crate::errors::{codes, Severity, ValidationError};
use crate::registry::{ScanContext, Validator};

pub struct NetworkingValidator;

impl Validator for NetworkingValidator {
    fn name(&self) -> &'static str {
        "networking"
    }

    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>> {
        Box::pin(async move { Ok(check(ctx)) })
    }
}

fn pod_matches_selector(pod: &Pod, selector: &std::collections::BTreeMap<String, String>) -> bool {
    if selector.is_empty() {
        return false;
    }
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn check(ctx: &ScanContext) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !ctx.config.enable_networking_validation {
        return errors;
    }
    let snapshot = &ctx.snapshot;

    for service in &snapshot.services {
        let name = service.metadata.name.clone().unwrap_or_default();
        let namespace = service.metadata.namespace.clone().unwrap_or_default();
        let Some(spec) = &service.spec else { continue };
        let selector = spec.selector.clone().unwrap_or_default();

        if !selector.is_empty() {
            let matching_pods: Vec<&Pod> = snapshot
                .pods
                .iter()
                .filter(|p| p.metadata.namespace.as_deref() == Some(namespace.as_str()) && pod_matches_selector(p, &selector))
                .collect();

            if matching_pods.is_empty() {
                errors.push(ValidationError::new(
                    "Service",
                    &name,
                    &namespace,
                    "service_selector_mismatch",
                    "service selector matches no pods in its namespace",
                    Severity::Warning,
                    codes::networking::SERVICE_SELECTOR_MISMATCH,
                ));
            }

            for port in spec.ports.iter().flatten() {
                let target_matches = matching_pods.iter().any(|pod| {
                    pod.spec.as_ref().is_some_and(|pod_spec| {
                        pod_spec.containers.iter().any(|c| {
                            c.ports.iter().flatten().any(|cp| cp.container_port == port.port)
                        })
                    })
                });
                if !matching_pods.is_empty() && !target_matches {
                    errors.push(ValidationError::new(
                        "Service",
                        &name,
                        &namespace,
                        "service_port_mismatch",
                        format!("service port {} does not match any backing pod's containerPort", port.port),
                        Severity::Warning,
                        codes::networking::SERVICE_PORT_MISMATCH,
                    ));
                }
            }
        }

        let endpoints_empty = match snapshot.endpoints_for(&namespace, &name) {
            Some(ep) => ep.subsets.as_ref().is_none_or(|subsets| {
                subsets.iter().all(|s| s.addresses.as_ref().is_none_or(|a| a.is_empty()))
            }),
            None => true,
        };
        if !selector.is_empty() && endpoints_empty {
            errors.push(ValidationError::new(
                "Service",
                &name,
                &namespace,
                "service_no_endpoints",
                "service has no ready endpoints",
                Severity::Warning,
                codes::networking::SERVICE_NO_ENDPOINTS,
            ));
        }
    }

    if ctx.config.warn_unexposed_pods {
        for pod in &snapshot.pods {
            let namespace = pod.metadata.namespace.clone().unwrap_or_default();
            let name = pod.metadata.name.clone().unwrap_or_default();
            if ctx.config.is_system_namespace(&namespace) || ctx.config.is_unexposed_pod_name(&name) {
                continue;
            }
            let has_batch_owner = pod
                .metadata
                .owner_references
                .iter()
                .flatten()
                .any(|owner| ctx.config.is_batch_owner_kind(&owner.kind));
            if has_batch_owner {
                continue;
            }
            let labels = pod.metadata.labels.clone().unwrap_or_default();
            let has_service = snapshot.services.iter().any(|svc| {
                svc.metadata.namespace.as_deref() == Some(namespace.as_str())
                    && svc.spec.as_ref().and_then(|s| s.selector.as_ref()).is_some_and(|sel| {
                        !sel.is_empty() && sel.iter().all(|(k, v)| labels.get(k) == Some(v))
                    })
            });
            if !has_service {
                errors.push(ValidationError::new(
                    "Pod",
                    &name,
                    &namespace,
                    "pod_no_service",
                    "pod is not selected by any service",
                    Severity::Warning,
                    codes::networking::POD_NO_SERVICE,
                ));
            }
        }
    }

    for ingress in &snapshot.ingresses {
        let name = ingress.metadata.name.clone().unwrap_or_default();
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let Some(spec) = &ingress.spec else { continue };

        for rule in spec.rules.iter().flatten() {
            let Some(http) = &rule.http else { continue };
            for path in &http.paths {
                let Some(backend) = &path.backend.service else { continue };
                match snapshot.find_service(&namespace, &backend.name) {
                    None => errors.push(ValidationError::new(
                        "Ingress",
                        &name,
                        &namespace,
                        "ingress_service_missing",
                        format!("backend service '{}' does not exist", backend.name),
                        Severity::Error,
                        codes::networking::INGRESS_SERVICE_MISSING,
                    )),
                    Some(service) => {
                        if let Some(backend_port) = &backend.port {
                            let service_has_port = service
                                .spec
                                .as_ref()
                                .and_then(|s| s.ports.as_ref())
                                .is_some_and(|ports| {
                                    ports.iter().any(|p| {
                                        backend_port.number.is_some_and(|n| n == p.port)
                                            || backend_port.name.as_deref().is_some_and(|pn| Some(pn) == p.name.as_deref())
                                    })
                                });
                            if !service_has_port {
                                errors.push(ValidationError::new(
                                    "Ingress",
                                    &name,
                                    &namespace,
                                    "ingress_service_port_mismatch",
                                    format!("backend service '{}' has no matching port", backend.name),
                                    Severity::Error,
                                    codes::networking::INGRESS_SERVICE_PORT_MISMATCH,
                                ));
                            }
                        }

                        let ep_empty = match snapshot.endpoints_for(&namespace, &backend.name) {
                            Some(ep) => ep.subsets.as_ref().is_none_or(|subsets| {
                                subsets.iter().all(|s| s.addresses.as_ref().is_none_or(|a| a.is_empty()))
                            }),
                            None => true,
                        };
                        if ep_empty {
                            errors.push(ValidationError::new(
                                "Ingress",
                                &name,
                                &namespace,
                                "ingress_no_backend_pods",
                                format!("backend service '{}' has no backing pods", backend.name),
                                Severity::Warning,
                                codes::networking::INGRESS_NO_BACKEND_PODS,
                            ));
                        }
                    }
                }
            }
        }
    }

    errors.extend(check_network_policies(snapshot, ctx.config.as_ref()));

    errors
}

fn check_network_policies(snapshot: &ClusterSnapshot, config: &crate::config::SharedConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for np in &snapshot.network_policies {
        let name = np.metadata.name.clone().unwrap_or_default();
        let namespace = np.metadata.namespace.clone().unwrap_or_default();
        let Some(spec) = &np.spec else { continue };

        let selector = spec.pod_selector.match_labels.clone().unwrap_or_default();
        if !selector.is_empty() {
            let matches_any = snapshot
                .pods
                .iter()
                .any(|p| p.metadata.namespace.as_deref() == Some(namespace.as_str()) && pod_matches_selector(p, &selector));
            if !matches_any {
                errors.push(ValidationError::new(
                    "NetworkPolicy",
                    &name,
                    &namespace,
                    "network_policy_orphaned",
                    "podSelector matches no pods in its namespace",
                    Severity::Info,
                    codes::networking::NETWORK_POLICY_ORPHANED,
                ));
            }
        }
    }

    for namespace in &snapshot.namespaces {
        let ns_name = namespace.metadata.name.clone().unwrap_or_default();
        if !config.is_networking_required_namespace(&ns_name) {
            continue;
        }
        let ns_policies: Vec<_> = snapshot
            .network_policies
            .iter()
            .filter(|np| np.metadata.namespace.as_deref() == Some(ns_name.as_str()))
            .collect();
        if ns_policies.is_empty() {
            continue;
        }
        let has_default_deny = ns_policies.iter().any(|np| {
            np.spec.as_ref().is_some_and(|spec| {
                let selects_all = spec.pod_selector.match_labels.as_ref().is_none_or(|m| m.is_empty())
                    && spec.pod_selector.match_expressions.as_ref().is_none_or(|m| m.is_empty());
                let denies_both = spec.policy_types.as_ref().is_some_and(|types| {
                    types.iter().any(|t| t == "Ingress") && types.iter().any(|t| t == "Egress")
                });
                selects_all && denies_both
            })
        });
        if !has_default_deny {
            errors.push(ValidationError::new(
                "Namespace",
                &ns_name,
                &ns_name,
                "missing_network_policy_default_deny",
                format!("namespace '{ns_name}' requires a default-deny NetworkPolicy but has none"),
                Severity::Error,
                codes::networking::MISSING_NETWORK_POLICY_DEFAULT_DENY,
            ));
        }
    }

    errors
}
