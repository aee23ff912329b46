use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, ContainerStatus, Pod, PodSpec, PodStatus, Probe,
    ResourceRequirements, SecurityContext, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    let mut map = BTreeMap::new();
    map.insert("cpu".to_string(), Quantity(cpu.to_string()));
    map.insert("memory".to_string(), Quantity(memory.to_string()));
    map
}

/// A plain container, optionally with `(cpu, memory)` requests/limits.
pub fn make_container(name: &str, requests: Option<(&str, &str)>, limits: Option<(&str, &str)>) -> Container {
    Container {
        name: name.to_string(),
        resources: if requests.is_none() && limits.is_none() {
            None
        } else {
            Some(ResourceRequirements {
                requests: requests.map(|(c, m)| quantities(c, m)),
                limits: limits.map(|(c, m)| quantities(c, m)),
                ..Default::default()
            })
        },
        ..Default::default()
    }
}

pub fn make_container_with_port(name: &str, port: i32) -> Container {
    Container {
        name: name.to_string(),
        ports: Some(vec![ContainerPort { container_port: port, ..Default::default() }]),
        ..Default::default()
    }
}

/// A container matching the "privileged container" boundary scenario:
/// privileged, writable root filesystem, `NET_ADMIN` capability added.
pub fn make_privileged_container(name: &str) -> Container {
    Container {
        name: name.to_string(),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            read_only_root_filesystem: Some(false),
            run_as_non_root: Some(true),
            allow_privilege_escalation: Some(false),
            capabilities: Some(Capabilities {
                add: Some(vec!["NET_ADMIN".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn make_service_spec(port: i32, selector: BTreeMap<String, String>) -> ServiceSpec {
    ServiceSpec {
        selector: Some(selector),
        ports: Some(vec![ServicePort { port, ..Default::default() }]),
        ..Default::default()
    }
}

/// An ingress with a single rule/path backend per `(service, port)` in
/// `backends`, and an optional `ingressClassName`.
pub fn make_ingress(name: &str, namespace: &str, ingress_class: Option<&str>, backends: &[(&str, i32)]) -> Ingress {
    let paths = backends
        .iter()
        .map(|(service, port)| HTTPIngressPath {
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: service.to_string(),
                    port: Some(k8s_openapi::api::networking::v1::ServiceBackendPort {
                        number: Some(*port),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            },
            path: None,
            path_type: "Prefix".to_string(),
        })
        .collect();

    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: ingress_class.map(|s| s.to_string()),
            rules: if backends.is_empty() {
                None
            } else {
                Some(vec![IngressRule {
                    host: None,
                    http: Some(HTTPIngressRuleValue { paths }),
                }])
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn make_test_pod(
    name: &str,
    namespace: &str,
    image: &str,
    has_liveness: bool,
    has_readiness: bool,
    restart_count: i32,
    phase: &str,
) -> Pod {
    let probes = |has: bool| -> Option<Probe> {
        if has { Some(Probe::default()) } else { None }
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                image: Some(image.to_string()),
                liveness_probe: probes(has_liveness),
                readiness_probe: probes(has_readiness),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(vec![ContainerStatus {
                name: "main".to_string(),
                restart_count,
                ready: phase == "Running",
                image: image.to_string(),
                image_id: String::new(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}
