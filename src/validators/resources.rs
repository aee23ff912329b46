//! Resource Limits Validator — `KOGARO-RES-xxx` (SPEC_FULL.md §4.5).
//! Flags containers missing requests/limits, requests below the configured
//! floor, and the derived Kubernetes QoS class.

use std::future::Future;
use std::pin::Pin;

use crate::errors::{codes, Severity, ValidationError};
use crate::quantity::{cpu_millis, memory_bytes};
use crate::registry::{ScanContext, Validator};
use crate::templates::extract_pod_templates;

pub struct ResourceLimitsValidator;

impl Validator for ResourceLimitsValidator {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>> {
        Box::pin(async move { Ok(check(ctx)) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QosClass {
    Guaranteed,
    Burstable,
    BestEffort,
}

fn check(ctx: &ScanContext) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !ctx.config.enable_resource_validation {
        return errors;
    }

    for template in extract_pod_templates(&ctx.snapshot) {
        let mut any_requests = false;
        let mut any_limits = false;
        let mut all_requests_and_limits_equal = !template.spec.containers.is_empty();

        for container in &template.spec.containers {
            let requests = container.resources.as_ref().and_then(|r| r.requests.as_ref());
            let limits = container.resources.as_ref().and_then(|r| r.limits.as_ref());

            if requests.is_none() {
                errors.push(ValidationError::new(
                    template.kind,
                    &template.name,
                    &template.namespace,
                    "missing_resource_requests",
                    format!("container '{}' has no resource requests", container.name),
                    Severity::Warning,
                    codes::resources::MISSING_RESOURCE_REQUESTS,
                ));
            } else {
                any_requests = true;
            }

            if limits.is_none() {
                errors.push(ValidationError::new(
                    template.kind,
                    &template.name,
                    &template.namespace,
                    "missing_resource_limits",
                    format!("container '{}' has no resource limits", container.name),
                    Severity::Warning,
                    codes::resources::MISSING_RESOURCE_LIMITS,
                ));
            } else {
                any_limits = true;
            }

            if let Some(requests) = requests {
                if let Some(min_cpu) = ctx.config.min_cpu_request_millis() {
                    let actual = requests.get("cpu").and_then(cpu_millis);
                    if actual.is_none_or(|m| m < min_cpu) {
                        errors.push(ValidationError::new(
                            template.kind,
                            &template.name,
                            &template.namespace,
                            "insufficient_cpu_request",
                            format!("container '{}' CPU request below floor of {min_cpu}m", container.name),
                            Severity::Error,
                            codes::resources::INSUFFICIENT_CPU_REQUEST,
                        ));
                    }
                }
                if let Some(min_mem) = ctx.config.min_memory_request_bytes() {
                    let actual = requests.get("memory").and_then(memory_bytes);
                    if actual.is_none_or(|b| b < min_mem) {
                        errors.push(ValidationError::new(
                            template.kind,
                            &template.name,
                            &template.namespace,
                            "insufficient_memory_request",
                            format!("container '{}' memory request below floor of {min_mem} bytes", container.name),
                            Severity::Error,
                            codes::resources::INSUFFICIENT_MEMORY_REQUEST,
                        ));
                    }
                }
            }

            let requests_eq_limits = match (requests, limits) {
                (Some(req), Some(lim)) => {
                    req.get("cpu").and_then(cpu_millis) == lim.get("cpu").and_then(cpu_millis)
                        && req.get("memory").and_then(memory_bytes) == lim.get("memory").and_then(memory_bytes)
                }
                _ => false,
            };
            if !requests_eq_limits {
                all_requests_and_limits_equal = false;
            }
        }

        let qos = if !any_requests && !any_limits {
            QosClass::BestEffort
        } else if all_requests_and_limits_equal {
            QosClass::Guaranteed
        } else {
            QosClass::Burstable
        };

        match qos {
            QosClass::BestEffort => errors.push(ValidationError::new(
                template.kind,
                &template.name,
                &template.namespace,
                "qos_class_issue",
                "pod has BestEffort QoS: no container sets requests or limits, so it can be killed first under pressure".to_string(),
                Severity::Error,
                codes::resources::QOS_CLASS_ISSUE,
            )),
            QosClass::Burstable => errors.push(ValidationError::new(
                template.kind,
                &template.name,
                &template.namespace,
                "qos_class_issue",
                "pod has Burstable QoS: requests and limits differ, so it may face throttling".to_string(),
                Severity::Warning,
                codes::resources::QOS_CLASS_ISSUE,
            )),
            QosClass::Guaranteed => {}
        }
    }

    errors
}
