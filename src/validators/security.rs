//! Security Validator — `KOGARO-SEC-xxx` (SPEC_FULL.md §4.6). Pod and
//! container `securityContext` posture, RBAC transitive reach for pod
//! service accounts, and required-namespace NetworkPolicy presence.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, Subject};

use crate::cluster::ClusterSnapshot;
use crate::errors::{codes, Severity, ValidationError};
use crate::registry::{ScanContext, Validator};
use crate::templates::extract_pod_templates;

pub struct SecurityValidator;

impl Validator for SecurityValidator {
    fn name(&self) -> &'static str {
        "security"
    }

    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>> {
        Box::pin(async move { Ok(check(ctx)) })
    }
}

fn check(ctx: &ScanContext) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !ctx.config.enable_security_validation {
        return errors;
    }
    let snapshot = &ctx.snapshot;

    for template in extract_pod_templates(snapshot) {
        if ctx.config.is_system_namespace(&template.namespace) {
            continue;
        }
        let kind = template.kind;
        let name = &template.name;
        let namespace = &template.namespace;

        match &template.spec.security_context {
            None => errors.push(ValidationError::new(
                kind, name, namespace, "missing_pod_security_context",
                "pod has no securityContext", Severity::Warning,
                codes::security::MISSING_POD_SECURITY_CONTEXT,
            )),
            Some(psc) => {
                if psc.run_as_user == Some(0) {
                    errors.push(ValidationError::new(
                        kind, name, namespace, "pod_running_as_root",
                        "pod securityContext sets runAsUser: 0", Severity::Error,
                        codes::security::POD_RUNNING_AS_ROOT,
                    ));
                }
                if psc.run_as_non_root != Some(true) {
                    errors.push(ValidationError::new(
                        kind, name, namespace, "pod_allows_root_user",
                        "pod securityContext does not set runAsNonRoot: true", Severity::Warning,
                        codes::security::POD_ALLOWS_ROOT_USER,
                    ));
                }
            }
        }

        for container in &template.spec.containers {
            match &container.security_context {
                None => errors.push(ValidationError::new(
                    kind, name, namespace, "missing_container_security_context",
                    format!("container '{}' has no securityContext", container.name), Severity::Warning,
                    codes::security::MISSING_CONTAINER_SECURITY_CONTEXT,
                )),
                Some(sc) => {
                    if sc.run_as_user == Some(0) {
                        errors.push(ValidationError::new(
                            kind, name, namespace, "container_running_as_root",
                            format!("container '{}' sets runAsUser: 0", container.name), Severity::Error,
                            codes::security::CONTAINER_RUNNING_AS_ROOT,
                        ));
                    }
                    if sc.allow_privilege_escalation != Some(false) {
                        errors.push(ValidationError::new(
                            kind, name, namespace, "container_allows_privilege_escalation",
                            format!("container '{}' does not set allowPrivilegeEscalation: false", container.name),
                            Severity::Warning,
                            codes::security::CONTAINER_ALLOWS_PRIVILEGE_ESCALATION,
                        ));
                    }
                    if sc.privileged == Some(true) {
                        errors.push(ValidationError::new(
                            kind, name, namespace, "container_privileged_mode",
                            format!("container '{}' runs in privileged mode", container.name), Severity::Error,
                            codes::security::CONTAINER_PRIVILEGED_MODE,
                        ));
                    }
                    if sc.read_only_root_filesystem != Some(true) {
                        errors.push(ValidationError::new(
                            kind, name, namespace, "container_writable_root_filesystem",
                            format!("container '{}' does not set readOnlyRootFilesystem: true", container.name),
                            Severity::Warning,
                            codes::security::CONTAINER_WRITABLE_ROOT_FILESYSTEM,
                        ));
                    }
                    if let Some(caps) = &sc.capabilities {
                        if caps.add.as_ref().is_some_and(|add| !add.is_empty()) {
                            errors.push(ValidationError::new(
                                kind, name, namespace, "container_additional_capabilities",
                                format!("container '{}' adds Linux capabilities", container.name), Severity::Warning,
                                codes::security::CONTAINER_ADDITIONAL_CAPABILITIES,
                            ));
                        }
                    }
                }
            }
        }

    }

    for required_namespace in ctx.config.security_required_namespaces() {
        let has_policy = snapshot
            .network_policies
            .iter()
            .any(|np| np.metadata.namespace.as_deref() == Some(required_namespace));
        if !has_policy {
            errors.push(ValidationError::new(
                "Namespace", required_namespace, required_namespace,
                "missing_network_policy_required",
                format!("namespace '{required_namespace}' requires a NetworkPolicy but has none"),
                Severity::Error,
                codes::security::MISSING_NETWORK_POLICY_REQUIRED,
            ));
        }
    }

    errors.extend(check_service_account_rbac(snapshot, ctx.config.default_service_account()));

    errors
}

fn subject_matches(subject: &Subject, namespace: &str, service_account: &str) -> bool {
    subject.kind == "ServiceAccount"
        && subject.name == service_account
        && subject.namespace.as_deref() == Some(namespace)
}

fn role_bindings_for(role_bindings: &[RoleBinding], namespace: &str, service_account: &str) -> Vec<String> {
    role_bindings
        .iter()
        .filter(|rb| rb.metadata.namespace.as_deref() == Some(namespace))
        .filter(|rb| rb.subjects.iter().flatten().any(|s| subject_matches(s, namespace, service_account)))
        .map(|rb| rb.role_ref.name.clone())
        .collect()
}

fn cluster_role_bindings_for(bindings: &[ClusterRoleBinding], namespace: &str, service_account: &str) -> Vec<String> {
    bindings
        .iter()
        .filter(|crb| crb.subjects.iter().flatten().any(|s| subject_matches(s, namespace, service_account)))
        .map(|crb| crb.role_ref.name.clone())
        .collect()
}

/// For every distinct `(namespace, serviceAccountName)` pair used by a pod
/// template, flag any ClusterRoleBinding reach and any binding to a role
/// whose rules grant `"*"` resources/verbs (spec.md §4.4 "RBAC transitive
/// reach").
fn check_service_account_rbac(snapshot: &ClusterSnapshot, default_sa: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for template in extract_pod_templates(snapshot) {
        let sa = template
            .spec
            .service_account_name
            .clone()
            .unwrap_or_else(|| default_sa.to_string());
        if sa == default_sa {
            continue;
        }
        let key = (template.namespace.clone(), sa.clone());
        if !seen.insert(key) {
            continue;
        }

        let cluster_roles = cluster_role_bindings_for(&snapshot.cluster_role_bindings, &template.namespace, &sa);
        for role_name in cluster_roles.iter().filter(|r| r.as_str() == "cluster-admin") {
            errors.push(ValidationError::new(
                template.kind,
                &template.name,
                &template.namespace,
                "serviceaccount_cluster_role_binding",
                format!("serviceAccount '{sa}' is bound to ClusterRole '{role_name}' via a ClusterRoleBinding"),
                Severity::Warning,
                codes::security::SERVICEACCOUNT_CLUSTER_ROLE_BINDING,
            ));
        }

        let namespaced_roles = role_bindings_for(&snapshot.role_bindings, &template.namespace, &sa);
        let is_excessive_role = |role_name: &str| {
            role_name == "cluster-admin" || role_name == "admin" || role_name == "edit" || role_name.contains('*')
        };
        let excessive = namespaced_roles.iter().any(|r| is_excessive_role(r))
            || cluster_roles.iter().any(|r| is_excessive_role(r));

        if excessive {
            errors.push(ValidationError::new(
                template.kind,
                &template.name,
                &template.namespace,
                "serviceaccount_excessive_permissions",
                format!("serviceAccount '{sa}' is bound to an overly broad role"),
                Severity::Warning,
                codes::security::SERVICEACCOUNT_EXCESSIVE_PERMISSIONS,
            ));
        }
    }

    errors
}
