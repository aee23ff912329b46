//! The finding record (`ValidationError`) and its structured error codes.
//!
//! A `ValidationError` is plain data, never raised as a Rust `Error` across
//! a component boundary — it only ever flows through a validator's return
//! value into the state tracker, the metrics fabric, and the logs.

use std::fmt;

/// Severity discriminates user-visible gravity. Fixed per check, except
/// where an explicit `allow_*` flag downgrades it (see the image validator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// A reference to another resource, used for `ValidationError::related`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// One finding. `(namespace, kind, name, check)` is the identity tuple used
/// everywhere downstream — see [`crate::state::StateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub check: String,
    pub message: String,
    pub severity: Severity,
    pub code: String,
    pub remediation: Option<String>,
    pub related: Vec<ResourceRef>,
    /// The pattern or value a well-formed resource would have had, for the
    /// `expected_pattern` metric label (spec.md §4.7). Empty when a check
    /// has no single expected value to quote (e.g. "this reference must
    /// point at something that exists" rather than "must match X").
    pub expected_pattern: String,
}

impl ValidationError {
    /// Construct a finding. Panics if `code` does not match
    /// `KOGARO-[A-Z]+-\d{3}` — every call site passes a `const` code from
    /// one of the `codes` modules below, so this is a programmer-error
    /// guard, not a runtime validation path.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        check: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        code: impl Into<String>,
    ) -> Self {
        let code = code.into();
        assert!(
            is_well_formed_code(&code),
            "malformed finding code: {code}"
        );
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            check: check.into(),
            message: message.into(),
            severity,
            code,
            remediation: None,
            related: Vec::new(),
            expected_pattern: String::new(),
        }
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn with_related(mut self, related: Vec<ResourceRef>) -> Self {
        self.related = related;
        self
    }

    pub fn with_expected_pattern(mut self, expected_pattern: impl Into<String>) -> Self {
        self.expected_pattern = expected_pattern.into();
        self
    }
}

/// `KOGARO-<DOMAIN>-<NNN>` where `<DOMAIN>` is all-uppercase ASCII letters
/// and `<NNN>` is exactly three digits. No regex crate needed for a check
/// this narrow — a hand-rolled scan keeps it obvious and allocation-free.
pub fn is_well_formed_code(code: &str) -> bool {
    let Some(rest) = code.strip_prefix("KOGARO-") else {
        return false;
    };
    let Some((domain, digits)) = rest.rsplit_once('-') else {
        return false;
    };
    !domain.is_empty()
        && domain.chars().all(|c| c.is_ascii_uppercase())
        && digits.len() == 3
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// Stable, versioned error codes, one module per validator domain.
pub mod codes {
    pub mod reference {
        pub const DANGLING_INGRESS_CLASS: &str = "KOGARO-REF-001";
        pub const DANGLING_SERVICE_REFERENCE: &str = "KOGARO-REF-002";
        pub const DANGLING_TLS_SECRET: &str = "KOGARO-REF-003";
        pub const DANGLING_CONFIGMAP_VOLUME: &str = "KOGARO-REF-004";
        pub const DANGLING_CONFIGMAP_ENVFROM: &str = "KOGARO-REF-005";
        pub const DANGLING_SECRET_VOLUME: &str = "KOGARO-REF-006";
        pub const DANGLING_SECRET_ENVFROM: &str = "KOGARO-REF-007";
        pub const DANGLING_SECRET_ENV: &str = "KOGARO-REF-008";
        pub const DANGLING_PVC_REFERENCE: &str = "KOGARO-REF-009";
        pub const DANGLING_STORAGE_CLASS: &str = "KOGARO-REF-010";
        pub const DANGLING_SERVICE_ACCOUNT: &str = "KOGARO-REF-011";
    }

    pub mod resources {
        pub const MISSING_RESOURCE_REQUESTS: &str = "KOGARO-RES-001";
        pub const MISSING_RESOURCE_LIMITS: &str = "KOGARO-RES-002";
        pub const INSUFFICIENT_CPU_REQUEST: &str = "KOGARO-RES-003";
        pub const INSUFFICIENT_MEMORY_REQUEST: &str = "KOGARO-RES-004";
        pub const QOS_CLASS_ISSUE: &str = "KOGARO-RES-005";
    }

    pub mod security {
        pub const MISSING_POD_SECURITY_CONTEXT: &str = "KOGARO-SEC-001";
        pub const POD_RUNNING_AS_ROOT: &str = "KOGARO-SEC-002";
        pub const POD_ALLOWS_ROOT_USER: &str = "KOGARO-SEC-003";
        pub const MISSING_CONTAINER_SECURITY_CONTEXT: &str = "KOGARO-SEC-004";
        pub const CONTAINER_RUNNING_AS_ROOT: &str = "KOGARO-SEC-005";
        pub const CONTAINER_ALLOWS_PRIVILEGE_ESCALATION: &str = "KOGARO-SEC-006";
        pub const CONTAINER_PRIVILEGED_MODE: &str = "KOGARO-SEC-007";
        pub const CONTAINER_WRITABLE_ROOT_FILESYSTEM: &str = "KOGARO-SEC-008";
        pub const CONTAINER_ADDITIONAL_CAPABILITIES: &str = "KOGARO-SEC-009";
        pub const SERVICEACCOUNT_CLUSTER_ROLE_BINDING: &str = "KOGARO-SEC-010";
        pub const SERVICEACCOUNT_EXCESSIVE_PERMISSIONS: &str = "KOGARO-SEC-011";
        pub const MISSING_NETWORK_POLICY_REQUIRED: &str = "KOGARO-SEC-012";
    }

    pub mod image {
        pub const INVALID_IMAGE_REFERENCE: &str = "KOGARO-IMG-001";
        pub const MISSING_IMAGE: &str = "KOGARO-IMG-002";
        pub const MISSING_IMAGE_WARNING: &str = "KOGARO-IMG-003";
        pub const ARCHITECTURE_MISMATCH: &str = "KOGARO-IMG-004";
        pub const ARCHITECTURE_MISMATCH_WARNING: &str = "KOGARO-IMG-005";
    }

    pub mod networking {
        pub const SERVICE_SELECTOR_MISMATCH: &str = "KOGARO-NET-001";
        pub const SERVICE_NO_ENDPOINTS: &str = "KOGARO-NET-002";
        pub const SERVICE_PORT_MISMATCH: &str = "KOGARO-NET-003";
        pub const POD_NO_SERVICE: &str = "KOGARO-NET-004";
        pub const INGRESS_SERVICE_MISSING: &str = "KOGARO-NET-005";
        pub const INGRESS_SERVICE_PORT_MISMATCH: &str = "KOGARO-NET-006";
        pub const INGRESS_NO_BACKEND_PODS: &str = "KOGARO-NET-007";
        pub const NETWORK_POLICY_ORPHANED: &str = "KOGARO-NET-008";
        pub const MISSING_NETWORK_POLICY_DEFAULT_DENY: &str = "KOGARO-NET-009";
    }
}
