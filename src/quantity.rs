//! Canonicalization of Kubernetes resource quantities: CPU into milliCPU,
//! memory into bytes. Unparseable quantities return `None` rather than
//! erroring — this reads live cluster data, a malformed request/limit is a
//! fact about the resource, not a bug in Kogaro.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Parse a CPU quantity (`"100m"`, `"1"`, `"0.5"`) into milliCPU.
pub fn parse_cpu_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(digits) = raw.strip_suffix('m') {
        return digits.parse::<f64>().ok().map(|m| m.round() as i64);
    }
    raw.parse::<f64>().ok().map(|cores| (cores * 1000.0).round() as i64)
}

/// Parse a memory quantity (`"128Mi"`, `"1Gi"`, `"500000000"`, `"2M"`) into
/// bytes, honoring both the binary (`Ki Mi Gi Ti Pi Ei`) and decimal
/// (`k M G T P E`) suffix families from the Kubernetes quantity grammar.
pub fn parse_memory_bytes(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const BINARY_SUFFIXES: &[(&str, f64)] = &[
        ("Ei", 1024f64.powi(6)),
        ("Pi", 1024f64.powi(5)),
        ("Ti", 1024f64.powi(4)),
        ("Gi", 1024f64.powi(3)),
        ("Mi", 1024f64.powi(2)),
        ("Ki", 1024f64),
    ];
    const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
        ("E", 1e18),
        ("P", 1e15),
        ("T", 1e12),
        ("G", 1e9),
        ("M", 1e6),
        ("k", 1e3),
    ];

    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(digits) = raw.strip_suffix(suffix) {
            return digits.parse::<f64>().ok().map(|n| (n * multiplier).round() as i64);
        }
    }
    for (suffix, multiplier) in DECIMAL_SUFFIXES {
        if let Some(digits) = raw.strip_suffix(suffix) {
            return digits.parse::<f64>().ok().map(|n| (n * multiplier).round() as i64);
        }
    }
    raw.parse::<f64>().ok().map(|n| n.round() as i64)
}

pub fn cpu_millis(q: &Quantity) -> Option<i64> {
    parse_cpu_millis(&q.0)
}

pub fn memory_bytes(q: &Quantity) -> Option<i64> {
    parse_memory_bytes(&q.0)
}
