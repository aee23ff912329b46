//! Image Validator — `KOGARO-IMG-xxx` (SPEC_FULL.md §4.7). Disabled by
//! default. Parses container image references against the canonical
//! `[registry[:port]/]repository[:tag][@digest]` grammar, then probes
//! registries for existence and architecture via injected probe traits so
//! tests never touch the network.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use regex::Regex;

use crate::errors::{codes, Severity, ValidationError};
use crate::registry::{ScanContext, Validator};
use crate::templates::extract_pod_templates;

const PROBE_CONCURRENCY: usize = 8;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

static IMAGE_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<registry>[\w.-]+(?::\d+)?)/)?(?P<repository>[a-z0-9._/-]+)(?::(?P<tag>[\w.-]+))?(?:@(?P<digest>[a-zA-Z0-9]+:[a-fA-F0-9]+))?$",
    )
    .expect("image reference pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

pub fn parse_image_ref(raw: &str) -> Option<ImageRef> {
    let caps = IMAGE_REF_PATTERN.captures(raw)?;
    let repository = caps.name("repository")?.as_str().to_string();
    if repository.is_empty() {
        return None;
    }
    let registry = caps.name("registry").map(|m| m.as_str().to_string()).unwrap_or_else(|| "docker.io".to_string());
    let tag = caps.name("tag").map(|m| m.as_str().to_string()).unwrap_or_else(|| "latest".to_string());
    Some(ImageRef { registry, repository, tag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    Missing,
    Skipped,
}

/// Checks whether an image reference resolves in its registry. A real
/// implementation issues a HEAD against `/v2/<name>/manifests/<ref>`;
/// tests substitute a deterministic fake.
pub trait ImageExistsProbe: Send + Sync {
    fn probe<'a>(&'a self, image: &'a ImageRef) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;
}

/// Checks whether an image's manifest covers the cluster's node
/// architecture(s).
pub trait ImageArchProbe: Send + Sync {
    fn probe<'a>(&'a self, image: &'a ImageRef, arch: &'a str) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;
}

/// An arch probe that always reports the image covers every architecture
/// (air-gapped/offline deployments wire this in to skip the check
/// entirely, per SPEC_FULL.md §4.7).
pub struct SkipArchProbe;

impl ImageArchProbe for SkipArchProbe {
    fn probe<'a>(&'a self, _image: &'a ImageRef, _arch: &'a str) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move { ProbeOutcome::Skipped })
    }
}

/// Probes a real OCI/Docker registry over HTTPS.
pub struct HttpExistsProbe {
    client: reqwest::Client,
}

impl Default for HttpExistsProbe {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder().timeout(PROBE_TIMEOUT).build().expect("reqwest client builds"),
        }
    }
}

impl ImageExistsProbe for HttpExistsProbe {
    fn probe<'a>(&'a self, image: &'a ImageRef) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("https://{}/v2/{}/manifests/{}", image.registry, image.repository, image.tag);
            let accept = "application/vnd.oci.image.index.v1+json, application/vnd.docker.distribution.manifest.list.v2+json, application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";
            match self.client.head(&url).header("Accept", accept).send().await {
                Ok(resp) if resp.status().is_success() => ProbeOutcome::Exists,
                Ok(resp) if resp.status().as_u16() == 404 => ProbeOutcome::Missing,
                _ => ProbeOutcome::Skipped,
            }
        })
    }
}

/// Probes a manifest list's `manifests[].platform.architecture` entries.
pub struct HttpArchProbe {
    client: reqwest::Client,
}

impl Default for HttpArchProbe {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder().timeout(PROBE_TIMEOUT).build().expect("reqwest client builds"),
        }
    }
}

impl ImageArchProbe for HttpArchProbe {
    fn probe<'a>(&'a self, image: &'a ImageRef, arch: &'a str) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("https://{}/v2/{}/manifests/{}", image.registry, image.repository, image.tag);
            let accept = "application/vnd.oci.image.index.v1+json, application/vnd.docker.distribution.manifest.list.v2+json";
            let Ok(resp) = self.client.get(&url).header("Accept", accept).send().await else {
                return ProbeOutcome::Skipped;
            };
            let Ok(body) = resp.json::<serde_json::Value>().await else {
                return ProbeOutcome::Skipped;
            };
            let Some(manifests) = body.get("manifests").and_then(|m| m.as_array()) else {
                return ProbeOutcome::Skipped;
            };
            let covers = manifests
                .iter()
                .filter_map(|m| m.get("platform")?.get("architecture")?.as_str())
                .any(|a| a == arch);
            if covers {
                ProbeOutcome::Exists
            } else {
                ProbeOutcome::Missing
            }
        })
    }
}

pub struct ImageValidator {
    exists_probe: Box<dyn ImageExistsProbe>,
    arch_probe: Box<dyn ImageArchProbe>,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self {
            exists_probe: Box::new(HttpExistsProbe::default()),
            arch_probe: Box::new(HttpArchProbe::default()),
        }
    }
}

impl ImageValidator {
    pub fn with_probe(probe: Box<dyn ImageExistsProbe>) -> Self {
        Self { exists_probe: probe, arch_probe: Box::new(SkipArchProbe) }
    }

    pub fn with_probes(exists_probe: Box<dyn ImageExistsProbe>, arch_probe: Box<dyn ImageArchProbe>) -> Self {
        Self { exists_probe, arch_probe }
    }
}

impl Validator for ImageValidator {
    fn name(&self) -> &'static str {
        "image"
    }

    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.check(ctx).await) })
    }
}

impl ImageValidator {
    async fn check(&self, ctx: &ScanContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !ctx.config.enable_image_validation {
            return errors;
        }

        struct Work {
            kind: &'static str,
            name: String,
            namespace: String,
            container: String,
            raw_ref: String,
        }

        let mut work = Vec::new();
        for template in extract_pod_templates(&ctx.snapshot) {
            for container in &template.spec.containers {
                work.push(Work {
                    kind: template.kind,
                    name: template.name.clone(),
                    namespace: template.namespace.clone(),
                    container: container.name.clone(),
                    raw_ref: container.image.clone().unwrap_or_default(),
                });
            }
        }

        let mut cache: HashMap<ImageRef, ProbeOutcome> = HashMap::new();
        let mut to_probe = Vec::new();

        for item in &work {
            match parse_image_ref(&item.raw_ref) {
                None => {
                    errors.push(ValidationError::new(
                        item.kind,
                        &item.name,
                        &item.namespace,
                        "invalid_image_reference",
                        format!("container '{}' has unparseable image reference '{}'", item.container, item.raw_ref),
                        Severity::Error,
                        codes::image::INVALID_IMAGE_REFERENCE,
                    ));
                }
                Some(image_ref) => {
                    if !cache.contains_key(&image_ref) {
                        to_probe.push(image_ref);
                    }
                }
            }
        }

        to_probe.dedup();
        let probe = &self.exists_probe;
        let probed: Vec<(ImageRef, ProbeOutcome)> = stream::iter(to_probe.into_iter())
            .map(|image_ref| async move {
                let outcome = probe.probe(&image_ref).await;
                (image_ref, outcome)
            })
            .buffer_unordered(PROBE_CONCURRENCY)
            .collect()
            .await;
        cache.extend(probed);

        for item in &work {
            let Some(image_ref) = parse_image_ref(&item.raw_ref) else { continue };
            match cache.get(&image_ref) {
                Some(ProbeOutcome::Missing) => {
                    let (check, severity, code) = if ctx.config.allow_missing_images {
                        ("missing_image_warning", Severity::Warning, codes::image::MISSING_IMAGE_WARNING)
                    } else {
                        ("missing_image", Severity::Error, codes::image::MISSING_IMAGE)
                    };
                    errors.push(ValidationError::new(
                        item.kind,
                        &item.name,
                        &item.namespace,
                        check,
                        format!("container '{}' image '{}' was not found in its registry", item.container, item.raw_ref),
                        severity,
                        code,
                    ));
                }
                Some(ProbeOutcome::Exists) | Some(ProbeOutcome::Skipped) | None => {}
            }
        }

        let architectures: Vec<String> = {
            let mut archs: Vec<String> = ctx
                .snapshot
                .nodes
                .iter()
                .filter_map(|n| n.status.as_ref()?.node_info.as_ref().map(|i| i.architecture.clone()))
                .collect();
            archs.sort();
            archs.dedup();
            archs
        };

        if !architectures.is_empty() {
            let existing_refs: Vec<ImageRef> = cache
                .iter()
                .filter(|(_, outcome)| **outcome == ProbeOutcome::Exists)
                .map(|(image_ref, _)| image_ref.clone())
                .collect();

            let mut arch_cache: HashMap<(ImageRef, String), ProbeOutcome> = HashMap::new();
            for image_ref in &existing_refs {
                for arch in &architectures {
                    let outcome = self.arch_probe.probe(image_ref, arch).await;
                    arch_cache.insert((image_ref.clone(), arch.clone()), outcome);
                }
            }

            for item in &work {
                let Some(image_ref) = parse_image_ref(&item.raw_ref) else { continue };
                if cache.get(&image_ref) != Some(&ProbeOutcome::Exists) {
                    continue;
                }
                for arch in &architectures {
                    if arch_cache.get(&(image_ref.clone(), arch.clone())) == Some(&ProbeOutcome::Missing) {
                        let (check, severity, code) = if ctx.config.allow_architecture_mismatch {
                            ("architecture_mismatch_warning", Severity::Warning, codes::image::ARCHITECTURE_MISMATCH_WARNING)
                        } else {
                            ("architecture_mismatch", Severity::Error, codes::image::ARCHITECTURE_MISMATCH)
                        };
                        errors.push(ValidationError::new(
                            item.kind,
                            &item.name,
                            &item.namespace,
                            check,
                            format!("container '{}' image '{}' has no manifest for node architecture '{arch}'", item.container, item.raw_ref),
                            severity,
                            code,
                        ));
                    }
                }
            }
        }

        errors
    }
}
