//! The fetch layer: resolves a provider's `FetchConfiguration` into a
//! cached [`cache::Artifact`] of raw manifest documents, trying exactly one
//! of the three mutually-exclusive sources.

pub mod cache;
pub mod configmap;
pub mod http;
pub mod oci;

use crate::api::common::FetchConfiguration;
use crate::util::errors::{Error, StdError};
use cache::{Artifact, CacheKey, FetchCache};
use kube::Client;
use std::sync::Arc;

/// Fetches the component manifest for `config`, consulting `cache` first.
/// `requested_version` is `None` for "latest".
pub async fn fetch(
    client: Client,
    namespace: &str,
    cache: &FetchCache,
    config: &FetchConfiguration,
    requested_version: Option<&str>,
) -> Result<Arc<Artifact>, Error> {
    if config.set_count() != 1 {
        return Err(Error::StdError(StdError::Validation(format!(
            "fetchConfig must set exactly one of url/oci/selector, found {}",
            config.set_count()
        ))));
    }

    let source_key = source_key(config);
    let cache_key = CacheKey { source: source_key, version: requested_version.unwrap_or("latest").to_string() };
    if let Some(cached) = cache.get(&cache_key).await {
        return Ok(cached);
    }

    let artifact = if let Some(url) = &config.url {
        let fetcher = http::HttpFetcher::new(url);
        let (resolved_version, manifest, metadata) = fetcher.fetch_components(requested_version).await?;
        Artifact { version: resolved_version, documents: vec![manifest], metadata: Some(metadata) }
    } else if let Some(image) = &config.oci {
        let mut fetcher = oci::OciFetcher::new();
        let (metadata, documents) = fetcher.fetch_components(image).await?;
        Artifact { version: requested_version.unwrap_or("latest").to_string(), documents, metadata: Some(metadata) }
    } else if let Some(selector) = &config.selector {
        let (metadata, components) = configmap::fetch_labeled_documents(client, namespace, selector).await?;
        Artifact {
            version: requested_version.unwrap_or("latest").to_string(),
            documents: vec![components],
            metadata: Some(metadata),
        }
    } else {
        unreachable!("set_count() == 1 guarantees exactly one branch matched")
    };

    Ok(cache.insert(cache_key, artifact).await)
}

fn source_key(config: &FetchConfiguration) -> String {
    if let Some(url) = &config.url {
        format!("url:{url}")
    } else if let Some(oci) = &config.oci {
        format!("oci:{oci}")
    } else {
        format!("selector:{:?}", config.selector)
    }
}
