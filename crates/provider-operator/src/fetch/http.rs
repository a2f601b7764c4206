//! HTTP release-directory fetch source: a base URL serving a release index
//! plus per-version manifest documents, in the shape clusterctl's own
//! GitHub-release layout uses. One `reqwest::Client`, explicit status
//! checks, typed errors.

use crate::util::errors::{Error, StdError};
use semver::Version;
use tracing::{info, warn};

pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

/// A parsed release index entry: everything needed to decide whether this
/// release satisfies a requested version constraint.
#[derive(Debug, Clone)]
pub struct ReleaseEntry {
    pub tag: String,
    pub version: Version,
    pub prerelease: bool,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }

    async fn get_text(&self, path: &str) -> Result<String, Error> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        info!("fetching release asset: {}", url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            Error::StdError(StdError::HttpError(format!("request to {url} failed: {e}")))
        })?;
        if !response.status().is_success() {
            return Err(Error::StdError(StdError::HttpError(format!(
                "{url} returned {}",
                response.status()
            ))));
        }
        response
            .text()
            .await
            .map_err(|e| Error::StdError(StdError::HttpError(format!("reading body of {url} failed: {e}"))))
    }

    /// Fetches the release index (one tag per line) and parses it into
    /// valid semver entries, discarding unparseable tags.
    pub async fn list_releases(&self) -> Result<Vec<ReleaseEntry>, Error> {
        let index = self.get_text("releases.txt").await?;
        Ok(parse_release_index(&index))
    }

    /// Resolves a requested version (or `None` for "latest") against the
    /// release index, preferring stable releases over pre-releases, and
    /// fetches that version's component manifest and metadata documents.
    pub async fn fetch_components(&self, requested: Option<&str>) -> Result<(String, String, String), Error> {
        let releases = self.list_releases().await?;
        let chosen = select_version(&releases, requested)
            .ok_or_else(|| Error::StdError(StdError::Fetch(format!("no release satisfies {requested:?}"))))?;
        let manifest = self.get_text(&format!("{}/components.yaml", chosen.tag)).await?;
        let metadata = self.get_text(&format!("{}/metadata.yaml", chosen.tag)).await.map_err(|e| {
            Error::StdError(StdError::MetadataMissing(format!(
                "{}/metadata.yaml: {e}", chosen.tag
            )))
        })?;
        Ok((chosen.tag.clone(), manifest, metadata))
    }
}

fn parse_release_index(index: &str) -> Vec<ReleaseEntry> {
    index
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|tag| {
            let trimmed = tag.trim_start_matches('v');
            match Version::parse(trimmed) {
                Ok(version) => {
                    let prerelease = !version.pre.is_empty();
                    Some(ReleaseEntry { tag: tag.to_string(), version, prerelease })
                }
                Err(e) => {
                    warn!("ignoring unparseable release tag {tag}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Selects the release matching `requested`, or the highest stable version
/// when `requested` is `None`. Pre-releases are only chosen when `requested`
/// names one explicitly or no stable release exists.
fn select_version<'a>(releases: &'a [ReleaseEntry], requested: Option<&str>) -> Option<&'a ReleaseEntry> {
    if let Some(requested) = requested {
        let wanted = requested.trim_start_matches('v');
        return releases.iter().find(|r| r.version.to_string() == wanted || r.tag == requested);
    }
    releases
        .iter()
        .filter(|r| !r.prerelease)
        .max_by(|a, b| a.version.cmp(&b.version))
        .or_else(|| releases.iter().max_by(|a, b| a.version.cmp(&b.version)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_semver_tags_ignoring_garbage() {
        let index = "v1.2.0\nnot-a-version\nv1.10.0\nv1.3.0-rc1\n";
        let releases = parse_release_index(index);
        assert_eq!(releases.len(), 3);
    }

    #[test]
    fn latest_prefers_stable_over_prerelease() {
        let releases = parse_release_index("v1.2.0\nv1.3.0-rc1\n");
        let chosen = select_version(&releases, None).unwrap();
        assert_eq!(chosen.tag, "v1.2.0");
    }

    #[test]
    fn latest_falls_back_to_prerelease_when_no_stable_exists() {
        let releases = parse_release_index("v1.3.0-rc1\n");
        let chosen = select_version(&releases, None).unwrap();
        assert_eq!(chosen.tag, "v1.3.0-rc1");
    }

    #[test]
    fn explicit_version_is_matched_exactly() {
        let releases = parse_release_index("v1.2.0\nv1.10.0\n");
        let chosen = select_version(&releases, Some("v1.2.0")).unwrap();
        assert_eq!(chosen.tag, "v1.2.0");
        assert!(select_version(&releases, Some("v9.9.9")).is_none());
    }
}
