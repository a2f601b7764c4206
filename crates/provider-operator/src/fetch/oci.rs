//! OCI artifact fetch source. Pulls a provider's component manifests from
//! an OCI registry the way `kubecfg-kubit`'s controller pulls packages:
//! resolve a `Reference`, obtain registry credentials, pull the manifest,
//! then pull each layer blob.

use crate::util::errors::{Error, StdError};
use docker_credential::DockerCredential;
use oci_distribution::{client::ClientConfig, manifest::OciManifest, secrets::RegistryAuth, Client, Reference};
use tracing::{info, warn};

/// The ORAS convention this fetcher relies on to tell the metadata layer
/// apart from the component manifest layers in an artifact with no other
/// structure than "a title on each layer".
const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";
const METADATA_LAYER_TITLE: &str = "metadata.yaml";

pub struct OciFetcher {
    client: Client,
}

impl Default for OciFetcher {
    fn default() -> Self {
        Self { client: Client::new(ClientConfig::default()) }
    }
}

impl OciFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn auth_for(reference: &Reference) -> RegistryAuth {
        match docker_credential::get_credential(reference.registry()) {
            Ok(DockerCredential::UsernamePassword(username, password)) => RegistryAuth::Basic(username, password),
            Ok(DockerCredential::IdentityToken(_)) => {
                warn!("identity-token credentials are not supported for OCI pulls; falling back to anonymous");
                RegistryAuth::Anonymous
            }
            Err(e) => {
                info!("no stored credential for {}: {e}; pulling anonymously", reference.registry());
                RegistryAuth::Anonymous
            }
        }
    }

    /// Pulls the named artifact and splits its layers into the
    /// `metadata.yaml`-titled layer and the remaining component-manifest
    /// layers, in manifest layer order.
    pub async fn fetch_components(&mut self, image: &str) -> Result<(String, Vec<String>), Error> {
        let reference: Reference = image
            .parse()
            .map_err(|e| Error::StdError(StdError::OciError(format!("invalid OCI reference {image}: {e}"))))?;
        let auth = Self::auth_for(&reference);

        let (manifest, _digest) = self
            .client
            .pull_manifest(&reference, &auth)
            .await
            .map_err(|e| Error::StdError(StdError::OciError(format!("pulling manifest for {image}: {e}"))))?;

        let manifest = match manifest {
            OciManifest::Image(manifest) => manifest,
            OciManifest::ImageIndex(_) => {
                return Err(Error::StdError(StdError::OciError(format!(
                    "{image} resolved to an image index, not a single artifact"
                ))))
            }
        };

        let mut metadata = None;
        let mut documents = Vec::with_capacity(manifest.layers.len());
        for layer in &manifest.layers {
            let mut buf = Vec::new();
            self.client
                .pull_blob(&reference, layer, &mut buf)
                .await
                .map_err(|e| Error::StdError(StdError::OciError(format!("pulling layer {}: {e}", layer.digest))))?;
            let text = String::from_utf8_lossy(&buf).into_owned();

            let title = layer.annotations.as_ref().and_then(|a| a.get(TITLE_ANNOTATION));
            if title.map(String::as_str) == Some(METADATA_LAYER_TITLE) {
                metadata = Some(text);
            } else {
                documents.push(text);
            }
        }

        let metadata = metadata.ok_or_else(|| {
            Error::StdError(StdError::MetadataMissing(format!(
                "{image} has no layer titled `{METADATA_LAYER_TITLE}`"
            )))
        })?;
        if documents.is_empty() {
            return Err(Error::StdError(StdError::OciError(format!(
                "{image} has no component manifest layers besides `{METADATA_LAYER_TITLE}`"
            ))));
        }
        Ok((metadata, documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_reference_is_rejected() {
        let reference: Result<Reference, _> = "not a valid ref!!".parse();
        assert!(reference.is_err());
    }
}
