//! `name[:namespace[:version]]` argument grammar shared by the CLI's
//! `init`/`delete`/`upgrade apply` subcommands. Only the parsing contract
//! is in scope here; the subcommands themselves are external
//! collaborators.

use crate::util::errors::{Error, StdError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderArg {
    pub name: String,
    pub namespace: Option<String>,
    pub version: Option<String>,
}

impl ProviderArg {
    pub fn parse(raw: &str) -> Result<ProviderArg, Error> {
        let parts: Vec<&str> = raw.split(':').collect();
        match parts.as_slice() {
            [name] => Ok(ProviderArg {
                name: (*name).to_string(),
                namespace: None,
                version: None,
            }),
            [name, namespace] => Ok(ProviderArg {
                name: (*name).to_string(),
                namespace: Some((*namespace).to_string()),
                version: None,
            }),
            [name, namespace, version] => Ok(ProviderArg {
                name: (*name).to_string(),
                namespace: Some((*namespace).to_string()),
                version: Some((*version).to_string()),
            }),
            _ => Err(Error::StdError(StdError::InvalidArgument(format!(
                "provider argument `{raw}` must have at most 3 colon-separated parts"
            )))),
        }
    }
}
