//! The patch engine: whole-document merge patches (stored schema) and
//! selector-targeted patches with body auto-detection (hub schema).

pub mod merge;
pub mod targeted;

use crate::api::common::Patch;
use crate::util::errors::Error;
use serde_json::Value;

pub fn apply_stored_patches(documents: &mut [Value], manifest_patches: &[String]) -> Result<(), Error> {
    merge::apply_merge_patches(documents, manifest_patches)
}

pub fn apply_hub_patches(documents: &mut [Value], patches: &[Patch]) -> Result<(), Error> {
    for patch in patches {
        targeted::apply_targeted_patch(documents, &patch.target, &patch.patch)?;
    }
    Ok(())
}
