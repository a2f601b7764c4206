//! The manifest renderer: variable substitution, namespace rewrite,
//! deployment/container overrides, patch application, and final
//! authoritative `ConfigMap` emission.

pub mod overrides;
pub mod pipeline;
pub mod variables;

pub use pipeline::{components_configmap, render, resolve_contract, RenderInput};
