//! Deployment and endpoint naming derived from model ids.

use crate::constants::{DEFAULT_MODEL_TAG, DEPLOYMENT_NAME_PREFIX};

/// Restrict a string to `[a-zA-Z][-a-zA-Z0-9]*`: underscores and dots
/// become hyphens, anything else invalid is dropped, and leading
/// non-alphabetic characters are stripped.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let ch = match ch {
            '_' | '.' => '-',
            other => other,
        };
        if out.is_empty() {
            if ch.is_ascii_alphabetic() {
                out.push(ch);
            }
        } else if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        }
    }
    out
}

/// The deployment name a model/tag pair maps to. The default tag is left
/// out of the name.
pub fn deployment_name(model_id: &str, model_tag: &str) -> String {
    let id_with_tag = if !model_tag.is_empty() && model_tag != DEFAULT_MODEL_TAG {
        format!("{model_id}-{model_tag}")
    } else {
        model_id.to_string()
    };
    format!(
        "{}-{}",
        DEPLOYMENT_NAME_PREFIX,
        normalize(&id_with_tag).to_lowercase()
    )
}

/// Path the framework shim serves a deployment's invocations under.
pub fn invocation_path(model_id: &str, model_tag: &str) -> String {
    format!("/{model_id}/{model_tag}/invocations")
}
