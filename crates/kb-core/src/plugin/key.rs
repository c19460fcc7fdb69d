//! Plugin keys: `<name>/<version>`, where the name is `<base>.<domain qualifier>`.

use crate::error::{KbError, Result};
use crate::resource::is_dns1123_subdomain;
use crate::version::PluginVersion;

/// Join a name and version into a key. An empty version yields the bare name.
pub fn key(name: &str, version: &str) -> String {
    if version.is_empty() {
        return name.to_string();
    }
    format!("{name}/v{}", version.trim_start_matches('v'))
}

/// Split a key into name and version; the version is empty when absent.
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once('/').unwrap_or((key, ""))
}

/// The part of a plugin name before its domain qualifier, e.g. `deploy-image`.
pub fn base_name(name: &str) -> &str {
    name.split_once('.').map_or(name, |(base, _)| base)
}

/// Names must be DNS-1123 subdomains; versions are optional on the command line.
pub fn validate_key(key: &str) -> Result<()> {
    let (name, version) = split_key(key);
    if !is_dns1123_subdomain(name) {
        return Err(KbError::InvalidPluginKey {
            key: key.to_string(),
            reason: format!("name '{name}' is not a valid DNS-1123 subdomain"),
        });
    }
    if !version.is_empty() {
        version.parse::<PluginVersion>().map_err(|_| KbError::InvalidPluginKey {
            key: key.to_string(),
            reason: format!("version '{version}' must look like v1, v2-alpha or v3-beta"),
        })?;
    }
    Ok(())
}

/// Pick the key under which a plugin stores its blob.
///
/// An exact match in the chain wins. Failing that, a chain entry with the same
/// base name and version under another domain (a bundle re-hosting the plugin)
/// is used. Otherwise the plugin's own key.
pub fn resolve_config_key(canonical: &str, chain: &[String]) -> String {
    if chain.iter().any(|k| k == canonical) {
        return canonical.to_string();
    }

    let (name, version) = split_key(canonical);
    let base = base_name(name);
    chain
        .iter()
        .find(|candidate| {
            let (c_name, c_version) = split_key(candidate);
            c_version == version && base_name(c_name) == base
        })
        .cloned()
        .unwrap_or_else(|| canonical.to_string())
}

/// Whether a user-supplied key (possibly without version, possibly a short
/// name) refers to the plugin with `canonical` key.
pub fn matches_key(query: &str, canonical: &str) -> bool {
    if query == canonical {
        return true;
    }
    let (q_name, q_version) = split_key(query);
    let (name, version) = split_key(canonical);
    let name_matches = q_name == name || (!q_name.contains('.') && q_name == base_name(name));
    name_matches && (q_version.is_empty() || q_version == version)
}
