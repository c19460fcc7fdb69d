//! Cross-resource invariants checked before a resource is tracked.

use crate::config::ProjectConfig;
use crate::error::{KbError, Result};
use crate::resource::Resource;

/// True when `tracked` already pins a version other than `candidate`.
///
/// An empty set never conflicts: the first resource sets the project-wide value.
fn differs(tracked: &[String], candidate: &str) -> bool {
    match tracked {
        [] => false,
        [only] => only != candidate,
        _ => true,
    }
}

pub fn has_different_crd_version(cfg: &dyn ProjectConfig, candidate: &str) -> bool {
    differs(&cfg.list_crd_versions(), candidate)
}

pub fn has_different_webhook_version(cfg: &dyn ProjectConfig, candidate: &str) -> bool {
    differs(&cfg.list_webhook_versions(), candidate)
}

/// Single-group projects accept new groups only for types under a foreign domain.
fn check_group(cfg: &dyn ProjectConfig, res: &Resource) -> Result<()> {
    if cfg.is_multi_group() || cfg.resources_len() == 0 || cfg.has_group(&res.group) {
        return Ok(());
    }
    if res.domain != cfg.domain() {
        return Ok(());
    }
    Err(KbError::InvalidResource(format!(
        "group '{}' cannot be added: multiple groups are not allowed by default, \
         enable multigroup with 'kubebuilder edit --multigroup'",
        res.group
    )))
}

/// Validate a resource about to gain an API.
pub fn validate_new_api(cfg: &dyn ProjectConfig, res: &Resource) -> Result<()> {
    let gvk = res.gvk();
    if res.has_api() {
        if let Ok(existing) = cfg.get_resource(&gvk) {
            if existing.has_api() {
                return Err(KbError::DuplicateResource(gvk));
            }
        }
    }

    check_group(cfg, res)?;

    if let Some(api) = res.api.as_ref().filter(|a| !a.crd_version.is_empty()) {
        if has_different_crd_version(cfg, &api.crd_version) {
            return Err(KbError::InvalidResource(format!(
                "only one CRD version can be used for all resources, cannot add '{}' (project uses {:?})",
                api.crd_version,
                cfg.list_crd_versions()
            )));
        }
    }
    Ok(())
}

/// Validate a resource about to gain webhooks.
pub fn validate_new_webhook(cfg: &dyn ProjectConfig, res: &Resource) -> Result<()> {
    let Some(webhooks) = res.webhooks.as_ref().filter(|w| !w.is_empty()) else {
        return Err(KbError::InvalidResource(
            "at least one of defaulting, validation or conversion webhooks is required".into(),
        ));
    };

    let gvk = res.gvk();
    if let Ok(existing) = cfg.get_resource(&gvk) {
        let clash = (webhooks.defaulting && existing.has_defaulting_webhook())
            || (webhooks.validation && existing.has_validation_webhook())
            || (webhooks.conversion && existing.has_conversion_webhook());
        if clash {
            return Err(KbError::DuplicateResource(gvk));
        }
    } else if !res.external && !res.core {
        return Err(KbError::ResourceNotFound(gvk));
    }

    check_group(cfg, res)?;

    if !webhooks.webhook_version.is_empty()
        && has_different_webhook_version(cfg, &webhooks.webhook_version)
    {
        return Err(KbError::InvalidResource(format!(
            "only one webhook version can be used for all resources, cannot add '{}'",
            webhooks.webhook_version
        )));
    }
    Ok(())
}
