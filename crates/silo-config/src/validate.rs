//! Validation helpers applied while resolving a [`crate::SiloConfig`].

use crate::error::ConfigError;

pub(crate) fn ensure_positive(value: usize, field: &'static str) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            message: "must be positive".to_string(),
        });
    }
    Ok(value)
}

pub(crate) fn ensure_nonempty(value: String, field: &'static str) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

pub(crate) fn ensure_template_has_placeholder(
    template: String,
    field: &'static str,
) -> Result<String, ConfigError> {
    if !template.contains("{payload_hash}") {
        return Err(ConfigError::InvalidField {
            field,
            message: "must contain a '{payload_hash}' placeholder".to_string(),
        });
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_concurrency() {
        assert!(ensure_positive(0, "hash_concurrency").is_err());
    }

    #[test]
    fn rejects_template_missing_placeholder() {
        assert!(
            ensure_template_has_placeholder("/cold/data".to_string(), "pool_payload_root_template")
                .is_err()
        );
    }

    #[test]
    fn accepts_template_with_placeholder() {
        assert!(ensure_template_has_placeholder(
            "/cold/data/{payload_hash}".to_string(),
            "pool_payload_root_template"
        )
        .is_ok());
    }
}
