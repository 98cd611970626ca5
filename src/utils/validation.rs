use crate::utils::error::{GeoError, Result};
use tokio::sync::Semaphore;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> GeoError {
    GeoError::InvalidConfigValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 供應商端點只接受 http / https
pub fn validate_url(field: &str, url: &str) -> Result<()> {
    let parsed = Url::parse(url).map_err(|e| invalid(field, url, format!("Invalid URL format: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(field, url, format!("Unsupported URL scheme: {}", scheme))),
    }
}

pub fn validate_path(field: &str, path: &str) -> Result<()> {
    if path.is_empty() || path.contains('\0') {
        return Err(invalid(field, path, "Path must be non-empty and free of null bytes"));
    }
    Ok(())
}

pub fn validate_file_extension(field: &str, file: &str, allowed: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(extension)) {
        return Ok(());
    }
    Err(invalid(
        field,
        file,
        format!("Expected a .{} file", allowed.join(" / .")),
    ))
}

pub fn validate_required_field<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| GeoError::MissingConfig {
        field: field.to_string(),
    })
}

pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(field: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(field, value, format!("Value must be between {} and {}", min, max)));
    }
    Ok(())
}

/// 供應商層級的並行上限與每秒上限，兩者都至少為 1
pub fn validate_limits(prefix: &str, max_concurrent: usize, max_per_second: usize) -> Result<()> {
    validate_range(
        &format!("{}max_concurrent", prefix),
        max_concurrent,
        1,
        Semaphore::MAX_PERMITS,
    )?;
    validate_range(
        &format!("{}max_per_second", prefix),
        max_per_second,
        1,
        usize::MAX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("providers.base_url", "https://brasilapi.com.br/api/cep/v2/").is_ok());
        assert!(validate_url("providers.base_url", "http://localhost:8080").is_ok());
        assert!(validate_url("providers.base_url", "").is_err());
        assert!(validate_url("providers.base_url", "invalid-url").is_err());
        assert!(validate_url("providers.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("input", "enderecos.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("input", "ENDERECOS.CSV", &["csv"]).is_ok());
        assert!(validate_file_extension("input", "enderecos.xls", &["csv"]).is_err());
        assert!(validate_file_extension("input", "enderecos", &["csv"]).is_err());
    }

    #[test]
    fn test_validate_limits() {
        assert!(validate_limits("", 5, 1).is_ok());
        let err = validate_limits("providers.scrape.", 0, 1).unwrap_err();
        assert!(matches!(
            err,
            GeoError::InvalidConfigValue { ref field, .. } if field == "providers.scrape.max_concurrent"
        ));
        assert!(validate_limits("", 1, 0).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("snapshot.json".to_string());
        let missing: Option<String> = None;
        assert!(validate_required_field("snapshot", &present).is_ok());
        assert!(matches!(
            validate_required_field("snapshot", &missing),
            Err(GeoError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_validate_path_and_strings() {
        assert!(validate_range("timeout_seconds", 60u64, 1, 600).is_ok());
        assert!(validate_range("timeout_seconds", 0u64, 1, 600).is_err());
        assert!(validate_path("output", "saida.csv").is_ok());
        assert!(validate_path("output", "sa\0ida.csv").is_err());
        assert!(validate_non_empty_string("key_column", "  ").is_err());
    }
}
