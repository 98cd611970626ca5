use crate::domain::model::{InvalidInput, Key};
use crate::utils::error::{GeoError, Result};
use std::collections::BTreeSet;

pub const KEY_LENGTH: usize = 8;

/// 去掉 `.` 與 `-`，左側補 0 到 8 碼
pub fn normalize(raw: &str) -> Result<Key> {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .collect();

    if stripped.is_empty() {
        return Err(invalid(raw, "empty after stripping separators"));
    }
    if let Some(bad) = stripped.chars().find(|c| !c.is_ascii_digit()) {
        return Err(invalid(raw, &format!("contains non-digit character '{}'", bad)));
    }
    if stripped.len() > KEY_LENGTH {
        return Err(invalid(
            raw,
            &format!("has {} digits, at most {} allowed", stripped.len(), KEY_LENGTH),
        ));
    }

    Ok(Key::from_normalized(format!(
        "{:0>width$}",
        stripped,
        width = KEY_LENGTH
    )))
}

/// 正規化並去重；無效輸入另外回報，不影響其他 key
pub fn normalize_all<'a, I>(raw_keys: I) -> (BTreeSet<Key>, Vec<InvalidInput>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keys = BTreeSet::new();
    let mut invalid = Vec::new();

    for raw in raw_keys {
        match normalize(raw) {
            Ok(key) => {
                keys.insert(key);
            }
            Err(GeoError::InvalidKey { raw, reason }) => {
                tracing::warn!("⚠️ Skipping invalid key '{}': {}", raw, reason);
                invalid.push(InvalidInput { raw, reason });
            }
            Err(other) => invalid.push(InvalidInput {
                raw: raw.to_string(),
                reason: other.to_string(),
            }),
        }
    }

    (keys, invalid)
}

fn invalid(raw: &str, reason: &str) -> GeoError {
    GeoError::InvalidKey {
        raw: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_separators() {
        assert_eq!(normalize("01.310-100").unwrap().as_str(), "01310100");
        assert_eq!(normalize("01310-100").unwrap().as_str(), "01310100");
    }

    #[test]
    fn test_left_pads_short_keys() {
        assert_eq!(normalize("1001000").unwrap().as_str(), "01001000");
        assert_eq!(normalize("1").unwrap().as_str(), "00000001");
    }

    #[test]
    fn test_is_idempotent() {
        for raw in ["01.310-100", "1001000", " 99999-999 ", "7"] {
            let once = normalize(raw).unwrap();
            let twice = normalize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(normalize("123456789"), Err(GeoError::InvalidKey { .. })));
        assert!(matches!(normalize("0131O100"), Err(GeoError::InvalidKey { .. })));
        assert!(matches!(normalize("--"), Err(GeoError::InvalidKey { .. })));
        assert!(matches!(normalize("01310 100"), Err(GeoError::InvalidKey { .. })));
    }

    #[test]
    fn test_dotted_format() {
        assert_eq!(normalize("1310100").unwrap().dotted(), "01.310-100");
    }

    #[test]
    fn test_normalize_all_dedupes_and_reports_invalid() {
        let (keys, invalid) =
            normalize_all(["01310-100", "01310100", "1001000", "abc"].into_iter());
        assert_eq!(keys.len(), 2);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].raw, "abc");
    }
}
