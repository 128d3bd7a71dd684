use std::time::{SystemTime, UNIX_EPOCH};

/// Bytes in one mebibyte, the unit of the throughput thresholds.
pub(crate) const MIB: f64 = (1024 * 1024) as f64;

/// Split a bundle id of the form `<namespace>/<range>` on the last `/`.
/// Namespaces may themselves contain slashes.
pub(crate) fn split_bundle_id(bundle: &str) -> Option<(&str, &str)> {
    match bundle.rsplit_once('/') {
        Some((namespace, range)) if !namespace.is_empty() && !range.is_empty() => {
            Some((namespace, range))
        }
        _ => None,
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bundle_id() {
        assert_eq!(
            split_bundle_id("ns1/0x40000000_0x80000000"),
            Some(("ns1", "0x40000000_0x80000000"))
        );
        assert_eq!(
            split_bundle_id("tenant/ns1/0x00000000_0x40000000"),
            Some(("tenant/ns1", "0x00000000_0x40000000"))
        );
    }

    #[test]
    fn test_split_bundle_id_malformed() {
        assert_eq!(split_bundle_id("no-separator"), None);
        assert_eq!(split_bundle_id("ns1/"), None);
        assert_eq!(split_bundle_id("/0x00_0x80"), None);
        assert_eq!(split_bundle_id(""), None);
    }
}
