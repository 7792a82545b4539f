//! Storage usage estimation and byte formatting.

use crate::repo::kv_repo::KvBackend;
use log::warn;
use serde::Serialize;

/// Best-effort usage snapshot of the durable medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEstimate {
    pub used_bytes: u64,
    /// `None` when the medium exposes no capacity.
    pub available_bytes: Option<u64>,
}

impl StorageEstimate {
    /// Percentage of capacity in use; `None` without a known capacity.
    pub fn usage_percentage(&self) -> Option<f64> {
        let available = self.available_bytes?;
        let total = self.used_bytes + available;
        if total == 0 {
            return Some(0.0);
        }
        Some(self.used_bytes as f64 * 100.0 / total as f64)
    }
}

/// Estimates used and available bytes of `backend`.
///
/// Never fails: a backend read error is logged and reported as zero usage
/// with unknown availability.
pub fn estimate_usage<B: KvBackend + ?Sized>(backend: &B) -> StorageEstimate {
    match backend.used_bytes() {
        Ok(used_bytes) => StorageEstimate {
            used_bytes,
            available_bytes: backend
                .capacity_bytes()
                .map(|capacity| capacity.saturating_sub(used_bytes)),
        },
        Err(err) => {
            warn!(
                "event=quota_estimate module=quota status=error error={}",
                err
            );
            StorageEstimate {
                used_bytes: 0,
                available_bytes: None,
            }
        }
    }
}

/// Formats `bytes` with base-1024 units and up to `decimals` places.
///
/// Trailing zeros are dropped: `1536` becomes `"1.5 KB"`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let mut text = format!("{scaled:.decimals$}");
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{text} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::{estimate_usage, format_bytes, StorageEstimate};
    use crate::repo::kv_repo::{KvBackend, MemoryKvBackend};

    #[test]
    fn format_bytes_matches_human_readable_units() {
        assert_eq!(format_bytes(0, 2), "0 Bytes");
        assert_eq!(format_bytes(512, 2), "512 Bytes");
        assert_eq!(format_bytes(1536, 2), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024, 2), "1 MB");
        assert_eq!(format_bytes(1_234_567, 2), "1.18 MB");
    }

    #[test]
    fn estimate_reports_available_only_with_capacity() {
        let mut unbounded = MemoryKvBackend::new();
        unbounded.set("k", "v").unwrap();
        assert_eq!(
            estimate_usage(&unbounded),
            StorageEstimate {
                used_bytes: 2,
                available_bytes: None
            }
        );

        let mut bounded = MemoryKvBackend::with_capacity(100);
        bounded.set("k", "v").unwrap();
        let estimate = estimate_usage(&bounded);
        assert_eq!(estimate.available_bytes, Some(98));
        assert_eq!(estimate.usage_percentage(), Some(2.0));
    }
}
