//! Upload size and total storage limits.

use serde::Serialize;
use utoipa::ToSchema;

use crate::config::QuotaConfig;
use crate::{CloudboxError, Result};

const GIB: u64 = 1024 * 1024 * 1024;

/// Default largest single file.
pub const MAX_FILE_SIZE: u64 = 100 * GIB;

/// Default ceiling on the sum of all file sizes.
pub const STORAGE_LIMIT: u64 = 100 * GIB;

/// Usage report served by `GET /api/storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageSummary {
    /// Bytes in use.
    pub used: u64,
    /// Storage limit in bytes.
    pub total: u64,
    /// Bytes still free, never negative.
    pub available: u64,
}

/// Limits checked by the request layer before it writes to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    pub max_file_size: u64,
    pub storage_limit: u64,
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            storage_limit: STORAGE_LIMIT,
        }
    }
}

impl From<&QuotaConfig> for StorageQuota {
    fn from(config: &QuotaConfig) -> Self {
        Self {
            max_file_size: config.max_file_size_bytes,
            storage_limit: config.storage_limit_bytes,
        }
    }
}

impl StorageQuota {
    /// Check a new file of `size` bytes against the limits, given `used` bytes.
    pub fn check_upload(&self, used: u64, size: u64) -> Result<()> {
        self.check_file_size(size)?;
        if used.saturating_add(size) > self.storage_limit {
            return Err(CloudboxError::QuotaExceeded(
                "Storage limit exceeded".to_string(),
            ));
        }
        Ok(())
    }

    /// Check replacing a payload of `old_size` bytes with one of `new_size`.
    pub fn check_replace(&self, used: u64, old_size: u64, new_size: u64) -> Result<()> {
        self.check_file_size(new_size)?;
        let after = used.saturating_sub(old_size).saturating_add(new_size);
        if new_size > old_size && after > self.storage_limit {
            return Err(CloudboxError::QuotaExceeded(
                "Storage limit exceeded".to_string(),
            ));
        }
        Ok(())
    }

    fn check_file_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(CloudboxError::QuotaExceeded("File too large".to_string()));
        }
        Ok(())
    }

    /// Usage report for `used` bytes.
    pub fn summary(&self, used: u64) -> StorageSummary {
        StorageSummary {
            used,
            total: self.storage_limit,
            available: self.storage_limit.saturating_sub(used),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StorageQuota {
        StorageQuota {
            max_file_size: 50,
            storage_limit: 100,
        }
    }

    #[test]
    fn test_defaults() {
        let quota = StorageQuota::default();
        assert_eq!(quota.max_file_size, 107_374_182_400);
        assert_eq!(quota.storage_limit, 107_374_182_400);
    }

    #[test]
    fn test_check_upload_file_too_large() {
        let result = small().check_upload(0, 51);
        match result {
            Err(CloudboxError::QuotaExceeded(msg)) => assert_eq!(msg, "File too large"),
            other => panic!("Expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_check_upload_limit_boundary() {
        assert!(small().check_upload(50, 50).is_ok());
        match small().check_upload(51, 50) {
            Err(CloudboxError::QuotaExceeded(msg)) => assert_eq!(msg, "Storage limit exceeded"),
            other => panic!("Expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_check_replace() {
        // 90 used, of which 40 belong to the file being replaced
        assert!(small().check_replace(90, 40, 50).is_ok());
        assert!(small().check_replace(90, 10, 30).is_err());
        assert!(small().check_replace(90, 40, 51).is_err());
        // Shrinking is always allowed, even when already over the limit
        assert!(small().check_replace(120, 40, 10).is_ok());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            small().summary(30),
            StorageSummary {
                used: 30,
                total: 100,
                available: 70
            }
        );
        assert_eq!(small().summary(130).available, 0);
    }

    #[test]
    fn test_from_config() {
        let config = QuotaConfig {
            max_file_size_bytes: 1,
            storage_limit_bytes: 2,
        };
        let quota = StorageQuota::from(&config);
        assert_eq!(quota.max_file_size, 1);
        assert_eq!(quota.storage_limit, 2);
    }
}
