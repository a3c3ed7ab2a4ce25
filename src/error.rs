use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("record store unreadable: {0}")]
    StoreUnreadable(#[from] std::io::Error),
    #[error("record store corrupt: {0}")]
    StoreCorrupt(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("blob rejected: {0}")]
    BlobRejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorCode {
    E001StoreCorrupt,
    E002StoreWriteFailed,
    E003ReportWriteFailed,
    E004LockUnavailable,
    E005ReportDrift,
    E006StoreUnreadable,
}

impl LedgerErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001StoreCorrupt => "E001_STORE_CORRUPT",
            Self::E002StoreWriteFailed => "E002_STORE_WRITE_FAILED",
            Self::E003ReportWriteFailed => "E003_REPORT_WRITE_FAILED",
            Self::E004LockUnavailable => "E004_LOCK_UNAVAILABLE",
            Self::E005ReportDrift => "E005_REPORT_DRIFT",
            Self::E006StoreUnreadable => "E006_STORE_UNREADABLE",
        }
    }
}
