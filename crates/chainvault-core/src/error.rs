use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("chain has no genesis record")]
    EmptyChain,

    #[error("chain for {0} already has a genesis record")]
    GenesisExists(String),

    #[error("digest length mismatch: {left} vs {right} bytes")]
    LengthMismatch { left: usize, right: usize },

    #[error("invalid key length: {actual} bytes (expected {expected})")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no chain for owner {0}")]
    ChainNotFound(String),

    #[error("no key pair registered for {0}")]
    KeyPairNotFound(String),

    #[error("recipient {0} has no registered key pair")]
    RecipientKeyMissing(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("integrity violation in chain {owner} at sequence {sequence}: {reason}")]
    IntegrityViolation {
        owner: String,
        sequence: u64,
        reason: String,
    },

    #[error("chain owner mismatch: expected {expected}, found {found}")]
    OwnerMismatch { expected: String, found: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// Tampering or wrong-key failures. Never retried.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            VaultError::Authentication(_) | VaultError::IntegrityViolation { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VaultError::FileNotFound(_)
                | VaultError::ChainNotFound(_)
                | VaultError::KeyPairNotFound(_)
                | VaultError::RecipientKeyMissing(_)
                | VaultError::RecordNotFound(_)
        )
    }
}
