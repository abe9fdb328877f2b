use thiserror::Error;

/// Errors returned by the L2-FIB, policer registry, endpoint registry, and
/// TX pacer. One variant per error kind named in the data-plane contract;
/// none are swallowed, all are returned from the operation at its boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataplaneError {
    #[error("entry not found")]
    NotFound,

    #[error("name already exists")]
    Exists,

    #[error("interface mismatch on delete")]
    Mismatch,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("local endpoint already in use")]
    InUse,

    #[error("refcount already zero")]
    Busy,

    #[error("no source port available")]
    NoPort,

    #[error("no route to destination")]
    NoRoute,

    #[error("no resolving interface")]
    NoInterface,

    #[error("no IP address on resolving interface")]
    NoIp,

    #[error("unregistered transport or policer index")]
    NoRegistration,

    #[error("invalid worker index")]
    WorkerInvalid,

    #[error("hash table memory exhausted")]
    ResourceExhausted,
}

pub type Result<T> = std::result::Result<T, DataplaneError>;
