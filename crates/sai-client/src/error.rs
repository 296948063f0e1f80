//! SAI status codes and the error type returned by every device call.

use std::fmt;
use thiserror::Error;

/// `sai_status_t` values.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    BufferOverflow = -8,
    InvalidPortNumber = -9,
    InvalidPortMember = -10,
    InvalidVlanId = -11,
    Uninitialized = -12,
    TableFull = -13,
    MandatoryAttributeMissing = -14,
    NotImplemented = -15,
    AddrNotFound = -16,
    ObjectInUse = -17,
    InvalidObjectType = -18,
    InvalidObjectId = -19,
    InvalidAttribute = -24,
}

impl SaiStatus {
    const ALL: [SaiStatus; 21] = [
        SaiStatus::Success,
        SaiStatus::Failure,
        SaiStatus::NotSupported,
        SaiStatus::NoMemory,
        SaiStatus::InsufficientResources,
        SaiStatus::InvalidParameter,
        SaiStatus::ItemAlreadyExists,
        SaiStatus::ItemNotFound,
        SaiStatus::BufferOverflow,
        SaiStatus::InvalidPortNumber,
        SaiStatus::InvalidPortMember,
        SaiStatus::InvalidVlanId,
        SaiStatus::Uninitialized,
        SaiStatus::TableFull,
        SaiStatus::MandatoryAttributeMissing,
        SaiStatus::NotImplemented,
        SaiStatus::AddrNotFound,
        SaiStatus::ObjectInUse,
        SaiStatus::InvalidObjectType,
        SaiStatus::InvalidObjectId,
        SaiStatus::InvalidAttribute,
    ];

    /// Unknown codes collapse to `Failure`.
    pub fn from_raw(status: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| *s as i32 == status)
            .unwrap_or(SaiStatus::Failure)
    }

    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    pub fn into_result(self) -> SaiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SaiError::from_status(self))
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SaiStatus::Success => "SUCCESS",
            SaiStatus::Failure => "FAILURE",
            SaiStatus::NotSupported => "NOT_SUPPORTED",
            SaiStatus::NoMemory => "NO_MEMORY",
            SaiStatus::InsufficientResources => "INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "ITEM_NOT_FOUND",
            SaiStatus::BufferOverflow => "BUFFER_OVERFLOW",
            SaiStatus::InvalidPortNumber => "INVALID_PORT_NUMBER",
            SaiStatus::InvalidPortMember => "INVALID_PORT_MEMBER",
            SaiStatus::InvalidVlanId => "INVALID_VLAN_ID",
            SaiStatus::Uninitialized => "UNINITIALIZED",
            SaiStatus::TableFull => "TABLE_FULL",
            SaiStatus::MandatoryAttributeMissing => "MANDATORY_ATTRIBUTE_MISSING",
            SaiStatus::NotImplemented => "NOT_IMPLEMENTED",
            SaiStatus::AddrNotFound => "ADDR_NOT_FOUND",
            SaiStatus::ObjectInUse => "OBJECT_IN_USE",
            SaiStatus::InvalidObjectType => "INVALID_OBJECT_TYPE",
            SaiStatus::InvalidObjectId => "INVALID_OBJECT_ID",
            SaiStatus::InvalidAttribute => "INVALID_ATTRIBUTE",
        }
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SAI_STATUS_{}", self.name())
    }
}

/// Error returned by a [`crate::SaiClient`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// Non-success status with no more specific mapping.
    #[error("SAI operation failed: {status}")]
    Status { status: SaiStatus },

    #[error("not supported: {feature}")]
    NotSupported { feature: String },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("item not found: {item}")]
    NotFound { item: String },

    #[error("item already exists: {item}")]
    AlreadyExists { item: String },

    #[error("table full: {table}")]
    TableFull { table: String },

    #[error("object in use: {object}")]
    ObjectInUse { object: String },

    #[error("switch not initialized")]
    Uninitialized,

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SaiError {
    pub fn from_status(status: SaiStatus) -> Self {
        let detail = || status.to_string();
        match status {
            SaiStatus::Success => SaiError::internal("from_status called with success status"),
            SaiStatus::NotSupported | SaiStatus::NotImplemented => SaiError::not_supported(detail()),
            SaiStatus::InvalidParameter
            | SaiStatus::InvalidPortNumber
            | SaiStatus::InvalidPortMember
            | SaiStatus::InvalidVlanId
            | SaiStatus::InvalidObjectType
            | SaiStatus::InvalidObjectId
            | SaiStatus::InvalidAttribute
            | SaiStatus::MandatoryAttributeMissing => SaiError::invalid_parameter(detail()),
            SaiStatus::ItemNotFound | SaiStatus::AddrNotFound => SaiError::not_found(detail()),
            SaiStatus::ItemAlreadyExists => SaiError::already_exists(detail()),
            SaiStatus::TableFull => SaiError::table_full(detail()),
            SaiStatus::ObjectInUse => SaiError::object_in_use(detail()),
            SaiStatus::Uninitialized => SaiError::Uninitialized,
            _ => SaiError::Status { status },
        }
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        SaiError::NotSupported {
            feature: feature.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        SaiError::NotFound { item: item.into() }
    }

    pub fn already_exists(item: impl Into<String>) -> Self {
        SaiError::AlreadyExists { item: item.into() }
    }

    pub fn table_full(table: impl Into<String>) -> Self {
        SaiError::TableFull {
            table: table.into(),
        }
    }

    pub fn object_in_use(object: impl Into<String>) -> Self {
        SaiError::ObjectInUse {
            object: object.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SaiError::Internal {
            message: message.into(),
        }
    }

    /// The closest status code for this error.
    pub fn status(&self) -> SaiStatus {
        match self {
            SaiError::Status { status } => *status,
            SaiError::NotSupported { .. } => SaiStatus::NotSupported,
            SaiError::InvalidParameter { .. } => SaiStatus::InvalidParameter,
            SaiError::NotFound { .. } => SaiStatus::ItemNotFound,
            SaiError::AlreadyExists { .. } => SaiStatus::ItemAlreadyExists,
            SaiError::TableFull { .. } => SaiStatus::TableFull,
            SaiError::ObjectInUse { .. } => SaiStatus::ObjectInUse,
            SaiError::Uninitialized => SaiStatus::Uninitialized,
            SaiError::Internal { .. } => SaiStatus::Failure,
        }
    }
}

pub type SaiResult<T> = Result<T, SaiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_roundtrip_raw() {
        assert_eq!(SaiStatus::from_raw(0), SaiStatus::Success);
        assert_eq!(SaiStatus::from_raw(-7), SaiStatus::ItemNotFound);
        assert_eq!(SaiStatus::from_raw(-24), SaiStatus::InvalidAttribute);
        assert_eq!(SaiStatus::from_raw(-999), SaiStatus::Failure);
    }

    #[test]
    fn test_into_result() {
        assert!(SaiStatus::Success.into_result().is_ok());
        assert_eq!(
            SaiStatus::ObjectInUse.into_result(),
            Err(SaiError::object_in_use("SAI_STATUS_OBJECT_IN_USE"))
        );
    }

    #[test]
    fn test_error_maps_back_to_status() {
        for status in [
            SaiStatus::ItemNotFound,
            SaiStatus::TableFull,
            SaiStatus::Uninitialized,
            SaiStatus::BufferOverflow,
        ] {
            assert_eq!(SaiError::from_status(status).status(), status);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(SaiStatus::TableFull.to_string(), "SAI_STATUS_TABLE_FULL");
        assert_eq!(
            SaiError::from_status(SaiStatus::BufferOverflow).to_string(),
            "SAI operation failed: SAI_STATUS_BUFFER_OVERFLOW"
        );
    }
}
