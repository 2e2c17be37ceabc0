use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[non_exhaustive]
pub enum TableError {
    #[cfg_attr(feature = "std", error("table would be read past its end"))]
    TruncatedTable,
    #[cfg_attr(feature = "std", error("table checksum mismatch"))]
    BadChecksum,
    #[cfg_attr(feature = "std", error("unexpected table signature"))]
    BadSignature,
    #[cfg_attr(feature = "std", error("no known layout for table revision"))]
    UnsupportedRevision,
    #[cfg_attr(feature = "std", error("inconsistent header"))]
    InconsistentHeader,
    #[cfg_attr(feature = "std", error("unexpected device in topology"))]
    UnexpectedDevice,
}

/// Status byte reported by the DIMM firmware in the mailbox status
/// register.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[non_exhaustive]
pub enum FwStatusCode {
    Success = 0x00,
    InvalidParameter = 0x01,
    DataTransferError = 0x02,
    InternalError = 0x03,
    UnsupportedCommand = 0x04,
    Busy = 0x05,
    PassphraseError = 0x06,
    SecurityError = 0x07,
    InvalidState = 0x08,
    SystemTimeError = 0x09,
    DataNotSet = 0x0A,
    Aborted = 0x0B,
    RevisionFailure = 0x0D,
    InjectionNotEnabled = 0x0E,
    ConfigLocked = 0x0F,
    InvalidAlignment = 0x10,
    IncompatibleDimmType = 0x11,
    TimeoutOccurred = 0x12,
    MediaDisabled = 0x14,
    UpdateAlreadyOccurred = 0x15,
    NoResources = 0x16,
    /// Never sent by firmware; stands for anything the driver could not
    /// attribute to a real status byte.
    Unknown = 0xFF,
}

/// Coarse grouping of firmware status codes, as far as callers need to
/// tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    InvalidParameter,
    DeviceError,
    Unsupported,
    NoResponse,
    NoMedia,
    AccessDenied,
    SecurityViolation,
    NotStarted,
    Timeout,
    Aborted,
}

impl FwStatusCode {
    pub fn from_byte(value: u8) -> Self {
        Self::from_u8(value).unwrap_or(Self::Unknown)
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn class(self) -> StatusClass {
        match self {
            Self::Success => StatusClass::Success,
            Self::InvalidParameter | Self::InvalidAlignment => {
                StatusClass::InvalidParameter
            }
            Self::DataTransferError
            | Self::InternalError
            | Self::NoResources => StatusClass::DeviceError,
            Self::UnsupportedCommand | Self::InjectionNotEnabled => {
                StatusClass::Unsupported
            }
            Self::Busy => StatusClass::NoResponse,
            Self::MediaDisabled => StatusClass::NoMedia,
            Self::PassphraseError | Self::ConfigLocked => {
                StatusClass::AccessDenied
            }
            Self::SecurityError | Self::InvalidState => {
                StatusClass::SecurityViolation
            }
            Self::DataNotSet => StatusClass::NotStarted,
            Self::TimeoutOccurred => StatusClass::Timeout,
            _ => StatusClass::Aborted,
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[non_exhaustive]
pub enum Error {
    #[cfg_attr(feature = "std", error("firmware reported {0:?}"))]
    Firmware(FwStatusCode),
    #[cfg_attr(feature = "std", error("timed out"))]
    Timeout,
    #[cfg_attr(
        feature = "std",
        error("firmware does not track this long operation")
    )]
    IncompatibleVersion,
    #[cfg_attr(feature = "std", error("device is not responding"))]
    DeviceError,
    #[cfg_attr(feature = "std", error("{1}: {0}"))]
    Table(TableError, &'static str), // kind, struct or field name
    #[cfg_attr(feature = "std", error("payload too big"))]
    PayloadTooBig,
    #[cfg_attr(feature = "std", error("arithmetic overflow"))]
    ArithmeticOverflow,
    #[cfg_attr(feature = "std", error("invalid parameter"))]
    InvalidParameter,
    #[cfg_attr(feature = "std", error("not found"))]
    NotFound,
}

pub type Result<Q> = core::result::Result<Q, Error>;
