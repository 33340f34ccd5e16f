//! Exit codes of the `mwdb` binary.
//!
//! The BSD sysexits conventions are followed where they fit; failures specific
//! to talking with an MWDB server get codes from 100 up.

use crate::error::MwdbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MwdbExitCode {
    Success,
    /// Invalid command line
    UsageError,
    /// Input data was incorrect, or the server sent something unexpected
    DataError,
    /// Cannot open an input file
    NoInput,
    /// Object or endpoint does not exist
    NotFound,
    /// Server in maintenance or unreachable gateway
    Unavailable,
    /// Rate limited
    TempFail,
    SoftwareError,
    OSError,
    ConfigError,
    /// Login or token issues
    AuthError,
    /// Connection failures
    NetworkError,
    /// Any other error reported by the server
    ApiError,
}

impl MwdbExitCode {
    /// Convert to numeric exit code
    pub fn code(&self) -> i32 {
        match self {
            MwdbExitCode::Success => exitcode::OK,
            MwdbExitCode::UsageError => exitcode::USAGE,
            MwdbExitCode::DataError => exitcode::DATAERR,
            MwdbExitCode::NoInput => exitcode::NOINPUT,
            MwdbExitCode::NotFound => exitcode::NOUSER,
            MwdbExitCode::Unavailable => exitcode::UNAVAILABLE,
            MwdbExitCode::TempFail => exitcode::TEMPFAIL,
            MwdbExitCode::SoftwareError => exitcode::SOFTWARE,
            MwdbExitCode::OSError => exitcode::OSERR,
            MwdbExitCode::ConfigError => exitcode::CONFIG,
            MwdbExitCode::AuthError => 100,
            MwdbExitCode::NetworkError => 101,
            MwdbExitCode::ApiError => 102,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            MwdbExitCode::Success => "Success",
            MwdbExitCode::UsageError => "Command line usage error",
            MwdbExitCode::DataError => "Data format error",
            MwdbExitCode::NoInput => "Cannot open input file",
            MwdbExitCode::NotFound => "Resource not found",
            MwdbExitCode::Unavailable => "Service unavailable",
            MwdbExitCode::TempFail => "Temporary failure",
            MwdbExitCode::SoftwareError => "Internal software error",
            MwdbExitCode::OSError => "Operating system error",
            MwdbExitCode::ConfigError => "Configuration error",
            MwdbExitCode::AuthError => "Authentication error",
            MwdbExitCode::NetworkError => "Network communication error",
            MwdbExitCode::ApiError => "Remote API error",
        }
    }
}

impl From<MwdbExitCode> for i32 {
    fn from(code: MwdbExitCode) -> Self {
        code.code()
    }
}

impl From<&MwdbError> for MwdbExitCode {
    fn from(error: &MwdbError) -> Self {
        match error {
            MwdbError::Validation { .. } => MwdbExitCode::UsageError,
            MwdbError::NotAuthenticated { .. }
            | MwdbError::InvalidCredentials { .. }
            | MwdbError::UserPending { .. }
            | MwdbError::UserDisabled { .. }
            | MwdbError::PermissionDenied { .. } => MwdbExitCode::AuthError,
            MwdbError::ObjectNotFound { .. } | MwdbError::EndpointNotFound { .. } => {
                MwdbExitCode::NotFound
            }
            MwdbError::MaintenanceUnderway { .. } | MwdbError::Gateway { .. } => {
                MwdbExitCode::Unavailable
            }
            MwdbError::LimitExceeded { .. } => MwdbExitCode::TempFail,
            MwdbError::Connection(_) | MwdbError::Client(_) => MwdbExitCode::NetworkError,
            MwdbError::BadResponse(_)
            | MwdbError::UnsupportedType(_)
            | MwdbError::MissingField { .. }
            | MwdbError::InvalidField { .. } => MwdbExitCode::DataError,
            MwdbError::Url(_) | MwdbError::Request(_) => MwdbExitCode::UsageError,
            MwdbError::TypeConflict { .. }
            | MwdbError::Internal { .. }
            | MwdbError::VersionMismatch { .. } => MwdbExitCode::ApiError,
        }
    }
}
