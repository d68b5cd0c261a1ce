//! Process exit codes
//!
//! Scripts branch on these, so the numbers are part of the CLI's interface
//! and must not be renumbered.

use bz_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Anything not covered below
    GeneralError = 1,
    /// Bad arguments or an unusable path
    UsageError = 2,
    /// Connection failure or timeout
    NetworkError = 3,
    /// Credentials rejected or missing capability
    AuthError = 4,
    /// Account, bucket or file does not exist
    NotFound = 5,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Classify a library error
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidArgument(_) | Error::InvalidPath(_) => ExitCode::UsageError,
            Error::Network(_) | Error::Timeout(_) => ExitCode::NetworkError,
            e if e.is_not_found() => ExitCode::NotFound,
            Error::Api(api) if api.status == 401 || api.status == 403 => ExitCode::AuthError,
            _ => ExitCode::GeneralError,
        }
    }
}
