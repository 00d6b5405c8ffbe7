use std::ffi::OsString;

use crate::defs::HRESULT;

#[derive(Debug)]
pub enum HookError {
    ProtectFailed,
    LoadLibFailed(String),
    GetProcAddressFailed(String),
    NulError(std::ffi::NulError),
    BadStateError(String),
    FailedToConvertString(OsString),
    D3D9DeviceHookFailed,
    D3DXHookFailed(String),
    IOError(std::io::Error),
    SerdeError(String),
    ThreadSpawnFailed(String),
}

impl std::convert::From<std::ffi::NulError> for HookError {
    fn from(error: std::ffi::NulError) -> Self {
        HookError::NulError(error)
    }
}

impl std::convert::From<std::ffi::OsString> for HookError {
    fn from(error: std::ffi::OsString) -> Self {
        HookError::FailedToConvertString(error)
    }
}

impl std::convert::From<std::io::Error> for HookError {
    fn from(error: std::io::Error) -> Self {
        HookError::IOError(error)
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

/// Result of a call that went through to the device or D3DX; the error is the raw HRESULT
/// so it can be handed back to the game unchanged.
pub type DxResult<T> = std::result::Result<T, HRESULT>;
