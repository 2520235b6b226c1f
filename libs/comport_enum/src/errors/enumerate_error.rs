use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnumerateError {
    // more class guids are registered under a single class name than our fixed-capacity list
    #[error("too many device class guids are registered under one class name")]
    ClassGuidListOverflow,
    #[error("a device property buffer did not match its reported property type")]
    InvalidPropertyData,
    #[error("a device string was not valid utf-16")]
    StringDecodingError(#[from] std::string::FromUtf16Error),
    #[error("a device string was not properly null-terminated")]
    StringTerminationDecodingError,
    #[error("device property type {0:#010x} is not supported")]
    UnsupportedPropertyType(u32),
    #[error("win32 error {0}")]
    Win32Error(u32),
}
