use windows::Win32::Foundation::{GetLastError, WIN32_ERROR};

pub fn get_last_error_as_win32_error() -> WIN32_ERROR {
    let get_last_error_result = unsafe { GetLastError().ok() };

    match get_last_error_result {
        Ok(()) => WIN32_ERROR(0),
        Err(last_error) => WIN32_ERROR::from_error(&last_error).unwrap_or(WIN32_ERROR(0)),
    }
}

pub fn to_utf16_with_nul(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decodes a utf-16 buffer up to (and excluding) its first null char.
pub fn utf16_until_nul(buffer: &[u16]) -> String {
    let length = buffer
        .iter()
        .position(|&utf16_char| utf16_char == 0)
        .unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..length])
}
