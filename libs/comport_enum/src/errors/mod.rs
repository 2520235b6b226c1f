mod enumerate_error;
pub use enumerate_error::EnumerateError;
