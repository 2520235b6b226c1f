mod enumerate_option;
pub use enumerate_option::EnumerateOption;
