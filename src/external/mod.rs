pub mod file_storage;
pub mod paypal;

pub use file_storage::*;
pub use paypal::*;
