pub mod entry_errors;
pub mod transfer_errors;
pub mod user_errors;
