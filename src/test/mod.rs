use std::fs::{create_dir_all, remove_dir_all, remove_file};
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::repository::initialize_db;
use crate::service::storage_service;


/// tests share one process, so each test's database and storage live under
/// names derived from the test thread
pub fn current_thread_name() -> String {
    let current_thread = std::thread::current();
    current_thread.name().unwrap().to_string()
}

pub fn refresh_db() {
    let thread_name = current_thread_name();
    remove_file(Path::new(format!("{thread_name}.sqlite").as_str())).unwrap_or(());
    initialize_db().unwrap();
}

/// creates the storage directory for a user without going through AUTH
pub fn create_user_storage(login: &str) {
    create_dir_all(storage_service::user_dir(login)).unwrap();
}

pub fn cleanup() {
    let thread_name = current_thread_name();
    remove_file(Path::new(format!("{thread_name}.sqlite").as_str())).unwrap_or(());
    remove_dir_all(Path::new(storage_service::storage_dir().as_str())).unwrap_or(());
}

/// produces a path-safe token shaped like the client's encrypted names
/// (base64-url of nonce + tag + ciphertext). Deterministic per name so
/// tests can refer to the same logical path twice
pub fn enc_token(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(format!("nonce:{name}:tag"))
}
