pub mod file_service;
pub mod folder_service;
pub mod path_service;
pub mod storage_service;
pub mod transfer_service;
pub mod user_service;
