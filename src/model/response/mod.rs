use serde::{Deserialize, Serialize};

use crate::model::repository::UserStats;

/// one element of the JSON array LIST sends back. `name` is the client's
/// encrypted token; the server never learns the display name
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ListEntry {
    pub name: String,
    /// physical blob size on disk, 0 when the blob is missing or a folder
    pub size: u64,
    /// unix epoch seconds
    pub date: u64,
    #[serde(rename = "type")]
    pub item_type: String,
}

/// a single line sent back to the client, not counting LIST payloads and
/// binary bodies
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Reply {
    /// bare `OK`, used to clear a client to start streaming a body
    Ready,
    Ok(String),
    Error(String),
    Stats(UserStats),
}

impl Reply {
    pub fn to_line(&self) -> String {
        match self {
            Reply::Ready => "OK".to_string(),
            Reply::Ok(message) => format!("OK|{message}"),
            Reply::Error(reason) => format!("ERRO|{reason}"),
            Reply::Stats(stats) => format!(
                "STATS|{}|{}|{}|{}",
                stats.upload_count,
                stats.download_count,
                stats.bytes_uploaded,
                stats.bytes_downloaded
            ),
        }
    }
}
