use rusqlite::ToSql;

/// what a metadata entry points at. Folders never have a real file behind
/// their physical name; they only anchor the logical namespace
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum EntryKind {
    File,
    Folder,
}

impl From<&str> for EntryKind {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "folder" => Self::Folder,
            _ => {
                log::warn!(
                    "item type from database {value} does not match any branches in EntryKind#from"
                );
                Self::File
            }
        }
    }
}

impl ToSql for EntryKind {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        match self {
            Self::File => Ok("file".into()),
            Self::Folder => Ok("folder".into()),
        }
    }
}

/// one row of the entries table, as returned by a child listing
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EntryRecord {
    /// the client-encrypted leaf name; opaque to the server
    pub logical_name: String,
    /// the on-disk blob name derived from the logical name
    pub physical_name: String,
    pub kind: EntryKind,
    /// unix epoch seconds
    pub modified_date: u64,
}

/// a file entry with enough context to rebuild its full logical path
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubtreeFile {
    pub parent_path: String,
    pub logical_name: String,
    pub physical_name: String,
}

/// a folder entry with enough context to rebuild its full logical path
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubtreeFolder {
    pub parent_path: String,
    pub logical_name: String,
}

/// the four usage counters kept per user
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct UserStats {
    pub upload_count: u64,
    pub download_count: u64,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}
