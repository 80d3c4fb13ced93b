/// a fully validated protocol command. Fields are the raw pipe-delimited
/// values from the wire; logical paths are still in client form and get
/// normalized by the path service at dispatch time
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    Auth { login: String, password: String },
    Register { login: String, password: String },
    CreateFolder { path: String },
    List { path: String },
    Upload { path: String, length: u64 },
    Download { path: String },
    DownloadFolderAsZip { path: String },
    UploadZipAsFolder { path: String, length: u64 },
    Delete { path: String },
    GetStats,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseCommandError {
    EmptyLine,
    UnknownCommand(String),
    MissingField(&'static str),
    /// a length field that isn't a non-negative decimal integer
    BadLength(String),
}

impl Command {
    /// turns one wire line into a command, validating required fields before
    /// anything is dispatched
    pub fn parse(line: &str) -> Result<Command, ParseCommandError> {
        let mut parts = line.split('|');
        let name = parts.next().unwrap_or("");
        if name.is_empty() {
            return Err(ParseCommandError::EmptyLine);
        }
        let mut field = |label: &'static str| -> Result<String, ParseCommandError> {
            match parts.next() {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Err(ParseCommandError::MissingField(label)),
            }
        };
        match name {
            "AUTH" => Ok(Command::Auth {
                login: field("login")?,
                password: field("password")?,
            }),
            "REGISTER" => Ok(Command::Register {
                login: field("login")?,
                password: field("password")?,
            }),
            "CREATE_FOLDER" => Ok(Command::CreateFolder { path: field("path")? }),
            // LIST of the root is an empty path, so the field may be blank
            "LIST" => Ok(Command::List {
                path: parts.next().unwrap_or("").to_string(),
            }),
            "UPLOAD" => Ok(Command::Upload {
                path: field("path")?,
                length: parse_length(field("length")?)?,
            }),
            "DOWNLOAD" => Ok(Command::Download { path: field("path")? }),
            "DOWNLOAD_FOLDER_AS_ZIP" => Ok(Command::DownloadFolderAsZip {
                path: parts.next().unwrap_or("").to_string(),
            }),
            "UPLOAD_ZIP_AS_FOLDER" => Ok(Command::UploadZipAsFolder {
                path: field("path")?,
                length: parse_length(field("length")?)?,
            }),
            "DELETE" => Ok(Command::Delete { path: field("path")? }),
            "GET_STATS" => Ok(Command::GetStats),
            other => Err(ParseCommandError::UnknownCommand(other.to_string())),
        }
    }

    /// whether the command may be issued before AUTH succeeds
    pub fn allowed_unauthenticated(&self) -> bool {
        matches!(self, Command::Auth { .. } | Command::Register { .. })
    }
}

fn parse_length(raw: String) -> Result<u64, ParseCommandError> {
    raw.parse::<u64>()
        .map_err(|_| ParseCommandError::BadLength(raw))
}
