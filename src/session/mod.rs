use std::io::{self, BufRead, BufReader, Read, Write};

use crate::model::error::entry_errors::{CreateFolderError, DeleteError};
use crate::model::error::transfer_errors::{DownloadError, PackZipError, UploadError};
use crate::model::error::user_errors::{AuthenticateError, RegisterError};
use crate::model::request::{Command, ParseCommandError};
use crate::model::response::Reply;
use crate::service::path_service::normalize_path;
use crate::service::transfer_service::copy_all;
use crate::service::{file_service, folder_service, transfer_service, user_service};

/// one client connection, from accept to disconnect. Starts out
/// unauthenticated; AUTH is the only way to reach the command handlers.
/// Strictly request/response: one command line in, one reply (plus any
/// framed body) out, nothing pipelined
pub struct Session<S: Read + Write> {
    stream: BufReader<S>,
    /// login of the authenticated user; `None` until AUTH succeeds
    user: Option<String>,
    peer: String,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, peer: String) -> Self {
        Session {
            stream: BufReader::new(stream),
            user: None,
            peer,
        }
    }

    /// reads and dispatches commands until the peer disconnects or the
    /// transport fails. Transport failures end the session without a reply;
    /// command failures are reported in-band and the session continues
    pub fn run(&mut self) {
        log::info!("connection opened from {}", self.peer);
        loop {
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    log::info!("connection from {} dropped: {e:?}", self.peer);
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            let outcome = match Command::parse(&line) {
                Ok(command) => self.dispatch(command),
                Err(e) => self.send(&Reply::Error(describe_parse_error(&e))),
            };
            if let Err(e) = outcome {
                log::info!("connection from {} dropped mid-command: {e:?}", self.peer);
                break;
            }
        }
        log::info!("connection from {} closed", self.peer);
    }

    fn dispatch(&mut self, command: Command) -> io::Result<()> {
        if self.user.is_none() && !command.allowed_unauthenticated() {
            return self.send(&Reply::Error(
                "Action not allowed. Authenticate first.".to_string(),
            ));
        }
        match command {
            Command::Auth { login, password } => self.handle_auth(login, password),
            Command::Register { login, password } => self.handle_register(login, password),
            Command::CreateFolder { path } => self.handle_create_folder(path),
            Command::List { path } => self.handle_list(path),
            Command::Upload { path, length } => self.handle_upload(path, length),
            Command::Download { path } => self.handle_download(path),
            Command::DownloadFolderAsZip { path } => self.handle_download_zip(path),
            Command::UploadZipAsFolder { path, length } => self.handle_upload_zip(path, length),
            Command::Delete { path } => self.handle_delete(path),
            Command::GetStats => self.handle_stats(),
        }
    }

    fn handle_auth(&mut self, login: String, password: String) -> io::Result<()> {
        match user_service::authenticate(&login, &password) {
            Ok(salt_hex) => {
                log::info!("user '{login}' authenticated from {}", self.peer);
                self.user = Some(login);
                self.send(&Reply::Ok(salt_hex))
            }
            Err(AuthenticateError::BadCredentials) => {
                self.send(&Reply::Error("bad login or password".to_string()))
            }
            Err(AuthenticateError::MissingSalt) => self.send(&Reply::Error(
                "could not read user security data".to_string(),
            )),
            Err(_) => self.send(&Reply::Error("authentication failed".to_string())),
        }
    }

    fn handle_register(&mut self, login: String, password: String) -> io::Result<()> {
        match user_service::register(&login, &password) {
            Ok(()) => self.send(&Reply::Ok("Registered successfully!".to_string())),
            Err(RegisterError::DuplicateLogin) => {
                self.send(&Reply::Error("User already exists.".to_string()))
            }
            Err(RegisterError::InvalidLogin) => {
                self.send(&Reply::Error("Invalid login.".to_string()))
            }
            Err(RegisterError::DbFailure) => {
                self.send(&Reply::Error("registration failed".to_string()))
            }
        }
    }

    fn handle_create_folder(&mut self, path: String) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        match folder_service::create_folder(&login, &path) {
            Ok(()) => self.send(&Reply::Ok("Folder created.".to_string())),
            Err(CreateFolderError::MissingName) => {
                self.send(&Reply::Error("folder path is required".to_string()))
            }
            Err(CreateFolderError::DbFailure) => {
                self.send(&Reply::Error("Failed to create folder.".to_string()))
            }
        }
    }

    /// LIST never fails in-band: the reply is always a 10-byte left-justified
    /// length header followed by that many bytes of a JSON array
    fn handle_list(&mut self, path: String) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        let entries = folder_service::list_folder(&login, &path);
        let json = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string());
        let stream = self.stream.get_mut();
        stream.write_all(format!("{:<10}", json.len()).as_bytes())?;
        stream.write_all(json.as_bytes())?;
        stream.flush()
    }

    fn handle_upload(&mut self, path: String, length: u64) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        if path.is_empty() {
            return self.send(&Reply::Error("file path is required".to_string()));
        }
        // clear the client to start streaming the body
        self.send(&Reply::Ready)?;
        match file_service::upload_file(&login, &path, length, &mut self.stream) {
            Ok(()) => self.send(&Reply::Ok("UPLOAD_SUCCESS".to_string())),
            Err(UploadError::IncompleteTransfer) => {
                self.send(&Reply::Error("Upload incomplete.".to_string()))
            }
            Err(UploadError::MissingName) => {
                self.send(&Reply::Error("file path is required".to_string()))
            }
            Err(_) => self.send(&Reply::Error("Failed to store the file.".to_string())),
        }
    }

    fn handle_download(&mut self, path: String) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        match file_service::download_file(&login, &path) {
            Ok((length, mut file)) => {
                self.send(&Reply::Ok(length.to_string()))?;
                self.await_ack()?;
                let stream = self.stream.get_mut();
                copy_all(&mut file, stream)?;
                stream.flush()?;
                user_service::record_download(&login, length);
                Ok(())
            }
            Err(DownloadError::NotFound) => {
                self.send(&Reply::Error("File not found.".to_string()))
            }
            Err(DownloadError::MissingBlob) => self.send(&Reply::Error(
                "File missing from server disk.".to_string(),
            )),
            Err(_) => self.send(&Reply::Error("Failed to read the file.".to_string())),
        }
    }

    fn handle_download_zip(&mut self, path: String) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        match transfer_service::pack_folder(&login, &path) {
            Ok((bytes, content_size)) => {
                self.send(&Reply::Ok(bytes.len().to_string()))?;
                self.await_ack()?;
                let stream = self.stream.get_mut();
                stream.write_all(&bytes)?;
                stream.flush()?;
                // the ledger counts the packed file content, not the archive
                user_service::record_download(&login, content_size);
                Ok(())
            }
            Err(PackZipError::NotFound) => {
                self.send(&Reply::Error("Folder not found.".to_string()))
            }
            Err(PackZipError::EmptyFolder) => {
                self.send(&Reply::Error("Folder is empty.".to_string()))
            }
            Err(_) => self.send(&Reply::Error("Failed to build zip archive.".to_string())),
        }
    }

    fn handle_upload_zip(&mut self, path: String, length: u64) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        if path.is_empty() {
            return self.send(&Reply::Error("folder path is required".to_string()));
        }
        // the destination folder's entry is committed before the body, so an
        // aborted body leaves the folder but none of its children
        if transfer_service::ensure_destination_folder(&login, &path).is_err() {
            return self.send(&Reply::Error("Failed to create folder.".to_string()));
        }
        self.send(&Reply::Ready)?;
        let mut bytes = Vec::new();
        let copied = transfer_service::copy_exact(&mut self.stream, &mut bytes, length)?;
        if copied < length {
            return self.send(&Reply::Error("Zip upload incomplete.".to_string()));
        }
        match transfer_service::extract_zip(&login, &path, &bytes) {
            Ok(()) => {
                user_service::record_upload(&login, length);
                folder_service::touch_path_ancestors(&login, &path);
                self.send(&Reply::Ok("Zip uploaded and extracted!".to_string()))
            }
            Err(_) => self.send(&Reply::Error("Failed to process the zip.".to_string())),
        }
    }

    fn handle_delete(&mut self, path: String) -> io::Result<()> {
        let login = self.login();
        let path = normalize_path(&path);
        match folder_service::delete_item(&login, &path) {
            Ok(()) => self.send(&Reply::Ok("Item(s) deleted successfully.".to_string())),
            Err(DeleteError::NotFound) => {
                self.send(&Reply::Error("Item not found.".to_string()))
            }
            Err(_) => self.send(&Reply::Error(
                "Failed to delete the item on the server.".to_string(),
            )),
        }
    }

    fn handle_stats(&mut self) -> io::Result<()> {
        let login = self.login();
        match user_service::get_stats(&login) {
            Ok(stats) => self.send(&Reply::Stats(stats)),
            Err(_) => self.send(&Reply::Error("Could not retrieve stats.".to_string())),
        }
    }

    /// dispatch gates on authentication before any handler runs
    fn login(&self) -> String {
        self.user.clone().unwrap_or_default()
    }

    fn send(&mut self, reply: &Reply) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(reply.to_line().as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.stream.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// body streaming waits for a one-line go-ahead from the client
    fn await_ack(&mut self) -> io::Result<()> {
        match self.read_line()? {
            Some(_) => Ok(()),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        }
    }
}

fn describe_parse_error(error: &ParseCommandError) -> String {
    match error {
        ParseCommandError::EmptyLine => "empty command".to_string(),
        ParseCommandError::UnknownCommand(_) => "Unknown command.".to_string(),
        ParseCommandError::MissingField(field) => format!("missing required field {field}"),
        ParseCommandError::BadLength(raw) => format!("invalid length {raw}"),
    }
}
