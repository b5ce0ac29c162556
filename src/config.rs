use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::auth::generate_token;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ATTACHMENT_BASE_URL: &str = "http://localhost:9000/attachments";
pub const DEFAULT_UPLOAD_URL_EXPIRY: Duration = Duration::from_secs(300);

/// Process configuration, read once at startup and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub base_path: String,
    pub attachment_base_url: String,
    pub attachment_key: String,
    pub upload_url_expiry: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let port = match lookup("TODOS_PORT") {
            Some(port) => port
                .parse()
                .map_err(|e| format!("TODOS_PORT is not a port number: {e}"))?,
            None => DEFAULT_PORT,
        };

        let db_path = lookup("TODOS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("todos.db"));

        let base_path = lookup("TODOS_BASE_PATH")
            .map(|path| normalize_base_path(&path))
            .unwrap_or_default();

        let attachment_base_url = lookup("TODOS_ATTACHMENT_BASE_URL")
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_BASE_URL.to_string());

        let attachment_key = match lookup("TODOS_ATTACHMENT_KEY") {
            Some(key) if !key.is_empty() => key,
            _ => {
                warn!("TODOS_ATTACHMENT_KEY not set, upload URLs are signed with a per-process key");
                generate_token()
            }
        };

        let upload_url_expiry = match lookup("TODOS_UPLOAD_URL_EXPIRY_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .map_err(|e| format!("TODOS_UPLOAD_URL_EXPIRY_SECS is not a number: {e}"))?,
            ),
            None => DEFAULT_UPLOAD_URL_EXPIRY,
        };

        Ok(Config {
            port,
            db_path,
            base_path,
            attachment_base_url,
            attachment_key,
            upload_url_expiry,
        })
    }
}

/// `"api/"` and `"/api"` both become `"/api"`; `"/"` becomes empty.
pub fn normalize_base_path(path: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

pub const USAGE: &str = "usage: todopage [issue-token <owner-id> [name]]";

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    IssueToken {
        owner_id: String,
        name: Option<String>,
    },
}

impl Command {
    /// Parses the arguments after the program name.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            return Ok(Command::Serve);
        };

        match command.as_str() {
            "issue-token" => {
                let owner_id = args
                    .next()
                    .filter(|owner| !owner.is_empty())
                    .ok_or("issue-token needs an owner id")?;
                let name = args.next();
                if let Some(extra) = args.next() {
                    return Err(format!("unexpected argument {extra:?}"));
                }
                Ok(Command::IssueToken { owner_id, name })
            }
            other => Err(format!("unknown command {other:?}")),
        }
    }
}
