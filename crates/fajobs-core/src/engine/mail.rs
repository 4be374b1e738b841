//! Mail delivery for queue notifications.
//!
//! Credentials are never passed on the command line or kept in configuration
//! files: [`SmtpMailer`] looks them up in a netrc file, keyed by SMTP server.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Could not find email credentials for {server}, make sure the netrc file has a correct entry")]
    MissingCredentials { server: String },

    #[error("Failed to read netrc file '{path}': {source}", path = path.display())]
    Netrc {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid email address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub trait MailTransport {
    /// Whether credentials are available to send anything at all.
    fn can_send(&self) -> bool;

    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetrcEntry {
    pub login: String,
    pub password: String,
}

/// The subset of netrc used for mail: `machine`, `default`, `login` and `password`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netrc {
    machines: HashMap<String, NetrcEntry>,
    default: Option<NetrcEntry>,
}

impl Netrc {
    pub fn parse(text: &str) -> Self {
        let mut netrc = Netrc::default();
        let mut tokens = text.split_whitespace();
        // (machine, login, password); `None` machine is the `default` entry.
        let mut current: Option<(Option<String>, String, String)> = None;

        while let Some(token) = tokens.next() {
            match token {
                "machine" | "default" => {
                    if let Some(entry) = current.take() {
                        netrc.insert(entry);
                    }
                    let machine = if token == "machine" {
                        tokens.next().map(str::to_string)
                    } else {
                        None
                    };
                    current = Some((machine, String::new(), String::new()));
                }
                "login" => {
                    if let (Some(entry), Some(value)) = (current.as_mut(), tokens.next()) {
                        entry.1 = value.to_string();
                    }
                }
                "password" => {
                    if let (Some(entry), Some(value)) = (current.as_mut(), tokens.next()) {
                        entry.2 = value.to_string();
                    }
                }
                "account" => {
                    tokens.next();
                }
                _ => {}
            }
        }
        if let Some(entry) = current {
            netrc.insert(entry);
        }
        netrc
    }

    fn insert(&mut self, (machine, login, password): (Option<String>, String, String)) {
        let entry = NetrcEntry { login, password };
        match machine {
            // The first entry for a machine wins.
            Some(machine) => {
                self.machines.entry(machine).or_insert(entry);
            }
            None => self.default = Some(entry),
        }
    }

    pub fn load(path: &Path) -> Result<Self, MailError> {
        let text = fs::read_to_string(path).map_err(|source| MailError::Netrc {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// `$NETRC`, or `~/.netrc`.
    pub fn default_path() -> Option<PathBuf> {
        env::var_os("NETRC")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".netrc")))
    }

    pub fn authenticators(&self, host: &str) -> Option<&NetrcEntry> {
        self.machines.get(host).or(self.default.as_ref())
    }
}

/// Sends plain-text mail over SMTPS with netrc credentials.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    server: String,
    netrc_path: Option<PathBuf>,
}

impl Default for SmtpMailer {
    fn default() -> Self {
        Self::new(DEFAULT_SMTP_SERVER)
    }
}

impl SmtpMailer {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            netrc_path: None,
        }
    }

    pub fn netrc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.netrc_path = Some(path.into());
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn credentials(&self) -> Result<NetrcEntry, MailError> {
        let missing = || MailError::MissingCredentials {
            server: self.server.clone(),
        };
        let path = self
            .netrc_path
            .clone()
            .or_else(Netrc::default_path)
            .ok_or_else(missing)?;
        Netrc::load(&path)?
            .authenticators(&self.server)
            .cloned()
            .ok_or_else(missing)
    }

    /// A bare login becomes `login@<server without its first label>`.
    fn sender_address(&self, login: &str) -> String {
        if login.contains('@') {
            return login.to_string();
        }
        let domain = self
            .server
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.server);
        format!("{}@{}", login, domain)
    }
}

fn parse_mailbox(address: &str) -> Result<lettre::message::Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

impl MailTransport for SmtpMailer {
    fn can_send(&self) -> bool {
        match self.credentials() {
            Ok(_) => true,
            Err(e) => {
                debug!(server = %self.server, error = %e, "Mail transport unavailable");
                false
            }
        }
    }

    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let credentials = self.credentials()?;
        let sender = self.sender_address(&credentials.login);

        let message = Message::builder()
            .from(parse_mailbox(&sender)?)
            .to(parse_mailbox(recipient)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let transport = SmtpTransport::relay(&self.server)?
            .credentials(Credentials::new(sender, credentials.password))
            .build();
        transport.send(&message)?;
        info!(recipient, subject, "Notification sent");
        Ok(())
    }
}
