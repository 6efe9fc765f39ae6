//! SSH remote access settings.
//!
//! Key handling and the SSH protocol itself live outside this crate. A
//! [`SessionFactory`] turns an SSH URL plus an [`SshConfig`] into a
//! [`Transport`]; the configuration is an immutable value handed to every
//! call, so changing it means building a new one.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{RemoteUrl, Transport};
use crate::error::Result;

/// Longest banner line read during a connection test.
const MAX_BANNER: u64 = 255;

fn default_timeout() -> u64 {
    5
}

fn default_user() -> String {
    "git".to_string()
}

/// SSH client settings.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SshConfig {
    /// Private key file.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// Inline private key; takes precedence over `private_key_path`.
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    /// Inline known-hosts content.
    #[serde(default)]
    pub known_hosts: Option<String>,
    #[serde(default)]
    pub strict_host_key_checking: bool,
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: u64,
    /// Login used when the URL names none.
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            private_key_path: None,
            private_key: None,
            passphrase: None,
            known_hosts_path: None,
            known_hosts: None,
            strict_host_key_checking: false,
            connect_timeout_secs: default_timeout(),
            user: default_user(),
        }
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SshConfig")
            .field("private_key_path", &self.private_key_path)
            .field("private_key", &redact(&self.private_key))
            .field("passphrase", &redact(&self.passphrase))
            .field("known_hosts_path", &self.known_hosts_path)
            .field("known_hosts", &self.known_hosts.as_ref().map(|k| k.len()))
            .field("strict_host_key_checking", &self.strict_host_key_checking)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user", &self.user)
            .finish()
    }
}

impl SshConfig {
    /// Returns a copy that uses an inline key instead of the configured
    /// key file.
    pub fn with_inline_key(
        &self,
        private_key: impl Into<String>,
        passphrase: Option<String>,
        known_hosts: Option<String>,
    ) -> Self {
        SshConfig {
            private_key: Some(private_key.into()),
            passphrase,
            known_hosts,
            ..self.clone()
        }
    }

    /// The connect timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Describes which key would be used, without reading it.
    pub fn key_info(&self) -> SshKeyInfo {
        if self.private_key.as_deref().is_some_and(|k| !k.is_empty()) {
            return SshKeyInfo {
                configured: true,
                source: "custom".to_string(),
            };
        }
        match &self.private_key_path {
            Some(path) => SshKeyInfo {
                configured: path.exists(),
                source: format!("file:{}", path.display()),
            },
            None => SshKeyInfo {
                configured: false,
                source: "none".to_string(),
            },
        }
    }
}

/// Which SSH key a configuration points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeyInfo {
    pub configured: bool,
    /// `custom`, `file:<path>` or `none`.
    pub source: String,
}

/// Opens transports to SSH remotes.
pub trait SessionFactory: Send + Sync {
    /// Connects to `url` with `config`.
    fn open(&self, url: &RemoteUrl, config: &SshConfig) -> Result<Box<dyn Transport>>;
}

/// Checks that `host:port` accepts TCP connections and greets with an SSH
/// banner within the configured timeout.
pub fn test_connection(config: &SshConfig, host: &str, port: u16) -> bool {
    match probe(config, host, port) {
        Ok(banner) => {
            info!(host, port, banner = %banner, "SSH connection test succeeded");
            true
        }
        Err(reason) => {
            warn!(host, port, error = %reason, "SSH connection test failed");
            false
        }
    }
}

fn probe(config: &SshConfig, host: &str, port: u16) -> std::result::Result<String, String> {
    let timeout = config.timeout();
    let addrs = (host, port).to_socket_addrs().map_err(|e| e.to_string())?;

    let mut last_err = format!("no addresses for {}", host);
    for addr in addrs {
        let stream = match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => stream,
            Err(e) => {
                last_err = e.to_string();
                continue;
            }
        };
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| e.to_string())?;

        let mut line = String::new();
        BufReader::new(stream.take(MAX_BANNER))
            .read_line(&mut line)
            .map_err(|e| e.to_string())?;
        let banner = line.trim_end().to_string();
        return if banner.starts_with("SSH-") {
            Ok(banner)
        } else {
            Err(format!("unexpected banner: {:?}", banner))
        };
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_key_info_sources() {
        let config = SshConfig::default();
        assert_eq!(config.key_info().source, "none");
        assert!(!config.key_info().configured);

        let file = SshConfig {
            private_key_path: Some(PathBuf::from("/nonexistent/id_ed25519")),
            ..SshConfig::default()
        };
        let info = file.key_info();
        assert_eq!(info.source, "file:/nonexistent/id_ed25519");
        assert!(!info.configured);

        let inline = file.with_inline_key("-----BEGIN KEY-----", None, None);
        assert_eq!(
            inline.key_info(),
            SshKeyInfo {
                configured: true,
                source: "custom".to_string()
            }
        );
        // the original value is untouched
        assert!(file.private_key.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SshConfig::default().with_inline_key("secret-key", Some("pw".into()), None);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("\"pw\""));
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: SshConfig = serde_yaml::from_str("private_key_path: /keys/id\n").unwrap();
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.user, "git");
        assert!(!config.strict_host_key_checking);
    }

    fn serve_once(reply: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(reply);
            }
        });
        port
    }

    #[test]
    fn test_connection_checks_banner() {
        let config = SshConfig::default();
        let port = serve_once(b"SSH-2.0-OpenSSH_9.6\r\n");
        assert!(test_connection(&config, "127.0.0.1", port));

        let port = serve_once(b"HTTP/1.1 400 Bad Request\r\n");
        assert!(!test_connection(&config, "127.0.0.1", port));
    }
}
