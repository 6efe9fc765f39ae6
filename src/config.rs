//! Store settings loaded from YAML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::objects::Signature;
use crate::refs;
use crate::transport::SshConfig;

fn default_branch() -> String {
    "main".to_string()
}

/// Settings for a [`RepositoryStore`](crate::manager::RepositoryStore).
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Directory holding one repository per child directory.
    pub root: PathBuf,
    /// Initial branch of newly created repositories.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Author of merge commits and annotated tags.
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub ssh: SshConfig,
}

impl ManagerConfig {
    /// A configuration with defaults for everything but the root.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        ManagerConfig {
            root: root.into(),
            default_branch: default_branch(),
            identity: Identity::default(),
            ssh: SshConfig::default(),
        }
    }

    /// Sanity checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config("root must not be empty".to_string()));
        }
        refs::validate_name(&self.default_branch).map_err(|_| {
            Error::Config(format!("invalid default_branch: {:?}", self.default_branch))
        })?;
        if self.ssh.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "ssh.connect_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Name and email used for commits and tags the store writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Identity {
            name: "repokeeper".to_string(),
            email: "repokeeper@localhost".to_string(),
        }
    }
}

impl Identity {
    /// A signature stamped with the current time.
    pub fn signature(&self) -> Signature {
        Signature::now(&self.name, &self.email)
    }
}

/// Loads and validates a [`ManagerConfig`] from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ManagerConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let config: ManagerConfig = serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}
