// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that deja reads on startup to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.
//!
//! # General Layout
//!
//! ```toml
//! [store]
//! path = "~/.deja"
//! home = "$HOME"
//! metadata_dir = ".git"
//!
//! [remote]
//! host = "https://github.com"
//! backend = "git2"
//! ```
//!
//! Every field is optional. Path fields go through shell expansion.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where repositories live, and where they get linked to.
    pub store: StoreSettings,

    /// How repositories get fetched.
    pub remote: RemoteSettings,
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.store.path = settings.store.path.map(expand_path).transpose()?;
        settings.store.home = settings.store.home.map(expand_path).transpose()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Repository store settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store root. Defaults to `$HOME/.deja` when absent.
    pub path: Option<PathBuf>,

    /// Home root to link into. Defaults to user's home directory when absent.
    pub home: Option<PathBuf>,

    /// VCS metadata directory to exclude from linking and diffing.
    pub metadata_dir: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            home: None,
            metadata_dir: ".git".into(),
        }
    }
}

/// Remote access settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Host prepended to `user/repo` shorthand.
    pub host: String,

    /// Which VCS backend performs clones and pulls.
    pub backend: Backend,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: "https://github.com".into(),
            backend: Backend::default(),
        }
    }
}

/// VCS backend selection.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Use libgit2.
    #[default]
    Git2,

    /// Shell out to the git binary.
    Git,
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [store]
            path = "$BLAH/.deja"
            home = "$BLAH"
            metadata_dir = ".hg"

            [remote]
            host = "https://git.blah.org"
            backend = "git"
        "#
        .parse()?;

        let expect = Settings {
            store: StoreSettings {
                path: Some("/home/blah/.deja".into()),
                home: Some("/home/blah".into()),
                metadata_dir: ".hg".into(),
            },
            remote: RemoteSettings {
                host: "https://git.blah.org".into(),
                backend: Backend::Git,
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_empty_settings_uses_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.store.metadata_dir, ".git");
        assert_eq!(result.remote.backend, Backend::Git2);

        Ok(())
    }

    #[test]
    fn deserialize_rejects_unknown_backend() {
        let result = r#"
            [remote]
            backend = "svn"
        "#
        .parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn serialize_settings() {
        let result = Settings {
            store: StoreSettings {
                path: Some("/home/blah/.deja".into()),
                home: None,
                metadata_dir: ".git".into(),
            },
            remote: RemoteSettings::default(),
        }
        .to_string();

        let expect = indoc! {r#"
            [store]
            path = "/home/blah/.deja"
            metadata_dir = ".git"

            [remote]
            host = "https://github.com"
            backend = "git2"
        "#};

        assert_eq!(result, expect);
    }
}
