use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errmetainfo;
use crate::error::{Error, Result};

/// A strict version number: major.minor or major.minor.patch.
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?$").expect("invalid regex"));

/// A metainfo key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetainfoKey {
    /// The design file's name.
    Name,
    /// The design file's schema version.
    Version,
}

impl MetainfoKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "version" => Some(Self::Version),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Version => "version",
        }
    }
}

impl std::fmt::Display for MetainfoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metainfo value. The variant is determined by the key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetainfoValue {
    Text(String),
    Version(Version),
}

impl std::fmt::Display for MetainfoValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Version(version) => version.fmt(f),
        }
    }
}

/// A schema version number. Versions are ordered numerically by component,
/// and a missing patch component is 0, so 1.0 == 1.0.0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.patch != 0 {
            write!(f, ".{}", self.patch)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(captures) = VERSION.captures(s) else {
            return errmetainfo!("invalid version number {s:?}");
        };
        let component = |i: usize| -> Result<u32> {
            match captures.get(i) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|err| Error::Metainfo(format!("invalid version number {s:?}: {err}"))),
                None => Ok(0),
            }
        };
        Ok(Self { major: component(1)?, minor: component(2)?, patch: component(3)? })
    }
}

/// Parses a metainfo statement body of the form key=value. Both sides are
/// trimmed, and version values are parsed as version numbers.
pub fn parse_metainfo(statement: &str) -> Result<(MetainfoKey, MetainfoValue)> {
    let Some((key, value)) = statement.split_once('=') else {
        return errmetainfo!("missing = in {statement:?}");
    };
    let (key, value) = (key.trim(), value.trim());
    let Some(key) = MetainfoKey::from_name(key) else {
        return errmetainfo!("invalid metainfo key {key:?} in {statement:?}");
    };
    let value = match key {
        MetainfoKey::Name => MetainfoValue::Text(value.to_string()),
        MetainfoKey::Version => MetainfoValue::Version(value.parse()?),
    };
    Ok((key, value))
}
