//! Text encodings of design SQL files. Older design files are Latin-1, newer
//! ones UTF-8; the dialect itself is the same.

use serde::{Deserialize, Serialize};

use crate::errinput;
use crate::error::{Error, Result};

/// A source text encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Decodes raw bytes into a string.
    pub fn decode(&self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes)
                .map_err(|err| Error::InvalidInput(format!("invalid UTF-8 text: {err}"))),
            // Latin-1 code points map directly onto the first 256 Unicode
            // code points.
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf8",
            Self::Latin1 => "latin1",
        })
    }
}

impl std::str::FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => errinput!("unknown encoding {s}"),
        }
    }
}
