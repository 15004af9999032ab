//! Structured dotfile mapping definitions.
//!
//! `links.toml` declares ordered symlink mappings:
//!
//! ```toml
//! [[link]]
//! link = "/home/user/.bashrc"
//! target = "/home/user/conf/bashrc"
//! description = "Bash profile"
//! ```
//!
//! Both paths must be absolute; relative paths are rejected so the engine
//! never depends on the working directory it happens to run from.

use serde::Deserialize;
use std::path::PathBuf;

use crate::declarations::LinkDeclaration;
use crate::error::ParseError;

#[derive(Debug, Deserialize)]
struct LinksFile {
    #[serde(default)]
    link: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    link: PathBuf,
    target: PathBuf,
    #[serde(default)]
    description: String,
}

/// Parse `links.toml` content into link declarations, preserving file order.
///
/// # Errors
///
/// Returns a [`ParseError::Malformed`] when the TOML is invalid, or a
/// [`ParseError::RelativePath`] for the first non-absolute path encountered
/// in an entry.
pub fn parse(content: &str) -> Result<Vec<LinkDeclaration>, ParseError> {
    let file: LinksFile = toml::from_str(content).map_err(|e| ParseError::Malformed {
        file: "links.toml".to_string(),
        message: e.message().to_string(),
    })?;

    file.link
        .into_iter()
        .map(|entry| {
            for path in [&entry.link, &entry.target] {
                if !path.is_absolute() {
                    return Err(ParseError::RelativePath {
                        file: "links.toml".to_string(),
                        path: path.display().to_string(),
                    });
                }
            }
            Ok(LinkDeclaration {
                link_path: entry.link,
                target_path: entry.target,
                description: entry.description,
            })
        })
        .collect()
}
