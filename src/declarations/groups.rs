//! Structured package group definitions.
//!
//! `groups.toml` declares ordered groups, each with a name, a description,
//! and an ordered list of package entries:
//!
//! ```toml
//! [[group]]
//! name = "dev"
//! description = "Developer tools"
//!
//! [[group.packages]]
//! name = "git"
//! description = "Version control"
//! ```

use serde::Deserialize;

use crate::declarations::PackageDeclaration;
use crate::error::ParseError;

#[derive(Debug, Deserialize)]
struct GroupsFile {
    #[serde(default)]
    group: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct Group {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
    #[serde(default)]
    packages: Vec<PackageEntry>,
}

#[derive(Debug, Deserialize)]
struct PackageEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// Parse `groups.toml` content into package declarations tagged with their
/// group, preserving file order.
///
/// # Errors
///
/// Returns a [`ParseError::Malformed`] when the TOML is invalid.
pub fn parse(content: &str) -> Result<Vec<PackageDeclaration>, ParseError> {
    let file: GroupsFile = toml::from_str(content).map_err(|e| ParseError::Malformed {
        file: "groups.toml".to_string(),
        message: e.message().to_string(),
    })?;

    Ok(file
        .group
        .into_iter()
        .flat_map(|group| {
            let group_name = group.name;
            group
                .packages
                .into_iter()
                .map(move |entry| PackageDeclaration {
                    name: entry.name,
                    group: Some(group_name.clone()),
                    description: entry.description,
                })
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_in_order() {
        let content = r#"
            [[group]]
            name = "dev"
            description = "Developer tools"

            [[group.packages]]
            name = "git"
            description = "Version control"

            [[group.packages]]
            name = "jq"

            [[group]]
            name = "shell"
            description = "Shell utilities"

            [[group.packages]]
            name = "fzf"
        "#;
        let packages = parse(content).unwrap();
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].name, "git");
        assert_eq!(packages[0].group.as_deref(), Some("dev"));
        assert_eq!(packages[0].description.as_deref(), Some("Version control"));
        assert_eq!(packages[1].name, "jq");
        assert_eq!(packages[1].description, None);
        assert_eq!(packages[2].name, "fzf");
        assert_eq!(packages[2].group.as_deref(), Some("shell"));
    }

    #[test]
    fn empty_file_yields_no_packages() {
        assert_eq!(parse("").unwrap(), Vec::new());
    }

    #[test]
    fn group_without_packages_is_fine() {
        let content = r#"
            [[group]]
            name = "empty"
            description = "Nothing yet"
        "#;
        assert_eq!(parse(content).unwrap(), Vec::new());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse("[[group]\nname = ").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { ref file, .. } if file == "groups.toml"));
    }

    #[test]
    fn missing_package_name_is_a_parse_error() {
        let content = r#"
            [[group]]
            name = "dev"

            [[group.packages]]
            description = "no name"
        "#;
        assert!(parse(content).is_err());
    }
}
