use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Parser configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```yaml
/// wrap_sections: false
/// extra_commands:
///   hl: { open: "<mark>", close: "</mark>" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Wrap each section in `<div class="article-section">`.
    pub wrap_sections: bool,
    /// Remove `%` comments before parsing.
    pub strip_comments: bool,
    /// Treat a missing `\begin{document}` as fatal instead of rendering the
    /// whole input as the body.
    pub require_document: bool,
    /// Render `\item[label]` in itemize/enumerate as an emphasized lead-in.
    pub render_item_labels: bool,
    /// Inputs longer than this many bytes are rejected.
    pub max_input_bytes: usize,
    /// Inline commands on top of the built-in table. Entries here shadow
    /// built-in ones of the same name.
    pub extra_commands: BTreeMap<String, CommandWrapper>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            wrap_sections: true,
            strip_comments: true,
            require_document: false,
            render_item_labels: true,
            max_input_bytes: 4 * 1024 * 1024,
            extra_commands: BTreeMap::new(),
        }
    }
}

/// Opening and closing HTML for a configured inline command.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandWrapper {
    pub open: String,
    pub close: String,
}

pub fn load_options_from_yaml_file(path: &Path) -> Result<Options, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_options_from_yaml_str(&content)
}

pub fn load_options_from_yaml_str(content: &str) -> Result<Options, ConfigError> {
    let options = serde_yaml::from_str::<Options>(content)?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let options = load_options_from_yaml_str("{}").unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn partial_override() {
        let options = load_options_from_yaml_str("wrap_sections: false\n").unwrap();
        assert!(!options.wrap_sections);
        assert!(options.strip_comments);
    }

    #[test]
    fn extra_commands() {
        let yaml = "extra_commands:\n  hl: { open: \"<mark>\", close: \"</mark>\" }\n";
        let options = load_options_from_yaml_str(yaml).unwrap();
        let hl = &options.extra_commands["hl"];
        assert_eq!(hl.open, "<mark>");
        assert_eq!(hl.close, "</mark>");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = load_options_from_yaml_str("wrap_section: false\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
