//! The inline command table.
//!
//! Maps a command name (without the backslash) to the HTML that wraps its
//! braced argument. The built-in table is a compile-time `phf` map; callers
//! can layer extra commands on top through [`crate::Options`].

use std::collections::BTreeMap;

use phf::phf_map;

use crate::config::CommandWrapper;

/// Opening and closing HTML for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrapper<'a> {
    pub open: &'a str,
    pub close: &'a str,
}

const fn wrap(open: &'static str, close: &'static str) -> Wrapper<'static> {
    Wrapper { open, close }
}

static BUILTIN: phf::Map<&'static str, Wrapper<'static>> = phf_map! {
    "textbf" => wrap("<strong>", "</strong>"),
    "emph" => wrap("<em>", "</em>"),
    "textit" => wrap("<em>", "</em>"),
    "textsl" => wrap("<em>", "</em>"),
    "texttt" => wrap("<code>", "</code>"),
    "underline" => wrap("<u>", "</u>"),
    "textsc" => wrap("<span class=\"small-caps\">", "</span>"),
    "textsf" => wrap("<span class=\"tex-sans\">", "</span>"),
    "textrm" => wrap("<span class=\"tex-roman\">", "</span>"),
    "textsuperscript" => wrap("<sup>", "</sup>"),
    "textsubscript" => wrap("<sub>", "</sub>"),
    "tiny" => wrap("<span class=\"tex-tiny\">", "</span>"),
    "scriptsize" => wrap("<span class=\"tex-scriptsize\">", "</span>"),
    "footnotesize" => wrap("<span class=\"tex-footnotesize\">", "</span>"),
    "small" => wrap("<span class=\"tex-small\">", "</span>"),
    "normalsize" => wrap("<span class=\"tex-normalsize\">", "</span>"),
    "large" => wrap("<span class=\"tex-large\">", "</span>"),
    "Large" => wrap("<span class=\"tex-Large\">", "</span>"),
    "LARGE" => wrap("<span class=\"tex-LARGE\">", "</span>"),
    "huge" => wrap("<span class=\"tex-huge\">", "</span>"),
    "Huge" => wrap("<span class=\"tex-Huge\">", "</span>"),
};

/// Font-size switches, which also work without braces (`\small text`).
pub const SIZE_COMMANDS: &[&str] = &[
    "tiny",
    "scriptsize",
    "footnotesize",
    "small",
    "normalsize",
    "large",
    "Large",
    "LARGE",
    "huge",
    "Huge",
];

/// Built-in commands plus any configured extras.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    extra: BTreeMap<String, CommandWrapper>,
}

impl CommandTable {
    /// The built-in table alone.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// The built-in table extended with `extra`.
    pub fn with_extra(extra: BTreeMap<String, CommandWrapper>) -> Self {
        Self { extra }
    }

    /// Look up a command by name.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<Wrapper<'_>> {
        if let Some(w) = self.extra.get(name) {
            return Some(Wrapper {
                open: &w.open,
                close: &w.close,
            });
        }
        BUILTIN.get(name).copied()
    }

    /// Check whether `name` is a known inline command.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.extra.contains_key(name) || BUILTIN.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let table = CommandTable::builtin();
        assert_eq!(table.lookup("textbf").unwrap().open, "<strong>");
        assert_eq!(table.lookup("emph").unwrap().close, "</em>");
        assert!(table.lookup("section").is_none());
    }

    #[test]
    fn extra_shadows_builtin() {
        let mut extra = BTreeMap::new();
        extra.insert(
            "textbf".to_string(),
            CommandWrapper {
                open: "<b>".into(),
                close: "</b>".into(),
            },
        );
        let table = CommandTable::with_extra(extra);
        assert_eq!(table.lookup("textbf").unwrap().open, "<b>");
        assert!(table.contains("emph"));
    }

    #[test]
    fn every_size_switch_has_a_braced_form() {
        let table = CommandTable::builtin();
        for name in SIZE_COMMANDS {
            assert!(table.contains(name), "{name}");
        }
    }
}
