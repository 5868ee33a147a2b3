//! Environment switches for CLI output
//!
//! - `NONDB_QUIET=1` silences the human-readable chatter (results still print)
//! - `NONDB_COLOR=always|never|auto` overrides terminal detection
//! - `NO_COLOR` disables color under `auto`

use std::sync::OnceLock;

pub const QUIET_VAR: &str = "NONDB_QUIET";
pub const COLOR_VAR: &str = "NONDB_COLOR";

static QUIET: OnceLock<bool> = OnceLock::new();
static COLOR: OnceLock<ColorChoice> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Unknown values fall back to `Auto`
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("always" | "1" | "true" | "yes") => Self::Always,
            Some("never" | "0" | "false" | "no") => Self::Never,
            _ => Self::Auto,
        }
    }

    /// Whether to color output written to `term`
    pub fn enabled_for(self, term: &console::Term) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::env::var_os("NO_COLOR").is_none() && term.is_term(),
        }
    }
}

pub fn color_choice() -> ColorChoice {
    *COLOR.get_or_init(|| ColorChoice::parse(std::env::var(COLOR_VAR).ok().as_deref()))
}

pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| flag_set(std::env::var(QUIET_VAR).ok().as_deref()))
}

fn flag_set(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_flag_values() {
        for on in ["1", "true", "TRUE", " yes "] {
            assert!(flag_set(Some(on)), "{on}");
        }
        for off in ["", "0", "false", "quiet"] {
            assert!(!flag_set(Some(off)), "{off}");
        }
        assert!(!flag_set(None));
    }

    #[test]
    fn test_color_choice_parse() {
        assert_eq!(ColorChoice::parse(Some("always")), ColorChoice::Always);
        assert_eq!(ColorChoice::parse(Some(" Never")), ColorChoice::Never);
        assert_eq!(ColorChoice::parse(Some("auto")), ColorChoice::Auto);
        assert_eq!(ColorChoice::parse(Some("sometimes")), ColorChoice::Auto);
        assert_eq!(ColorChoice::parse(None), ColorChoice::Auto);
    }

    #[test]
    fn test_forced_choices_ignore_terminal() {
        let term = console::Term::stdout();
        assert!(ColorChoice::Always.enabled_for(&term));
        assert!(!ColorChoice::Never.enabled_for(&term));
    }
}
