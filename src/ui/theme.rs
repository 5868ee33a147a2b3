use crate::output::color_choice;
use owo_colors::Style;
use std::sync::OnceLock;

static STDOUT_THEME: OnceLock<Theme> = OnceLock::new();
static STDERR_THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for the things the CLI prints
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub label: Style,
    /// Primary keys (record file names)
    pub primary_key: Style,
    /// Derived keys (index directory names)
    pub index_key: Style,
    pub path: Style,
}

impl Theme {
    pub fn for_term(term: &console::Term) -> Self {
        if color_choice().enabled_for(term) {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            label: Style::new().white().dimmed(),
            primary_key: Style::new().blue().bold(),
            index_key: Style::new().magenta(),
            path: Style::new().underline(),
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            error: none,
            warn: none,
            label: none,
            primary_key: none,
            index_key: none,
            path: none,
        }
    }
}

/// Theme for results and progress written to stdout
pub fn theme() -> &'static Theme {
    STDOUT_THEME.get_or_init(|| Theme::for_term(&console::Term::stdout()))
}

/// Theme for errors and warnings written to stderr
pub fn stderr_theme() -> &'static Theme {
    STDERR_THEME.get_or_init(|| Theme::for_term(&console::Term::stderr()))
}
