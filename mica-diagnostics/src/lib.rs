// Diagnostics for the Mica toolchain
// Spans, severity levels, rendering with source excerpts, and exit codes

use colored::Colorize;
use std::fmt;

/// Byte range into the original source buffer.
pub type Span = std::ops::Range<usize>;

/// Line/column pair recovered from a span, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Recover the line and column of a byte offset by counting newlines.
    pub fn of(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let column = offset - before.rfind('\n').map_or(0, |p| p + 1) + 1;
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// What stage produced a diagnostic. Drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    File,
    Parse,
    Type,
    Scope,
    Emit,
    Runtime,
}

impl Category {
    pub fn exit_code(self) -> i32 {
        match self {
            Category::File => 1,
            Category::Parse => 2,
            Category::Type => 3,
            Category::Scope => 4,
            Category::Emit => 5,
            Category::Runtime => 6,
        }
    }
}

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "{}", "error".red().bold()),
            Level::Warning => write!(f, "{}", "warning".yellow().bold()),
            Level::Note => write!(f, "{}", "note".cyan().bold()),
        }
    }
}

/// A secondary message attached to a diagnostic, e.g. a previous definition.
#[derive(Debug, Clone)]
pub struct Note {
    pub message: String,
    pub span: Option<Span>,
}

/// A single reportable problem with a primary span.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub category: Category,
    pub message: String,
    pub span: Span,
    pub notes: Vec<Note>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>, span: Span) -> Self {
        Self {
            level: Level::Error,
            category,
            message: message.into(),
            span,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn with_note(mut self, message: impl Into<String>, span: Option<Span>) -> Self {
        self.notes.push(Note {
            message: message.into(),
            span,
        });
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Render this diagnostic with the offending source line and a caret.
    pub fn render(&self, file: &str, source: &str) -> String {
        let mut out = String::new();
        render_snippet(
            &mut out,
            self.level,
            &self.message,
            file,
            source,
            &self.span,
        );
        for note in &self.notes {
            match &note.span {
                Some(span) => {
                    render_snippet(&mut out, Level::Note, &note.message, file, source, span)
                }
                None => out.push_str(&format!("{}: {}\n", Level::Note, note.message)),
            }
        }
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!(
                "{}: did you mean `{}`?\n",
                "help".green().bold(),
                suggestion
            ));
        }
        out
    }
}

fn render_snippet(
    out: &mut String,
    level: Level,
    message: &str,
    file: &str,
    source: &str,
    span: &Span,
) {
    let loc = Location::of(source, span.start);
    out.push_str(&format!("{}: {}\n", level, message));
    out.push_str(&format!(
        "  {} {}:{}\n",
        "-->".blue().bold(),
        file,
        loc
    ));

    let line_start = source[..span.start.min(source.len())]
        .rfind('\n')
        .map_or(0, |p| p + 1);
    let line_end = source[line_start..]
        .find('\n')
        .map_or(source.len(), |p| line_start + p);
    let line = &source[line_start..line_end];
    let caret_len = span.end.saturating_sub(span.start).clamp(1, line.len().max(1));

    out.push_str(&format!("  {}\n", line));
    out.push_str(&format!(
        "  {}{}\n",
        " ".repeat(loc.column - 1),
        "^".repeat(caret_len).green().bold()
    ));
}

/// Pick the closest visible name for a "did you mean" hint.
/// Returns `None` when nothing is within edit distance 2.
pub fn closest_match<'a, I>(wanted: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|c| (strsim::levenshtein(wanted, c), c))
        .filter(|(d, _)| *d <= 2 && *d > 0)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_of() {
        let src = "fn main() {\n  x := 1;\n}\n";
        assert_eq!(Location::of(src, 0), Location { line: 1, column: 1 });
        assert_eq!(Location::of(src, 14), Location { line: 2, column: 3 });
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Category::File.exit_code(), 1);
        assert_eq!(Category::Parse.exit_code(), 2);
        assert_eq!(Category::Type.exit_code(), 3);
        assert_eq!(Category::Scope.exit_code(), 4);
        assert_eq!(Category::Emit.exit_code(), 5);
        assert_eq!(Category::Runtime.exit_code(), 6);
    }

    #[test]
    fn test_closest_match() {
        let names = ["print", "main", "scale"];
        assert_eq!(closest_match("prnt", names.iter().copied()), Some("print"));
        assert_eq!(closest_match("zzzzz", names.iter().copied()), None);
        // An exact match is not a suggestion
        assert_eq!(closest_match("main", names.iter().copied()), None);
    }

    #[test]
    fn test_render_contains_caret() {
        let src = "x := y;\n";
        let d = Diagnostic::error(Category::Scope, "undeclared name", 5..6);
        let rendered = d.render("test.mica", src);
        assert!(rendered.contains("undeclared name"));
        assert!(rendered.contains("test.mica:1:6"));
    }
}
