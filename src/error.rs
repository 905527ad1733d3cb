use crate::codegen::GenerationError;
use crate::parser::ParseError;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::io;
use thiserror::Error;

/// Any failure of a whole-file translation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranspileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Byte range of the 1-based `line` in `source`, clamped to the text.
fn line_span(source: &str, line: usize) -> std::ops::Range<usize> {
    let mut start = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let end = start + text.trim_end_matches(['\r', '\n']).len();
            return start..end.max(start + 1);
        }
        start += text.len();
    }
    let end = source.len();
    end.saturating_sub(1)..end
}

/// Display a parse error with ariadne formatting
pub fn display_parse_error(source: &str, filename: &str, error: &ParseError) -> io::Result<()> {
    let span = line_span(source, error.line);

    Report::build(ReportKind::Error, filename, span.start)
        .with_message(format!("Parse error: {}", error.message))
        .with_label(
            Label::new((filename, span))
                .with_message(format!("{}:{}: {}", error.filename, error.line, error.message))
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)))
}

/// Display a code generation error with ariadne formatting
pub fn display_generation_error(
    source: &str,
    filename: &str,
    error: &GenerationError,
) -> io::Result<()> {
    Report::build(ReportKind::Error, filename, 0)
        .with_message("Code generation error")
        .with_label(
            Label::new((filename, 0..source.len().min(1)))
                .with_message(error.to_string())
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename, Source::from(source)))
}

pub fn display_transpile_error(
    source: &str,
    filename: &str,
    error: &TranspileError,
) -> io::Result<()> {
    match error {
        TranspileError::Parse(error) => display_parse_error(source, filename, error),
        TranspileError::Generation(error) => display_generation_error(source, filename, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_span_points_at_line() {
        let source = "a = 1\nbad line\nc = 3\n";
        assert_eq!(&source[line_span(source, 2)], "bad line");
        assert_eq!(line_span(source, 1), 0..5);
    }

    #[test]
    fn test_error_messages_pass_through() {
        let parse: TranspileError = ParseError {
            filename: "m.py".to_string(),
            line: 4,
            message: "unexpected indent".to_string(),
        }
        .into();
        assert_eq!(parse.to_string(), "m.py:4: unexpected indent");
        let generation: TranspileError = GenerationError::new("boom").into();
        assert_eq!(generation.to_string(), "boom");
    }

    #[test]
    fn test_display_reports_write_result() {
        let error: TranspileError = GenerationError::new("boom").into();
        assert!(display_transpile_error("x = 1\n", "m.py", &error).is_ok());
    }
}
