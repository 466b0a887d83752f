//! Plain-text rendering of lexer and parser errors for the engine log.

use std::ops::Range;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::grammar::ParserError;
use crate::lexer::{LexerError, Span};

const SOURCE_ID: &str = "repl";

pub fn render_lexer_errors(source: &str, errors: &[LexerError]) -> String {
    errors
        .iter()
        .map(|err| render(source, err.span(), &err.to_string()))
        .collect()
}

pub fn render_parser_errors(source: &str, errors: &[ParserError]) -> String {
    errors
        .iter()
        .map(|err| render(source, err.span, &err.message))
        .collect()
}

fn render(source: &str, span: Span, message: &str) -> String {
    let range: Range<usize> = span.into();
    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, SOURCE_ID.to_string(), range.start)
        .with_config(Config::default().with_color(false))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID.to_string(), range)).with_message(message))
        .finish()
        .write((SOURCE_ID.to_string(), Source::from(source)), &mut out);
    if written.is_err() {
        return format!("{message}\n");
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::render_lexer_errors;
    use crate::lexer::tokenize;

    #[test]
    fn lexer_errors_mention_the_message() {
        let errors = tokenize("1 $ 2").expect_err("should fail");
        let text = render_lexer_errors("1 $ 2", &errors);
        assert!(text.contains("unexpected character `$`"));
    }
}
