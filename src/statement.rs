//! Read configuration/schema source text into a statement tree.
//!
//! A statement is `keyword argument? ( ';' | '{' statement* '}' )`; `//`
//! starts an end-of-line comment and `/* ... */` a block comment. Arguments
//! may be bare tokens, single-quoted (literal) or double-quoted (with
//! `\n \t \" \\` escapes). Every statement keeps its source location for
//! diagnostics.

use pest::Parser;
use pest_derive::Parser as PestParser;
use std::fmt;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DocumentParser;

/// Line/column position in a source document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One node of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub keyword: String,
    pub argument: Option<String>,
    /// Present only for brace-delimited bodies; `None` for `keyword arg;`.
    pub body: Option<Vec<Statement>>,
    pub loc: Location,
}

impl Statement {
    pub fn is_compound(&self) -> bool {
        self.body.is_some()
    }

    pub fn substatements(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{source_name}:{loc}: {message}")]
pub struct SyntaxError {
    pub source_name: String,
    pub loc: Location,
    pub message: String,
}

/// Parse a whole document into its top-level statements.
pub fn parse_document(text: &str, source_name: &str) -> Result<Vec<Statement>, SyntaxError> {
    let mut pairs = DocumentParser::parse(Rule::document, text)
        .map_err(|e| syntax_error(e, source_name))?;
    let document = match pairs.next() {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };
    Ok(document
        .into_inner()
        .filter(|p| p.as_rule() == Rule::statement)
        .map(build_statement)
        .collect())
}

/// Parse a document that consists of a single argument, as used by bare
/// scalar grammars. Returns `None` for an empty (or comment-only) document.
pub fn parse_bare_argument(text: &str, source_name: &str) -> Result<Option<String>, SyntaxError> {
    let mut pairs = DocumentParser::parse(Rule::bare_value, text)
        .map_err(|e| syntax_error(e, source_name))?;
    let value = match pairs.next() {
        Some(p) => p,
        None => return Ok(None),
    };
    Ok(value
        .into_inner()
        .find(|p| p.as_rule() == Rule::argument)
        .map(argument_text))
}

fn build_statement(pair: pest::iterators::Pair<Rule>) -> Statement {
    let (line, column) = pair.as_span().start_pos().line_col();
    let mut keyword = String::new();
    let mut argument = None;
    let mut body = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::keyword => keyword = inner.as_str().to_string(),
            Rule::argument => argument = Some(argument_text(inner)),
            Rule::block => {
                body = Some(
                    inner
                        .into_inner()
                        .filter(|p| p.as_rule() == Rule::statement)
                        .map(build_statement)
                        .collect(),
                )
            }
            _ => {}
        }
    }
    Statement {
        keyword,
        argument,
        body,
        loc: Location { line, column },
    }
}

fn argument_text(pair: pest::iterators::Pair<Rule>) -> String {
    let inner = match pair.into_inner().next() {
        Some(p) => p,
        None => return String::new(),
    };
    let s = inner.as_str();
    match inner.as_rule() {
        Rule::dquoted => unescape(&s[1..s.len() - 1]),
        Rule::squoted => s[1..s.len() - 1].to_string(),
        _ => s.to_string(),
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn syntax_error(e: pest::error::Error<Rule>, source_name: &str) -> SyntaxError {
    let (line, column) = match e.line_col {
        pest::error::LineColLocation::Pos((l, c)) => (l, c),
        pest::error::LineColLocation::Span((l, c), _) => (l, c),
    };
    SyntaxError {
        source_name: source_name.to_string(),
        loc: Location { line, column },
        message: e.variant.message().to_string(),
    }
}
