//! Structural Parser
//!
//! Line-oriented, indentation-driven parser for the annotated Python subset.
//! Statements are recognised by their leading keyword; expressions are handed to
//! `rustpython-parser` and lowered into the AST model, falling back to
//! [`Expr::Raw`] when no structural rule applies.
//!
//! ## Architecture
//! - **Scanning**: physical lines are joined into logical lines (open brackets,
//!   open triple-quoted strings and trailing backslashes continue a line), comments
//!   are stripped and the indent level is `leading spaces / 4`.
//! - **Blocks**: [`Parser::parse_block`] consumes statements at one indent level;
//!   block headers (`class`, `def`, `if`, `for`, `while`, `try`) recurse.
//! - **Simple statements**: annotated assignment, assignment (including tuple
//!   unpacking and augmented forms) and expression statements.
//!
//! Parsing is fail-fast: the first problem aborts with a [`ParseError`] and no
//! partial module is returned.

use crate::ast::{Alias, BinOp, Constant, ExceptHandler, Expr, Module, Parameter, Stmt};
use crate::lowering::lower_expression;
use rustpython_parser::{ast, Parse};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{filename}:{line}: {message}")]
pub struct ParseError {
    pub filename: String,
    pub line: usize,
    pub message: String,
}

/// A logical source line with its indentation stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    number: usize,
    indent: usize,
    text: String,
}

/// Parses a whole source file into a [`Module`].
pub fn parse_module(source: &str, filename: &str) -> Result<Module, ParseError> {
    let lines = scan_lines(source, filename)?;
    debug!(filename, lines = lines.len(), "parsing module");
    let mut parser = Parser {
        filename,
        lines,
        pos: 0,
    };
    let body = parser.parse_block(0)?;
    if let Some(line) = parser.peek() {
        return Err(parser.error(line.number, "unexpected indent"));
    }
    Ok(Module { body })
}

/// Parses a single expression, falling back to [`Expr::Raw`] on anything the
/// structural lowering does not cover.
pub fn parse_expression(text: &str) -> Expr {
    let text = text.trim();
    match ast::Expr::parse(text, "<expr>") {
        Ok(parsed) => match lower_expression(&parsed) {
            Ok(expr) => expr,
            Err(err) => {
                trace!(%err, text, "keeping expression as raw text");
                Expr::Raw(text.to_owned())
            }
        },
        Err(err) => {
            trace!(error = %err.error, text, "keeping unparsable expression as raw text");
            Expr::Raw(text.to_owned())
        }
    }
}

// ============================================================================
// Line Scanning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Quote {
    ch: char,
    triple: bool,
}

/// Bracket depth and string state carried across physical lines.
#[derive(Debug, Default)]
struct LineScanner {
    depth: usize,
    quote: Option<Quote>,
}

impl LineScanner {
    fn is_open(&self) -> bool {
        self.depth > 0 || self.quote.is_some()
    }

    /// Scans one physical line. Returns the code with any comment removed and
    /// whether it ends in an explicit `\` continuation.
    fn scan(&mut self, line: &str) -> Result<(String, bool), &'static str> {
        let chars: Vec<char> = line.chars().collect();
        let mut code = String::with_capacity(line.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if let Some(quote) = self.quote {
                code.push(c);
                if c == '\\' && i + 1 < chars.len() {
                    code.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if c == quote.ch {
                    if !quote.triple {
                        self.quote = None;
                    } else if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                        code.push(c);
                        code.push(c);
                        i += 2;
                        self.quote = None;
                    }
                }
                i += 1;
                continue;
            }
            match c {
                '#' => break,
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    self.quote = Some(Quote { ch: c, triple });
                    if triple {
                        code.push(c);
                        code.push(c);
                        i += 2;
                    }
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            code.push(c);
            i += 1;
        }

        if let Some(quote) = self.quote {
            if !quote.triple {
                if code.ends_with('\\') {
                    code.pop();
                    return Ok((code, true));
                }
                return Err("unterminated string literal");
            }
            return Ok((code, false));
        }

        let trimmed = code.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            return Ok((stripped.to_owned(), true));
        }
        let len = trimmed.len();
        code.truncate(len);
        Ok((code, false))
    }
}

struct Pending {
    number: usize,
    indent: usize,
    text: String,
}

fn scan_lines(source: &str, filename: &str) -> Result<Vec<Line>, ParseError> {
    let error = |line: usize, message: &str| ParseError {
        filename: filename.to_owned(),
        line,
        message: message.to_owned(),
    };

    let mut lines = Vec::new();
    let mut scanner = LineScanner::default();
    let mut pending: Option<Pending> = None;

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let body = match pending.is_some() {
            true if scanner.quote.is_some() => raw,
            true => raw.trim_start(),
            false => {
                let content = raw.trim_start_matches(' ');
                if content.trim().is_empty() || content.starts_with('#') {
                    continue;
                }
                if content.starts_with('\t') {
                    return Err(error(number, "tab indentation is not supported"));
                }
                let spaces = raw.len() - content.len();
                pending = Some(Pending {
                    number,
                    indent: spaces / 4,
                    text: String::new(),
                });
                content
            }
        };

        let (code, continued) = scanner
            .scan(body)
            .map_err(|message| error(number, message))?;
        let Some(current) = pending.as_mut() else {
            continue;
        };
        current.text.push_str(&code);

        if scanner.quote.map_or(false, |q| q.triple) {
            current.text.push('\n');
            continue;
        }
        if continued || scanner.is_open() {
            if !current.text.ends_with(' ') {
                current.text.push(' ');
            }
            continue;
        }

        if let Some(done) = pending.take() {
            let text = done.text.trim_end().to_owned();
            // a line that held only a comment after continuation handling
            if !text.is_empty() {
                lines.push(Line {
                    number: done.number,
                    indent: done.indent,
                    text,
                });
            }
        }
    }

    if let Some(open) = pending {
        let message = if scanner.quote.is_some() {
            "unterminated triple-quoted string"
        } else {
            "unexpected end of file inside brackets"
        };
        return Err(error(open.number, message));
    }
    Ok(lines)
}

// ============================================================================
// Top-level text helpers
// ============================================================================

/// Byte offsets and characters of `text` that sit outside brackets and strings.
fn top_level_chars(text: &str) -> Vec<(usize, char)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    for (i, c) in outside_strings(text) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push((i, c)),
            _ => {}
        }
    }
    out
}

/// Byte offsets and characters of `text` outside string literals. Triple
/// quotes open and close as a unit, so `"""a "b" c"""` is one literal.
fn outside_strings(text: &str) -> Vec<(usize, char)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let tripled = |at: usize, c: char| {
        chars.get(at + 1).map(|&(_, n)| n) == Some(c) && chars.get(at + 2).map(|&(_, n)| n) == Some(c)
    };
    let mut out = Vec::new();
    let mut quote: Option<Quote> = None;
    let mut k = 0;
    while k < chars.len() {
        let (i, c) = chars[k];
        match quote {
            Some(_) if c == '\\' => k += 1,
            Some(q) if c == q.ch && !q.triple => quote = None,
            Some(q) if c == q.ch && tripled(k, c) => {
                quote = None;
                k += 2;
            }
            Some(_) => {}
            None if c == '\'' || c == '"' => {
                let triple = tripled(k, c);
                quote = Some(Quote { ch: c, triple });
                if triple {
                    k += 2;
                }
            }
            None => out.push((i, c)),
        }
        k += 1;
    }
    out
}

/// True when the whole of `text` is a single string literal, e.g. a docstring.
fn is_string_literal(text: &str) -> bool {
    let text = text.trim();
    let body = text.trim_start_matches(|c: char| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U'));
    if !(body.starts_with('"') || body.starts_with('\'')) {
        return false;
    }
    outside_strings(body).is_empty() && matches!(parse_expression(text), Expr::Constant(Constant::Str(_)))
}

/// Splits on top-level occurrences of `sep`.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level_chars(text) {
        if c == sep {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Finds the first top-level occurrence of the word `needle` (e.g. `" in "`).
fn find_top_level(text: &str, needle: &str) -> Option<usize> {
    let top: Vec<usize> = top_level_chars(text).into_iter().map(|(i, _)| i).collect();
    top.iter().copied().find(|&i| {
        text[i..].starts_with(needle)
            && needle
                .char_indices()
                .all(|(offset, _)| top.binary_search(&(i + offset)).is_ok())
    })
}

/// If `text` starts with the keyword `kw` as a whole word, returns the rest.
fn strip_keyword<'t>(text: &'t str, kw: &str) -> Option<&'t str> {
    let rest = text.strip_prefix(kw)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_alphanumeric() || c == '_' => None,
        Some(_) => Some(rest.trim_start()),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_dotted_identifier(text: &str) -> bool {
    text.split('.').all(|part| is_identifier(part.trim()))
}

/// Assignment operators found at the top level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    Plain,
    Augmented(BinOp),
}

/// Locates top-level assignment operators: `(start, end, op)` byte ranges.
fn find_assign_ops(text: &str) -> Vec<(usize, usize, AssignOp)> {
    let top = top_level_chars(text);
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    for (i, c) in top {
        if c != '=' {
            continue;
        }
        if bytes.get(i + 1) == Some(&b'=') {
            continue;
        }
        let prev = if i > 0 { bytes[i - 1] } else { 0 };
        let prev2 = if i > 1 { bytes[i - 2] } else { 0 };
        let found_op = match prev {
            b'=' | b'!' | b':' => None,
            b'<' if prev2 == b'<' => Some((i - 2, AssignOp::Augmented(BinOp::LShift))),
            b'>' if prev2 == b'>' => Some((i - 2, AssignOp::Augmented(BinOp::RShift))),
            b'<' | b'>' => None,
            b'*' if prev2 == b'*' => Some((i - 2, AssignOp::Augmented(BinOp::Pow))),
            b'/' if prev2 == b'/' => Some((i - 2, AssignOp::Augmented(BinOp::FloorDiv))),
            b'+' => Some((i - 1, AssignOp::Augmented(BinOp::Add))),
            b'-' => Some((i - 1, AssignOp::Augmented(BinOp::Sub))),
            b'*' => Some((i - 1, AssignOp::Augmented(BinOp::Mul))),
            b'/' => Some((i - 1, AssignOp::Augmented(BinOp::Div))),
            b'%' => Some((i - 1, AssignOp::Augmented(BinOp::Mod))),
            b'&' => Some((i - 1, AssignOp::Augmented(BinOp::BitAnd))),
            b'|' => Some((i - 1, AssignOp::Augmented(BinOp::BitOr))),
            b'^' => Some((i - 1, AssignOp::Augmented(BinOp::BitXor))),
            _ => Some((i, AssignOp::Plain)),
        };
        if let Some((start, op)) = found_op {
            found.push((start, i + 1, op));
        }
    }
    found
}

// ============================================================================
// Block Parser
// ============================================================================

struct Parser<'a> {
    filename: &'a str,
    lines: Vec<Line>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            filename: self.filename.to_owned(),
            line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<Line> {
        self.lines.get(self.pos).cloned()
    }

    /// Consumes statements while the next line sits at `indent`.
    fn parse_block(&mut self, indent: usize) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(self.error(line.number, "unexpected indent"));
            }
            body.push(self.parse_statement(&line)?);
        }
        Ok(body)
    }

    /// Parses the indented body following a block header at `header`.
    fn parse_suite(&mut self, header: &Line) -> Result<Vec<Stmt>, ParseError> {
        match self.peek() {
            Some(next) if next.indent > header.indent => self.parse_block(next.indent),
            _ => Err(self.error(header.number, "expected an indented block")),
        }
    }

    /// Returns the header text without its trailing `:`.
    fn header<'t>(&self, line: &Line, rest: &'t str, keyword: &str) -> Result<&'t str, ParseError> {
        rest.trim_end()
            .strip_suffix(':')
            .map(str::trim)
            .ok_or_else(|| self.error(line.number, format!("expected ':' after '{}' header", keyword)))
    }

    /// Consumes a continuation clause (`else:`, `finally:`) at the same indent.
    fn parse_clause(&mut self, owner: &Line, keyword: &str) -> Result<Option<Vec<Stmt>>, ParseError> {
        let Some(line) = self.peek() else {
            return Ok(None);
        };
        if line.indent != owner.indent {
            return Ok(None);
        }
        let Some(rest) = strip_keyword(&line.text, keyword) else {
            return Ok(None);
        };
        let header = self.header(&line, rest, keyword)?;
        if !header.is_empty() {
            return Err(self.error(line.number, format!("unexpected text after '{}'", keyword)));
        }
        self.pos += 1;
        self.parse_suite(&line).map(Some)
    }

    fn parse_statement(&mut self, line: &Line) -> Result<Stmt, ParseError> {
        let text = line.text.as_str();
        trace!(line = line.number, text, "statement");

        if text.starts_with('@') {
            return self.parse_decorated(line);
        }
        if let Some(rest) = strip_keyword(text, "import") {
            self.pos += 1;
            return self.parse_import(line, rest);
        }
        if let Some(rest) = strip_keyword(text, "from") {
            self.pos += 1;
            return self.parse_import_from(line, rest);
        }
        if let Some(rest) = strip_keyword(text, "class") {
            self.pos += 1;
            return self.parse_class(line, rest, Vec::new());
        }
        if let Some(rest) = strip_keyword(text, "def") {
            self.pos += 1;
            return self.parse_function(line, rest, Vec::new());
        }
        if let Some(rest) = strip_keyword(text, "if") {
            self.pos += 1;
            let test = self.header(line, rest, "if")?;
            return self.parse_if(line, test);
        }
        if let Some(rest) = strip_keyword(text, "for") {
            self.pos += 1;
            return self.parse_for(line, rest);
        }
        if let Some(rest) = strip_keyword(text, "while") {
            self.pos += 1;
            let test = parse_expression(self.header(line, rest, "while")?);
            let body = self.parse_suite(line)?;
            let orelse = self.parse_clause(line, "else")?.unwrap_or_default();
            return Ok(Stmt::While { test, body, orelse });
        }
        if let Some(rest) = strip_keyword(text, "try") {
            self.pos += 1;
            return self.parse_try(line, rest);
        }
        for orphan in ["elif", "else", "except", "finally"] {
            if strip_keyword(text, orphan).is_some() {
                return Err(self.error(line.number, format!("'{}' without a matching block", orphan)));
            }
        }
        for unsupported in ["with", "async", "global", "nonlocal", "del", "assert", "yield", "lambda"] {
            if strip_keyword(text, unsupported).is_some() {
                return Err(self.error(
                    line.number,
                    format!("unsupported statement '{}'", unsupported),
                ));
            }
        }

        self.pos += 1;
        if let Some(rest) = strip_keyword(text, "return") {
            let value = (!rest.is_empty()).then(|| parse_expression(rest));
            return Ok(Stmt::Return(value));
        }
        if let Some(rest) = strip_keyword(text, "raise") {
            let value = (!rest.is_empty()).then(|| parse_expression(rest));
            return Ok(Stmt::Raise(value));
        }
        match text {
            "pass" => return Ok(Stmt::Pass),
            "break" => return Ok(Stmt::Break),
            "continue" => return Ok(Stmt::Continue),
            _ => {}
        }
        if text.ends_with(':') {
            return Err(self.error(line.number, "unsupported block statement"));
        }
        self.parse_simple(line)
    }

    fn parse_decorated(&mut self, line: &Line) -> Result<Stmt, ParseError> {
        let mut decorators = Vec::new();
        while let Some(next) = self.peek() {
            if next.indent != line.indent || !next.text.starts_with('@') {
                break;
            }
            let name = next.text[1..].trim();
            if name.is_empty() {
                return Err(self.error(next.number, "empty decorator"));
            }
            decorators.push(name.to_owned());
            self.pos += 1;
        }
        let target = match self.peek() {
            Some(target) if target.indent == line.indent => target,
            _ => {
                return Err(self.error(
                    line.number,
                    "decorator must precede a class or function definition",
                ))
            }
        };
        self.pos += 1;
        if let Some(rest) = strip_keyword(&target.text, "class") {
            return self.parse_class(&target, rest, decorators);
        }
        if let Some(rest) = strip_keyword(&target.text, "def") {
            return self.parse_function(&target, rest, decorators);
        }
        Err(self.error(
            target.number,
            "decorator must precede a class or function definition",
        ))
    }

    fn parse_aliases(&self, line: &Line, text: &str) -> Result<Vec<Alias>, ParseError> {
        let mut names = Vec::new();
        for item in split_top_level(text, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, asname) = match item.split_once(" as ") {
                Some((name, asname)) => (name.trim(), Some(asname.trim().to_owned())),
                None => (item, None),
            };
            if !is_dotted_identifier(name) || asname.as_deref().map_or(false, |a| !is_identifier(a)) {
                return Err(self.error(line.number, format!("invalid import name '{}'", item)));
            }
            names.push(Alias {
                name: name.to_owned(),
                asname,
            });
        }
        if names.is_empty() {
            return Err(self.error(line.number, "import statement without names"));
        }
        Ok(names)
    }

    fn parse_import(&self, line: &Line, rest: &str) -> Result<Stmt, ParseError> {
        Ok(Stmt::Import {
            names: self.parse_aliases(line, rest)?,
        })
    }

    fn parse_import_from(&self, line: &Line, rest: &str) -> Result<Stmt, ParseError> {
        let (module, names) = rest
            .split_once(" import ")
            .ok_or_else(|| self.error(line.number, "expected 'import' in 'from' statement"))?;
        let module = module.trim();
        if !is_dotted_identifier(module.trim_start_matches('.')) && !module.chars().all(|c| c == '.') {
            return Err(self.error(line.number, format!("invalid module name '{}'", module)));
        }
        let names = names.trim();
        let names = names
            .strip_prefix('(')
            .and_then(|n| n.strip_suffix(')'))
            .unwrap_or(names);
        let names = if names == "*" {
            vec![Alias {
                name: "*".to_owned(),
                asname: None,
            }]
        } else {
            self.parse_aliases(line, names)?
        };
        Ok(Stmt::ImportFrom {
            module: module.to_owned(),
            names,
        })
    }

    fn parse_class(&mut self, line: &Line, rest: &str, decorators: Vec<String>) -> Result<Stmt, ParseError> {
        let header = self.header(line, rest, "class")?;
        let (name, bases) = match header.find('(') {
            Some(open) => {
                let inner = header[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| self.error(line.number, "malformed class header"))?;
                let bases = split_top_level(inner, ',')
                    .into_iter()
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_owned)
                    .collect();
                (header[..open].trim(), bases)
            }
            None => (header, Vec::new()),
        };
        if !is_identifier(name) {
            return Err(self.error(line.number, format!("invalid class name '{}'", name)));
        }
        debug!(class = name, line = line.number, "class definition");
        let body = self.parse_suite(line)?;
        Ok(Stmt::ClassDef {
            name: name.to_owned(),
            bases,
            decorators,
            body,
        })
    }

    fn parse_function(&mut self, line: &Line, rest: &str, decorators: Vec<String>) -> Result<Stmt, ParseError> {
        let header = self.header(line, rest, "def")?;
        let open = header
            .find('(')
            .ok_or_else(|| self.error(line.number, "malformed function header"))?;
        let name = header[..open].trim();
        if !is_identifier(name) {
            return Err(self.error(line.number, format!("invalid function name '{}'", name)));
        }
        let close = matching_paren(header, open)
            .ok_or_else(|| self.error(line.number, "malformed function header"))?;
        let params = self.parse_params(line, &header[open + 1..close])?;
        let after = header[close + 1..].trim();
        let returns = after
            .strip_prefix("->")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                self.error(
                    line.number,
                    format!("function '{}' is missing a return type annotation", name),
                )
            })?;
        debug!(function = name, line = line.number, "function definition");
        let body = self.parse_suite(line)?;
        Ok(Stmt::FunctionDef {
            name: name.to_owned(),
            params,
            returns: parse_expression(returns),
            decorators,
            body,
        })
    }

    fn parse_params(&self, line: &Line, text: &str) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        for item in split_top_level(text, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if item.starts_with('*') || item == "/" {
                return Err(self.error(
                    line.number,
                    format!("variadic parameter '{}' is not supported", item),
                ));
            }
            let (decl, default) = match find_assign_ops(item).first() {
                Some(&(start, end, AssignOp::Plain)) => (item[..start].trim(), Some(parse_expression(&item[end..]))),
                Some(_) => return Err(self.error(line.number, format!("malformed parameter '{}'", item))),
                None => (item, None),
            };
            let (name, annotation) = match split_top_level(decl, ':').as_slice() {
                [name] => (name.trim(), None),
                [name, annotation] => (name.trim(), Some(parse_expression(annotation))),
                _ => return Err(self.error(line.number, format!("malformed parameter '{}'", item))),
            };
            if !is_identifier(name) {
                return Err(self.error(line.number, format!("invalid parameter name '{}'", name)));
            }
            params.push(Parameter {
                name: name.to_owned(),
                annotation,
                default,
            });
        }
        Ok(params)
    }

    fn parse_if(&mut self, line: &Line, test: &str) -> Result<Stmt, ParseError> {
        let test = parse_expression(test);
        let body = self.parse_suite(line)?;
        let mut orelse = Vec::new();
        if let Some(next) = self.peek() {
            if next.indent == line.indent {
                if let Some(rest) = strip_keyword(&next.text, "elif") {
                    self.pos += 1;
                    let elif_test = self.header(&next, rest, "elif")?;
                    orelse.push(self.parse_if(&next, elif_test)?);
                } else if let Some(block) = self.parse_clause(line, "else")? {
                    orelse = block;
                }
            }
        }
        Ok(Stmt::If { test, body, orelse })
    }

    fn parse_for(&mut self, line: &Line, rest: &str) -> Result<Stmt, ParseError> {
        let header = self.header(line, rest, "for")?;
        let split = find_top_level(header, " in ")
            .ok_or_else(|| self.error(line.number, "expected 'in' in 'for' header"))?;
        let target_text = header[..split].trim();
        let target = match parse_target_list(target_text) {
            Some(target) => target,
            None => return Err(self.error(line.number, format!("invalid loop target '{}'", target_text))),
        };
        let iter = parse_expression(&header[split + 4..]);
        let body = self.parse_suite(line)?;
        let orelse = self.parse_clause(line, "else")?.unwrap_or_default();
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    fn parse_try(&mut self, line: &Line, rest: &str) -> Result<Stmt, ParseError> {
        if !self.header(line, rest, "try")?.is_empty() {
            return Err(self.error(line.number, "unexpected text after 'try'"));
        }
        let body = self.parse_suite(line)?;
        let mut handlers = Vec::new();
        while let Some(next) = self.peek() {
            if next.indent != line.indent {
                break;
            }
            let Some(rest) = strip_keyword(&next.text, "except") else {
                break;
            };
            self.pos += 1;
            let clause = self.header(&next, rest, "except")?;
            let (type_name, name) = match clause.rsplit_once(" as ") {
                Some((ty, name)) => {
                    let name = name.trim();
                    if !is_identifier(name) {
                        return Err(self.error(next.number, format!("invalid exception name '{}'", name)));
                    }
                    (Some(ty.trim().to_owned()), Some(name.to_owned()))
                }
                None if clause.is_empty() => (None, None),
                None => (Some(clause.to_owned()), None),
            };
            let body = self.parse_suite(&next)?;
            handlers.push(ExceptHandler {
                type_name,
                name,
                body,
            });
        }
        let orelse = self.parse_clause(line, "else")?.unwrap_or_default();
        let finalbody = self.parse_clause(line, "finally")?.unwrap_or_default();
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error(
                line.number,
                "'try' requires at least one 'except' or 'finally' clause",
            ));
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    /// Annotated assignment, assignment or expression statement.
    fn parse_simple(&self, line: &Line) -> Result<Stmt, ParseError> {
        let text = line.text.as_str();

        if is_string_literal(text) {
            return Ok(Stmt::Expr(parse_expression(text)));
        }
        if let Some(&(colon, _)) = top_level_chars(text).iter().find(|&&(_, c)| c == ':') {
            let target = text[..colon].trim();
            if is_dotted_identifier(target) {
                let rest = &text[colon + 1..];
                let (annotation, value) = match find_assign_ops(rest).as_slice() {
                    [] => (rest, None),
                    [(start, end, AssignOp::Plain)] => (&rest[..*start], Some(parse_expression(&rest[*end..]))),
                    _ => return Err(self.error(line.number, "malformed annotated assignment")),
                };
                if annotation.trim().is_empty() {
                    return Err(self.error(line.number, "missing type annotation"));
                }
                return Ok(Stmt::AnnAssign {
                    target: parse_expression(target),
                    annotation: parse_expression(annotation),
                    value,
                });
            }
        }

        let ops = find_assign_ops(text);
        match ops.as_slice() {
            [] => Ok(Stmt::Expr(parse_expression(text))),
            [(start, end, op)] => {
                let lhs = text[..*start].trim();
                let value = parse_expression(&text[*end..]);
                if lhs.is_empty() {
                    return Err(self.error(line.number, "assignment without a target"));
                }
                match op {
                    AssignOp::Plain => {
                        let targets = match parse_target_list(lhs) {
                            Some(Expr::Tuple(items)) => items,
                            Some(target) => vec![target],
                            None => vec![parse_expression(lhs)],
                        };
                        Ok(Stmt::Assign { targets, value })
                    }
                    AssignOp::Augmented(op) => Ok(Stmt::AugAssign {
                        target: parse_expression(lhs),
                        op: *op,
                        value,
                    }),
                }
            }
            _ => Err(self.error(line.number, "chained assignment is not supported")),
        }
    }
}

/// Parses `a`, `a, b` or `(a, b)` style targets. Non-name elements are kept as
/// expressions so the generator can report them.
fn parse_target_list(text: &str) -> Option<Expr> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parts = split_top_level(text, ',');
    let parts: Vec<&str> = parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 {
        return Some(Expr::Tuple(parts.iter().map(|p| parse_expression(p)).collect()));
    }
    let single = parts.first()?;
    match parse_expression(single) {
        Expr::List(items) => Some(Expr::Tuple(items)),
        expr => Some(expr),
    }
}

/// Index of the `)` matching the `(` at `open`, skipping strings.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in outside_strings(&text[open..]) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_respects_brackets() {
        assert_eq!(split_top_level("a, f(b, c), 'x,y'", ','), vec!["a", " f(b, c)", " 'x,y'"]);
    }

    #[test]
    fn test_assignment_operator_detection() {
        assert!(find_assign_ops("x == 1").is_empty());
        assert!(find_assign_ops("x <= 1").is_empty());
        assert_eq!(find_assign_ops("x = 1"), vec![(2, 3, AssignOp::Plain)]);
        assert_eq!(
            find_assign_ops("x //= 2"),
            vec![(2, 5, AssignOp::Augmented(BinOp::FloorDiv))]
        );
        assert_eq!(
            find_assign_ops("x <<= 2"),
            vec![(2, 5, AssignOp::Augmented(BinOp::LShift))]
        );
        assert!(find_assign_ops("f(a=1)").is_empty());
    }

    #[test]
    fn test_triple_quoted_strings_hide_inner_quotes() {
        assert!(find_assign_ops(r#""""Returns "a=b" pairs.""""#).is_empty());
        assert!(top_level_chars(r#"'''k: 'v' '''"#).is_empty());
        assert_eq!(find_assign_ops(r#"x = """a "=" b""""#), vec![(2, 3, AssignOp::Plain)]);
        assert!(is_string_literal(r#""""Holds "k=v".""""#));
        assert!(!is_string_literal(r#""a" + b"#));
        assert_eq!(matching_paren(r#"f(""")""", x)"#, 1), Some(12));
    }

    #[test]
    fn test_find_top_level_skips_nested() {
        assert_eq!(find_top_level("x in [a in b]", " in "), Some(1));
        assert_eq!(find_top_level("(a in b)", " in "), None);
    }

    #[test]
    fn test_scanner_joins_bracket_continuations() {
        let lines = scan_lines("x = [1,\n     2]\ny = 3  # note\n", "t.py").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "x = [1, 2]");
        assert_eq!(lines[1].text, "y = 3");
        assert_eq!(lines[1].number, 3);
    }

    #[test]
    fn test_strip_keyword_needs_word_boundary() {
        assert_eq!(strip_keyword("iffy = 1", "if"), None);
        assert_eq!(strip_keyword("if x:", "if"), Some("x:"));
        assert_eq!(strip_keyword("pass", "pass"), Some(""));
    }
}
