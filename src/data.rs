//! Derive a document parser and a canonical printer from a compiled grammar.
//!
//! [`DataParser`] folds a statement tree into a [`Value`] instance, using the
//! table builder each table production resolved at compile time. Structural
//! mismatches abort the whole parse; no partial value is ever returned.
//! [`DataPrinter`] mirrors it: members print in sorted-keyword order, scalar
//! values equal to their default are elided (key members always print), and
//! strings are quoted when they contain whitespace, quotes, braces,
//! semicolons or slashes. Both are immutable once built and reusable across
//! documents.
//!
//! Four top-level shapes are supported: an ordinary struct body, an rpc
//! operation sequence, a bare scalar (the document is just the value text),
//! and a bare array/table (handled through a synthetic single-member
//! struct).

use crate::grammar::{
    normalize_id, ArrayProduction, Production, ScalarProduction, SequenceProduction,
    StructProduction, TableProduction,
};
use crate::statement::{parse_bare_argument, parse_document, Location, Statement, SyntaxError};
use crate::types::DecodeError;
use crate::value::{TableBuilder, TableError, Value};
use std::collections::HashMap;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("{source_name}:{loc}: argument unexpected for {keyword}")]
    UnexpectedArgument { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: {keyword} requires brace-delimited sub-parameters")]
    MissingBody { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: {keyword} does not take sub-parameters")]
    UnexpectedBody { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: missing argument for {keyword}")]
    MissingArgument { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: unrecognized parameter {keyword}")]
    UnknownKeyword { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: duplicate parameter {keyword}")]
    DuplicateParameter { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: missing mandatory parameter {keyword}")]
    MissingValue { source_name: String, loc: Location, keyword: String },
    #[error("{source_name}:{loc}: {keyword} entry is missing key leaf {key}")]
    MissingKey { source_name: String, loc: Location, keyword: String, key: String },
    #[error("{source_name}:{loc}: {keyword}: {source}")]
    Table {
        source_name: String,
        loc: Location,
        keyword: String,
        #[source]
        source: TableError,
    },
    #[error("{source_name}:{loc}: {source}")]
    Decode {
        source_name: String,
        loc: Location,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("value does not match grammar: {0}")]
    Shape(String),
}

/// The four top-level entry shapes, resolved once from the grammar root.
#[derive(Debug, Clone)]
enum Entry {
    Struct(StructProduction),
    Sequence(SequenceProduction),
    Scalar(ScalarProduction),
    /// Bare array/table, wrapped in a synthetic single-member struct.
    Wrapped { wrapper: StructProduction, id: String },
}

fn entry_shape(grammar: Production) -> Entry {
    match grammar {
        Production::Struct(s) => Entry::Struct(s),
        Production::Sequence(s) => Entry::Sequence(s),
        Production::Scalar(s) => Entry::Scalar(s),
        Production::Array(a) => wrap(a.keyword.clone(), Production::Array(a)),
        Production::Table(t) => wrap(t.keyword.clone(), Production::Table(t)),
    }
}

fn wrap(keyword: String, production: Production) -> Entry {
    let id = normalize_id(&keyword);
    let mut wrapper = StructProduction::default();
    wrapper.members.insert(keyword, production);
    Entry::Wrapped { wrapper, id }
}

/// Location of an implicit document-level body.
const DOC_START: Location = Location { line: 1, column: 1 };

struct Ctx<'a> {
    source_name: &'a str,
}

impl Ctx<'_> {
    fn here(&self, stmt: &Statement) -> (String, Location) {
        (self.source_name.to_string(), stmt.loc)
    }
}

/// Document parser derived from one grammar; immutable and reusable.
#[derive(Debug, Clone)]
pub struct DataParser {
    entry: Entry,
}

impl DataParser {
    pub fn new(grammar: Production) -> DataParser {
        DataParser { entry: entry_shape(grammar) }
    }

    /// Parse a whole document into a value instance. Any structural
    /// mismatch or decode failure aborts with no partial result.
    pub fn parse(&self, text: &str, source_name: &str) -> Result<Value, DataError> {
        let ctx = Ctx { source_name };
        match &self.entry {
            Entry::Struct(root) => {
                let statements = parse_document(text, source_name)?;
                Ok(Value::Struct(parse_struct_body(root, &statements, &ctx, DOC_START)?))
            }
            Entry::Sequence(seq) => {
                let statements = parse_document(text, source_name)?;
                parse_sequence(seq, &statements, &ctx)
            }
            Entry::Scalar(scalar) => parse_bare_scalar(scalar, text, source_name),
            Entry::Wrapped { wrapper, id } => {
                let statements = parse_document(text, source_name)?;
                let mut members = parse_struct_body(wrapper, &statements, &ctx, DOC_START)?;
                members.remove(id).ok_or_else(|| DataError::MissingValue {
                    source_name: source_name.to_string(),
                    loc: DOC_START,
                    keyword: id.clone(),
                })
            }
        }
    }
}

fn parse_bare_scalar(
    scalar: &ScalarProduction,
    text: &str,
    source_name: &str,
) -> Result<Value, DataError> {
    let start = DOC_START;
    match parse_bare_argument(text, source_name)? {
        Some(argument) => {
            let value = scalar.primitive.parse(&argument).map_err(|source| {
                DataError::Decode { source_name: source_name.to_string(), loc: start, source }
            })?;
            scalar.restrictions.check(&value).map_err(|source| DataError::Decode {
                source_name: source_name.to_string(),
                loc: start,
                source,
            })?;
            Ok(value)
        }
        None => match &scalar.default {
            Some(default) => Ok(default.clone()),
            None => Err(DataError::MissingValue {
                source_name: source_name.to_string(),
                loc: start,
                keyword: scalar.keyword.clone(),
            }),
        },
    }
}

fn parse_sequence(
    seq: &SequenceProduction,
    statements: &[Statement],
    ctx: &Ctx,
) -> Result<Value, DataError> {
    let mut calls = Vec::with_capacity(statements.len());
    for stmt in statements {
        let operation = seq.operations.get(&stmt.keyword).ok_or_else(|| {
            let (source_name, loc) = ctx.here(stmt);
            DataError::UnknownKeyword { source_name, loc, keyword: stmt.keyword.clone() }
        })?;
        if stmt.argument.is_some() {
            let (source_name, loc) = ctx.here(stmt);
            return Err(DataError::UnexpectedArgument {
                source_name,
                loc,
                keyword: stmt.keyword.clone(),
            });
        }
        // `op;` is a call with an empty body; defaults and mandatory checks
        // still apply.
        let body = parse_struct_body(operation, stmt.substatements(), ctx, stmt.loc)?;
        calls.push((stmt.keyword.clone(), Value::Struct(body)));
    }
    Ok(Value::Sequence(calls))
}

/// Per-member accumulator during one struct parse.
enum MemberAcc<'g> {
    Scalar(&'g ScalarProduction, Option<Value>),
    Array(&'g ArrayProduction, Vec<Value>),
    Table(&'g TableProduction, Box<dyn TableBuilder>),
    Struct(&'g StructProduction, Option<Value>),
}

fn init_acc(production: &Production) -> MemberAcc<'_> {
    match production {
        Production::Scalar(s) => MemberAcc::Scalar(s, None),
        Production::Array(a) => MemberAcc::Array(a, Vec::new()),
        Production::Table(t) => MemberAcc::Table(t, t.new_builder()),
        Production::Struct(s) => MemberAcc::Struct(s, None),
        // Sequences only occur at the grammar root.
        Production::Sequence(_) => unreachable!("sequence production nested in a struct"),
    }
}

fn parse_struct_body(
    prod: &StructProduction,
    statements: &[Statement],
    ctx: &Ctx,
    body_loc: Location,
) -> Result<HashMap<String, Value>, DataError> {
    let mut accs: HashMap<&str, MemberAcc> = prod
        .members
        .iter()
        .map(|(keyword, production)| (keyword.as_str(), init_acc(production)))
        .collect();

    for stmt in statements {
        let acc = accs.get_mut(stmt.keyword.as_str()).ok_or_else(|| {
            let (source_name, loc) = ctx.here(stmt);
            DataError::UnknownKeyword { source_name, loc, keyword: stmt.keyword.clone() }
        })?;
        match acc {
            MemberAcc::Scalar(scalar, slot) => parse_scalar_member(scalar, slot, stmt, ctx)?,
            MemberAcc::Array(array, items) => {
                require_simple(stmt, ctx)?;
                let argument = stmt.argument.as_deref().ok_or_else(|| {
                    let (source_name, loc) = ctx.here(stmt);
                    DataError::MissingArgument { source_name, loc, keyword: stmt.keyword.clone() }
                })?;
                let value = array.element.parse(argument).map_err(|source| {
                    let (source_name, loc) = ctx.here(stmt);
                    DataError::Decode { source_name, loc, source }
                })?;
                array.restrictions.check(&value).map_err(|source| {
                    let (source_name, loc) = ctx.here(stmt);
                    DataError::Decode { source_name, loc, source }
                })?;
                items.push(value);
            }
            MemberAcc::Table(table, builder) => {
                let body = require_compound(stmt, ctx)?;
                let entry = parse_struct_body(&table.body, body, ctx, stmt.loc)?;
                let (key, value) = split_table_entry(table, entry, stmt, ctx)?;
                builder.add(key, value).map_err(|source| {
                    let (source_name, loc) = ctx.here(stmt);
                    DataError::Table { source_name, loc, keyword: stmt.keyword.clone(), source }
                })?;
            }
            MemberAcc::Struct(inner, slot) => {
                let body = require_compound(stmt, ctx)?;
                if slot.is_some() {
                    let (source_name, loc) = ctx.here(stmt);
                    return Err(DataError::DuplicateParameter {
                        source_name,
                        loc,
                        keyword: stmt.keyword.clone(),
                    });
                }
                *slot = Some(Value::Struct(parse_struct_body(inner, body, ctx, stmt.loc)?));
            }
        }
    }

    finish_members(prod, accs, ctx, body_loc)
}

fn parse_scalar_member(
    scalar: &ScalarProduction,
    slot: &mut Option<Value>,
    stmt: &Statement,
    ctx: &Ctx,
) -> Result<(), DataError> {
    require_simple(stmt, ctx)?;
    if slot.is_some() {
        let (source_name, loc) = ctx.here(stmt);
        return Err(DataError::DuplicateParameter {
            source_name,
            loc,
            keyword: stmt.keyword.clone(),
        });
    }
    match stmt.argument.as_deref() {
        Some(argument) => {
            let value = scalar.primitive.parse(argument).map_err(|source| {
                let (source_name, loc) = ctx.here(stmt);
                DataError::Decode { source_name, loc, source }
            })?;
            scalar.restrictions.check(&value).map_err(|source| {
                let (source_name, loc) = ctx.here(stmt);
                DataError::Decode { source_name, loc, source }
            })?;
            *slot = Some(value);
            Ok(())
        }
        // An empty statement is only meaningful when a default or the
        // mandatory check at finish time resolves it.
        None if scalar.default.is_some() || scalar.mandatory => Ok(()),
        None => {
            let (source_name, loc) = ctx.here(stmt);
            Err(DataError::MissingArgument { source_name, loc, keyword: stmt.keyword.clone() })
        }
    }
}

fn split_table_entry(
    table: &TableProduction,
    mut entry: HashMap<String, Value>,
    stmt: &Statement,
    ctx: &Ctx,
) -> Result<(Value, Value), DataError> {
    for key_keyword in &table.key_keywords {
        if !entry.contains_key(&normalize_id(key_keyword)) {
            let (source_name, loc) = ctx.here(stmt);
            return Err(DataError::MissingKey {
                source_name,
                loc,
                keyword: table.keyword.clone(),
                key: key_keyword.clone(),
            });
        }
    }
    // String-keyed tables index by the bare key string; everything else by a
    // struct of key members.
    let key = match table.string_key() {
        Some(key_keyword) => match entry.remove(&normalize_id(key_keyword)) {
            Some(value) => value,
            None => unreachable!("key presence checked above"),
        },
        None => {
            let mut key_members = HashMap::with_capacity(table.key_keywords.len());
            for key_keyword in &table.key_keywords {
                let id = normalize_id(key_keyword);
                if let Some(value) = entry.remove(&id) {
                    key_members.insert(id, value);
                }
            }
            Value::Struct(key_members)
        }
    };
    Ok((key, Value::Struct(entry)))
}

fn finish_members(
    prod: &StructProduction,
    accs: HashMap<&str, MemberAcc>,
    ctx: &Ctx,
    body_loc: Location,
) -> Result<HashMap<String, Value>, DataError> {
    let mut out = HashMap::with_capacity(prod.members.len());
    for (keyword, acc) in accs {
        let id = normalize_id(keyword);
        match acc {
            MemberAcc::Scalar(scalar, slot) => match slot {
                Some(value) => {
                    out.insert(id, value);
                }
                None => {
                    if let Some(default) = &scalar.default {
                        out.insert(id, default.clone());
                    } else if scalar.mandatory {
                        return Err(DataError::MissingValue {
                            source_name: ctx.source_name.to_string(),
                            loc: body_loc,
                            keyword: keyword.to_string(),
                        });
                    }
                }
            },
            // Arrays and tables always materialize so results have a stable
            // shape; empty ones print nothing.
            MemberAcc::Array(_, items) => {
                out.insert(id, Value::Array(items));
            }
            MemberAcc::Table(_, builder) => {
                out.insert(id, Value::Table(builder.finish()));
            }
            MemberAcc::Struct(_, slot) => {
                if let Some(value) = slot {
                    out.insert(id, value);
                }
            }
        }
    }
    Ok(out)
}

fn require_simple(stmt: &Statement, ctx: &Ctx) -> Result<(), DataError> {
    if stmt.body.is_some() {
        let (source_name, loc) = ctx.here(stmt);
        return Err(DataError::UnexpectedBody { source_name, loc, keyword: stmt.keyword.clone() });
    }
    Ok(())
}

fn require_compound<'s>(stmt: &'s Statement, ctx: &Ctx) -> Result<&'s [Statement], DataError> {
    if stmt.argument.is_some() {
        let (source_name, loc) = ctx.here(stmt);
        return Err(DataError::UnexpectedArgument {
            source_name,
            loc,
            keyword: stmt.keyword.clone(),
        });
    }
    match &stmt.body {
        Some(body) => Ok(body),
        None => {
            let (source_name, loc) = ctx.here(stmt);
            Err(DataError::MissingBody { source_name, loc, keyword: stmt.keyword.clone() })
        }
    }
}

/// Canonical printer derived from one grammar; immutable and reusable.
#[derive(Debug, Clone)]
pub struct DataPrinter {
    entry: Entry,
}

impl DataPrinter {
    pub fn new(grammar: Production) -> DataPrinter {
        DataPrinter { entry: entry_shape(grammar) }
    }

    /// Print a value instance in canonical form. Fails only on io errors or
    /// when the value does not match the grammar's shape.
    pub fn print(&self, value: &Value, out: &mut dyn io::Write) -> Result<(), PrintError> {
        match &self.entry {
            Entry::Struct(root) => {
                let members = value
                    .as_struct()
                    .ok_or_else(|| PrintError::Shape(format!("expected struct, got {}", value)))?;
                print_struct_body(root, members, 0, out)
            }
            Entry::Sequence(seq) => print_sequence(seq, value, out),
            Entry::Scalar(scalar) => {
                let text = scalar
                    .primitive
                    .to_text(value)
                    .ok_or_else(|| shape_mismatch(&scalar.keyword, value))?;
                write!(out, "{}", quote_if_needed(&text))?;
                Ok(())
            }
            Entry::Wrapped { wrapper, .. } => {
                for (keyword, production) in &wrapper.members {
                    print_member(production, keyword, Some(value), 0, false, out)?;
                }
                Ok(())
            }
        }
    }

    /// Print into a fresh string.
    pub fn to_text(&self, value: &Value) -> Result<String, PrintError> {
        let mut buf = Vec::new();
        self.print(value, &mut buf)?;
        String::from_utf8(buf).map_err(|_| PrintError::Shape("non-utf8 output".to_string()))
    }
}

fn print_sequence(
    seq: &SequenceProduction,
    value: &Value,
    out: &mut dyn io::Write,
) -> Result<(), PrintError> {
    let calls = match value {
        Value::Sequence(calls) => calls,
        other => return Err(PrintError::Shape(format!("expected sequence, got {}", other))),
    };
    for (name, body) in calls {
        let operation = seq
            .operations
            .get(name)
            .ok_or_else(|| PrintError::Shape(format!("unknown operation {}", name)))?;
        let members = body
            .as_struct()
            .ok_or_else(|| shape_mismatch(name, body))?;
        writeln!(out, "{} {{", name)?;
        print_struct_body(operation, members, 1, out)?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn print_struct_body(
    prod: &StructProduction,
    members: &HashMap<String, Value>,
    indent: usize,
    out: &mut dyn io::Write,
) -> Result<(), PrintError> {
    // BTreeMap iteration gives the stable sorted-keyword order.
    for (keyword, production) in &prod.members {
        let value = members.get(&normalize_id(keyword));
        print_member(production, keyword, value, indent, false, out)?;
    }
    Ok(())
}

fn print_member(
    production: &Production,
    keyword: &str,
    value: Option<&Value>,
    indent: usize,
    is_key: bool,
    out: &mut dyn io::Write,
) -> Result<(), PrintError> {
    let value = match value {
        Some(v) => v,
        None => return Ok(()),
    };
    let pad = "  ".repeat(indent);
    match production {
        Production::Scalar(scalar) => {
            let text = scalar
                .primitive
                .to_text(value)
                .ok_or_else(|| shape_mismatch(keyword, value))?;
            // Values equal to the default are elided, except table keys: a
            // missing key would make the entry unparseable.
            if !is_key {
                if let Some(default) = &scalar.default {
                    if scalar.primitive.to_text(default).as_deref() == Some(text.as_str()) {
                        return Ok(());
                    }
                }
            }
            writeln!(out, "{}{} {};", pad, keyword, quote_if_needed(&text))?;
            Ok(())
        }
        Production::Array(array) => {
            let items = value.as_array().ok_or_else(|| shape_mismatch(keyword, value))?;
            for item in items {
                let text = array
                    .element
                    .to_text(item)
                    .ok_or_else(|| shape_mismatch(keyword, item))?;
                writeln!(out, "{}{} {};", pad, keyword, quote_if_needed(&text))?;
            }
            Ok(())
        }
        Production::Table(table) => {
            let instance = value.as_table().ok_or_else(|| shape_mismatch(keyword, value))?;
            for (key, entry_value) in instance.entries() {
                writeln!(out, "{}{} {{", pad, keyword)?;
                print_table_entry(table, &key, &entry_value, indent + 1, out)?;
                writeln!(out, "{}}}", pad)?;
            }
            Ok(())
        }
        Production::Struct(inner) => {
            let members = value.as_struct().ok_or_else(|| shape_mismatch(keyword, value))?;
            writeln!(out, "{}{} {{", pad, keyword)?;
            print_struct_body(inner, members, indent + 1, out)?;
            writeln!(out, "{}}}", pad)?;
            Ok(())
        }
        Production::Sequence(_) => {
            Err(PrintError::Shape(format!("sequence production under member {}", keyword)))
        }
    }
}

fn print_table_entry(
    table: &TableProduction,
    key: &Value,
    entry_value: &Value,
    indent: usize,
    out: &mut dyn io::Write,
) -> Result<(), PrintError> {
    for (keyword, production) in &table.body.members {
        let id = normalize_id(keyword);
        let member_value = if table.is_key(keyword) {
            match key {
                Value::Struct(_) => key.field(&id),
                // String-keyed tables carry the bare key string.
                bare if table.string_key() == Some(keyword.as_str()) => Some(bare),
                _ => None,
            }
        } else {
            entry_value.field(&id)
        };
        print_member(
            production,
            keyword,
            member_value,
            indent,
            table.is_key(keyword),
            out,
        )?;
    }
    Ok(())
}

fn shape_mismatch(keyword: &str, value: &Value) -> PrintError {
    PrintError::Shape(format!("member {} does not match its production: {}", keyword, value))
}

/// Quote and escape an argument when it could not be re-read bare.
fn quote_if_needed(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.chars().any(|c| {
            c.is_whitespace() || matches!(c, '"' | '\'' | ';' | '{' | '}' | '/')
        });
    if !needs_quotes {
        return text.to_string();
    }
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_if_needed("plain-token"), "plain-token");
        assert_eq!(quote_if_needed("1.2.3.4"), "1.2.3.4");
        assert_eq!(quote_if_needed("two words"), "\"two words\"");
        assert_eq!(quote_if_needed("a;b"), "\"a;b\"");
        assert_eq!(quote_if_needed("tab\there"), "\"tab\\there\"");
        assert_eq!(quote_if_needed("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_if_needed(""), "\"\"");
        assert_eq!(quote_if_needed("a/b"), "\"a/b\"");
    }
}
