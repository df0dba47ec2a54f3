//! Schema tree: YANG-like module statements reduced to the node kinds the
//! grammar compiler consumes (container, list, leaf, leaf-list, rpc).
//!
//! Cross-module concerns (imports, groupings) are assumed already resolved
//! in the source text; metadata statements such as `description` or
//! `namespace` are accepted and skipped.

use crate::statement::{parse_document, Statement, SyntaxError};
use crate::types::Restrictions;
use std::path::Path;

/// One schema data node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Container(ContainerNode),
    List(ListNode),
    Leaf(LeafNode),
    LeafList(LeafListNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    pub name: String,
    /// A presence container materializes as an optional struct member;
    /// without `presence` the container only namespaces its children.
    pub presence: bool,
    pub body: Vec<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListNode {
    pub name: String,
    /// Space-separated ordered member names from the `key` clause.
    pub key: String,
    pub body: Vec<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub name: String,
    pub type_name: String,
    pub restrictions: Restrictions,
    pub default: Option<String>,
    pub mandatory: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafListNode {
    pub name: String,
    pub type_name: String,
    pub restrictions: Restrictions,
}

/// A remote-procedure definition with separate input and output bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Rpc {
    pub name: String,
    pub input: Vec<SchemaNode>,
    pub output: Vec<SchemaNode>,
}

/// A loaded schema: the module data body plus its rpc definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub body: Vec<SchemaNode>,
    pub rpcs: Vec<Rpc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{loc}: {keyword} requires an argument", loc = .0.loc, keyword = .0.keyword)]
    MissingArgument(Statement),
    #[error("leaf {0} has no type statement")]
    MissingType(String),
    #[error("leaf {leaf}: unknown type {type_name}")]
    UnknownType { leaf: String, type_name: String },
    #[error("leaf {leaf}: bad default value: {source}")]
    BadDefault {
        leaf: String,
        #[source]
        source: crate::types::DecodeError,
    },
    #[error("duplicate identifier {0} (keywords collide after normalization)")]
    DuplicateIdentifier(String),
    #[error("list {list}: key {key} does not name a member")]
    UnknownKey { list: String, key: String },
    #[error("list {0} has no key clause")]
    MissingKey(String),
}

impl Schema {
    /// Parse schema source text. Accepts either a `module NAME { ... }`
    /// wrapper or a bare sequence of schema statements.
    pub fn parse(text: &str, source_name: &str) -> Result<Schema, SchemaError> {
        let statements = parse_document(text, source_name)?;
        let (name, body_statements) = match statements.as_slice() {
            [only] if only.keyword == "module" => {
                let name = only
                    .argument
                    .clone()
                    .ok_or_else(|| SchemaError::MissingArgument(only.clone()))?;
                (name, only.substatements())
            }
            _ => (source_name.to_string(), statements.as_slice()),
        };
        let mut body = Vec::new();
        let mut rpcs = Vec::new();
        for stmt in body_statements {
            if stmt.keyword == "rpc" {
                rpcs.push(build_rpc(stmt)?);
            } else if let Some(node) = build_node(stmt)? {
                body.push(node);
            }
        }
        log::debug!("loaded schema {} ({} top-level nodes, {} rpcs)", name, body.len(), rpcs.len());
        Ok(Schema { name, body, rpcs })
    }

    pub fn load(path: &Path) -> Result<Schema, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        Schema::parse(&text, &path.display().to_string())
    }
}

/// Build the data nodes of a statement body, skipping metadata statements.
pub fn build_body(statements: &[Statement]) -> Result<Vec<SchemaNode>, SchemaError> {
    let mut nodes = Vec::new();
    for stmt in statements {
        if let Some(node) = build_node(stmt)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

fn build_node(stmt: &Statement) -> Result<Option<SchemaNode>, SchemaError> {
    match stmt.keyword.as_str() {
        "container" => {
            let name = required_argument(stmt)?;
            let presence = stmt.substatements().iter().any(|s| s.keyword == "presence");
            let body = build_body(stmt.substatements())?;
            Ok(Some(SchemaNode::Container(ContainerNode { name, presence, body })))
        }
        "list" => {
            let name = required_argument(stmt)?;
            let key = stmt
                .substatements()
                .iter()
                .find(|s| s.keyword == "key")
                .and_then(|s| s.argument.clone())
                .ok_or_else(|| SchemaError::MissingKey(name.clone()))?;
            let body = build_body(stmt.substatements())?;
            Ok(Some(SchemaNode::List(ListNode { name, key, body })))
        }
        "leaf" => {
            let name = required_argument(stmt)?;
            let (type_name, restrictions) = leaf_type(stmt, &name)?;
            let default = substatement_argument(stmt, "default");
            let mandatory = substatement_argument(stmt, "mandatory").as_deref() == Some("true");
            Ok(Some(SchemaNode::Leaf(LeafNode {
                name,
                type_name,
                restrictions,
                default,
                mandatory,
            })))
        }
        "leaf-list" => {
            let name = required_argument(stmt)?;
            let (type_name, restrictions) = leaf_type(stmt, &name)?;
            Ok(Some(SchemaNode::LeafList(LeafListNode { name, type_name, restrictions })))
        }
        other => {
            log::trace!("skipping schema statement {}", other);
            Ok(None)
        }
    }
}

fn build_rpc(stmt: &Statement) -> Result<Rpc, SchemaError> {
    let name = required_argument(stmt)?;
    let mut input = Vec::new();
    let mut output = Vec::new();
    for sub in stmt.substatements() {
        match sub.keyword.as_str() {
            "input" => input = build_body(sub.substatements())?,
            "output" => output = build_body(sub.substatements())?,
            _ => {}
        }
    }
    Ok(Rpc { name, input, output })
}

fn leaf_type(stmt: &Statement, name: &str) -> Result<(String, Restrictions), SchemaError> {
    let type_stmt = stmt
        .substatements()
        .iter()
        .find(|s| s.keyword == "type")
        .ok_or_else(|| SchemaError::MissingType(name.to_string()))?;
    let type_name = type_stmt
        .argument
        .clone()
        .ok_or_else(|| SchemaError::MissingArgument(type_stmt.clone()))?;
    let clauses = type_stmt
        .substatements()
        .iter()
        .map(|s| (s.keyword.clone(), s.argument.clone().unwrap_or_default()))
        .collect();
    Ok((type_name, Restrictions { clauses }))
}

fn required_argument(stmt: &Statement) -> Result<String, SchemaError> {
    stmt.argument
        .clone()
        .ok_or_else(|| SchemaError::MissingArgument(stmt.clone()))
}

fn substatement_argument(stmt: &Statement, keyword: &str) -> Option<String> {
    stmt.substatements()
        .iter()
        .find(|s| s.keyword == keyword)
        .and_then(|s| s.argument.clone())
}
