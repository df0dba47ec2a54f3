//! Compile a schema tree into an executable grammar.
//!
//! A [`Production`] is the compiled form of a schema subtree: `Struct` for a
//! fixed member set, `Array` for a leaf-list, `Table` for a keyed list,
//! `Scalar` for a leaf, and `Sequence` for a set of named rpc operations.
//! Containers without `presence` contribute their members directly to the
//! parent member set and never appear in instances.
//!
//! Compilation is pure: the same schema yields a structurally identical
//! grammar, and the result is immutable and shareable. Fixed binary layouts
//! are memoized in a [`LayoutCache`] keyed by a generated descriptor string.

use crate::schema::{Schema, SchemaError, SchemaNode};
use crate::types::{Primitive, Restrictions};
use crate::value::{
    FixedKeyTableBuilder, FixedTableBuilder, OrderedTableBuilder, StringKeyedTableBuilder,
    TableBuilder, Value,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Replace every character outside `[A-Za-z0-9_]` with `_`, turning a schema
/// keyword into a field-name-safe identifier.
pub fn normalize_id(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A fixed-size binary layout for a set of scalar fields, in declaration
/// order with network-byte-order encoding.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub fields: Vec<LayoutField>,
    pub size: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub struct LayoutField {
    pub keyword: String,
    /// Normalized member name, the key into struct instances.
    pub id: String,
    pub primitive: Primitive,
    pub offset: usize,
    pub size: usize,
}

/// Append-only layout memoization, shared across compilations through an
/// `Arc`. Tests can instantiate independent caches.
#[derive(Debug, Default)]
pub struct LayoutCache {
    inner: Mutex<HashMap<String, Arc<Layout>>>,
}

impl LayoutCache {
    pub fn new() -> LayoutCache {
        LayoutCache::default()
    }

    pub(crate) fn intern(&self, fields: &[(String, Primitive)]) -> Arc<Layout> {
        let descriptor: String = fields
            .iter()
            .map(|(kw, p)| format!("{}:{}", kw, p.name()))
            .collect::<Vec<_>>()
            .join(" ");
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(layout) = inner.get(&descriptor) {
            return layout.clone();
        }
        log::trace!("building layout {}", descriptor);
        let mut offset = 0;
        let mut built = Vec::with_capacity(fields.len());
        for (keyword, primitive) in fields {
            // Callers only intern fields with a fixed size.
            let size = primitive.fixed_size().unwrap_or(0);
            built.push(LayoutField {
                keyword: keyword.clone(),
                id: normalize_id(keyword),
                primitive: *primitive,
                offset,
                size,
            });
            offset += size;
        }
        let layout = Arc::new(Layout { fields: built, size: offset });
        inner.insert(descriptor, layout.clone());
        layout
    }
}

/// The compiled form of a schema subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Production {
    Struct(StructProduction),
    Array(ArrayProduction),
    Table(TableProduction),
    Scalar(ScalarProduction),
    Sequence(SequenceProduction),
}

/// Fixed set of named members, keyed by the original schema keyword.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructProduction {
    pub members: BTreeMap<String, Production>,
}

/// Ordered homogeneous sequence from a leaf-list.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayProduction {
    pub keyword: String,
    pub element: Primitive,
    pub restrictions: Restrictions,
    /// Set when the element type has a fixed binary width.
    pub element_size: Option<usize>,
}

/// A single typed value from a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarProduction {
    pub keyword: String,
    pub primitive: Primitive,
    pub restrictions: Restrictions,
    pub default: Option<Value>,
    pub mandatory: bool,
    /// Present only when the leaf is mandatory or defaulted and its type has
    /// a fixed width; that is the only case the compiler needs raw storage.
    pub layout: Option<Arc<Layout>>,
}

/// The representation backing a table, decided once at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRepr {
    /// Both keys and values pack into fixed-size rows.
    Fixed {
        key_layout: Arc<Layout>,
        value_layout: Arc<Layout>,
    },
    /// Exactly one key member of type string.
    StringKeyed,
    /// Keys pack, values stay heterogeneous.
    FixedKey { key_layout: Arc<Layout> },
    /// Fallback: structural key equality.
    Ordered,
}

/// Associative list from a keyed `list` node.
#[derive(Debug, Clone, PartialEq)]
pub struct TableProduction {
    pub keyword: String,
    /// Merged key+value member set; entries parse against this.
    pub body: StructProduction,
    /// Key member keywords in `key` clause order.
    pub key_keywords: Vec<String>,
    pub repr: TableRepr,
}

impl TableProduction {
    pub fn is_key(&self, keyword: &str) -> bool {
        self.key_keywords.iter().any(|k| k == keyword)
    }

    pub fn string_key(&self) -> Option<&str> {
        match self.repr {
            TableRepr::StringKeyed => self.key_keywords.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn key_layout(&self) -> Option<&Arc<Layout>> {
        match &self.repr {
            TableRepr::Fixed { key_layout, .. } | TableRepr::FixedKey { key_layout } => {
                Some(key_layout)
            }
            _ => None,
        }
    }

    pub fn value_layout(&self) -> Option<&Arc<Layout>> {
        match &self.repr {
            TableRepr::Fixed { value_layout, .. } => Some(value_layout),
            _ => None,
        }
    }

    /// A fresh accumulator for one parse of this table.
    pub fn new_builder(&self) -> Box<dyn TableBuilder> {
        match &self.repr {
            TableRepr::Fixed { key_layout, value_layout } => Box::new(FixedTableBuilder::new(
                key_layout.clone(),
                value_layout.clone(),
            )),
            TableRepr::StringKeyed => Box::new(StringKeyedTableBuilder::new()),
            TableRepr::FixedKey { key_layout } => {
                Box::new(FixedKeyTableBuilder::new(key_layout.clone()))
            }
            TableRepr::Ordered => Box::new(OrderedTableBuilder::new()),
        }
    }
}

/// Named rpc operations, each with its own struct body.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceProduction {
    pub operations: BTreeMap<String, StructProduction>,
}

/// Grammar compiler with an injectable layout cache.
#[derive(Debug, Default, Clone)]
pub struct Compiler {
    layouts: Arc<LayoutCache>,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler::default()
    }

    pub fn with_cache(layouts: Arc<LayoutCache>) -> Compiler {
        Compiler { layouts }
    }

    /// Compile a schema's data body into its root struct production.
    pub fn compile(&self, schema: &Schema) -> Result<Production, SchemaError> {
        let root = self.compile_struct(&schema.body)?;
        log::debug!("compiled grammar for {} ({} top-level members)", schema.name, root.members.len());
        Ok(Production::Struct(root))
    }

    /// Compile a single schema node (used for bare leaf/list/leaf-list
    /// grammars).
    pub fn compile_node(&self, node: &SchemaNode) -> Result<Production, SchemaError> {
        let (_, production) = self.member(node)?;
        Ok(production)
    }

    /// Rpc request grammar: a sequence of operations keyed by rpc name, each
    /// parsing that rpc's input body.
    pub fn rpc_input(&self, schema: &Schema) -> Result<Production, SchemaError> {
        self.rpc_sequence(schema, |rpc| &rpc.input)
    }

    /// Rpc reply grammar over the output bodies.
    pub fn rpc_output(&self, schema: &Schema) -> Result<Production, SchemaError> {
        self.rpc_sequence(schema, |rpc| &rpc.output)
    }

    fn rpc_sequence(
        &self,
        schema: &Schema,
        body: impl Fn(&crate::schema::Rpc) -> &[SchemaNode],
    ) -> Result<Production, SchemaError> {
        let mut operations = BTreeMap::new();
        for rpc in &schema.rpcs {
            let compiled = self.compile_struct(body(rpc))?;
            if operations.insert(rpc.name.clone(), compiled).is_some() {
                return Err(SchemaError::DuplicateIdentifier(rpc.name.clone()));
            }
        }
        Ok(Production::Sequence(SequenceProduction { operations }))
    }

    fn compile_struct(&self, nodes: &[SchemaNode]) -> Result<StructProduction, SchemaError> {
        let mut members = BTreeMap::new();
        let mut normalized: HashMap<String, String> = HashMap::new();
        self.collect_members(nodes, &mut members, &mut normalized)?;
        Ok(StructProduction { members })
    }

    fn collect_members(
        &self,
        nodes: &[SchemaNode],
        members: &mut BTreeMap<String, Production>,
        normalized: &mut HashMap<String, String>,
    ) -> Result<(), SchemaError> {
        for node in nodes {
            // Presence-less containers vanish: their members merge into the
            // parent member set.
            if let SchemaNode::Container(c) = node {
                if !c.presence {
                    self.collect_members(&c.body, members, normalized)?;
                    continue;
                }
            }
            let (keyword, production) = self.member(node)?;
            if let Some(previous) = normalized.insert(normalize_id(&keyword), keyword.clone()) {
                return Err(SchemaError::DuplicateIdentifier(previous));
            }
            if members.insert(keyword.clone(), production).is_some() {
                return Err(SchemaError::DuplicateIdentifier(keyword));
            }
        }
        Ok(())
    }

    fn member(&self, node: &SchemaNode) -> Result<(String, Production), SchemaError> {
        match node {
            SchemaNode::Container(c) => {
                let body = self.compile_struct(&c.body)?;
                Ok((c.name.clone(), Production::Struct(body)))
            }
            SchemaNode::Leaf(leaf) => {
                let primitive = self.primitive(&leaf.name, &leaf.type_name)?;
                let default = match &leaf.default {
                    Some(text) => Some(primitive.parse(text).map_err(|source| {
                        SchemaError::BadDefault { leaf: leaf.name.clone(), source }
                    })?),
                    None => None,
                };
                let layout = if (default.is_some() || leaf.mandatory)
                    && primitive.fixed_size().is_some()
                {
                    Some(self.layouts.intern(&[(leaf.name.clone(), primitive)]))
                } else {
                    None
                };
                Ok((
                    leaf.name.clone(),
                    Production::Scalar(ScalarProduction {
                        keyword: leaf.name.clone(),
                        primitive,
                        restrictions: leaf.restrictions.clone(),
                        default,
                        mandatory: leaf.mandatory,
                        layout,
                    }),
                ))
            }
            SchemaNode::LeafList(ll) => {
                let primitive = self.primitive(&ll.name, &ll.type_name)?;
                Ok((
                    ll.name.clone(),
                    Production::Array(ArrayProduction {
                        keyword: ll.name.clone(),
                        element: primitive,
                        restrictions: ll.restrictions.clone(),
                        element_size: primitive.fixed_size(),
                    }),
                ))
            }
            SchemaNode::List(list) => {
                let body = self.compile_struct(&list.body)?;
                let key_keywords: Vec<String> =
                    list.key.split_whitespace().map(str::to_string).collect();
                let mut key_scalars = Vec::new();
                for key in &key_keywords {
                    match body.members.get(key) {
                        Some(Production::Scalar(s)) => {
                            key_scalars.push((key.clone(), s.primitive))
                        }
                        _ => {
                            return Err(SchemaError::UnknownKey {
                                list: list.name.clone(),
                                key: key.clone(),
                            })
                        }
                    }
                }
                let repr = self.table_repr(&body, &key_keywords, &key_scalars);
                Ok((
                    list.name.clone(),
                    Production::Table(TableProduction {
                        keyword: list.name.clone(),
                        body,
                        key_keywords,
                        repr,
                    }),
                ))
            }
        }
    }

    fn table_repr(
        &self,
        body: &StructProduction,
        key_keywords: &[String],
        key_scalars: &[(String, Primitive)],
    ) -> TableRepr {
        let keys_fixed = !key_scalars.is_empty()
            && key_scalars.iter().all(|(_, p)| p.fixed_size().is_some());
        let key_layout = keys_fixed.then(|| self.layouts.intern(key_scalars));

        // A value layout needs every non-key member to be a fixed-width
        // scalar that is mandatory or defaulted, so frozen rows have no
        // absent cells.
        let mut value_fields = Vec::new();
        let mut values_fixed = true;
        for (keyword, production) in &body.members {
            if key_keywords.iter().any(|k| k == keyword) {
                continue;
            }
            match production {
                Production::Scalar(s)
                    if s.primitive.fixed_size().is_some()
                        && (s.mandatory || s.default.is_some()) =>
                {
                    value_fields.push((keyword.clone(), s.primitive))
                }
                _ => {
                    values_fixed = false;
                    break;
                }
            }
        }

        let single_string_key = key_scalars.len() == 1
            && key_scalars[0].1 == Primitive::String;

        match (key_layout, values_fixed) {
            (Some(key_layout), true) => TableRepr::Fixed {
                key_layout,
                value_layout: self.layouts.intern(&value_fields),
            },
            (key_layout, _) if single_string_key => {
                debug_assert!(key_layout.is_none());
                TableRepr::StringKeyed
            }
            (Some(key_layout), false) => TableRepr::FixedKey { key_layout },
            _ => TableRepr::Ordered,
        }
    }

    fn primitive(&self, leaf: &str, type_name: &str) -> Result<Primitive, SchemaError> {
        Primitive::from_name(type_name).ok_or_else(|| SchemaError::UnknownType {
            leaf: leaf.to_string(),
            type_name: type_name.to_string(),
        })
    }
}

/// Compile a schema with a fresh layout cache.
pub fn compile_grammar(schema: &Schema) -> Result<Production, SchemaError> {
    Compiler::new().compile(schema)
}

/// Rpc request grammar with a fresh layout cache.
pub fn rpc_input_grammar(schema: &Schema) -> Result<Production, SchemaError> {
    Compiler::new().rpc_input(schema)
}

/// Rpc reply grammar with a fresh layout cache.
pub fn rpc_output_grammar(schema: &Schema) -> Result<Production, SchemaError> {
    Compiler::new().rpc_output(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_identifiers() {
        assert_eq!(normalize_id("fruit-bowl"), "fruit_bowl");
        assert_eq!(normalize_id("a.b:c"), "a_b_c");
        assert_eq!(normalize_id("plain_name9"), "plain_name9");
    }

    #[test]
    fn layout_cache_memoizes() {
        let cache = LayoutCache::new();
        let a = cache.intern(&[("port".to_string(), Primitive::Uint16)]);
        let b = cache.intern(&[("port".to_string(), Primitive::Uint16)]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.size, 2);
    }

    #[test]
    fn layout_offsets_accumulate() {
        let cache = LayoutCache::new();
        let layout = cache.intern(&[
            ("addr".to_string(), Primitive::Ipv4Address),
            ("port".to_string(), Primitive::Uint16),
            ("up".to_string(), Primitive::Boolean),
        ]);
        assert_eq!(layout.size, 7);
        assert_eq!(layout.fields[1].offset, 4);
        assert_eq!(layout.fields[2].offset, 6);
    }
}
