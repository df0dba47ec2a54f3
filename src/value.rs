//! In-memory value instances shaped by a compiled grammar, and the four
//! associative containers that back table productions.
//!
//! A struct instance maps normalized member names to sub-instances, an array
//! is an ordered sequence of scalars, and a table is one of four
//! representations picked at grammar-compile time: fixed rows (packed key
//! and value bytes), a string-keyed map, packed keys with heterogeneous
//! values, or an ordered fallback with structural key equality.

use crate::grammar::Layout;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// A single decoded value (scalar or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    /// Normalized member name to sub-instance.
    Struct(HashMap<String, Value>),
    Array(Vec<Value>),
    Table(Table),
    /// Ordered named operations from an rpc grammar.
    Sequence(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint8(n) => Some(*n as u64),
            Value::Uint16(n) => Some(*n as u64),
            Value::Uint32(n) => Some(*n as u64),
            Value::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(n) => Some(*n as i64),
            Value::Int16(n) => Some(*n as i64),
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            Value::Uint8(n) => Some(*n as i64),
            Value::Uint16(n) => Some(*n as i64),
            Value::Uint32(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Value::Ipv4(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Struct member lookup by normalized name.
    pub fn field(&self, id: &str) -> Option<&Value> {
        self.as_struct().and_then(|m| m.get(id))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Uint8(n) => write!(f, "{}", n),
            Value::Uint16(n) => write!(f, "{}", n),
            Value::Uint32(n) => write!(f, "{}", n),
            Value::Uint64(n) => write!(f, "{}", n),
            Value::Int8(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Ipv4(a) => write!(f, "{}", a),
            Value::Ipv6(a) => write!(f, "{}", a),
            Value::Struct(m) => {
                let mut ids: Vec<_> = m.keys().collect();
                ids.sort();
                write!(f, "{{")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {}", id, m[*id])?;
                }
                write!(f, "}}")
            }
            Value::Array(_) => write!(f, "<array>"),
            Value::Table(_) => write!(f, "<table>"),
            Value::Sequence(_) => write!(f, "<sequence>"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TableError {
    #[error("duplicate key {0}")]
    Duplicate(String),
    #[error("entry does not match table layout: {0}")]
    Shape(String),
}

/// A frozen table instance, one variant per builder strategy.
#[derive(Debug, Clone)]
pub enum Table {
    Fixed(FixedTable),
    StringKeyed(BTreeMap<String, Value>),
    FixedKey(FixedKeyTable),
    Ordered(Vec<(Value, Value)>),
}

/// Packed fixed-size rows: key bytes to value bytes.
#[derive(Debug, Clone)]
pub struct FixedTable {
    pub key_layout: Arc<Layout>,
    pub value_layout: Arc<Layout>,
    entries: HashMap<Box<[u8]>, Box<[u8]>>,
}

/// Packed fixed-size keys, values stored as-is.
#[derive(Debug, Clone)]
pub struct FixedKeyTable {
    pub key_layout: Arc<Layout>,
    entries: HashMap<Box<[u8]>, Value>,
}

impl Table {
    pub fn len(&self) -> usize {
        match self {
            Table::Fixed(t) => t.entries.len(),
            Table::StringKeyed(m) => m.len(),
            Table::FixedKey(t) => t.entries.len(),
            Table::Ordered(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry; the key is a struct of key members, except for
    /// string-keyed tables where it is the bare string.
    pub fn get(&self, key: &Value) -> Option<Value> {
        match self {
            Table::Fixed(t) => {
                let packed = pack_struct(&t.key_layout, key).ok()?;
                let row = t.entries.get(&packed)?;
                Some(unpack_struct(&t.value_layout, row))
            }
            Table::StringKeyed(m) => m.get(key.as_str()?).cloned(),
            Table::FixedKey(t) => {
                let packed = pack_struct(&t.key_layout, key).ok()?;
                t.entries.get(&packed).cloned()
            }
            Table::Ordered(v) => v.iter().find(|(k, _)| k == key).map(|(_, val)| val.clone()),
        }
    }

    /// String-keyed lookup without allocating a key value.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        match self {
            Table::StringKeyed(m) => m.get(key),
            _ => None,
        }
    }

    /// Materialized `(key, value)` pairs in a deterministic order: packed
    /// representations sort by key bytes, string keys by string, and the
    /// ordered fallback keeps insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match self {
            Table::Fixed(t) => {
                let mut keys: Vec<_> = t.entries.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|k| {
                        (
                            unpack_struct(&t.key_layout, k),
                            unpack_struct(&t.value_layout, &t.entries[k]),
                        )
                    })
                    .collect()
            }
            Table::StringKeyed(m) => m
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Table::FixedKey(t) => {
                let mut keys: Vec<_> = t.entries.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|k| (unpack_struct(&t.key_layout, k), t.entries[k].clone()))
                    .collect()
            }
            Table::Ordered(v) => v.clone(),
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Table) -> bool {
        match (self, other) {
            (Table::Fixed(a), Table::Fixed(b)) => a.entries == b.entries,
            (Table::StringKeyed(a), Table::StringKeyed(b)) => a == b,
            (Table::FixedKey(a), Table::FixedKey(b)) => a.entries == b.entries,
            // Insertion order is irrelevant for equality.
            (Table::Ordered(a), Table::Ordered(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
            }
            _ => false,
        }
    }
}

/// Pack a struct instance into a layout's fixed-size row.
pub fn pack_struct(layout: &Layout, value: &Value) -> Result<Box<[u8]>, TableError> {
    let members = value
        .as_struct()
        .ok_or_else(|| TableError::Shape(format!("expected struct, got {}", value)))?;
    let mut row = vec![0u8; layout.size];
    for field in &layout.fields {
        let member = members
            .get(&field.id)
            .ok_or_else(|| TableError::Shape(format!("missing member {}", field.id)))?;
        let slot = &mut row[field.offset..field.offset + field.size];
        if !field.primitive.write_fixed(member, slot) {
            return Err(TableError::Shape(format!(
                "member {} is not a {}",
                field.id,
                field.primitive.name()
            )));
        }
    }
    Ok(row.into_boxed_slice())
}

/// Rebuild a struct instance from a packed row.
pub fn unpack_struct(layout: &Layout, row: &[u8]) -> Value {
    let mut members = HashMap::with_capacity(layout.fields.len());
    for field in &layout.fields {
        let slot = &row[field.offset..field.offset + field.size];
        members.insert(field.id.clone(), field.primitive.read_fixed(slot));
    }
    Value::Struct(members)
}

/// Transient accumulator for one parse of a table production: insert entries,
/// then freeze into the queryable container. Never shared across parses.
pub trait TableBuilder {
    /// Insert one entry; duplicate keys are a hard error.
    fn add(&mut self, key: Value, value: Value) -> Result<(), TableError>;
    /// Freeze into the table instance handed to the caller.
    fn finish(self: Box<Self>) -> Table;
}

pub struct FixedTableBuilder {
    key_layout: Arc<Layout>,
    value_layout: Arc<Layout>,
    entries: HashMap<Box<[u8]>, Box<[u8]>>,
}

impl FixedTableBuilder {
    pub fn new(key_layout: Arc<Layout>, value_layout: Arc<Layout>) -> FixedTableBuilder {
        FixedTableBuilder { key_layout, value_layout, entries: HashMap::new() }
    }
}

impl TableBuilder for FixedTableBuilder {
    fn add(&mut self, key: Value, value: Value) -> Result<(), TableError> {
        let packed_key = pack_struct(&self.key_layout, &key)?;
        let packed_value = pack_struct(&self.value_layout, &value)?;
        if self.entries.contains_key(&packed_key) {
            return Err(TableError::Duplicate(key.to_string()));
        }
        self.entries.insert(packed_key, packed_value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Table {
        Table::Fixed(FixedTable {
            key_layout: self.key_layout,
            value_layout: self.value_layout,
            entries: self.entries,
        })
    }
}

#[derive(Default)]
pub struct StringKeyedTableBuilder {
    entries: BTreeMap<String, Value>,
}

impl StringKeyedTableBuilder {
    pub fn new() -> StringKeyedTableBuilder {
        StringKeyedTableBuilder::default()
    }
}

impl TableBuilder for StringKeyedTableBuilder {
    fn add(&mut self, key: Value, value: Value) -> Result<(), TableError> {
        let key = match key {
            Value::String(s) => s,
            other => {
                return Err(TableError::Shape(format!("expected string key, got {}", other)))
            }
        };
        if self.entries.contains_key(&key) {
            return Err(TableError::Duplicate(key));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Table {
        Table::StringKeyed(self.entries)
    }
}

pub struct FixedKeyTableBuilder {
    key_layout: Arc<Layout>,
    entries: HashMap<Box<[u8]>, Value>,
}

impl FixedKeyTableBuilder {
    pub fn new(key_layout: Arc<Layout>) -> FixedKeyTableBuilder {
        FixedKeyTableBuilder { key_layout, entries: HashMap::new() }
    }
}

impl TableBuilder for FixedKeyTableBuilder {
    fn add(&mut self, key: Value, value: Value) -> Result<(), TableError> {
        let packed_key = pack_struct(&self.key_layout, &key)?;
        if self.entries.contains_key(&packed_key) {
            return Err(TableError::Duplicate(key.to_string()));
        }
        self.entries.insert(packed_key, value);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Table {
        Table::FixedKey(FixedKeyTable { key_layout: self.key_layout, entries: self.entries })
    }
}

#[derive(Default)]
pub struct OrderedTableBuilder {
    entries: Vec<(Value, Value)>,
}

impl OrderedTableBuilder {
    pub fn new() -> OrderedTableBuilder {
        OrderedTableBuilder::default()
    }
}

impl TableBuilder for OrderedTableBuilder {
    fn add(&mut self, key: Value, value: Value) -> Result<(), TableError> {
        if self.entries.iter().any(|(k, _)| *k == key) {
            return Err(TableError::Duplicate(key.to_string()));
        }
        self.entries.push((key, value));
        Ok(())
    }

    fn finish(self: Box<Self>) -> Table {
        Table::Ordered(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::LayoutCache;
    use crate::types::Primitive;

    fn id_layout() -> Arc<Layout> {
        LayoutCache::new().intern(&[("id".to_string(), Primitive::Uint16)])
    }

    fn key(n: u16) -> Value {
        let mut m = HashMap::new();
        m.insert("id".to_string(), Value::Uint16(n));
        Value::Struct(m)
    }

    #[test]
    fn fixed_key_builder_rejects_duplicates() {
        let mut builder = FixedKeyTableBuilder::new(id_layout());
        builder.add(key(7), Value::Boolean(true)).expect("first insert");
        let err = builder.add(key(7), Value::Boolean(false)).expect_err("duplicate");
        assert!(matches!(err, TableError::Duplicate(_)));
    }

    #[test]
    fn fixed_key_round_trip() {
        let mut builder = FixedKeyTableBuilder::new(id_layout());
        builder.add(key(1), Value::String("one".into())).unwrap();
        builder.add(key(2), Value::String("two".into())).unwrap();
        let table = Box::new(builder).finish();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&key(2)), Some(Value::String("two".into())));
        let entries = table.entries();
        assert_eq!(entries[0].0, key(1));
        assert_eq!(entries[1].0, key(2));
    }

    #[test]
    fn ordered_equality_ignores_insertion_order() {
        let mut a = OrderedTableBuilder::new();
        a.add(Value::Uint8(1), Value::Boolean(true)).unwrap();
        a.add(Value::Uint8(2), Value::Boolean(false)).unwrap();
        let mut b = OrderedTableBuilder::new();
        b.add(Value::Uint8(2), Value::Boolean(false)).unwrap();
        b.add(Value::Uint8(1), Value::Boolean(true)).unwrap();
        assert_eq!(Box::new(a).finish(), Box::new(b).finish());
    }

    #[test]
    fn string_keyed_builder_requires_string() {
        let mut builder = StringKeyedTableBuilder::new();
        let err = builder.add(Value::Uint8(1), Value::Boolean(true)).expect_err("shape");
        assert!(matches!(err, TableError::Shape(_)));
    }

    #[test]
    fn pack_reports_missing_member() {
        let layout = id_layout();
        let err = pack_struct(&layout, &Value::Struct(HashMap::new())).expect_err("missing");
        assert!(matches!(err, TableError::Shape(_)));
    }
}
