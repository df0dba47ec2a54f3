//! # confcodec — schema-driven configuration codec
//!
//! Compiles a YANG-like schema into an executable grammar, then derives from
//! that grammar a parser (configuration/state text to a typed value tree)
//! and a printer (value tree back to canonical text).
//!
//! ## Pipeline
//!
//! - **Schema**: `module { container ... list ... leaf ... }` source text,
//!   read into a schema-node tree.
//! - **Grammar**: the compiled form — Struct, Array (leaf-list), Table
//!   (keyed list), Scalar (leaf), Sequence (rpc operations). Non-presence
//!   containers flatten into their parent; keyed lists pick one of four
//!   associative representations from their static key/value shape.
//! - **Values**: `DataParser` turns a document into a `Value` tree,
//!   `DataPrinter` serializes it back; `parse(print(v)) == v` and printing
//!   is canonically idempotent.
//!
//! ## Example
//!
//! ```
//! use confcodec::{compile_grammar, DataParser, DataPrinter, Schema};
//!
//! let schema = Schema::parse(
//!     "module net { leaf mtu { type uint16; default 1500; } }",
//!     "net.schema",
//! ).unwrap();
//! let grammar = compile_grammar(&schema).unwrap();
//! let parser = DataParser::new(grammar.clone());
//! let printer = DataPrinter::new(grammar);
//!
//! let config = parser.parse("mtu 9000;", "net.conf").unwrap();
//! assert_eq!(config.field("mtu").and_then(|v| v.as_u64()), Some(9000));
//! assert_eq!(printer.to_text(&config).unwrap(), "mtu 9000;\n");
//! ```

pub mod data;
pub mod grammar;
pub mod schema;
pub mod statement;
pub mod types;
pub mod value;

pub use data::{DataError, DataParser, DataPrinter, PrintError};
pub use grammar::{
    compile_grammar, normalize_id, rpc_input_grammar, rpc_output_grammar, Compiler, Layout,
    LayoutCache, Production, TableRepr,
};
pub use schema::{Schema, SchemaError, SchemaNode};
pub use statement::{parse_document, Location, Statement, SyntaxError};
pub use types::{DecodeError, Primitive, Restrictions};
pub use value::{Table, TableBuilder, TableError, Value};
