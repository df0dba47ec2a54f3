use confcodec::{
    compile_grammar, rpc_input_grammar, Compiler, DataError, DataParser, DataPrinter, Schema,
    Value,
};

const FRUIT_SCHEMA: &str = r#"
module fruit {
    container fruit-bowl {
        presence true;
        leaf description { type string; }
        list contents {
            key name;
            leaf name { type string; }
            leaf score {
                type uint8 { range "0..10"; }
                mandatory true;
            }
            leaf tree-grown { type boolean; }
        }
    }
    leaf addr { type ipv4-address; }
}
"#;

const FRUIT_DOC: &str = r#"
fruit-bowl {
    description 'ohai';
    contents { name foo; score 7; }
    contents { name bar; score 8; }
    contents { name baz; score 9; tree-grown true; }
}
addr 1.2.3.4;
"#;

fn fruit_parser() -> (DataParser, DataPrinter) {
    let schema = Schema::parse(FRUIT_SCHEMA, "fruit.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    (DataParser::new(grammar.clone()), DataPrinter::new(grammar))
}

#[test]
fn fruit_bowl_parses() {
    let (parser, _) = fruit_parser();
    let doc = parser.parse(FRUIT_DOC, "fruit.conf").expect("parse");

    let bowl = doc.field("fruit_bowl").expect("bowl");
    assert_eq!(bowl.field("description").and_then(Value::as_str), Some("ohai"));

    let contents = bowl.field("contents").and_then(Value::as_table).expect("table");
    assert_eq!(contents.len(), 3);

    let foo = contents.get_str("foo").expect("foo");
    assert_eq!(foo.field("score").and_then(Value::as_u64), Some(7));
    assert_eq!(foo.field("tree_grown"), None);

    let baz = contents.get_str("baz").expect("baz");
    assert_eq!(baz.field("tree_grown").and_then(Value::as_bool), Some(true));

    let addr = doc.field("addr").and_then(Value::as_ipv4).expect("addr");
    assert_eq!(addr.octets(), [1, 2, 3, 4]);
}

#[test]
fn fruit_bowl_round_trips() {
    let (parser, printer) = fruit_parser();
    let doc = parser.parse(FRUIT_DOC, "fruit.conf").expect("parse");

    let text = printer.to_text(&doc).expect("print");
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);

    // Canonical text is a fixed point of print-then-parse.
    assert_eq!(printer.to_text(&again).expect("print"), text);
}

#[test]
fn fruit_bowl_canonical_text() {
    let (parser, printer) = fruit_parser();
    let doc = parser.parse(FRUIT_DOC, "fruit.conf").expect("parse");
    let text = printer.to_text(&doc).expect("print");
    assert_eq!(
        text,
        "addr 1.2.3.4;\n\
         fruit-bowl {\n\
         \x20 contents {\n\
         \x20   name bar;\n\
         \x20   score 8;\n\
         \x20 }\n\
         \x20 contents {\n\
         \x20   name baz;\n\
         \x20   score 9;\n\
         \x20   tree-grown true;\n\
         \x20 }\n\
         \x20 contents {\n\
         \x20   name foo;\n\
         \x20   score 7;\n\
         \x20 }\n\
         \x20 description ohai;\n\
         }\n"
    );
}

#[test]
fn absent_presence_container_is_absent() {
    let (parser, _) = fruit_parser();
    let doc = parser.parse("addr 10.0.0.1;\n", "min.conf").expect("parse");
    assert_eq!(doc.field("fruit_bowl"), None);
}

#[test]
fn duplicate_table_key_rejected() {
    let (parser, _) = fruit_parser();
    let doc = "fruit-bowl {\n\
               \x20 contents { name foo; score 1; }\n\
               \x20 contents { name foo; score 2; }\n\
               }\n";
    let err = parser.parse(doc, "dup.conf").expect_err("duplicate key");
    assert!(matches!(err, DataError::Table { .. }), "got {err}");
}

#[test]
fn duplicate_parameter_rejected() {
    let (parser, _) = fruit_parser();
    let err = parser
        .parse("addr 1.1.1.1;\naddr 2.2.2.2;\n", "dup.conf")
        .expect_err("duplicate parameter");
    assert!(matches!(err, DataError::DuplicateParameter { .. }), "got {err}");
}

#[test]
fn missing_mandatory_member_rejected() {
    let (parser, _) = fruit_parser();
    let doc = "fruit-bowl {\n  contents { name foo; }\n}\n";
    let err = parser.parse(doc, "bad.conf").expect_err("missing score");
    match err {
        DataError::MissingValue { source_name, loc, keyword } => {
            assert_eq!(keyword, "score");
            // The diagnostic points at the entry whose body is incomplete.
            assert_eq!(source_name, "bad.conf");
            assert_eq!(loc.line, 2);
        }
        other => panic!("got {other}"),
    }
}

#[test]
fn unknown_keyword_rejected() {
    let (parser, _) = fruit_parser();
    let err = parser.parse("bogus 1;\n", "bad.conf").expect_err("unknown");
    match err {
        DataError::UnknownKeyword { keyword, .. } => assert_eq!(keyword, "bogus"),
        other => panic!("got {other}"),
    }
}

const DEFAULT_SCHEMA: &str = "\
container net {\n\
    leaf mtu { type uint16; default 1500; }\n\
    leaf name { type string; mandatory true; }\n\
}\n";

#[test]
fn default_fills_and_elides() {
    let schema = Schema::parse(DEFAULT_SCHEMA, "net.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    // `net` is not a presence container, so its members sit at top level.
    let doc = parser.parse("name eth0;\n", "net.conf").expect("parse");
    assert_eq!(doc.field("mtu").and_then(Value::as_u64), Some(1500));

    // A member equal to its default is elided on output.
    assert_eq!(printer.to_text(&doc).expect("print"), "name eth0;\n");

    let doc = parser.parse("name eth0; mtu 9000;\n", "net.conf").expect("parse");
    assert_eq!(printer.to_text(&doc).expect("print"), "mtu 9000;\nname eth0;\n");
}

#[test]
fn restating_a_filled_scalar_rejected() {
    let schema = Schema::parse(DEFAULT_SCHEMA, "net.schema").expect("schema");
    let parser = DataParser::new(compile_grammar(&schema).expect("compile"));

    // An empty restatement of an already-given defaultable leaf is still a
    // duplicate.
    let err = parser
        .parse("name eth0; mtu 9000; mtu;\n", "net.conf")
        .expect_err("duplicate mtu");
    assert!(matches!(err, DataError::DuplicateParameter { ref keyword, .. } if keyword == "mtu"));
}

const BARE_SCHEMA: &str = "leaf n { type uint32; }\n";

#[test]
fn bare_scalar_document() {
    let schema = Schema::parse(BARE_SCHEMA, "n.schema").expect("schema");
    let grammar = Compiler::new().compile_node(&schema.body[0]).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    for text in ["1", "'1'", "  \"1\"  \n"] {
        let v = parser.parse(text, "n.conf").expect("parse");
        assert_eq!(v, Value::Uint32(1), "input {text:?}");
    }
    assert_eq!(printer.to_text(&Value::Uint32(1)).expect("print"), "1");

    let err = parser.parse("", "n.conf").expect_err("empty");
    assert!(matches!(err, DataError::MissingValue { .. }));
}

const DNS_SCHEMA: &str = "\
leaf-list dns { type ipv4-address; }\n\
leaf name { type string; mandatory true; }\n";

#[test]
fn leaf_list_round_trips() {
    let schema = Schema::parse(DNS_SCHEMA, "dns.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser
        .parse("name srv; dns 1.1.1.1; dns 8.8.8.8;\n", "dns.conf")
        .expect("parse");
    let items = doc.field("dns").and_then(Value::as_array).expect("array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ipv4().map(|a| a.octets()), Some([1, 1, 1, 1]));

    let text = printer.to_text(&doc).expect("print");
    assert_eq!(text, "dns 1.1.1.1;\ndns 8.8.8.8;\nname srv;\n");
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);
    assert_eq!(printer.to_text(&again).expect("print"), text);

    // An absent leaf-list materializes empty and prints nothing.
    let doc = parser.parse("name srv;\n", "dns.conf").expect("parse");
    assert_eq!(doc.field("dns").and_then(Value::as_array), Some(&[][..]));
    assert_eq!(printer.to_text(&doc).expect("print"), "name srv;\n");
}

#[test]
fn bare_leaf_list_document() {
    let schema = Schema::parse(DNS_SCHEMA, "dns.schema").expect("schema");
    let grammar = Compiler::new().compile_node(&schema.body[0]).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser.parse("dns 9.9.9.9; dns 1.0.0.1;\n", "dns.conf").expect("parse");
    let items = doc.as_array().expect("array");
    assert_eq!(items.len(), 2);

    let text = printer.to_text(&doc).expect("print");
    assert_eq!(text, "dns 9.9.9.9;\ndns 1.0.0.1;\n");
    assert_eq!(parser.parse(&text, "reprint").expect("reparse"), doc);
}

const ROUTE_SCHEMA: &str = "\
list route {\n\
    key id;\n\
    leaf id { type uint16; }\n\
    leaf metric { type uint32; default 1; }\n\
    leaf up { type boolean; mandatory true; }\n\
}\n";

fn u16_key(id: u16) -> Value {
    Value::Struct([("id".to_string(), Value::Uint16(id))].into_iter().collect())
}

#[test]
fn packed_table_round_trips() {
    let schema = Schema::parse(ROUTE_SCHEMA, "route.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser
        .parse(
            "route { id 30; metric 5; up true; }\nroute { id 2; up false; }\n",
            "route.conf",
        )
        .expect("parse");
    let routes = doc.field("route").and_then(Value::as_table).expect("table");
    assert_eq!(routes.len(), 2);

    let entry = routes.get(&u16_key(2)).expect("entry");
    assert_eq!(entry.field("metric").and_then(Value::as_u64), Some(1));
    assert_eq!(entry.field("up").and_then(Value::as_bool), Some(false));

    // Entries come back sorted by packed key, defaults elided.
    let text = printer.to_text(&doc).expect("print");
    assert_eq!(
        text,
        "route {\n\
         \x20 id 2;\n\
         \x20 up false;\n\
         }\n\
         route {\n\
         \x20 id 30;\n\
         \x20 metric 5;\n\
         \x20 up true;\n\
         }\n"
    );
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);
    assert_eq!(printer.to_text(&again).expect("print"), text);
}

#[test]
fn packed_table_duplicate_key_rejected() {
    let schema = Schema::parse(ROUTE_SCHEMA, "route.schema").expect("schema");
    let parser = DataParser::new(compile_grammar(&schema).expect("compile"));
    let err = parser
        .parse(
            "route { id 7; up true; }\nroute { id 7; up false; }\n",
            "route.conf",
        )
        .expect_err("duplicate id");
    assert!(matches!(err, DataError::Table { .. }), "got {err}");
}

#[test]
fn packed_key_table_round_trips() {
    // A string value member keeps the rows heterogeneous; only keys pack.
    let schema = Schema::parse(
        "list port {\n\
         \x20 key id;\n\
         \x20 leaf id { type uint16; }\n\
         \x20 leaf label { type string; }\n\
         }\n",
        "port.schema",
    )
    .expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser
        .parse("port { id 443; label https; }\nport { id 80; }\n", "port.conf")
        .expect("parse");
    let ports = doc.field("port").and_then(Value::as_table).expect("table");
    let entry = ports.get(&u16_key(443)).expect("entry");
    assert_eq!(entry.field("label").and_then(Value::as_str), Some("https"));
    assert_eq!(ports.get(&u16_key(80)).expect("entry").field("label"), None);

    let text = printer.to_text(&doc).expect("print");
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);
    assert_eq!(printer.to_text(&again).expect("print"), text);
}

const ACL_SCHEMA: &str = "\
list rule {\n\
    key \"chain id\";\n\
    leaf chain { type string; }\n\
    leaf id { type uint16; }\n\
    leaf action { type string; mandatory true; }\n\
}\n";

#[test]
fn composite_key_table_round_trips() {
    let schema = Schema::parse(ACL_SCHEMA, "acl.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser
        .parse(
            "rule { chain input; id 2; action drop; }\n\
             rule { chain input; id 1; action accept; }\n\
             rule { chain output; id 1; action accept; }\n",
            "acl.conf",
        )
        .expect("parse");
    let rules = doc.field("rule").and_then(Value::as_table).expect("table");
    assert_eq!(rules.len(), 3);

    let key = Value::Struct(
        [
            ("chain".to_string(), Value::String("input".to_string())),
            ("id".to_string(), Value::Uint16(2)),
        ]
        .into_iter()
        .collect(),
    );
    let entry = rules.get(&key).expect("entry");
    assert_eq!(entry.field("action").and_then(Value::as_str), Some("drop"));

    let text = printer.to_text(&doc).expect("print");
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);
    assert_eq!(printer.to_text(&again).expect("print"), text);
}

#[test]
fn composite_key_duplicates_rejected() {
    let schema = Schema::parse(ACL_SCHEMA, "acl.schema").expect("schema");
    let parser = DataParser::new(compile_grammar(&schema).expect("compile"));

    // Same chain with a different id is a distinct key.
    parser
        .parse(
            "rule { chain input; id 1; action drop; }\n\
             rule { chain input; id 2; action drop; }\n",
            "acl.conf",
        )
        .expect("distinct keys");

    let err = parser
        .parse(
            "rule { chain input; id 1; action drop; }\n\
             rule { chain input; id 1; action accept; }\n",
            "acl.conf",
        )
        .expect_err("duplicate composite key");
    assert!(matches!(err, DataError::Table { .. }), "got {err}");
}

const RPC_SCHEMA: &str = "\
module ops {\n\
    rpc ping {\n\
        output { leaf latency-ms { type uint32; mandatory true; } }\n\
    }\n\
    rpc set-mtu {\n\
        input { leaf mtu { type uint16; mandatory true; } }\n\
        output { leaf ok { type boolean; default true; } }\n\
    }\n\
}\n";

#[test]
fn rpc_sequence_round_trips() {
    let schema = Schema::parse(RPC_SCHEMA, "ops.schema").expect("schema");
    let grammar = rpc_input_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let doc = parser
        .parse("set-mtu { mtu 1400; }\nping;\nset-mtu { mtu 9000; }\n", "ops.txt")
        .expect("parse");
    let calls = match &doc {
        Value::Sequence(calls) => calls,
        other => panic!("got {other}"),
    };
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].0, "set-mtu");
    assert_eq!(calls[0].1.field("mtu").and_then(Value::as_u64), Some(1400));
    assert_eq!(calls[1].0, "ping");
    assert_eq!(calls[2].1.field("mtu").and_then(Value::as_u64), Some(9000));

    let text = printer.to_text(&doc).expect("print");
    let again = parser.parse(&text, "reprint").expect("reparse");
    assert_eq!(doc, again);
}

#[test]
fn rpc_call_missing_mandatory_input_rejected() {
    let schema = Schema::parse(RPC_SCHEMA, "ops.schema").expect("schema");
    let parser = DataParser::new(rpc_input_grammar(&schema).expect("compile"));
    let err = parser.parse("set-mtu;\n", "ops.txt").expect_err("missing mtu");
    assert!(matches!(err, DataError::MissingValue { .. }));
}

const QUOTE_SCHEMA: &str = "leaf motd { type string; mandatory true; }\n";

#[test]
fn strings_needing_quotes_round_trip() {
    let schema = Schema::parse(QUOTE_SCHEMA, "motd.schema").expect("schema");
    let grammar = compile_grammar(&schema).expect("compile");
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    for s in ["hello world", "semi;colon", "brace{y}", "say \"hi\"", "tab\there", ""] {
        let doc = Value::Struct(
            [("motd".to_string(), Value::String(s.to_string()))].into_iter().collect(),
        );
        let text = printer.to_text(&doc).expect("print");
        let again = parser.parse(&text, "motd.conf").expect("reparse");
        assert_eq!(doc, again, "value {s:?} via {text:?}");
    }
}
