//! Check configuration documents against a schema and print the canonical
//! form.
//!
//! Usage:
//!   confcheck SCHEMA.yang CONFIG.conf [CONFIG.conf ...]
//!
//! Each config file is parsed against the compiled schema grammar; on
//! success its canonical printed form goes to stdout. Errors are reported
//! per file to stderr and make the process exit non-zero.

use anyhow::Context;
use confcodec::{compile_grammar, DataParser, DataPrinter, Schema};
use std::io::Write;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: confcheck SCHEMA CONFIG [CONFIG ...]");
        std::process::exit(2);
    }

    let schema_path = Path::new(&args[0]);
    let schema = Schema::load(schema_path)
        .with_context(|| format!("loading schema {}", schema_path.display()))?;
    let grammar = compile_grammar(&schema)
        .with_context(|| format!("compiling schema {}", schema_path.display()))?;
    let parser = DataParser::new(grammar.clone());
    let printer = DataPrinter::new(grammar);

    let mut has_error = false;
    let stdout = std::io::stdout();
    for path in &args[1..] {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                has_error = true;
                continue;
            }
        };
        match parser.parse(&text, path) {
            Ok(value) => {
                let mut out = stdout.lock();
                if let Err(e) = printer.print(&value, &mut out) {
                    eprintln!("{}: print failed: {}", path, e);
                    has_error = true;
                }
                let _ = out.flush();
            }
            Err(e) => {
                eprintln!("{}", e);
                has_error = true;
            }
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
