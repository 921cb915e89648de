//! `doc-apply` — replay a log entry against a document.
//!
//! Usage:
//!   doc-apply '<entry-json>'
//!
//! The pre-image is read from stdin; the post-image is printed to stdout.

use std::io::{self, Read, Write};

use doc_delta::cli::{apply_document, options_from_env};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let entry = match args.get(1) {
        Some(e) => e.clone(),
        None => {
            eprintln!("First argument must be a log entry.");
            std::process::exit(1);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let result = options_from_env().and_then(|opts| apply_document(buf.trim(), &entry, &opts.codec));
    match result {
        Ok(doc) => {
            let mut out = io::stdout();
            if writeln!(out, "{doc}").is_err() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
