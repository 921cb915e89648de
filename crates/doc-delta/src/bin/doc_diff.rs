//! `doc-diff` — record the mutation between two documents as a log entry.
//!
//! Usage:
//!   doc-diff '<pre-json>' '<post-json>'
//!
//! Prints the compact JSON log entry. `DOC_DELTA_FIELD_ORDER` and
//! `DOC_DELTA_FORMAT_VERSION` tune the output; `RUST_LOG=debug` shows the
//! cost decision.

use std::io::{self, Write};

use doc_delta::cli::{diff_documents, options_from_env};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let (pre, post) = match (args.get(1), args.get(2)) {
        (Some(pre), Some(post)) => (pre, post),
        _ => {
            eprintln!("Usage: doc-diff '<pre-json>' '<post-json>'");
            std::process::exit(1);
        }
    };

    let result = options_from_env().and_then(|opts| diff_documents(pre, post, &opts));
    match result {
        Ok(entry) => {
            let mut out = io::stdout();
            if writeln!(out, "{entry}").is_err() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
