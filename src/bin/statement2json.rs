//! CLI tool for bank statement PDF to JSON conversion
//!
//! Usage: statement2json <pdf_file>... [--out <file>] [--config <json>] [--pretty]
//!
//! Exit codes: 0 all files converted, 1 usage or I/O error, 2 some file
//! produced no transactions.

use statement_inspector::{convert_many, ConversionResponse, ParseOptions, StatementParser};
use std::env;
use std::fs;
use std::process;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} <pdf_file>... [--out <file>] [--config <json>] [--pretty]",
        program
    );
    eprintln!();
    eprintln!("Extracts transactions from bank statement PDFs as JSON.");
    eprintln!("Several files are converted in parallel and printed as an array.");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("statement2json");

    let mut files: Vec<String> = Vec::new();
    let mut out_file: Option<String> = None;
    let mut config_file: Option<String> = None;
    let mut pretty = false;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--out" => out_file = Some(rest.next().cloned().unwrap_or_else(|| usage(program))),
            "--config" => config_file = Some(rest.next().cloned().unwrap_or_else(|| usage(program))),
            "--pretty" => pretty = true,
            flag if flag.starts_with("--") => {
                eprintln!("Unknown option: {}", flag);
                usage(program);
            }
            _ => files.push(arg.clone()),
        }
    }
    if files.is_empty() {
        usage(program);
    }

    let options = match config_file {
        Some(path) => {
            let loaded = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    serde_json::from_str::<ParseOptions>(&json).map_err(|e| e.to_string())
                });
            match loaded {
                Ok(options) => options,
                Err(e) => {
                    eprintln!("Error reading config {}: {}", path, e);
                    process::exit(1);
                }
            }
        }
        None => ParseOptions::default(),
    };

    let parser = StatementParser::new(options);
    let responses = convert_many(&parser, &files);

    let json = if let [single] = responses.as_slice() {
        render(single, pretty)
    } else {
        render(&responses, pretty)
    };
    let json = match json {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    };

    match &out_file {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                eprintln!("Error writing {}: {}", path, e);
                process::exit(1);
            }
            eprintln!("Output written to: {}", path);
        }
        None => println!("{}", json),
    }

    for response in responses.iter().filter(|r| !r.success) {
        eprintln!(
            "{}: {}",
            response.filename,
            response.error.as_deref().unwrap_or("conversion failed")
        );
    }
    if responses.iter().any(|r: &ConversionResponse| !r.success) {
        process::exit(2);
    }
}

fn render<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
