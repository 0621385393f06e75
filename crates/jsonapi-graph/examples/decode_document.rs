//! Simple decoder to inspect resource documents.

use std::fs;

use jsonapi_graph::{GraphEntry, Serializer, validate_document};
use serde_json::Value;

fn preview(record: &Value) -> String {
    let text = record.to_string();
    let short: String = text.chars().take(100).collect();
    if text.len() > 100 {
        format!("{}...", short)
    } else {
        short
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "document.json".to_string());

    println!("Reading: {}", path);

    let text = fs::read_to_string(&path).expect("Failed to read file");
    println!("File size: {} bytes", text.len());

    let document: Value = serde_json::from_str(&text).expect("Failed to parse JSON");
    if let Err(err) = validate_document(&document) {
        eprintln!("Invalid document: {}", err);
        std::process::exit(1);
    }

    let included = document
        .get("included")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    println!("Included resources: {}", included);

    let graph = Serializer::new()
        .deserialize(&document)
        .expect("Failed to decode");

    println!("\n=== Types ({}) ===", graph.len());
    for resource_type in graph.types() {
        match graph.get(resource_type) {
            Some(GraphEntry::One(record)) => {
                println!("{}: {}", resource_type, preview(record));
            }
            Some(GraphEntry::Many(records)) => {
                println!("{} ({} records)", resource_type, records.len());
                for record in records.iter().take(10) {
                    println!("  - {}", preview(record));
                }
                if records.len() > 10 {
                    println!("  ... and {} more", records.len() - 10);
                }
            }
            None => {}
        }
    }
}
