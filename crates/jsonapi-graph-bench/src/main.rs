//! Benchmark for encoding and decoding a synthetic library catalog.
//!
//! Every library links to its city, state and books; every book links back
//! to its author and the author to all of their books, so the dataset is
//! dense with repeated and cyclic references.

use std::time::Instant;

use jsonapi_graph::{
    CodecOptions, EncodeOptions, RelationshipSpec, Resolver, SchemaOptions, Serializer,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const STATES: usize = 50;
const CITIES_PER_STATE: usize = 20;
const AUTHORS: usize = 2_000;
const BOOKS_PER_LIBRARY: usize = 25;

fn build_serializer() -> Serializer {
    let options = CodecOptions::new()
        .option("baseUrl", "https://api.example.com")
        .link(
            "self",
            Resolver::sync(|ctx| {
                let base = ctx.option("baseUrl").and_then(Value::as_str).unwrap_or("");
                Ok(ctx.resource.as_ref().map(|resource| {
                    json!(format!("{base}/{}/{}", resource.resource_type, resource.id))
                }))
            }),
        )
        .top_level_meta(
            "page",
            Resolver::deferred(|ctx| async move { Ok(ctx.request().get("page").cloned()) }),
        );

    let mut serializer = Serializer::with_options(options);
    let schemas = [
        (
            "libraries",
            SchemaOptions::new()
                .id("_id")
                .blacklist(["internal"])
                .relationship("address.city", RelationshipSpec::new("cities"))
                .relationship("address.state", RelationshipSpec::new("states"))
                .relationship("books", RelationshipSpec::new("books")),
        ),
        (
            "cities",
            SchemaOptions::new().relationship("state", RelationshipSpec::new("states")),
        ),
        ("states", SchemaOptions::new().blacklist(["capital"])),
        (
            "books",
            SchemaOptions::new()
                .id("_id")
                .blacklist(["isbn"])
                .relationship("author", RelationshipSpec::new("authors")),
        ),
        (
            "authors",
            SchemaOptions::new()
                .id("_id")
                .relationship("books", RelationshipSpec::new("books").include(false)),
        ),
    ];
    for (resource_type, schema) in schemas {
        serializer
            .define(resource_type, schema)
            .expect("Failed to define schema");
    }
    serializer
}

fn build_dataset(libraries: usize) -> Value {
    let records: Vec<Value> = (0..libraries)
        .map(|l| {
            let state = l % STATES;
            let city = state * CITIES_PER_STATE + l % CITIES_PER_STATE;
            let books: Vec<Value> = (0..BOOKS_PER_LIBRARY)
                .map(|b| {
                    let book = (l * 7 + b * 13) % (libraries * 4);
                    let author = book % AUTHORS;
                    json!({
                        "_id": format!("book-{book}"),
                        "title": format!("Book {book}"),
                        "isbn": format!("978-{book:010}"),
                        "author": {
                            "_id": format!("author-{author}"),
                            "name": format!("Author {author}"),
                            "books": [format!("book-{book}")]
                        }
                    })
                })
                .collect();
            json!({
                "_id": format!("library-{l}"),
                "name": format!("Library {l}"),
                "internal": {"budget": l * 1000},
                "address": {
                    "street": format!("{l} Main St"),
                    "city": {"id": city, "name": format!("City {city}"), "state": state},
                    "state": {"id": state, "name": format!("State {state}"), "capital": "x"}
                },
                "books": books
            })
        })
        .collect();
    Value::Array(records)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let libraries: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1_000)
        .max(1);

    tracing::info!(libraries, "building dataset");
    let serializer = build_serializer();

    let build_start = Instant::now();
    let dataset = build_dataset(libraries);
    println!("Built {} libraries in {:?}", libraries, build_start.elapsed());

    let options = EncodeOptions::with_request(json!({"page": 1}));
    let encode_start = Instant::now();
    let document = serializer
        .serialize("libraries", dataset, &options)
        .await
        .expect("Failed to encode");
    let encode_time = encode_start.elapsed();

    println!(
        "\nEncoded {} primary, {} included in {:?}",
        document.data.as_slice().len(),
        document.included.len(),
        encode_time
    );
    println!(
        "  Throughput: {:.0} resources/s",
        (document.data.as_slice().len() + document.included.len()) as f64
            / encode_time.as_secs_f64()
    );

    let wire = serde_json::to_value(&document).expect("Failed to convert document");
    let text = serde_json::to_string(&wire).expect("Failed to write document");
    println!("  Document size: {} bytes", text.len());

    let decode_start = Instant::now();
    let graph = serializer.deserialize(&wire).expect("Failed to decode");
    let decode_time = decode_start.elapsed();

    println!("\nDecoded {} types in {:?}", graph.len(), decode_time);
    for resource_type in graph.types() {
        println!("  - {}: {}", resource_type, graph.records(resource_type).len());
    }
    println!(
        "  Throughput: {:.2} MB/s",
        (text.len() as f64 / 1_000_000.0) / decode_time.as_secs_f64()
    );

    assert_eq!(graph.records("libraries").len(), libraries);
}
