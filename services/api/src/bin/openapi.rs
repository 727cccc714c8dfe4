//! services/api/src/bin/openapi.rs
//!
//! Writes the HealthLens OpenAPI document as pretty JSON.
//!
//! Usage: `openapi [OUTPUT]`. `OUTPUT` defaults to `openapi.json` in the
//! current directory and is overwritten if it exists.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

/// Serializes `api_doc` and writes it to `path`.
fn write_document(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = api_doc.to_pretty_json()?;
    std::fs::write(path, document)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    write_document(ApiDoc::openapi(), &path)?;
    Ok(())
}
