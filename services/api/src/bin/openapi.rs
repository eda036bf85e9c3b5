//! services/api/src/bin/openapi.rs
//!
//! Dumps the reader API's OpenAPI document, for client generation and review.
//!
//! Usage: `openapi [OUTPUT]`. Without an argument the document goes to
//! `openapi.json` in the working directory.

use api_lib::web::rest::ApiDoc;
use std::error::Error;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn write_document(output: &Path) -> Result<usize, Box<dyn Error>> {
    let document = ApiDoc::openapi();
    let routes = document.paths.paths.len();
    if let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(output, document.to_pretty_json()?)?;
    Ok(routes)
}

fn main() -> Result<(), Box<dyn Error>> {
    let output: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let routes = write_document(&output)?;
    println!("{} routes described in {}", routes, output.display());
    Ok(())
}
