//! Print the OpenAPI document to stdout for offline client generation.

use utoipa::OpenApi;
use wordplay_back::services::documentation::ApiDoc;

fn main() {
    let doc = ApiDoc::openapi();
    match doc.to_pretty_json() {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to render OpenAPI document: {err}");
            std::process::exit(1);
        }
    }
}
