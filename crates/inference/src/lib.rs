//! Grounding model integration: prompt construction, the grounding client
//! contract and its HTTP implementation, schema URL projection, and output
//! validation.

pub mod client;
pub mod prompts;
pub mod schema_url;
pub mod validate;

pub use client::{Extraction, Grounding, GroundingClient, HttpGroundingClient};
pub use schema_url::{inject_urls, project_url_fields, UrlPath};
pub use validate::validate_against_schema;
