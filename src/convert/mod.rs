//! Content Conversion
//!
//! Pure markdown rewriters for the two Atlassian body formats: ADF for Jira
//! issue descriptions and comments, wiki markup for Confluence pages.

pub mod adf;
pub mod wiki;

pub use adf::{adf_doc, adf_to_text, markdown_to_adf, parse_inline};
pub use wiki::markdown_to_wiki;
