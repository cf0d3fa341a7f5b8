//! Report output formats

pub mod html;
pub mod json;
pub mod table;

pub use html::render_html;
pub use json::{parse_json, render_json};
pub use table::render_table;
