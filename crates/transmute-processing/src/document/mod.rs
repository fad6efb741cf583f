//! PDF strategy backed by `lopdf`

pub mod pages;
pub mod pdf;
pub mod transformer;

pub use pages::parse_page_ranges;
pub use transformer::DocumentTransformer;
