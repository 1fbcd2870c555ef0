//! Bundled tools. All are thin: searching, fetching and reading only, no parsing.

pub mod text_inspector;
pub mod visit_page;
pub mod web_search;

pub use text_inspector::TextInspector;
pub use visit_page::VisitPage;
pub use web_search::WebSearch;
