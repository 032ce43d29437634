//! Remote inventory API binding
//!
//! The engine talks to the inventory through the `AssetSource` trait:
//! one cursor-paginated search endpoint returning identifiers and one
//! batched detail endpoint returning full records. `AssetsApi` implements
//! it over the resilient `HttpClient`.

mod assets;
mod types;

pub use assets::{AssetsApi, DETAIL_PATH, SEARCH_PATH};
pub use types::{AssetSource, SearchPage, SearchRequest};
