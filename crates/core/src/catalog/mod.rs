pub mod feed;
pub mod store;

pub use feed::{
    feed_for_source, parse_csv, CatalogFeed, FileCatalogFeed, HttpCatalogFeed, StaticCatalogFeed,
};
pub use store::{CatalogSnapshot, CatalogStore, Snapshot};
