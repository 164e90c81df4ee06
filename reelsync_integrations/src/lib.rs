//! HTTP clients for the two external sources the engine pulls from: the
//! metadata catalog and the scraped tracking site.

pub mod catalog;
pub mod tracker;

pub use catalog::HttpCatalogClient;
pub use tracker::HttpTrackerClient;
