pub mod analysis;
pub mod db_loader;
pub mod extractor;
pub mod fetcher;
pub mod search;
pub mod table;
pub mod tools;
