pub mod loader;
pub mod types;
pub mod utils;

pub use loader::{LoadedTable, TableLoader};
pub use types::{Cell, Column, FileFormat, Table};
