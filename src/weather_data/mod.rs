//! Daily mean temperature (TMK) retrieval from the DWD open data server.

pub mod archive_index;
pub mod data_loader;
pub mod dwd;
pub mod error;
pub mod fetcher;
pub mod source;
