//! tubefetch-core: format resolution, extraction cascade and downloads for
//! the tubefetch web service

pub mod cascade;
pub mod config;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod service;
pub mod storage;
pub mod store;
pub mod strategy;
pub mod url;

pub use config::Config;
pub use error::{Result, TubeFetchError};
pub use formats::{resolve, FormatDescriptor, RankedFormat};
pub use service::VideoService;
