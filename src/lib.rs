pub mod cache;
pub mod config;
pub mod error;
pub mod image;
pub mod mill;
pub mod resolver;
pub mod search;
pub mod service;
pub mod service_clients;
pub mod sync;
pub mod web_server;

pub use error::MillError;
pub use image::{
    BatchAttachment, FailedImage, ImageItem, SearchParam, SearchResult, SyncOperation, SyncReport,
    NO_MORE_DATA,
};
pub use mill::ImageMill;
