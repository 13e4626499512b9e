//! Built image artifacts.

mod catalog;

pub use catalog::ImageCatalog;
