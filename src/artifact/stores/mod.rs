//! Concrete blob store implementations

pub mod azure;

pub use azure::AzureBlobStore;
