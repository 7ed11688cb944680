//! Artifact resolution layer
//!
//! Turns a logical request ("latest sandbox artifact for de") into concrete
//! download URLs by listing blob storage, filtering the listing and applying a
//! selection strategy. A signature-keyed cache sits in front of the engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Request   │────▶│  Resolver   │────▶│    Cache    │
//! │ (validate)  │     │ (composite) │     │ (signature) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!        ┌───────────────────┼───────────────────┐
//!        ▼                   ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Lister    │────▶│   Filter    │────▶│  Strategy   │
//! │(paged+retry)│     │(locale,date)│     │  (select)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   Stores    │
//! │   (azure)   │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: In-memory resolution cache with read-time expiry
//! - [`clock`]: Time source and day/week boundaries
//! - [`error`]: Error types for versions, listing, requests and resolution
//! - [`filter`]: Locale, platform, version prefix and date filtering
//! - [`lister`]: `BlobStore` trait and the paged listing with per-page retry
//! - [`request`]: Request type, validation and cache signature
//! - [`resolver`]: Resolution engine and the cached facade
//! - [`stores`]: Concrete blob stores
//! - [`strategy`]: Selection of artifacts from a candidate set
//! - [`types`]: Artifact types, strategies and blob entries
//! - [`version`]: Four-part version parsing and ordering

pub mod cache;
pub mod clock;
pub mod error;
pub mod filter;
pub mod lister;
pub mod request;
pub mod resolver;
pub mod stores;
pub mod strategy;
pub mod types;
pub mod version;
