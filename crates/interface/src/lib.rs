//! # Spindle Interface
//!
//! Media resolution and stream negotiation layer.
//!
//! Given a streaming-service URL this crate enumerates the constituent
//! media items (paging through albums, shows, playlists and artist
//! discographies), negotiates the best available encoded representation
//! of each item, acquires decryption material through a CDM
//! collaborator and assembles everything into immutable
//! [`media::MediaDescriptor`] values ready for staging.
//!
//! Per-item failures never abort sibling enumeration: the resolver
//! yields a stream of tagged results instead of raising.

pub mod api;
pub mod assembler;
pub mod cache;
pub mod cdm;
pub mod error;
pub mod media;
pub mod negotiator;
pub mod resolver;
pub mod url;

pub use cache::CollectionCache;
pub use cdm::{Cdm, KeyBroker};
pub use error::ResolveError;
pub use resolver::{Resolver, ResolverConfig};
pub use url::{MediaUrlKind, UrlInfo};
