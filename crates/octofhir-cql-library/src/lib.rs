//! CQL library resolution and caching for OctoFHIR
//!
//! Sits between a CQL compiler and the places library content comes from:
//! - ordered content providers (FHIR `Library` attachments, embedded content)
//! - reuse of precompiled ELM when it was built with the active translator
//!   options, compilation from source otherwise
//! - process-wide caches for compiled models, libraries and value set
//!   expansions, with single-flight computation per key
//!
//! The compiler, model info and terminology sources are supplied by the host
//! through the traits in [`compiler`], [`model_manager`] and [`terminology`].

pub mod cache;
pub mod compiler;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod elm;
pub mod error;
pub mod fingerprint;
pub mod identifier;
pub mod loader;
pub mod model_manager;
pub mod observability;
pub mod options;
pub mod resource;
pub mod service;
pub mod terminology;
pub mod version;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, LibraryCache, SingleFlightCache};
pub use compiler::{CompilationContext, CompilerOutput, CqlCompiler};
pub use config::CqlLibraryConfig;
pub use content::{ContentResolutionChain, LibraryContentKind, LibraryContentProvider};
pub use elm::CompiledLibrary;
pub use error::{LibraryError, LibraryResult};
pub use identifier::VersionedIdentifier;
pub use loader::{CacheAwareLibraryLoader, LibraryLoader, TranslatingLibraryLoader};
pub use model_manager::{GlobalModelCache, ModelInfoProvider, ModelManager};
pub use options::{TranslatorOption, TranslatorOptions};
pub use service::LibraryService;
pub use terminology::{CacheAwareTerminologyProvider, TerminologyCache, TerminologyProvider};
