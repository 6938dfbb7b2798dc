//! Tally Manifest - Remotely updatable rule set
//!
//! A manifest is a versioned list of rules. Each rule pairs a predicate
//! over events with the actions to run when it matches, and the manifest
//! carries the throttling defaults in force while it is active.
//!
//! # Lifecycle
//!
//! 1. A [`ManifestSource`] parses a document into a fresh [`Manifest`],
//!    dropping (and counting) malformed rules and actions
//! 2. The processor computes every sampling decision for its session
//! 3. The manifest is installed by atomic replacement and never mutated
//!
//! # Example
//!
//! ```ignore
//! use tally_manifest::{FileManifestSource, ManifestSource};
//!
//! let manifest = FileManifestSource::new("manifest.json").load()?;
//! manifest.compute_sampling(&identity);
//!
//! for action in manifest.actions_for(&event) {
//!     // ...
//! }
//! ```

mod error;
mod manifest;
mod matcher;
pub mod sampling;
mod source;

pub use error::{ManifestError, Result};
pub use manifest::{
    DEFAULT_THROTTLE_RESET, DEFAULT_THROTTLE_THRESHOLD, DEFAULT_VERSION, Manifest, Rule,
    ValidationReport,
};
pub use matcher::{EventMatch, NameMatch, SamplingMatch};
pub use sampling::{SamplingInput, calculate_is_sample_active, is_sample_active};
pub use source::{FileManifestSource, ManifestSource, StaticManifestSource};
