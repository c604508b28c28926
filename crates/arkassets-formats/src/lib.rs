//! Bundle decoding and asset extraction for Arknights resources
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Ratio heuristics
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! Downloaded `.ab` files are UnityFS bundles whose data blocks are LZ4
//! compressed. This crate turns such a file into its uncompressed payload and
//! pulls recognizable assets (images, audio, text tables) out of that payload.
//!
//! # Modules
//!
//! - **bundle**: UnityFS header and blocks-info parsing, LZ4 block reconstruction,
//!   and a builder for producing bundles
//! - **extract**: signature scanning, whole-file sniffing, and writing assets
//!   into `<name>_unpacked` directories with text-asset decryption
//!
//! Decoding never fails on a damaged block: the affected range is copied
//! through and the rest of the bundle is still reconstructed.

#![warn(missing_docs)]

pub mod bundle;
pub mod extract;

pub use bundle::{DecodeError, DecodedPayload, decode};
pub use extract::{ExtractedAsset, ExtractionError, Scanner, extract, unpack};
