//! UnityFS bundle decoding
//!
//! Bundles start with a 64-byte header, followed by a (usually LZ4-compressed)
//! blocks-info table and then the data blocks it describes. Decoding produces one
//! contiguous buffer with every block decompressed in order.
//!
//! Inputs that are not UnityFS are not rejected: legacy containers and unknown
//! files are passed through whole so the extractor can sniff them. Bundles with
//! unsupported compression (LZMA) or a blocks-info table that cannot be read
//! fall back the same way.
//!
//! # Example
//!
//! ```
//! use arkassets_formats::bundle::{BundleBuilder, CompressionKind, DecodePath, decode};
//!
//! let bytes = BundleBuilder::new()
//!     .add_block(b"first block", CompressionKind::Lz4)
//!     .add_block(b"second block", CompressionKind::None)
//!     .build()
//!     .unwrap();
//!
//! let payload = decode(&bytes).unwrap();
//! assert_eq!(payload.path, DecodePath::Blocks { block_count: 2 });
//! assert_eq!(payload.data, b"first blocksecond block");
//! ```

mod blocks;
mod builder;
mod error;
mod header;

pub use blocks::{BlockInfo, BlocksInfo, decompress_blocks_info, reconstruct};
pub use builder::BundleBuilder;
pub use error::{DecodeError, DecodeResult};
pub use header::{
    BundleHeader, COMPRESSION_MASK, CompressionKind, HEADER_LEN, LEGACY_PREFIX, Signature,
    UNITYFS_SIGNATURE, padded_field,
};

use tracing::{debug, info, warn};

/// Maximum allowed decompression size (1 GB)
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// How a payload was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// UnityFS with LZ4 blocks, fully reconstructed
    Blocks {
        /// Number of data blocks
        block_count: u32,
    },
    /// UnityFS without compression; payload is everything after the header
    Uncompressed,
    /// UnityFS with a compression that is not decoded; payload is the input
    Unsupported(CompressionKind),
    /// UnityFS whose blocks-info table could not be decompressed or parsed;
    /// payload is the input
    DamagedBlocksInfo,
    /// Pre-UnityFS container; payload is the input
    Legacy,
    /// Not a bundle; payload is the input
    Unrecognized,
}

impl DecodePath {
    /// True when the payload came out of a parsed UnityFS container
    pub fn is_structured(self) -> bool {
        matches!(self, Self::Blocks { .. } | Self::Uncompressed)
    }
}

/// Decoded bundle contents, owned by the caller
#[derive(Debug, Clone)]
pub struct DecodedPayload {
    /// Parsed header, when the input was UnityFS
    pub header: Option<BundleHeader>,
    /// Route taken through the decoder
    pub path: DecodePath,
    /// Reconstructed bytes
    pub data: Vec<u8>,
}

impl DecodedPayload {
    fn passthrough(bytes: &[u8], header: Option<BundleHeader>, path: DecodePath) -> Self {
        Self {
            header,
            path,
            data: bytes.to_vec(),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the payload holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode a bundle into its uncompressed payload.
///
/// Dispatches on the first eight bytes: `UnityFS` is parsed structurally, other
/// `Unity*` signatures and unknown inputs are passed through for sniffing.
pub fn decode(bytes: &[u8]) -> DecodeResult<DecodedPayload> {
    match Signature::detect(bytes) {
        Signature::UnityFs => decode_unity_fs(bytes),
        Signature::Legacy => {
            let version = bytes
                .get(8..12)
                .map_or(0, |v| u32::from_le_bytes([v[0], v[1], v[2], v[3]]));
            warn!(
                "Legacy bundle format (version {}), limited support available",
                version
            );
            Ok(DecodedPayload::passthrough(bytes, None, DecodePath::Legacy))
        }
        Signature::Unknown => {
            debug!("No bundle signature, passing {} bytes through", bytes.len());
            Ok(DecodedPayload::passthrough(
                bytes,
                None,
                DecodePath::Unrecognized,
            ))
        }
    }
}

fn decode_unity_fs(bytes: &[u8]) -> DecodeResult<DecodedPayload> {
    let header = BundleHeader::parse(bytes)?;
    let compression = header.compression();

    debug!(
        "UnityFS v{} engine {} ({}), flags=0x{:X}, blocks info {} -> {} bytes",
        header.format_version,
        header.engine_version_str(),
        header.engine_revision_str(),
        header.flags,
        header.compressed_blocks_info_size,
        header.uncompressed_blocks_info_size
    );

    match compression {
        CompressionKind::None => Ok(DecodedPayload {
            data: bytes[HEADER_LEN..].to_vec(),
            header: Some(header),
            path: DecodePath::Uncompressed,
        }),
        CompressionKind::Lz4 | CompressionKind::Lz4Hc => decode_blocks(bytes, header),
        kind => {
            warn!(
                "{} compression ({}) is not supported, falling back to content sniffing",
                kind.name(),
                kind.as_byte()
            );
            Ok(DecodedPayload::passthrough(
                bytes,
                Some(header),
                DecodePath::Unsupported(kind),
            ))
        }
    }
}

fn decode_blocks(bytes: &[u8], header: BundleHeader) -> DecodeResult<DecodedPayload> {
    let data_start = header.data_offset()?;
    let stored_info = bytes
        .get(HEADER_LEN..data_start)
        .ok_or(DecodeError::Truncated {
            what: "blocks info",
            needed: data_start,
            actual: bytes.len(),
        })?;

    let table =
        decompress_blocks_info(stored_info, header.uncompressed_blocks_info_size as usize)
            .and_then(|info_bytes| BlocksInfo::parse(&info_bytes));
    let info = match table {
        Ok(info) => info,
        Err(
            e @ (DecodeError::BlocksInfo(_)
            | DecodeError::Truncated { .. }
            | DecodeError::BinRw(_)),
        ) => {
            warn!(
                "Unreadable blocks info ({}), falling back to content sniffing",
                e
            );
            return Ok(DecodedPayload::passthrough(
                bytes,
                Some(header),
                DecodePath::DamagedBlocksInfo,
            ));
        }
        Err(e) => return Err(e),
    };
    debug!("Bundle has {} data blocks", info.block_count);

    let data = reconstruct(bytes, data_start, &info)?;
    info!(
        "Processed {} blocks, {} bytes uncompressed",
        info.block_count,
        data.len()
    );

    Ok(DecodedPayload {
        header: Some(header),
        path: DecodePath::Blocks {
            block_count: info.block_count,
        },
        data,
    })
}
