//! UnityFS header structures and parsing

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

use super::error::{DecodeError, DecodeResult};

/// UnityFS signature bytes (NUL padded to eight bytes)
pub const UNITYFS_SIGNATURE: [u8; 8] = *b"UnityFS\0";

/// Prefix shared by the pre-UnityFS container signatures
pub const LEGACY_PREFIX: &[u8] = b"Unity";

/// Fixed header length in bytes
pub const HEADER_LEN: usize = 64;

/// Mask selecting the compression kind from a flags word
pub const COMPRESSION_MASK: u32 = 0x3F;

/// Container family detected from the leading signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// `UnityFS`, parsed structurally
    UnityFs,
    /// `UnityWeb`, `UnityRaw` and friends
    Legacy,
    /// Not a bundle
    Unknown,
}

impl Signature {
    /// Detect the container family from the first eight bytes
    pub fn detect(bytes: &[u8]) -> Self {
        let Some(head) = bytes.get(..8) else {
            return Self::Unknown;
        };
        let trimmed = trim_nul(head);
        if trimmed == b"UnityFS" {
            Self::UnityFs
        } else if trimmed.starts_with(LEGACY_PREFIX) {
            Self::Legacy
        } else {
            Self::Unknown
        }
    }
}

/// Compression applied to the blocks-info region or to a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Stored
    None,
    /// LZMA, recognized but not decoded
    Lzma,
    /// LZ4 raw block
    Lz4,
    /// LZ4 high-compression (same decoder as LZ4)
    Lz4Hc,
    /// Anything else
    Unknown(u8),
}

impl CompressionKind {
    /// Extract the compression kind from a flags word
    pub fn from_flags(flags: u32) -> Self {
        match (flags & COMPRESSION_MASK) as u8 {
            0 => Self::None,
            1 => Self::Lzma,
            2 => Self::Lz4,
            3 => Self::Lz4Hc,
            other => Self::Unknown(other),
        }
    }

    /// Numeric code as stored in flags
    pub fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lzma => 1,
            Self::Lz4 => 2,
            Self::Lz4Hc => 3,
            Self::Unknown(code) => code,
        }
    }

    /// Whether the LZ4 block decoder handles this kind
    pub fn is_lz4(self) -> bool {
        matches!(self, Self::Lz4 | Self::Lz4Hc)
    }

    /// Display name used in log output
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Lzma => "LZMA",
            Self::Lz4 => "LZ4",
            Self::Lz4Hc => "LZ4HC",
            Self::Unknown(4) => "LZHAM",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// UnityFS bundle header
///
/// Layout (little-endian):
/// - signature (8 bytes)
/// - format version (u32)
/// - engine version and engine revision (16 bytes each, NUL padded)
/// - total size (u64)
/// - compressed and uncompressed blocks-info sizes (u32 each)
/// - flags (u32)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BundleHeader {
    /// Raw signature bytes
    pub signature: [u8; 8],
    /// Container format version
    pub format_version: u32,
    /// Engine version, NUL padded
    pub engine_version: [u8; 16],
    /// Engine revision, NUL padded
    pub engine_revision: [u8; 16],
    /// Declared size of the whole bundle
    pub total_size: u64,
    /// Stored size of the blocks-info region
    pub compressed_blocks_info_size: u32,
    /// Size of the blocks-info region once decompressed
    pub uncompressed_blocks_info_size: u32,
    /// Flags word; the low six bits select the compression kind
    pub flags: u32,
}

impl BundleHeader {
    /// Parse the fixed-size header from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> DecodeResult<Self> {
        let head = bytes.get(..HEADER_LEN).ok_or(DecodeError::Truncated {
            what: "bundle header",
            needed: HEADER_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::read(&mut Cursor::new(head))?)
    }

    /// Signature with NUL padding removed
    pub fn signature_str(&self) -> String {
        text_field(&self.signature)
    }

    /// Engine version with NUL padding removed
    pub fn engine_version_str(&self) -> String {
        text_field(&self.engine_version)
    }

    /// Engine revision with NUL padding removed
    pub fn engine_revision_str(&self) -> String {
        text_field(&self.engine_revision)
    }

    /// Compression of the blocks-info region
    pub fn compression(&self) -> CompressionKind {
        CompressionKind::from_flags(self.flags)
    }

    /// Offset of the first data block
    pub fn data_offset(&self) -> DecodeResult<usize> {
        HEADER_LEN
            .checked_add(self.compressed_blocks_info_size as usize)
            .ok_or(DecodeError::SizeOverflow("data offset"))
    }
}

/// Copy a string into a NUL-padded fixed field, truncating if needed
pub fn padded_field<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let len = value.len().min(N);
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
    field
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

fn text_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace('\0', "")
}
