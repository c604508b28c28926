//! Selects how an encrypted-looking text asset is decoded

/// Length of the signature block that prefixes encrypted text assets
pub const RSA_HEADER_LEN: usize = 128;

/// Decoding mode for a text asset, chosen from its destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Stage data: the signature block is dropped, the body is stored in clear
    LevelData,
    /// Everything else: AES-128-CBC after the signature block
    StandardText,
}

impl TextKind {
    /// Whether this kind needs the block cipher
    pub const fn is_encrypted(self) -> bool {
        matches!(self, Self::StandardText)
    }
}

/// Classify a text asset by the path it is stored under.
///
/// Level data lives under `gamedata/levels`, except the enemy database which shares
/// that prefix but is encrypted like any other table.
pub fn classify(path: &str) -> TextKind {
    let lower = path.to_lowercase();
    let in_levels = lower.contains("gamedata/levels") || lower.contains("gamedata\\levels");
    if in_levels && !lower.contains("enemydata") {
        TextKind::LevelData
    } else {
        TextKind::StandardText
    }
}

/// True when a text payload should go through [`classify`] and decoding.
///
/// Plain JSON and XML start with `{` or `<`; short buffers cannot carry the signature block.
pub fn looks_encrypted(data: &[u8]) -> bool {
    data.len() > RSA_HEADER_LEN && !matches!(data.first(), Some(b'{' | b'<'))
}
