/// Errors raised while decoding or building binary metadata.
///
/// Every variant carries enough context to locate the problem in the
/// byte stream: offsets are measured from the start of the structure
/// being decoded.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Input ended before a complete structure could be read.
    #[error("unexpected end of input at offset {offset}: need {needed} bytes, have {available}")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// An enum byte outside its defined range.
    #[error("invalid {enum_name} value: {value:#04X}")]
    InvalidEnumValue { enum_name: &'static str, value: u8 },

    /// A file name that does not start with 32 hex characters.
    #[error("cannot derive a content id from {name:?}")]
    InvalidContentId { name: String },

    /// More content entries than the 16-bit count field can hold once the
    /// meta blob's own entry is added.
    #[error("{count} content entries do not fit the 16-bit content count")]
    TooManyContents { count: usize },

    /// A content size that does not fit the 40-bit wire field.
    #[error("content size {size} exceeds the 40-bit limit")]
    ContentTooLarge { size: u64 },
}
