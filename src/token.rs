use smallvec::SmallVec;

/// Token identifier - matches the C-style id type used by inference runtimes
pub type TokenId = i32;

/// Absolute index of a token within its sequence
///
/// Non-negative, strictly increasing per sequence across a generation
/// lifetime. Never reused except when a sequence is explicitly cleared.
pub type Pos = i32;

/// Identifier of one logical token stream sharing continuous cache state
pub type SeqId = i32;

/// Stack-allocated token buffer for small operations (up to 32 tokens on stack)
///
/// For operations with <= 32 tokens this avoids heap allocation entirely.
/// Larger operations transparently spill to heap with no API change.
pub type TokenBuffer = SmallVec<[TokenId; 32]>;

/// Capacity of a [`PieceBuffer`] in bytes
///
/// Sized well above the worst-case piece length of common vocabularies
/// (12-20 bytes) so truncation is effectively unreachable in practice.
pub const PIECE_CAPACITY: usize = 32;

/// Fixed-capacity output buffer for rendering one token's text fragment
///
/// A piece longer than [`PIECE_CAPACITY`] is truncated at a UTF-8 character
/// boundary and the `truncated` flag is set; the stream continues rather
/// than failing, since one malformed fragment should not abort otherwise
/// valid output. Acquire one per call site; the buffer never escapes the
/// emission step that filled it.
#[derive(Debug)]
pub struct PieceBuffer {
    bytes: [u8; PIECE_CAPACITY],
    len: usize,
    truncated: bool,
}

impl PieceBuffer {
    pub fn new() -> Self {
        Self {
            bytes: [0u8; PIECE_CAPACITY],
            len: 0,
            truncated: false,
        }
    }

    /// Fill the buffer with a piece, truncating at a character boundary if needed
    pub fn set(&mut self, piece: &[u8]) {
        if piece.len() <= PIECE_CAPACITY {
            self.bytes[..piece.len()].copy_from_slice(piece);
            self.len = piece.len();
            self.truncated = false;
        } else {
            let cut = floor_char_boundary(piece, PIECE_CAPACITY);
            self.bytes[..cut].copy_from_slice(&piece[..cut]);
            self.len = cut;
            self.truncated = true;
        }
    }

    /// View the piece as text
    ///
    /// If the runtime handed back bytes that are not valid UTF-8, only the
    /// leading valid portion is returned.
    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.bytes[..self.len]) {
            Ok(s) => s,
            Err(e) => {
                // valid_up_to is a char boundary by definition
                std::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or("")
            }
        }
    }

    /// Whether the last `set` had to drop trailing bytes
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for PieceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest index <= `index` that does not split a UTF-8 sequence in `bytes`
fn floor_char_boundary(bytes: &[u8], mut index: usize) -> usize {
    if index >= bytes.len() {
        return bytes.len();
    }
    while index > 0 && bytes[index] & 0xC0 == 0x80 {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_buffer_roundtrip() {
        let mut buf = PieceBuffer::new();
        buf.set(b"hello");
        assert_eq!(buf.as_str(), "hello");
        assert!(!buf.truncated());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_piece_buffer_reuse() {
        let mut buf = PieceBuffer::new();
        buf.set(b"first piece");
        buf.set(b"x");
        assert_eq!(buf.as_str(), "x");
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_piece_buffer_truncates_long_piece() {
        let mut buf = PieceBuffer::new();
        let long = [b'a'; 100];
        buf.set(&long);
        assert!(buf.truncated());
        assert_eq!(buf.len(), PIECE_CAPACITY);
        assert_eq!(buf.as_str(), "a".repeat(PIECE_CAPACITY));
    }

    #[test]
    fn test_piece_buffer_truncates_at_char_boundary() {
        // 30 ASCII bytes followed by a 3-byte character straddling the cap
        let mut piece = vec![b'a'; 30];
        piece.extend("\u{20AC}".as_bytes());
        let mut buf = PieceBuffer::new();
        buf.set(&piece);
        assert!(buf.truncated());
        assert_eq!(buf.len(), 30);
        assert_eq!(buf.as_str(), "a".repeat(30));
    }

    #[test]
    fn test_empty_piece() {
        let mut buf = PieceBuffer::new();
        buf.set(b"");
        assert!(buf.is_empty());
        assert_eq!(buf.as_str(), "");
    }
}
