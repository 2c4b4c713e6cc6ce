//! Message buffer used by generated marshal and unmarshal code
//!
//! Offsets are byte offsets from the start of the message. Words are stored
//! little-endian with the backend's word width. Variable-length sequences
//! are appended at a cursor that generated code threads through as a plain
//! `usize`.

use crate::error::{Result, RtError};

/// How the element count of a variable-length sequence travels
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LengthEncoding {
    /// One length word precedes the elements
    Prefixed,
    /// No length word; the count follows from the message size, so only the
    /// last sequence of a message may use it
    Implicit,
}

/// Round `n` up to a multiple of `word`
pub const fn round_up(n: usize, word: usize) -> usize {
    if word == 0 {
        return n;
    }
    n.div_ceil(word) * word
}

/// Fixed-capacity message buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBuffer {
    bytes: Vec<u8>,
    word: usize,
    len: usize,
}

impl MessageBuffer {
    /// Create a zeroed buffer
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum message size in bytes
    /// * `word_bytes` - Backend word width (4 or 8)
    pub fn new(capacity: usize, word_bytes: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            word: word_bytes,
            len: 0,
        }
    }

    /// Maximum message size
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Word width in bytes
    pub fn word_bytes(&self) -> usize {
        self.word
    }

    /// Current message size (highest byte written or received)
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written or received
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The message bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Mutable access to the whole capacity, for receive primitives
    pub fn receive_area(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Record how many bytes a receive primitive delivered
    pub fn set_received_len(&mut self, len: usize) -> Result<()> {
        if len > self.bytes.len() {
            return Err(RtError::MessageTooLarge {
                size: len,
                max: self.bytes.len(),
            });
        }
        self.len = len;
        Ok(())
    }

    /// Zero the first `extent` bytes, or the whole buffer when `None`, and
    /// reset the message size
    pub fn clear(&mut self, extent: Option<usize>) {
        let end = extent.unwrap_or(self.bytes.len()).min(self.bytes.len());
        self.bytes[..end].fill(0);
        self.len = 0;
    }

    /// Write one word at `offset`
    pub fn put_word(&mut self, offset: usize, value: u64) -> Result<()> {
        let le = value.to_le_bytes();
        let width = self.word.min(le.len());
        self.put_bytes(offset, &le[..width])?;
        Ok(())
    }

    /// Read one word at `offset`
    pub fn get_word(&self, offset: usize) -> Result<u64> {
        let width = self.word.min(8);
        let raw = self.get_bytes(offset, width)?;
        let mut le = [0u8; 8];
        le[..width].copy_from_slice(raw);
        Ok(u64::from_le_bytes(le))
    }

    /// Copy `data` to `offset`, returning the end offset
    pub fn put_bytes(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or(RtError::MessageTooLarge {
                size: offset.saturating_add(data.len()),
                max: self.bytes.len(),
            })?;
        self.bytes[offset..end].copy_from_slice(data);
        self.len = self.len.max(end);
        Ok(end)
    }

    /// Borrow `len` bytes at `offset`
    pub fn get_bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len)
            .ok_or(RtError::OutOfBounds {
                offset: offset.saturating_add(len),
                len: self.len,
            })?;
        Ok(&self.bytes[offset..end])
    }

    /// Offset just past a length word at `cursor`
    fn after_word(&self, cursor: usize) -> Result<usize> {
        cursor.checked_add(self.word).ok_or(RtError::OutOfBounds {
            offset: usize::MAX,
            len: self.len,
        })
    }

    /// Append a sequence at `cursor` and return the cursor after it.
    ///
    /// Prefixed sequences are padded to the word width; an implicit sequence
    /// ends the message and is not padded.
    pub fn put_sequence(
        &mut self,
        cursor: usize,
        data: &[u8],
        element_bytes: usize,
        encoding: LengthEncoding,
    ) -> Result<usize> {
        if element_bytes == 0 || data.len() % element_bytes != 0 {
            return Err(RtError::InvalidMessage(format!(
                "{} bytes is not a whole number of {}-byte elements",
                data.len(),
                element_bytes
            )));
        }
        match encoding {
            LengthEncoding::Prefixed => {
                self.put_word(cursor, (data.len() / element_bytes) as u64)?;
                let end = self.put_bytes(self.after_word(cursor)?, data)?;
                let next = round_up(end, self.word);
                if next > self.bytes.len() {
                    return Err(RtError::MessageTooLarge {
                        size: next,
                        max: self.bytes.len(),
                    });
                }
                self.len = self.len.max(next);
                Ok(next)
            }
            LengthEncoding::Implicit => self.put_bytes(cursor, data),
        }
    }

    /// Read a sequence at `cursor`, returning its bytes and the cursor after
    /// it
    pub fn get_sequence(
        &self,
        cursor: usize,
        element_bytes: usize,
        encoding: LengthEncoding,
    ) -> Result<(&[u8], usize)> {
        if element_bytes == 0 {
            return Err(RtError::InvalidMessage("zero-sized sequence element".to_string()));
        }
        match encoding {
            LengthEncoding::Prefixed => {
                // The count comes off the wire and bounds nothing yet
                let count = self.get_word(cursor)?;
                let start = self.after_word(cursor)?;
                let bytes = usize::try_from(count)
                    .ok()
                    .and_then(|count| count.checked_mul(element_bytes))
                    .ok_or(RtError::OutOfBounds {
                        offset: usize::MAX,
                        len: self.len,
                    })?;
                let data = self.get_bytes(start, bytes)?;
                let next = round_up(start + data.len(), self.word);
                Ok((data, next))
            }
            LengthEncoding::Implicit => {
                let available = self.len.checked_sub(cursor).ok_or(RtError::OutOfBounds {
                    offset: cursor,
                    len: self.len,
                })?;
                if available % element_bytes != 0 {
                    return Err(RtError::InvalidMessage(format!(
                        "{} trailing bytes is not a whole number of {}-byte elements",
                        available, element_bytes
                    )));
                }
                Ok((&self.bytes[cursor..self.len], self.len))
            }
        }
    }
}
