//! Big-endian reader for persisted UI configuration.

use std::sync::Arc;

use euclid::default::Point2D;

use crate::path::{CurveType, PathPoint};
use crate::text::Color32;

/// String-table index meaning "no string".
const NULL_STRING: u16 = 65534;
/// String-table index meaning "empty string".
const EMPTY_STRING: u16 = 65533;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("unexpected end of buffer at {position}: needed {needed} bytes, length is {len}")]
    UnexpectedEof {
        position: usize,
        needed: usize,
        len: usize,
    },
    #[error("invalid utf-8 string at {position}")]
    InvalidUtf8 { position: usize },
    #[error("string index {index} out of range (table has {len} entries)")]
    StringIndex { index: u16, len: usize },
    #[error("buffer has no string table")]
    NoStringTable,
}

/// Sequential cursor over a shared byte slice.
///
/// Nested buffers returned by [`ByteBuffer::read_buffer`] share the same
/// bytes and string table, and carry their own position.
#[derive(Clone, Debug)]
pub struct ByteBuffer {
    data: Arc<[u8]>,
    offset: usize,
    len: usize,
    position: usize,
    string_table: Option<Arc<[String]>>,
    /// Format version of the stream, used by readers to skip newer fields.
    pub version: u32,
}

impl ByteBuffer {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let len = data.len();
        Self {
            data,
            offset: 0,
            len,
            position: 0,
            string_table: None,
            version: 0,
        }
    }

    pub fn with_string_table(mut self, table: impl Into<Arc<[String]>>) -> Self {
        self.string_table = Some(table.into());
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.len);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    pub fn skip(&mut self, count: usize) -> Result<(), BufferError> {
        self.bytes(count).map(|_| ())
    }

    fn bytes(&mut self, count: usize) -> Result<&[u8], BufferError> {
        if self.remaining() < count {
            return Err(BufferError::UnexpectedEof {
                position: self.position,
                needed: count,
                len: self.len,
            });
        }
        let start = self.offset + self.position;
        self.position += count;
        Ok(&self.data[start..start + count])
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8, BufferError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_byte()? == 1)
    }

    pub fn read_short(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_ushort(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_int(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_uint(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn read_float(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    pub fn read_long(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_double(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    /// Reads a UTF-16 code unit. Lone surrogates become U+FFFD.
    pub fn read_char(&mut self) -> Result<char, BufferError> {
        let unit = self.read_ushort()?;
        Ok(char::from_u32(unit as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Reads an inline string: `u16` byte length followed by UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, BufferError> {
        let len = self.read_ushort()? as usize;
        let position = self.position;
        let bytes = self.bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| BufferError::InvalidUtf8 { position })
    }

    /// Reads a string-table reference.
    pub fn read_s(&mut self) -> Result<Option<String>, BufferError> {
        let index = self.read_ushort()?;
        match index {
            NULL_STRING => Ok(None),
            EMPTY_STRING => Ok(Some(String::new())),
            _ => {
                let table = self.string_table.as_ref().ok_or(BufferError::NoStringTable)?;
                table
                    .get(index as usize)
                    .cloned()
                    .map(Some)
                    .ok_or(BufferError::StringIndex {
                        index,
                        len: table.len(),
                    })
            }
        }
    }

    pub fn read_s_array(&mut self, count: usize) -> Result<Vec<Option<String>>, BufferError> {
        (0..count).map(|_| self.read_s()).collect()
    }

    /// Reads four bytes in `r g b a` order.
    pub fn read_color(&mut self) -> Result<Color32, BufferError> {
        let [r, g, b, a] = self.take()?;
        Ok(Color32::rgba(r, g, b, a))
    }

    /// Reads an `i32` length and returns a cursor over that many bytes.
    pub fn read_buffer(&mut self) -> Result<ByteBuffer, BufferError> {
        let count = self.read_int()?.max(0) as usize;
        let start = self.position;
        self.bytes(count)?;
        Ok(ByteBuffer {
            data: Arc::clone(&self.data),
            offset: self.offset + start,
            len: count,
            position: 0,
            string_table: self.string_table.clone(),
            version: self.version,
        })
    }

    /// Jumps to block `block_index` of the index table at `index_table_pos`.
    ///
    /// The table starts with a segment count byte and a byte telling whether
    /// offsets are `i16` or `i32`; an offset of 0 marks an absent block.
    /// Returns `Ok(false)` and restores the position when the block does not
    /// exist.
    pub fn seek(&mut self, index_table_pos: usize, block_index: usize) -> Result<bool, BufferError> {
        let saved = self.position;
        self.set_position(index_table_pos);

        let found = self.read_block_offset(block_index);
        match found {
            Ok(Some(offset)) => {
                self.set_position(index_table_pos + offset);
                Ok(true)
            }
            Ok(None) => {
                self.position = saved;
                Ok(false)
            }
            Err(e) => {
                self.position = saved;
                Err(e)
            }
        }
    }

    fn read_block_offset(&mut self, block_index: usize) -> Result<Option<usize>, BufferError> {
        let segment_count = self.read_byte()? as usize;
        if block_index >= segment_count {
            return Ok(None);
        }

        let use_short = self.read_byte()? == 1;
        let offset = if use_short {
            self.skip(2 * block_index)?;
            self.read_short()? as i32
        } else {
            self.skip(4 * block_index)?;
            self.read_int()?
        };
        Ok((offset > 0).then_some(offset as usize))
    }

    /// Reads an `i32` point count followed by curve-typed points.
    pub fn read_path(&mut self) -> Result<Vec<PathPoint>, BufferError> {
        let count = self.read_int()?.max(0) as usize;
        let mut points = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let curve_type = CurveType::from_byte(self.read_byte()?);
            let pos = self.read_point()?;
            let point = match curve_type {
                CurveType::Bezier => PathPoint::bezier(pos, self.read_point()?),
                CurveType::CubicBezier => {
                    let control1 = self.read_point()?;
                    PathPoint::cubic_bezier(pos, control1, self.read_point()?)
                }
                _ => PathPoint::new(pos, curve_type),
            };
            points.push(point);
        }
        Ok(points)
    }

    fn read_point(&mut self) -> Result<Point2D<f32>, BufferError> {
        let x = self.read_float()?;
        Ok(Point2D::new(x, self.read_float()?))
    }
}
