//! Snapshot record encoding and decoding.
//!
//! ```text
//! [key_len: u32 LE][key bytes][value_len: u64 LE][value bytes]
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};

/// Width of the key length prefix.
pub const KEY_LEN_BYTES: usize = 4;

/// Width of the value length prefix.
pub const VALUE_LEN_BYTES: usize = 8;

/// Result of trying to read one record from a snapshot stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete record. The key has not been validated yet.
    Record { key: Vec<u8>, value: Vec<u8> },
    /// The stream ended exactly on a record boundary.
    End,
    /// The stream ended inside a record.
    Torn,
}

/// Writes one record and returns the number of bytes written.
///
/// # Errors
///
/// Returns `InvalidInput` if the key is longer than `u32::MAX` bytes, or any
/// error from the underlying writer.
pub fn write_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> io::Result<u64> {
    let key_len = u32::try_from(key.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "key too long"))?;
    w.write_u32::<LittleEndian>(key_len)?;
    w.write_all(key)?;
    w.write_u64::<LittleEndian>(value.len() as u64)?;
    w.write_all(value)?;
    Ok((KEY_LEN_BYTES + key.len() + VALUE_LEN_BYTES + value.len()) as u64)
}

/// Reads one record.
///
/// A stream that ends before the first byte of the key length is
/// [`ReadOutcome::End`]; one that ends anywhere later in the record is
/// [`ReadOutcome::Torn`]. Key and value bytes are read incrementally, so a
/// corrupt length larger than the remaining stream never triggers a large
/// allocation.
///
/// # Errors
///
/// Propagates I/O errors other than end of stream.
pub fn read_record<R: Read>(r: &mut R) -> io::Result<ReadOutcome> {
    let mut key_len = [0u8; KEY_LEN_BYTES];
    match fill(r, &mut key_len)? {
        0 => return Ok(ReadOutcome::End),
        KEY_LEN_BYTES => {}
        _ => return Ok(ReadOutcome::Torn),
    }
    let key_len = u64::from(LittleEndian::read_u32(&key_len));
    let Some(key) = read_exact_len(r, key_len)? else {
        return Ok(ReadOutcome::Torn);
    };

    let mut value_len = [0u8; VALUE_LEN_BYTES];
    if fill(r, &mut value_len)? != VALUE_LEN_BYTES {
        return Ok(ReadOutcome::Torn);
    }
    let value_len = LittleEndian::read_u64(&value_len);
    let Some(value) = read_exact_len(r, value_len)? else {
        return Ok(ReadOutcome::Torn);
    };

    Ok(ReadOutcome::Record { key, value })
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads exactly `len` bytes, or `None` if the stream ends first.
fn read_exact_len<R: Read>(r: &mut R, len: u64) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    (&mut *r).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 == len {
        Ok(Some(buf))
    } else {
        Ok(None)
    }
}
