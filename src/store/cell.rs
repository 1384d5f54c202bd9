//! Fixed-size cell slots and their self-describing payloads.

use crate::errors::Error;
use crate::store::codec;
use crate::store::values::Tuple;
use crate::store::PageNo;

/// Bytes of every slot spent on the overflow pointer and the payload length.
pub const CELL_HEADER_SIZE: usize = 4 + 4;

const TAG_KEY: u64 = 1;
const TAG_VALUE: u64 = 2;
const TAG_RIGHT: u64 = 3;

/// The record inside a cell. A leaf carries `key` and `value`; a branch
/// carries `key` and `right`. Absent fields stay at their empty/zero state
/// and are omitted from the encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub key: Tuple,
    pub value: Tuple,
    pub right: PageNo,
}

impl Payload {
    /// Encodes the record as a map keyed by field tag, present fields only.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = 0;
        if !self.key.is_empty() {
            fields += 1;
        }
        if !self.value.is_empty() {
            fields += 1;
        }
        if self.right != 0 {
            fields += 1;
        }

        let mut out = Vec::new();
        codec::write_head(&mut out, codec::MAJOR_MAP, fields);
        if !self.key.is_empty() {
            codec::write_head(&mut out, codec::MAJOR_UINT, TAG_KEY);
            codec::write_array(&mut out, &self.key);
        }
        if !self.value.is_empty() {
            codec::write_head(&mut out, codec::MAJOR_UINT, TAG_VALUE);
            codec::write_array(&mut out, &self.value);
        }
        if self.right != 0 {
            codec::write_head(&mut out, codec::MAJOR_UINT, TAG_RIGHT);
            codec::write_head(&mut out, codec::MAJOR_UINT, self.right as u64);
        }
        out
    }

    pub fn decode(mut input: &[u8]) -> Result<Payload, Error> {
        let input = &mut input;
        let (major, fields) = codec::read_head(input)?;
        if major != codec::MAJOR_MAP {
            return Err(err!(CorruptPage, "payload is not a record, major type {}", major));
        }
        let mut payload = Payload::default();
        for _ in 0..fields {
            match codec::read_uint(input)? {
                TAG_KEY => payload.key = codec::read_array(input)?,
                TAG_VALUE => payload.value = codec::read_array(input)?,
                TAG_RIGHT => {
                    let right = codec::read_uint(input)?;
                    payload.right = u32::try_from(right)
                        .map_err(|_| err!(CorruptPage, "right child {} out of range", right))?;
                }
                tag => return Err(err!(CorruptPage, "unknown payload field tag {}", tag)),
            }
        }
        Ok(payload)
    }
}

/// One fixed-size slot in a page. `overflow` points at a continuation page
/// for payloads that outgrow the slot; nothing writes it yet, so it is
/// always zero on our own files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub overflow: PageNo,
    pub payload: Payload,
}

impl Cell {
    pub fn leaf(key: Tuple, value: Tuple) -> Cell {
        Cell {
            overflow: 0,
            payload: Payload {
                key,
                value,
                right: 0,
            },
        }
    }

    pub fn branch(key: Tuple, right: PageNo) -> Cell {
        Cell {
            overflow: 0,
            payload: Payload {
                key,
                value: Vec::new(),
                right,
            },
        }
    }

    pub fn key(&self) -> &Tuple {
        &self.payload.key
    }

    pub fn value(&self) -> &Tuple {
        &self.payload.value
    }

    /// Appends exactly `cell_size` bytes: overflow pointer, payload length,
    /// payload, zero padding.
    pub fn write_to(&self, out: &mut Vec<u8>, cell_size: usize) -> Result<(), Error> {
        let payload = self.payload.encode();
        if CELL_HEADER_SIZE + payload.len() > cell_size {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: cell_size - CELL_HEADER_SIZE,
            });
        }
        out.extend_from_slice(&self.overflow.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        out.resize(out.len() + cell_size - CELL_HEADER_SIZE - payload.len(), 0);
        Ok(())
    }

    /// Decodes one slot from exactly `cell_size` bytes.
    pub fn read_from(buf: &[u8], cell_size: usize) -> Result<Cell, Error> {
        debug_assert_eq!(buf.len(), cell_size);
        let overflow = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let size = u32::from_be_bytes(buf[4..8].try_into().unwrap()) as usize;
        if CELL_HEADER_SIZE + size > cell_size {
            return Err(err!(
                CorruptPage,
                "payload length {} exceeds the cell slot of {} bytes",
                size,
                cell_size
            ));
        }
        let payload = Payload::decode(&buf[CELL_HEADER_SIZE..CELL_HEADER_SIZE + size])?;
        Ok(Cell { overflow, payload })
    }
}
