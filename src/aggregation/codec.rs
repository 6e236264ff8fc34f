//! Binary layout of a serialized time aggregator
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (18 bytes)                       │
//! │   magic: [u8; 2] = "TA"                 │
//! │   kind: i64 (finest unit flag)          │
//! │   flags: i64 (every unit flag)          │
//! ├─────────────────────────────────────────┤
//! │ RECORDS (until end of buffer)           │
//! │   period: u64                           │
//! │   counters: [i64; size(kind)]           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Buffers written before the header existed
//! start directly with the first record; their units are recovered from the
//! flag suffix of that record's period.

use crate::aggregation::counter::Aggregator;
use crate::aggregation::error::{AggregationError, AggregationResult};
use crate::aggregation::period::Period;
use crate::aggregation::unit::{Unit, UnitSet};

/// Magic bytes for aggregator buffers
pub const SIGNATURE: [u8; 2] = *b"TA";

/// Header size in bytes, signature included
pub const HEADER_SIZE: usize = 18;

/// Size of the period key leading every record
pub const PERIOD_SIZE: usize = 8;

/// How a buffer was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Signature and header precede the records
    Header,
    /// Records only, units implied by the first period
    Legacy,
}

impl Encoding {
    /// Detect the encoding of a buffer
    ///
    /// A buffer without the signature is only accepted as legacy if it starts
    /// with a well-formed period key.
    pub fn detect(bytes: &[u8]) -> AggregationResult<Self> {
        if bytes.starts_with(&SIGNATURE) {
            return Ok(Encoding::Header);
        }

        if is_legacy(bytes) {
            return Ok(Encoding::Legacy);
        }

        Err(AggregationError::SignatureMismatch(
            bytes[..bytes.len().min(SIGNATURE.len())].to_vec(),
        ))
    }
}

/// Check whether `bytes` start with a well-formed period key
pub fn is_legacy(bytes: &[u8]) -> bool {
    let mut first = bytes;
    match read_period(&mut first) {
        Ok(Some(period)) => period.unpack().is_ok(),
        _ => false,
    }
}

/// Raw header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Flag of the finest unit
    pub kind: i64,
    /// Flags of every configured unit
    pub flags: i64,
}

impl Header {
    /// Create a header for the given units
    pub fn new(kind: Unit, flags: UnitSet) -> Self {
        Self {
            kind: i64::from(kind.flag()),
            flags: i64::from(flags.bits()),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&SIGNATURE);
        buf[2..10].copy_from_slice(&self.kind.to_le_bytes());
        buf[10..18].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Parse the header from the front of `input`, advancing past it
    pub fn read(input: &mut &[u8]) -> AggregationResult<Self> {
        if !input.starts_with(&SIGNATURE) {
            return Err(AggregationError::SignatureMismatch(
                input[..input.len().min(SIGNATURE.len())].to_vec(),
            ));
        }

        let buf = take(input, HEADER_SIZE)?;
        Ok(Self {
            kind: i64::from_le_bytes(word(&buf[2..10])),
            flags: i64::from_le_bytes(word(&buf[10..18])),
        })
    }

    /// Validated units of this header
    ///
    /// Returns `None` when the flags field is zero, which older writers left
    /// unset; the caller then recovers the units from the records.
    pub fn units(&self) -> AggregationResult<Option<(Unit, UnitSet)>> {
        if self.flags == 0 {
            return Ok(None);
        }

        let flags = u64::try_from(self.flags)
            .map_err(|_| AggregationError::UnknownUnit(self.flags))
            .and_then(UnitSet::from_bits)?;
        let kind = Unit::from_flag(self.kind)?;

        if flags.finest() != Some(kind) {
            return Err(AggregationError::HeaderMismatch { kind, flags });
        }

        Ok(Some((kind, flags)))
    }
}

/// Read the next period key, `None` at a clean end of buffer
pub fn read_period(input: &mut &[u8]) -> AggregationResult<Option<Period>> {
    if input.is_empty() {
        return Ok(None);
    }

    let bytes = take(input, PERIOD_SIZE)?;
    Ok(Some(Period::from_raw(u64::from_le_bytes(word(bytes)))))
}

/// Append one record to `buf`
pub fn write_record(buf: &mut Vec<u8>, period: Period, aggregator: &Aggregator) {
    buf.extend_from_slice(&period.raw().to_le_bytes());
    aggregator.write_to(buf);
}

/// Split `len` bytes off the front of `input`
pub(crate) fn take<'a>(input: &mut &'a [u8], len: usize) -> AggregationResult<&'a [u8]> {
    if input.len() < len {
        return Err(AggregationError::TruncatedStream {
            needed: len,
            available: input.len(),
        });
    }

    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

fn word(bytes: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    buf
}
