//! Advertisement wire format.
//!
//! One route per line, fields separated by a single space:
//!
//! ```text
//! <destination-name> <via-ip> <cost>\n
//! ```
//!
//! A payload is the concatenation of such lines and travels as one datagram.
//! There is no framing, checksum or version field. Decoding is best effort:
//! lines that do not parse are skipped and the rest of the batch is kept.

use std::fmt::Write as _;
use std::net::IpAddr;

use thiserror::Error;

use crate::routing::table::{RouteRecord, RouteTable};

/// Why a single advertisement line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid via address {0:?}")]
    Via(String),
    #[error("invalid cost {0:?}")]
    Cost(String),
    #[error("line is not valid UTF-8")]
    Utf8,
}

/// Encode a table as an advertisement, announcing every route as reachable via `via`.
pub fn encode(table: &RouteTable, via: IpAddr) -> Vec<u8> {
    let mut payload = String::new();
    for (name, entry) in table.iter() {
        // Writing to a String cannot fail.
        let _ = writeln!(payload, "{} {} {}", name, via, entry.cost);
    }
    payload.into_bytes()
}

/// Parse a single line into a record.
pub fn parse_line(line: &str) -> Result<RouteRecord, LineError> {
    let fields: Vec<&str> = line.split(' ').collect();
    let [name, via, cost] = fields.as_slice() else {
        return Err(LineError::FieldCount(fields.len()));
    };
    if name.is_empty() {
        return Err(LineError::FieldCount(fields.len() - 1));
    }

    let via: IpAddr = via.parse().map_err(|_| LineError::Via(via.to_string()))?;
    let cost: u32 = cost.parse().map_err(|_| LineError::Cost(cost.to_string()))?;

    Ok(RouteRecord::new(*name, via, cost))
}

/// Decode a payload, returning the valid records and the rejected lines.
pub fn decode(payload: &[u8]) -> (Vec<RouteRecord>, Vec<(usize, LineError)>) {
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (index, raw) in payload.split(|b| *b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            continue;
        }
        let parsed = std::str::from_utf8(raw)
            .map_err(|_| LineError::Utf8)
            .and_then(parse_line);
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => rejected.push((index + 1, e)),
        }
    }

    (records, rejected)
}
