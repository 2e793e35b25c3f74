//! Request head reading and `Host` extraction.
//!
//! The proxy never interprets the request beyond its `Host` header. Bytes
//! are read until the blank line ending the head and forwarded verbatim.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::proxy::SessionError;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 8192;

/// Destination named by a `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub name: String,
    pub port: Option<u16>,
}

/// Read from `reader` until the end of the request head.
///
/// Returns everything read so far, which may include the start of a body.
pub async fn read_head<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Err(SessionError::Incomplete(head.len()));
        }

        // Only rescan the tail where a terminator could straddle two reads.
        let scan_from = head.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        head.extend_from_slice(&chunk[..read]);

        if let Some(pos) = find_terminator(&head[scan_from..]) {
            let head_len = scan_from + pos + HEAD_TERMINATOR.len();
            if head_len > max_bytes {
                return Err(SessionError::HeadTooLarge(max_bytes));
            }
            return Ok(head);
        }
        if head.len() > max_bytes {
            return Err(SessionError::HeadTooLarge(max_bytes));
        }
    }
}

fn find_terminator(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
}

/// Extract the `Host` header from a request head.
pub fn host_target(head: &[u8]) -> Option<HostTarget> {
    let end = find_terminator(head).unwrap_or(head.len());
    let head = String::from_utf8_lossy(&head[..end]);

    head.split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("host"))
        .and_then(|(_, value)| parse_host_value(value.trim()))
}

fn parse_host_value(value: &str) -> Option<HostTarget> {
    if value.is_empty() {
        return None;
    }

    // Bracketed IPv6 literal, optionally with a port.
    if let Some(rest) = value.strip_prefix('[') {
        let (name, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(port.parse().ok()?),
            None if after.is_empty() => None,
            None => return None,
        };
        return Some(HostTarget {
            name: name.to_string(),
            port,
        });
    }

    match value.split_once(':') {
        Some((name, port)) if !name.is_empty() => Some(HostTarget {
            name: name.to_string(),
            port: Some(port.parse().ok()?),
        }),
        Some(_) => None,
        None => Some(HostTarget {
            name: value.to_string(),
            port: None,
        }),
    }
}
