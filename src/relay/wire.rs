//! The inner handshake wire format: a fixed 512-byte request frame and a
//! fixed 4-byte reply frame.
//!
//! ```text
//! offset  size  field
//! 0       4     MAGIC     0x526f6e61, network byte order
//! 4       257   HOST      NUL-terminated ASCII host
//! 261     15    PORT      NUL-terminated ASCII decimal port
//! 276     236   IV        uniform random bytes, sent in the clear
//! ```
//! The first 276 bytes (MAGIC + HOST + PORT) are encrypted; the trailing IV
//! is not.

use std::io;

pub const MAGIC: u32 = 0x526f_6e61;

pub const HOST_FIELD_LEN: usize = 257;
pub const PORT_FIELD_LEN: usize = 15;
pub const HEADER_LEN: usize = 4 + HOST_FIELD_LEN + PORT_FIELD_LEN; // 276
pub const IV_LEN: usize = 236;
pub const REQUEST_LEN: usize = HEADER_LEN + IV_LEN; // 512
pub const REPLY_LEN: usize = 4;

/// Builds the plaintext 276-byte header (MAGIC + HOST + PORT) that gets
/// encrypted before being sent as the first part of the 512-byte request.
///
/// A host of exactly 256 bytes is accepted verbatim; longer hosts are
/// truncated to 256 bytes (the field holds 257 bytes so there is always
/// room for the NUL terminator).
pub fn encode_header(host: &str, port: u16) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0..4].copy_from_slice(&MAGIC.to_be_bytes());

    let host_bytes = host.as_bytes();
    let host_region = &mut buf[4..4 + HOST_FIELD_LEN];
    let copy_len = host_bytes.len().min(HOST_FIELD_LEN - 1);
    host_region[..copy_len].copy_from_slice(&host_bytes[..copy_len]);

    let port_str = port.to_string();
    let port_bytes = port_str.as_bytes();
    let port_region = &mut buf[4 + HOST_FIELD_LEN..HEADER_LEN];
    let copy_len = port_bytes.len().min(PORT_FIELD_LEN - 1);
    port_region[..copy_len].copy_from_slice(&port_bytes[..copy_len]);

    buf
}

/// Parses a decrypted 276-byte header, verifying the magic and extracting
/// the NUL-terminated host and port strings.
pub fn decode_header(buf: &[u8; HEADER_LEN]) -> io::Result<(String, u16)> {
    let magic = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "magic mismatch in inner request"));
    }

    let host_region = &buf[4..4 + HOST_FIELD_LEN];
    let host_end = host_region.iter().position(|&b| b == 0).unwrap_or(HOST_FIELD_LEN);
    let host = String::from_utf8_lossy(&host_region[..host_end]).into_owned();

    let port_region = &buf[4 + HOST_FIELD_LEN..HEADER_LEN];
    let port_end = port_region.iter().position(|&b| b == 0).unwrap_or(PORT_FIELD_LEN);
    let port_str = std::str::from_utf8(&port_region[..port_end])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-ASCII port in inner request"))?;
    let port: u16 = port_str
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid port in inner request"))?;

    Ok((host, port))
}

/// The encrypted-MAGIC success reply.
pub fn success_reply() -> [u8; REPLY_LEN] {
    MAGIC.to_be_bytes()
}

/// The all-zero failure reply.
pub fn failure_reply() -> [u8; REPLY_LEN] {
    [0u8; REPLY_LEN]
}

pub fn reply_is_success(buf: &[u8; REPLY_LEN]) -> bool {
    u32::from_be_bytes(*buf) == MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_short_host() {
        let header = encode_header("example.com", 443);
        let (host, port) = decode_header(&header).unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 443);
    }

    #[test]
    fn host_of_256_bytes_is_preserved() {
        let host = "a".repeat(256);
        let header = encode_header(&host, 80);
        let (decoded, _) = decode_header(&header).unwrap();
        assert_eq!(decoded, host);
    }

    #[test]
    fn host_of_257_bytes_is_truncated_to_256() {
        let host = "b".repeat(257);
        let header = encode_header(&host, 80);
        let (decoded, _) = decode_header(&header).unwrap();
        assert_eq!(decoded.len(), 256);
        assert_eq!(decoded, "b".repeat(256));
    }

    #[test]
    fn magic_mismatch_is_rejected() {
        let mut header = encode_header("host", 1);
        header[0] ^= 0xff;
        assert!(decode_header(&header).is_err());
    }

    #[test]
    fn success_and_failure_replies_are_distinguishable() {
        assert!(reply_is_success(&success_reply()));
        assert!(!reply_is_success(&failure_reply()));
    }
}
