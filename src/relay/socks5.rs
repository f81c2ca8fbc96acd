//! SOCKS5 codec: the client-facing ingress protocol (RFC 1928 subset —
//! greeting, CONNECT command, and the reply frame).

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SOCKS5_VERSION: u8 = 0x05;

pub const AUTH_METHOD_NONE: u8 = 0x00;
pub const AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xff;

pub const CMD_CONNECT: u8 = 0x01;
pub const CMD_BIND: u8 = 0x02;
pub const CMD_UDP_ASSOCIATE: u8 = 0x03;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

pub const REP_SUCCESS: u8 = 0x00;
pub const REP_GENERAL_FAILURE: u8 = 0x01;
pub const REP_CONNECTION_REFUSED: u8 = 0x05;
pub const REP_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const REP_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// A CONNECT target as carried by ATYP 0x01/0x03/0x04.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Socket(SocketAddr),
    Domain(String, u16),
}

impl Address {
    /// The ASCII host string carried in the inner request frame: the IP's
    /// presentation form for ATYP 0x01/0x04, the literal domain for ATYP
    /// 0x03.
    pub fn host(&self) -> String {
        match self {
            Address::Socket(addr) => addr.ip().to_string(),
            Address::Domain(host, _) => host.clone(),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Address::Socket(addr) => addr.port(),
            Address::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Socket(addr) => write!(f, "{}", addr),
            Address::Domain(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}

/// Reads the greeting (`VER | NMETHODS | METHODS`) and reports whether
/// no-auth (0x00) was offered. A version other than 0x05 or a missing
/// no-auth method are both rejected with a SOCKS5 reply rather than an I/O
/// error, so a bad greeting is reported as `Ok(false)`; only a genuine read
/// failure is an `Err` here.
pub async fn read_greeting<R>(r: &mut R) -> io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; 2];
    r.read_exact(&mut head).await?;
    let (ver, nmethods) = (head[0], head[1]);

    let mut methods = vec![0u8; nmethods as usize];
    r.read_exact(&mut methods).await?;

    Ok(ver == SOCKS5_VERSION && methods.contains(&AUTH_METHOD_NONE))
}

/// Writes the greeting reply (`05 00` or `05 ff`).
pub async fn write_method_reply<W>(w: &mut W, accepted: bool) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let method = if accepted { AUTH_METHOD_NONE } else { AUTH_METHOD_NOT_ACCEPTABLE };
    w.write_all(&[SOCKS5_VERSION, method]).await
}

/// Outcome of parsing a SOCKS5 request: either a CONNECT target, or the
/// `rep` code to report back (unsupported CMD → 0x07, unknown ATYP → 0x08).
pub enum Request {
    Connect(Address),
    Unsupported(u8),
}

/// Reads `VER CMD RSV ATYP DST.ADDR DST.PORT`.
pub async fn read_request<R>(r: &mut R) -> io::Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; 4];
    r.read_exact(&mut head).await?;
    let (ver, cmd, _rsv, atyp) = (head[0], head[1], head[2], head[3]);

    if ver != SOCKS5_VERSION {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unsupported SOCKS version {:#x}", ver)));
    }

    let address = match atyp {
        ATYP_IPV4 => {
            let mut buf = [0u8; 6];
            r.read_exact(&mut buf).await?;
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            let port = u16::from_be_bytes([buf[4], buf[5]]);
            Address::Socket(SocketAddr::new(IpAddr::V4(ip), port))
        }
        ATYP_IPV6 => {
            let mut buf = [0u8; 18];
            r.read_exact(&mut buf).await?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[..16]);
            let ip = Ipv6Addr::from(octets);
            let port = u16::from_be_bytes([buf[16], buf[17]]);
            Address::Socket(SocketAddr::new(IpAddr::V6(ip), port))
        }
        ATYP_DOMAIN => {
            let mut len_buf = [0u8; 1];
            r.read_exact(&mut len_buf).await?;
            let mut domain_buf = vec![0u8; len_buf[0] as usize + 2];
            r.read_exact(&mut domain_buf).await?;
            let port_offset = domain_buf.len() - 2;
            let domain = String::from_utf8_lossy(&domain_buf[..port_offset]).into_owned();
            let port = u16::from_be_bytes([domain_buf[port_offset], domain_buf[port_offset + 1]]);
            Address::Domain(domain, port)
        }
        _ => return Ok(Request::Unsupported(REP_ADDRESS_TYPE_NOT_SUPPORTED)),
    };

    if cmd != CMD_CONNECT {
        let rep = match cmd {
            CMD_BIND | CMD_UDP_ASSOCIATE => REP_COMMAND_NOT_SUPPORTED,
            _ => REP_GENERAL_FAILURE,
        };
        return Ok(Request::Unsupported(rep));
    }

    Ok(Request::Connect(address))
}

/// Writes a SOCKS5 reply with the given `rep` code. The bound address
/// echoed back is a fixed `0.0.0.0:0` — no client in the wild inspects it
/// for a CONNECT reply.
pub async fn write_reply<W>(w: &mut W, rep: u8) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let reply = [SOCKS5_VERSION, rep, 0x00, ATYP_IPV4, 0, 0, 0, 0, 0, 0];
    w.write_all(&reply).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn greeting_accepts_no_auth() {
        let mut buf = Cursor::new(vec![0x05, 0x02, 0x00, 0x01]);
        assert!(read_greeting(&mut buf).await.unwrap());
    }

    #[tokio::test]
    async fn greeting_rejects_wrong_version() {
        let mut buf = Cursor::new(vec![0x04, 0x01, 0x00]);
        assert_eq!(read_greeting(&mut buf).await.unwrap(), false);
    }

    #[tokio::test]
    async fn request_parses_ipv4_connect() {
        let mut buf = Cursor::new(vec![0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50]);
        match read_request(&mut buf).await.unwrap() {
            Request::Connect(addr) => {
                assert_eq!(addr.host(), "1.2.3.4");
                assert_eq!(addr.port(), 80);
            }
            Request::Unsupported(_) => panic!("expected a CONNECT request"),
        }
    }

    #[tokio::test]
    async fn request_parses_domain_connect() {
        let mut payload = vec![0x05, 0x01, 0x00, 0x03, 11];
        payload.extend_from_slice(b"example.com");
        payload.extend_from_slice(&443u16.to_be_bytes());
        let mut buf = Cursor::new(payload);
        match read_request(&mut buf).await.unwrap() {
            Request::Connect(addr) => {
                assert_eq!(addr.host(), "example.com");
                assert_eq!(addr.port(), 443);
            }
            Request::Unsupported(_) => panic!("expected a CONNECT request"),
        }
    }

    #[tokio::test]
    async fn bind_is_unsupported() {
        let mut buf = Cursor::new(vec![0x05, 0x02, 0x00, 0x01, 1, 2, 3, 4, 0, 0]);
        match read_request(&mut buf).await.unwrap() {
            Request::Unsupported(rep) => assert_eq!(rep, REP_COMMAND_NOT_SUPPORTED),
            Request::Connect(_) => panic!("expected BIND to be unsupported"),
        }
    }

    #[tokio::test]
    async fn unknown_atyp_is_rejected() {
        let mut buf = Cursor::new(vec![0x05, 0x01, 0x00, 0x7f]);
        match read_request(&mut buf).await.unwrap() {
            Request::Unsupported(rep) => assert_eq!(rep, REP_ADDRESS_TYPE_NOT_SUPPORTED),
            Request::Connect(_) => panic!("expected unknown ATYP to be rejected"),
        }
    }
}
