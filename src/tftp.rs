use async_io::Async;
use std::error;
use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Largest payload a Data packet is expected to carry. Anything shorter ends a transfer.
pub const DATA_BUFFER_SIZE: usize = 512;

/// Size of the receive buffer. Large enough for any UDP datagram so data is never truncated.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

///////////////////////////////////////////////////////////////
// Error-handling objects

/// Represents an error returned from the TFTP Socket handler
#[derive(Debug)]
pub enum SocketError {
    IO(io::Error),
    PacketParse(String),
}

impl error::Error for SocketError {}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SocketError::IO(e) => write!(f, "Socket IO error: {:#?}", e),
            SocketError::PacketParse(e) => write!(f, "Packet parsing error: {:#?}", e),
        }
    }
}

impl From<io::Error> for SocketError {
    fn from(e: io::Error) -> Self {
        SocketError::IO(e)
    }
}

pub type TftpResult<T> = Result<T, SocketError>;

/// Represents the transfer mode announced by a request. Unknown modes are kept verbatim since the
/// mode never affects how data is stored.
#[derive(Debug, PartialEq)]
pub enum FileMode { NetAscii, Octet, Mail, Other(String) }

impl From<&str> for FileMode {
    fn from(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "netascii" => FileMode::NetAscii,
            "octet" => FileMode::Octet,
            "mail" => FileMode::Mail,
            _ => FileMode::Other(raw.to_string()),
        }
    }
}

/// Represents a TFTP Error code surfaced by a TFTP Error packet
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ErrorCode {
    Undefined,
    FileNotFound,
    AccessViolation,
    DiskFull,
    Illegal,
    UnknownTid,
    FileAlreadyExists,
    NoSuchUser,
}

impl From<u16> for ErrorCode {
    fn from(raw: u16) -> Self {
        match raw {
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::Illegal,
            5 => ErrorCode::UnknownTid,
            6 => ErrorCode::FileAlreadyExists,
            7 => ErrorCode::NoSuchUser,
            _ => ErrorCode::Undefined,
        }
    }
}

/// An enum representing a TFTP packet and its associated data.
#[derive(Debug, PartialEq)]
pub enum Packet {
    /// A read request packet
    ReadReq {
        /// The file path the client wants to read.
        path: String,

        /// The file mode.
        mode: FileMode,
    },

    /// A write request packet
    WriteReq {
        path: String,
        mode: FileMode,
    },

    /// A data packet
    Data {
        /// The block number for this data packet.
        block: u16,

        /// The contents of the data itself. May be longer than a block; the length is not checked.
        data: Vec<u8>,
    },

    /// An acknowledgment packet
    Ack {
        /// The block being acknowledged.
        block: u16,
    },

    /// An error packet.
    Error {
        code: ErrorCode,
        message: String,
    },

    /// A packet carrying an opcode outside of RFC 1350.
    Unrecognized {
        opcode: u16,
    },
}

/// TFTP opcodes, as carried in the first two bytes of every packet.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum OpCode { Rrq, Wrq, Data, Ack, Error, Unknown(u16) }

impl From<u16> for OpCode {
    fn from(raw: u16) -> Self {
        match raw {
            1 => OpCode::Rrq,
            2 => OpCode::Wrq,
            3 => OpCode::Data,
            4 => OpCode::Ack,
            5 => OpCode::Error,
            other => OpCode::Unknown(other),
        }
    }
}

impl From<OpCode> for u16 {
    fn from(op: OpCode) -> u16 {
        match op {
            OpCode::Rrq => 1,
            OpCode::Wrq => 2,
            OpCode::Data => 3,
            OpCode::Ack => 4,
            OpCode::Error => 5,
            OpCode::Unknown(raw) => raw,
        }
    }
}

fn u16_from_buffer(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

/// Given a buffer, assumes the string begins at the beginning of the buffer and runs until the
/// first 0 byte.
///
/// Returns the string extracted from the buffer as well as the position of the 0 byte in the
/// buffer it was given (or the size of the buffer, if no 0 byte was encountered)
fn string_from_buffer(buf: &[u8]) -> (String, usize) {
    let end = buf.iter().position(|&c| c == 0x00).unwrap_or(buf.len());
    (String::from_utf8_lossy(&buf[..end]).into_owned(), end)
}

/// Splits a request body into its path and mode strings. Returns `None` for the mode when the path
/// is not NUL-terminated. Anything after the mode's terminator is ignored.
fn split_path_and_mode(buf: &[u8]) -> (String, Option<String>) {
    let (path, path_end) = string_from_buffer(buf);
    if path_end == buf.len() {
        return (path, None);
    }

    let (mode, _) = string_from_buffer(&buf[path_end + 1..]);
    (path, Some(mode))
}

fn parse_read_req(buf: &[u8]) -> TftpResult<Packet> {
    // Read requests are always answered with an error, so a missing mode doesn't matter.
    let (path, mode) = split_path_and_mode(&buf[2..]);
    let mode = FileMode::from(mode.unwrap_or_default().as_str());
    Ok(Packet::ReadReq { path, mode })
}

fn parse_write_req(buf: &[u8]) -> TftpResult<Packet> {
    match split_path_and_mode(&buf[2..]) {
        (path, Some(mode)) => Ok(Packet::WriteReq { path, mode: FileMode::from(mode.as_str()) }),
        (_, None) => Err(SocketError::PacketParse(
            "Write request path must be terminated with a null byte!".to_string())),
    }
}

fn ensure_header(buf: &[u8], op: OpCode) -> TftpResult<()> {
    if buf.len() < 4 {
        return Err(SocketError::PacketParse(format!(
            "{:?} packet too short: {} bytes", op, buf.len())));
    }
    Ok(())
}

fn parse_data(buf: &[u8]) -> TftpResult<Packet> {
    ensure_header(buf, OpCode::Data)?;
    let block = u16_from_buffer(&buf[2..4]);
    Ok(Packet::Data { block, data: Vec::from(&buf[4..]) })
}

fn parse_ack(buf: &[u8]) -> TftpResult<Packet> {
    ensure_header(buf, OpCode::Ack)?;
    let block = u16_from_buffer(&buf[2..4]);
    Ok(Packet::Ack { block })
}

fn parse_error(buf: &[u8]) -> TftpResult<Packet> {
    ensure_header(buf, OpCode::Error)?;
    let code = ErrorCode::from(u16_from_buffer(&buf[2..4]));
    let (message, _) = string_from_buffer(&buf[4..]);
    Ok(Packet::Error { code, message })
}

impl Packet {
    /// Decodes a raw datagram. Unknown opcodes decode to `Packet::Unrecognized` rather than failing.
    pub fn parse_from_buf(buf: &[u8]) -> TftpResult<Packet> {
        if buf.len() < 2 {
            return Err(SocketError::PacketParse("Packet too short to hold an opcode!".to_string()));
        }

        match OpCode::from(u16_from_buffer(&buf[..2])) {
            OpCode::Rrq => parse_read_req(buf),
            OpCode::Wrq => parse_write_req(buf),
            OpCode::Data => parse_data(buf),
            OpCode::Ack => parse_ack(buf),
            OpCode::Error => parse_error(buf),
            OpCode::Unknown(opcode) => Ok(Packet::Unrecognized { opcode }),
        }
    }
}

/// Builds an Ack packet: opcode 4 followed by the block number.
pub fn encode_ack(block: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    buf.extend_from_slice(&u16::from(OpCode::Ack).to_be_bytes());
    buf.extend_from_slice(&block.to_be_bytes());
    buf
}

/// Builds an Error packet with error code 0 ("not defined, see message") and a NUL-terminated
/// message.
pub fn encode_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 5);
    buf.extend_from_slice(&u16::from(OpCode::Error).to_be_bytes());
    buf.extend_from_slice(&0_u16.to_be_bytes());
    buf.extend_from_slice(message.as_bytes());
    buf.push(0x00);
    buf
}

///////////////////////////////////////////////////////////////
/// The datagram transport the server runs on top of.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Waits, without a deadline, for the next datagram.
    async fn recv_from(&mut self) -> TftpResult<(Vec<u8>, SocketAddr)>;

    /// Sends a single datagram to `dst`.
    async fn send_to(&mut self, buf: &[u8], dst: SocketAddr) -> TftpResult<()>;
}

/// Wrapper around a UDP socket that hands raw datagrams to the server.
pub struct TftpSocket {
    sock: Async<UdpSocket>,
}

impl TftpSocket {
    pub fn bind(addr: SocketAddr) -> TftpResult<TftpSocket> {
        Ok(TftpSocket {
            sock: Async::<UdpSocket>::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> TftpResult<SocketAddr> {
        Ok(self.sock.get_ref().local_addr()?)
    }
}

impl Transport for TftpSocket {
    async fn recv_from(&mut self) -> TftpResult<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let (total_written, src) = self.sock.recv_from(&mut buf).await?;
        buf.truncate(total_written);
        Ok((buf, src))
    }

    async fn send_to(&mut self, buf: &[u8], dst: SocketAddr) -> TftpResult<()> {
        let sent = self.sock.send_to(buf, dst).await?;
        if sent != buf.len() {
            return Err(SocketError::IO(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("Only sent {sent} of {} bytes", buf.len()),
            )));
        }
        Ok(())
    }
}
