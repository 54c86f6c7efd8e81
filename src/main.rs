// This is the receiving half of a TFTP server (RFC 1350). It accepts files uploaded with a write
// request and prints each completed file to stdout. Read requests are refused.
//
// TFTP header is a 2-byte opcode field.
//
// opcode   operation
// 1        Read req (RRQ)
// 2        Write req (WRQ)
// 3        Data (DATA)
// 4        ACK
// 5        ERROR
//
// WRQ packet format:
// 0x02 | Filename | 0x00 | Mode | 0x00
//
// DATA packet:
// 0x03 | Block # (2 bytes) | Data (0-512 bytes)
//
// A DATA packet with fewer than 512 bytes of data ends the transfer. A file whose length is an
// exact multiple of 512 therefore ends with an empty DATA packet.
//
// ACK packet format:
// 0x04 | Block # (2 bytes)
//
// A WRQ is acked with block 0, every DATA packet with its own block number.
//
// ERROR packet format:
// 0x05 | ErrorCode (2 bytes) | ErrMsg | 0x00
//
// This server only ever sends error code 0 (not defined, see message).
//
// Only one transfer is tracked at a time. There are no timeouts or retransmissions on the server
// side; a peer that loses an ack is expected to resend its packet.

pub mod assembly;
pub mod processor;
pub mod responder;
pub mod server;
pub mod session;
pub mod tftp;

use server::{Server, ServerConfig, StdoutSink};
use tftp::TftpSocket;

use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::default();
    let socket = TftpSocket::bind(config.bind_addr)
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    log::info!("Listening on {}", socket.local_addr()?);

    let mut server = Server::new(socket, StdoutSink);
    server.run().await.context("Error reading from network")?;

    Ok(())
}
