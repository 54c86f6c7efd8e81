// This module contains the receive loop.
//
// The server reads one datagram at a time, decodes it, lets the packet processor update the
// session, and sends whatever reply the processor asks for before reading the next datagram.
// When a transfer finishes, its blocks are reassembled and handed to an output sink.
//
// Nothing in here ends the loop except a failure to receive: malformed packets, failed sends and
// incomplete transfers are all logged and the server keeps listening.

use crate::assembly::IncompleteTransfer;
use crate::processor::{self, ResultAction};
use crate::responder::{self, Reply};
use crate::session::{CompletedTransfer, Session};
use crate::tftp::{self, TftpResult, Transport};
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 3333;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: (Ipv4Addr::UNSPECIFIED, DEFAULT_PORT).into(),
        }
    }
}

/// Receives the result of every finished transfer.
pub trait OutputSink {
    fn file_received(&mut self, filename: &str, contents: &[u8]) -> io::Result<()>;

    fn transfer_failed(&mut self, filename: &str, err: &IncompleteTransfer);
}

/// Writes received files to stdout.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn file_received(&mut self, _filename: &str, contents: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(contents)?;
        out.flush()
    }

    fn transfer_failed(&mut self, filename: &str, err: &IncompleteTransfer) {
        log::error!("Transfer of {:?} failed: {}", filename, err);
    }
}

/// Receives files over a single transport, one transfer at a time.
pub struct Server<T: Transport, S: OutputSink> {
    sock: T,
    sink: S,
    session: Session,
}

impl<T: Transport, S: OutputSink> Server<T, S> {
    pub fn new(sock: T, sink: S) -> Server<T, S> {
        Server { sock, sink, session: Session::new() }
    }

    /// Handles datagrams until receiving fails.
    pub async fn run(&mut self) -> TftpResult<()> {
        loop {
            let (buf, src) = self.sock.recv_from().await?;
            self.handle_datagram(&buf, src).await;
        }
    }

    /// Fully processes one datagram, including any reply and the output of a finished transfer.
    pub async fn handle_datagram(&mut self, buf: &[u8], src: SocketAddr) {
        let packet = match tftp::Packet::parse_from_buf(buf) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("Discarding {} byte datagram from {}: {}", buf.len(), src, e);
                return;
            }
        };
        log::debug!("Got packet from {}: {:?}", src, packet);

        match processor::process_packet(&mut self.session, &packet, src) {
            ResultAction::SendReply(reply) => self.reply(src, &reply).await,
            ResultAction::SendReplyAndEmit(reply, transfer) => {
                self.reply(src, &reply).await;
                self.emit(transfer);
            }
            ResultAction::Discard(Some(notice)) => log::warn!("{}", notice),
            ResultAction::Discard(None) => {}
        }
    }

    async fn reply(&mut self, dst: SocketAddr, reply: &Reply) {
        if let Err(e) = responder::respond(&mut self.sock, dst, reply).await {
            log::warn!("Unable to send {:?} to {}: {}", reply, dst, e);
        }
    }

    fn emit(&mut self, transfer: CompletedTransfer) {
        match transfer.assemble() {
            Ok(contents) => {
                log::info!(
                    "Received {:?}: {} bytes in {} blocks",
                    transfer.filename, contents.len(), transfer.final_block
                );
                if let Err(e) = self.sink.file_received(&transfer.filename, &contents) {
                    log::error!("Unable to output {:?}: {}", transfer.filename, e);
                }
            }
            Err(e) => self.sink.transfer_failed(&transfer.filename, &e),
        }
    }
}
