// Decides how the server reacts to each decoded packet.
//
// The processor owns every transition of the session's active flag:
//
// - Idle: a WriteReq starts a transfer and is acked with block 0. Data block 0 does the same for a
//   transfer with no name; its payload is not stored. Any other Data is out of sequence: it is
//   reported locally, neither stored nor acked.
// - Receiving: Data is stored at its block number and acked. A payload shorter than a full block
//   ends the transfer, which returns the session to idle and hands the blocks to reassembly.
//
// Block numbers are not checked for order on arrival, only when the file is assembled.

use crate::responder::Reply;
use crate::session::{CompletedTransfer, Session};
use crate::tftp;
use std::fmt;
use std::net::SocketAddr;

pub const READ_UNSUPPORTED: &str = "SORRY! Reading not supported";

/// Represents an action that the caller of process_packet should take in response to processing
/// a packet.
#[derive(Debug, PartialEq)]
pub enum ResultAction {
    /// Caller should send the reply.
    SendReply(Reply),

    /// Caller should send the reply, then assemble the finished transfer.
    SendReplyAndEmit(Reply, CompletedTransfer),

    /// Caller should send nothing, optionally reporting a notice locally.
    Discard(Option<Notice>),
}

/// Conditions that are reported locally but never to the peer.
#[derive(Debug, PartialEq)]
pub enum Notice {
    /// Data arrived while no transfer was in progress.
    OutOfSequenceData { block: u16 },

    /// The peer sent an error packet.
    PeerError { code: tftp::ErrorCode, message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notice::OutOfSequenceData { block } => {
                write!(f, "Not expecting mid file data, dropping block {block}")
            }
            Notice::PeerError { code, message } => {
                write!(f, "Client sent error packet: code: {:?}, message: '{}'", code, message)
            }
        }
    }
}

/// Given an incoming packet, updates the session and describes the action the caller should take.
pub fn process_packet(session: &mut Session, packet: &tftp::Packet, src: SocketAddr) -> ResultAction {
    match packet {
        tftp::Packet::ReadReq { path, mode } => {
            log::info!("Rejecting read request for {:?} ({:?}) from {}", path, mode, src);
            ResultAction::SendReply(Reply::Error(READ_UNSUPPORTED.to_string()))
        }
        tftp::Packet::WriteReq { path, mode } => {
            if session.is_active() {
                log::warn!(
                    "Write request for {:?} from {} replaces transfer of {:?}",
                    path, src, session.filename()
                );
            }
            log::info!("Starting new file {:?} ({:?}) from {}", path, mode, src);
            session.begin(path, src);
            ResultAction::SendReply(Reply::Ack(0))
        }
        tftp::Packet::Data { block, data } => process_data(session, *block, data, src),
        tftp::Packet::Ack { block } => {
            log::debug!("Ignoring ack for block {} from {}", block, src);
            ResultAction::Discard(None)
        }
        tftp::Packet::Error { code, message } => ResultAction::Discard(Some(Notice::PeerError {
            code: *code,
            message: message.clone(),
        })),
        tftp::Packet::Unrecognized { opcode } => {
            log::debug!("Ignoring unknown opcode {} from {}", opcode, src);
            ResultAction::Discard(None)
        }
    }
}

fn process_data(session: &mut Session, block: u16, data: &[u8], src: SocketAddr) -> ResultAction {
    if !session.is_active() {
        if block != 0 {
            return ResultAction::Discard(Some(Notice::OutOfSequenceData { block }));
        }
        log::info!("Starting new unnamed file from {} on data block 0", src);
        session.begin("", src);
        return ResultAction::SendReply(Reply::Ack(0));
    }

    // Any peer may feed the current transfer; mismatches are only logged.
    if session.peer() != Some(src) {
        log::warn!(
            "Block {} for {:?} came from {}, but the write request came from {:?}",
            block, session.filename(), src, session.peer()
        );
    }

    if session.store_block(block, data.to_vec()).is_some() {
        log::debug!("Block {} received again, keeping the latest copy", block);
    }

    // A full block means more data is coming, even if the file ends exactly here.
    if data.len() < tftp::DATA_BUFFER_SIZE {
        log::info!(
            "Got final block {} for {:?}, {} blocks stored",
            block, session.filename(), session.block_count()
        );
        return ResultAction::SendReplyAndEmit(Reply::Ack(block), session.finish(block));
    }

    ResultAction::SendReply(Reply::Ack(block))
}
