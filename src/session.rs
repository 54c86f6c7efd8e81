// The session holds the reassembly state of the one transfer the server tracks at a time.
//
// It is a plain value owned by the server loop and handed to the packet processor by mutable
// reference, so the whole state machine can be driven without a socket.

use crate::assembly::{self, IncompleteTransfer};
use std::collections::HashMap;
use std::mem;
use std::net::SocketAddr;

#[derive(Debug, Default)]
pub struct Session {
    /// Received payloads keyed by block number.
    blocks: HashMap<u16, Vec<u8>>,

    /// Whether a transfer is currently being received.
    active: bool,

    /// Name announced by the write request. Informational only.
    filename: String,

    /// The peer that issued the write request.
    peer: Option<SocketAddr>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Starts tracking a new transfer, dropping whatever was stored before.
    pub fn begin(&mut self, filename: &str, peer: SocketAddr) {
        self.blocks.clear();
        self.active = true;
        self.filename = filename.to_string();
        self.peer = Some(peer);
    }

    /// Stores a block payload. A block that was already stored is replaced, and the previous
    /// payload is returned.
    pub fn store_block(&mut self, block: u16, data: Vec<u8>) -> Option<Vec<u8>> {
        self.blocks.insert(block, data)
    }

    /// Ends the transfer and hands its blocks over for reassembly. The session is left idle and
    /// empty.
    pub fn finish(&mut self, final_block: u16) -> CompletedTransfer {
        self.active = false;
        self.peer = None;
        CompletedTransfer {
            filename: mem::take(&mut self.filename),
            blocks: mem::take(&mut self.blocks),
            final_block,
        }
    }
}

/// The blocks of a transfer whose terminal block has arrived.
#[derive(Debug, PartialEq)]
pub struct CompletedTransfer {
    pub filename: String,
    pub blocks: HashMap<u16, Vec<u8>>,
    pub final_block: u16,
}

impl CompletedTransfer {
    /// Joins blocks 1 through `final_block` in order.
    pub fn assemble(&self) -> Result<Vec<u8>, IncompleteTransfer> {
        assembly::assemble(&self.blocks, self.final_block)
    }
}
