use crate::tftp::{self, TftpResult, Transport};
use std::net::SocketAddr;

/// The only packets the server ever sends.
#[derive(Debug, PartialEq)]
pub enum Reply {
    Ack(u16),
    Error(String),
}

pub async fn send_ack<T: Transport>(sock: &mut T, dst: SocketAddr, block: u16) -> TftpResult<()> {
    sock.send_to(&tftp::encode_ack(block), dst).await
}

pub async fn send_error<T: Transport>(sock: &mut T, dst: SocketAddr, message: &str) -> TftpResult<()> {
    sock.send_to(&tftp::encode_error(message), dst).await
}

/// Sends `reply` to `dst`. A failed send is returned to the caller; nothing is retried.
pub async fn respond<T: Transport>(sock: &mut T, dst: SocketAddr, reply: &Reply) -> TftpResult<()> {
    match reply {
        Reply::Ack(block) => send_ack(sock, dst, *block).await,
        Reply::Error(message) => send_error(sock, dst, message).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::SocketError;
    use std::io;
    use std::net::Ipv4Addr;
    use tokio_test::{assert_err, assert_ok};

    /// Records every datagram handed to it.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<(Vec<u8>, SocketAddr)>,
        fail_sends: bool,
    }

    impl Transport for RecordingTransport {
        async fn recv_from(&mut self) -> TftpResult<(Vec<u8>, SocketAddr)> {
            Err(SocketError::IO(io::ErrorKind::UnexpectedEof.into()))
        }

        async fn send_to(&mut self, buf: &[u8], dst: SocketAddr) -> TftpResult<()> {
            if self.fail_sends {
                return Err(SocketError::IO(io::ErrorKind::ConnectionRefused.into()));
            }
            self.sent.push((buf.to_vec(), dst));
            Ok(())
        }
    }

    fn peer() -> SocketAddr {
        (Ipv4Addr::new(127, 0, 0, 1), 12345).into()
    }

    #[tokio::test]
    async fn test_send_ack() {
        let mut sock = RecordingTransport::default();
        assert_ok!(send_ack(&mut sock, peer(), 2).await);
        assert_eq!(sock.sent, vec![(vec![0x00, 0x04, 0x00, 0x02], peer())]);
    }

    #[tokio::test]
    async fn test_send_error() {
        let mut sock = RecordingTransport::default();
        assert_ok!(respond(&mut sock, peer(), &Reply::Error("Testing".to_string())).await);

        let (buf, dst) = &sock.sent[0];
        assert_eq!(*dst, peer());
        assert_eq!(&buf[..4], &[0x00, 0x05, 0x00, 0x00]);
        assert_eq!(&buf[4..], b"Testing\0");
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let mut sock = RecordingTransport { fail_sends: true, ..Default::default() };
        assert_err!(respond(&mut sock, peer(), &Reply::Ack(1)).await);
        assert!(sock.sent.is_empty());
    }
}
