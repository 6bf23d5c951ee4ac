//! Length-prefixed frame I/O used by the binary protocol.
//!
//! Every frame is an 8-byte ASCII decimal length, right-padded with `=`,
//! followed by a single handshake byte (`1` to accept, `0` to refuse) sent
//! by the reader back to the writer, followed by the frame body.

use std::io::{Read, Write};

use anwdl_common::constants::{FRAME_ACK, FRAME_LENGTH_PAD, FRAME_LENGTH_WIDTH, FRAME_NACK};

use crate::error::{SessionError, SessionResult};

/// Maximum single-frame body size accepted by [`recv_frame`]: 64 MiB. Guards
/// against a peer sending an enormous length prefix and exhausting memory
/// before the body is even read.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Sends `body` as one length-prefixed frame and waits for the peer's ack.
/// Returns `Err(SessionError::PeerRejected)` if the peer nacks.
pub fn send_frame<S: Read + Write>(stream: &mut S, body: &[u8]) -> SessionResult<()> {
    let len_str = format!("{}", body.len());
    let mut header = vec![FRAME_LENGTH_PAD; FRAME_LENGTH_WIDTH];
    header[..len_str.len()].copy_from_slice(len_str.as_bytes());

    stream.write_all(&header)?;
    stream.flush()?;

    let mut ack = [0u8; 1];
    stream.read_exact(&mut ack)?;
    if ack[0] != FRAME_ACK {
        return Err(SessionError::PeerRejected);
    }

    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

/// Receives one length-prefixed frame, acking or nacking the length prefix
/// before reading the body.
pub fn recv_frame<S: Read + Write>(stream: &mut S) -> SessionResult<Vec<u8>> {
    let mut header = [0u8; FRAME_LENGTH_WIDTH];
    stream.read_exact(&mut header)?;

    let trimmed: Vec<u8> = header
        .iter()
        .copied()
        .take_while(|&b| b != FRAME_LENGTH_PAD)
        .collect();
    let len_str = std::str::from_utf8(&trimmed).map_err(|_| SessionError::MalformedLength)?;
    let len: usize = len_str.parse().map_err(|_| SessionError::MalformedLength)?;

    if len > MAX_FRAME_LEN {
        stream.write_all(&[FRAME_NACK])?;
        stream.flush()?;
        return Err(SessionError::MalformedLength);
    }

    stream.write_all(&[FRAME_ACK])?;
    stream.flush()?;

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A tiny in-memory duplex: writes go to `out`, reads come from `inn`.
    struct Duplex {
        inn: Cursor<Vec<u8>>,
        out: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inn.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.out.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_frame_writes_padded_length_prefix() {
        let mut duplex = Duplex {
            inn: Cursor::new(vec![FRAME_ACK]),
            out: Vec::new(),
        };
        send_frame(&mut duplex, b"hi").expect("send");
        assert_eq!(&duplex.out[..8], b"2=======");
        assert_eq!(&duplex.out[8..], b"hi");
    }

    #[test]
    fn send_frame_errors_on_nack() {
        let mut duplex = Duplex {
            inn: Cursor::new(vec![FRAME_NACK]),
            out: Vec::new(),
        };
        let err = send_frame(&mut duplex, b"hi").unwrap_err();
        assert!(matches!(err, SessionError::PeerRejected));
    }

    #[test]
    fn recv_frame_reads_body_after_acking() {
        let mut input = Vec::new();
        input.extend_from_slice(b"2=======");
        input.extend_from_slice(b"hi");
        let mut duplex = Duplex {
            inn: Cursor::new(input),
            out: Vec::new(),
        };
        let body = recv_frame(&mut duplex).expect("recv");
        assert_eq!(body, b"hi");
        assert_eq!(duplex.out, vec![FRAME_ACK]);
    }

    #[test]
    fn round_trip_through_a_shared_buffer() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"5=======hello");
        let mut duplex = Duplex {
            inn: Cursor::new(buf.clone()),
            out: Vec::new(),
        };
        assert_eq!(recv_frame(&mut duplex).expect("recv"), b"hello");
    }
}
