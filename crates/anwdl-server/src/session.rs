//! A single binary-protocol client session: handshake, then exactly one
//! request/response exchange.

use std::io::{Read, Write};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use anwdl_common::constants::{AES_IV_LEN, AES_KEY_LEN};
use anwdl_crypto::{AesWrapper, RsaWrapper};
use anwdl_protocol::{Request, Response};

use crate::error::{SessionError, SessionResult};
use crate::framing::{recv_frame, send_frame};

/// Derives the short session id the original implementation used to tag log
/// lines: the first 7 hex characters of SHA-256(peer IP).
#[must_use]
pub fn session_id_for(peer_ip: IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(peer_ip.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..7].to_string()
}

/// One client's binary-protocol session: the handshake state and the
/// transport it runs over.
pub struct ClientSession<S: Read + Write> {
    stream: S,
    aes: Option<AesWrapper>,
    /// Short id derived from the peer's IP, used in log lines.
    pub id: String,
    /// When this session object was constructed.
    pub created_at: DateTime<Utc>,
}

impl<S: Read + Write> ClientSession<S> {
    /// Wraps a transport for a client connecting from `peer_ip`.
    pub fn new(stream: S, peer_ip: IpAddr) -> Self {
        Self {
            stream,
            aes: None,
            id: session_id_for(peer_ip),
            created_at: Utc::now(),
        }
    }

    /// Runs the server's "receive first" handshake role: receive the
    /// client's RSA public key, send our own, receive the symmetric key+IV
    /// the client generated (encrypted under our public key), then echo
    /// that same key+IV back to the client re-encrypted under its public
    /// key — the fourth round-trip the original `exchangeKeys` performs via
    /// `sendAESKey()`, without which a conformant client's final
    /// `recvAESKey()` blocks forever.
    pub fn exchange_keys(&mut self, local_rsa: &RsaWrapper) -> SessionResult<()> {
        let peer_pub_der = recv_frame(&mut self.stream)?;
        let peer_pub = RsaWrapper::peer_public_key_from_der(&peer_pub_der)?;

        send_frame(&mut self.stream, &local_rsa.public_key_der()?)?;

        let enveloped = recv_frame(&mut self.stream)?;
        let decrypted = local_rsa.decrypt(&enveloped)?;
        if decrypted.len() != AES_KEY_LEN + AES_IV_LEN {
            return Err(SessionError::Crypto(anwdl_crypto::CryptoError::Aes(
                format!(
                    "expected {} bytes of key material, got {}",
                    AES_KEY_LEN + AES_IV_LEN,
                    decrypted.len()
                ),
            )));
        }

        let echo = RsaWrapper::encrypt_for(&peer_pub, &decrypted)?;
        send_frame(&mut self.stream, &echo)?;

        let (key, iv) = decrypted.split_at(AES_KEY_LEN);
        self.aes = Some(AesWrapper::new(key, iv)?);
        Ok(())
    }

    fn aes(&self) -> SessionResult<&AesWrapper> {
        self.aes.as_ref().ok_or_else(|| {
            SessionError::Crypto(anwdl_crypto::CryptoError::Aes(
                "session key exchange has not completed".to_string(),
            ))
        })
    }

    /// Receives and decrypts one request frame.
    pub fn recv_request(&mut self) -> SessionResult<Request> {
        let ciphertext = recv_frame(&mut self.stream)?;
        let plaintext = self.aes()?.decrypt(&ciphertext)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Encrypts and sends one response frame.
    pub fn send_response(&mut self, response: &Response) -> SessionResult<()> {
        let plaintext = serde_json::to_vec(response)?;
        let ciphertext = self.aes()?.encrypt(&plaintext)?;
        send_frame(&mut self.stream, &ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn session_id_is_seven_hex_chars() {
        let id = session_id_for(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(id.len(), 7);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn session_id_is_deterministic_per_ip() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(session_id_for(ip), session_id_for(ip));
    }

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
    fn full_handshake_and_request_round_trip() {
        use anwdl_common::constants::{FRAME_ACK, FRAME_LENGTH_PAD, FRAME_LENGTH_WIDTH};
        use anwdl_crypto::generate_key_iv;

        // Simulate the client side inline, writing exactly what a real
        // client would send, into the server session's input buffer.
        let server_rsa = RsaWrapper::generate(2048).expect("server keygen");
        let client_rsa = RsaWrapper::generate(2048).expect("client keygen");

        let (aes_key, aes_iv) = generate_key_iv();
        let mut envelope = aes_key.clone();
        envelope.extend_from_slice(&aes_iv);

        fn framed(body: &[u8]) -> Vec<u8> {
            let len_str = format!("{}", body.len());
            let mut header = vec![FRAME_LENGTH_PAD; FRAME_LENGTH_WIDTH];
            header[..len_str.len()].copy_from_slice(len_str.as_bytes());
            let mut out = header;
            out.extend_from_slice(body);
            out
        }

        let mut input = Vec::new();
        // 1. client pubkey frame (server's first recv_frame: header+body only, no ack byte)
        input.extend_from_slice(&framed(&client_rsa.public_key_der().expect("der")));
        // server then send_frame()s its own pubkey: that call reads exactly one ack byte.
        input.push(FRAME_ACK);
        // 2. client sends RSA(server_pub, key||iv) as the next recv_frame (header+body only)
        let enveloped = RsaWrapper::encrypt_for(
            &RsaWrapper::peer_public_key_from_der(
                &server_rsa.public_key_der().expect("der"),
            )
            .expect("parse"),
            &envelope,
        )
        .expect("encrypt envelope");
        input.extend_from_slice(&framed(&enveloped));
        // server then send_frame()s the re-encrypted key+IV echo: another ack byte.
        input.push(FRAME_ACK);
        // 3. the request frame, again header+body only (recv_request's recv_frame).
        let request_plain = serde_json::to_vec(&serde_json::json!({"verb": "STAT", "parameters": {}}))
            .expect("json");
        let aes = AesWrapper::new(&aes_key, &aes_iv).expect("aes");
        let request_cipher = aes.encrypt(&request_plain).expect("encrypt request");
        input.extend_from_slice(&framed(&request_cipher));

        let mut session = ClientSession::new(
            Duplex {
                inn: Cursor::new(input),
                out: Vec::new(),
            },
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        );
        session.exchange_keys(&server_rsa).expect("handshake");

        // The server's second frame out is the echoed key+IV, RSA-encrypted
        // for the client's public key; the client must be able to recover it.
        let server_pub_frame_len = FRAME_LENGTH_WIDTH + server_rsa.public_key_der().expect("der").len();
        let echo_frame = &session.stream.out[server_pub_frame_len..];
        let echo_len: usize = std::str::from_utf8(&echo_frame[..FRAME_LENGTH_WIDTH])
            .expect("utf8")
            .trim_end_matches(FRAME_LENGTH_PAD as char)
            .parse()
            .expect("len");
        let echo_body = &echo_frame[FRAME_LENGTH_WIDTH..FRAME_LENGTH_WIDTH + echo_len];
        let recovered = client_rsa.decrypt(echo_body).expect("client decrypts echo");
        assert_eq!(recovered, envelope);

        let request = session.recv_request().expect("recv request");
        assert_eq!(request.verb, anwdl_protocol::Verb::Stat);
    }
}
