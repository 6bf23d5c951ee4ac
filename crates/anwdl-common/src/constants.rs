//! Shared constants.

/// Application name reported in logs and the `Stat` response.
pub const APP_NAME: &str = "anwdl-server";

/// Binary name of the CLI front-end.
pub const BIN_NAME: &str = "anwdlctl";

/// Default RSA key size in bits for the binary protocol handshake.
pub const DEFAULT_RSA_KEY_SIZE: usize = 4096;

/// Length in bytes of the AES symmetric key exchanged after the handshake.
pub const AES_KEY_LEN: usize = 32;

/// Length in bytes of the AES IV/nonce exchanged after the handshake.
pub const AES_IV_LEN: usize = 16;

/// Width, in bytes, of the ASCII decimal length prefix on every protocol frame.
pub const FRAME_LENGTH_WIDTH: usize = 8;

/// Padding byte used to right-pad the ASCII length prefix.
pub const FRAME_LENGTH_PAD: u8 = b'=';

/// Acknowledgement byte sent after a frame is accepted.
pub const FRAME_ACK: u8 = b'1';

/// Acknowledgement byte sent after a frame is refused.
pub const FRAME_NACK: u8 = b'0';

/// Raw byte length fed into the session-credential token generator
/// (yields >= 255 URL-safe base64 characters).
pub const SESSION_TOKEN_RAW_LEN: usize = 191;

/// Raw byte length fed into the access-token generator
/// (yields a 124-char URL-safe base64 token).
pub const ACCESS_TOKEN_RAW_LEN: usize = 93;

/// Default port range width reserved for the port forwarder pool.
pub const DEFAULT_FORWARDER_PORT_RANGE: std::ops::RangeInclusive<u16> = 30000..=30100;

/// Poll interval, in whole seconds, used by the reaper and domain-start wait loop.
pub const POLL_INTERVAL_SECS: u64 = 1;
