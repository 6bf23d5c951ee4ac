//! SSH-backed endpoint administration shell.
//!
//! Each provisioned container gets a short-lived SSH session used once to
//! push a freshly-generated, per-session set of login credentials and run
//! the guest-side setup script. The session is then closed; the credentials
//! it provisioned are what the client actually uses afterward.

use std::net::Ipv4Addr;

use rand::Rng;
use ssh2::Session;

use crate::error::{EndpointError, EndpointResult};

const SETUP_SCRIPT: &str = "/bin/anweddol_container_setup.sh";
const DEFAULT_PASSWORD_LEN: usize = 120;

/// An open SSH session to a guest, used only for administration.
pub struct EndpointShell {
    session: Session,
}

impl EndpointShell {
    /// Opens an SSH session to `ip:port`, authenticating with `username`/`password`.
    pub fn open(ip: Ipv4Addr, port: u16, username: &str, password: &str) -> EndpointResult<Self> {
        let tcp = std::net::TcpStream::connect((ip, port))
            .map_err(|e| EndpointError::Connect(ip.to_string(), e))?;
        let mut session = Session::new().map_err(|e| EndpointError::Session(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| EndpointError::Session(e.to_string()))?;
        session
            .userauth_password(username, password)
            .map_err(|e| EndpointError::Session(e.to_string()))?;
        if !session.authenticated() {
            return Err(EndpointError::Session("authentication rejected".to_string()));
        }
        Ok(Self { session })
    }

    /// Generates a fresh username/password pair for a guest login, in the
    /// same shape the original implementation used: a `user_<5 digits>`
    /// username and a long random ASCII+digit password.
    #[must_use]
    pub fn generate_client_credentials() -> (String, String) {
        let mut rng = rand::thread_rng();
        let username = format!("user_{}", rng.gen_range(10000..90000));
        const ALPHABET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let password = (0..DEFAULT_PASSWORD_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        (username, password)
    }

    /// Runs the guest-side container setup script with a newly generated
    /// login. Any stdout or stderr from the script is treated as failure,
    /// matching the original implementation's strict "silence means success"
    /// contract.
    pub fn administrate(&self, username: &str, password: &str, ssh_port: u16) -> EndpointResult<()> {
        let command = format!("sudo {SETUP_SCRIPT} {username} {password} {ssh_port}");
        let (stdout, stderr) = self.exec(&command)?;
        if !stdout.is_empty() || !stderr.is_empty() {
            return Err(EndpointError::AdminSetupFailed { stdout, stderr });
        }
        Ok(())
    }

    /// Executes an arbitrary command, returning its captured stdout and stderr.
    pub fn exec(&self, command: &str) -> EndpointResult<(String, String)> {
        use std::io::Read;

        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| EndpointError::Exec(e.to_string()))?;
        channel
            .exec(command)
            .map_err(|e| EndpointError::Exec(e.to_string()))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| EndpointError::Exec(e.to_string()))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| EndpointError::Exec(e.to_string()))?;

        channel
            .wait_close()
            .map_err(|e| EndpointError::Exec(e.to_string()))?;
        Ok((stdout, stderr))
    }

    /// Closes the SSH session.
    pub fn close(self) {
        drop(self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_username_matches_expected_shape() {
        let (username, password) = EndpointShell::generate_client_credentials();
        assert!(username.starts_with("user_"));
        assert_eq!(username.len(), "user_".len() + 5);
        assert_eq!(password.len(), DEFAULT_PASSWORD_LEN);
    }

    #[test]
    fn generated_credentials_are_not_repeated() {
        let (user_a, pass_a) = EndpointShell::generate_client_credentials();
        let (user_b, pass_b) = EndpointShell::generate_client_credentials();
        assert_ne!((user_a, pass_a), (user_b, pass_b));
    }
}
