use super::process_blocking;
use crate::terminal::{SimTerminal, QUIT_SENTINEL};
use arrayvec::ArrayString;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Longest command line accepted in one datagram.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Largest UDP payload over IPv4; longer replies go out in pieces.
pub const MAX_DATAGRAM_LEN: usize = 65_507;

pub type LineBuffer = ArrayString<MAX_LINE_LENGTH>;

/// Stateless request/response loop: one command per datagram.
///
/// Each command's result and then the next prompt go back to the sender as
/// separate datagrams, skipping empty ones and everything while output is
/// suppressed. A reply that cannot be delivered is logged and dropped; only
/// `QUIT` or a failed receive on the socket itself ends the loop.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            error!("Failed to bind UDP socket on {}: {}", addr, e);
            e
        })?;
        let local_addr = socket.local_addr()?;
        info!("UDP command socket listening on {}", local_addr);
        Ok(Self { socket, local_addr })
    }

    pub async fn bind_port(port: u16) -> std::io::Result<Self> {
        Self::bind(&format!("0.0.0.0:{port}")).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve datagrams until a command returns `QUIT`.
    pub async fn run(&self, terminal: &mut SimTerminal) -> std::io::Result<()> {
        // One spare byte so an oversize datagram is detectable.
        let mut buf = [0u8; MAX_LINE_LENGTH + 1];
        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                // Some platforms surface an earlier reply's ICMP error here.
                Err(e) if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                ) =>
                {
                    warn!("Ignoring UDP receive error: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let line = match decode_line(&buf[..len]) {
                Ok(line) => line,
                Err(reason) => {
                    warn!("Rejected datagram from {}: {}", src, reason);
                    self.reply(terminal.suppress_output(), &reason, src).await;
                    continue;
                }
            };
            debug!("Command from {}: {:?}", src, line.as_str());

            let result = process_blocking(terminal, &line);
            if result == QUIT_SENTINEL {
                info!("QUIT received from {}", src);
                break;
            }
            let suppress = terminal.suppress_output();
            self.reply(suppress, &result, src).await;
            self.reply(suppress, &terminal.prompt(), src).await;
        }
        Ok(())
    }

    async fn reply(&self, suppress: bool, text: &str, dest: SocketAddr) {
        if suppress || text.is_empty() {
            return;
        }
        for chunk in text.as_bytes().chunks(MAX_DATAGRAM_LEN) {
            if let Err(e) = self.socket.send_to(chunk, dest).await {
                warn!("Failed to send {} byte reply to {}: {}", chunk.len(), dest, e);
                return;
            }
        }
    }
}

/// Turn a datagram into one command line, refusing anything too long.
pub fn decode_line(datagram: &[u8]) -> Result<LineBuffer, String> {
    if datagram.len() > MAX_LINE_LENGTH {
        return Err(format!(
            "Input exceeds the maximum line length of {MAX_LINE_LENGTH} bytes."
        ));
    }
    let text = String::from_utf8_lossy(datagram);
    let text = text.trim_end_matches(['\r', '\n', '\0']);
    LineBuffer::from(text).map_err(|_| {
        format!("Input exceeds the maximum line length of {MAX_LINE_LENGTH} bytes.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_line_endings() {
        assert_eq!(decode_line(b"HELP\r\n").unwrap().as_str(), "HELP");
    }

    #[test]
    fn decode_rejects_oversize_datagrams() {
        let big = vec![b'A'; MAX_LINE_LENGTH + 1];
        assert!(decode_line(&big).is_err());
        let exact = vec![b'A'; MAX_LINE_LENGTH];
        assert_eq!(decode_line(&exact).unwrap().len(), MAX_LINE_LENGTH);
    }
}
