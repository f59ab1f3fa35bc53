//! Metric sink: stdout pass-through or a TCP connection with timeouts

use std::io::{self, LineWriter, Stdout, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::PASSTHROUGH_SINK;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink address '{0}' is not host:port")]
    BadAddress(String),
    #[error("cannot resolve sink address '{addr}'")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot connect to sink {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Destination of metric lines. Writes are line buffered.
#[derive(Debug)]
pub enum Sink {
    Stdout(Stdout),
    Tcp(LineWriter<TcpStream>),
}

impl Sink {
    /// `-` selects stdout, anything else is resolved as `host:port` and
    /// connected with `timeout` applied to connect, send and receive.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, SinkError> {
        if addr == PASSTHROUGH_SINK {
            debug!("metric lines go to stdout");
            return Ok(Sink::Stdout(io::stdout()));
        }

        let resolved = resolve(addr)?;
        let mut last_err = None;
        for sock_addr in resolved {
            match connect_with_timeout(&sock_addr, timeout) {
                Ok(stream) => {
                    info!(sink = %sock_addr, "connected to metric sink");
                    return Ok(Sink::Tcp(LineWriter::new(stream)));
                }
                Err(e) => {
                    debug!(sink = %sock_addr, "connect attempt failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(SinkError::Connect {
            addr: addr.to_string(),
            source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)),
        })
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Sink::Stdout(_))
    }
}

fn resolve(addr: &str) -> Result<Vec<SocketAddr>, SinkError> {
    let (host, port) = addr.rsplit_once(':').ok_or_else(|| SinkError::BadAddress(addr.to_string()))?;
    if host.is_empty() {
        return Err(SinkError::BadAddress(addr.to_string()));
    }
    let port: u16 = port.parse().map_err(|_| SinkError::BadAddress(addr.to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    (host, port)
        .to_socket_addrs()
        .map(|addrs| addrs.collect())
        .map_err(|source| SinkError::Resolve { addr: addr.to_string(), source })
}

fn connect_with_timeout(addr: &SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    socket.connect_timeout(&(*addr).into(), timeout)?;
    Ok(socket.into())
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(out) => out.write(buf),
            Sink::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::Tcp(stream) => stream.flush(),
        }
    }
}
