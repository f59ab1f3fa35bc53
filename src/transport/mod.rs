//! Unit readers: split a byte stream into FLV tags or top-level MP4 boxes
//!
//! Sources are `flv://host:port` / `fmp4://host:port` (raw TCP) or
//! `file:///path.flv` / `file:///path.mp4`.

mod flv;
mod fmp4;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::info;

use crate::constants::MAX_UNIT_SIZE;
use crate::parsers::DecodeError;
use crate::types::{MediaUnit, StreamFormat};

pub use flv::FlvReader;
pub use fmp4::BoxReader;

#[cfg(test)]
pub(crate) use flv::tests::flv_stream;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported source url '{0}'")]
    BadUrl(String),
    #[error("cannot open source {target}")]
    Open {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("read failed")]
    Io(#[from] io::Error),
    #[error("malformed unit")]
    Decode(#[from] DecodeError),
    #[error("unit of {size} bytes exceeds the {limit}-byte ceiling")]
    Oversized { size: u64, limit: u64 },
}

/// Where units come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUrl {
    Tcp { format: StreamFormat, addr: String },
    File { format: StreamFormat, path: PathBuf },
}

impl SourceUrl {
    pub fn format(&self) -> StreamFormat {
        match self {
            SourceUrl::Tcp { format, .. } | SourceUrl::File { format, .. } => *format,
        }
    }
}

impl FromStr for SourceUrl {
    type Err = TransportError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let bad = || TransportError::BadUrl(url.to_string());
        let (scheme, rest) = url.split_once("://").ok_or_else(bad)?;
        match scheme {
            "flv" | "fmp4" if !rest.is_empty() && !rest.contains('/') => {
                let format = if scheme == "flv" { StreamFormat::Tag } else { StreamFormat::Box };
                Ok(SourceUrl::Tcp { format, addr: rest.to_string() })
            }
            "file" if rest.starts_with('/') => {
                let path = PathBuf::from(rest);
                let format = match path.extension().and_then(|e| e.to_str()) {
                    Some("flv") => StreamFormat::Tag,
                    Some("mp4" | "m4s" | "cmfv" | "cmfa") => StreamFormat::Box,
                    _ => return Err(bad()),
                };
                Ok(SourceUrl::File { format, path })
            }
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUrl::Tcp { format, addr } => write!(f, "{format}://{addr}"),
            SourceUrl::File { path, .. } => write!(f, "file://{}", path.display()),
        }
    }
}

pub type ByteSource = Box<dyn AsyncRead + Unpin + Send>;

/// Reader for either stream format
pub enum UnitReader<R> {
    Flv(FlvReader<R>),
    Box(BoxReader<R>),
}

impl<R: AsyncRead + Unpin> UnitReader<R> {
    pub fn new(format: StreamFormat, reader: R) -> Self {
        match format {
            StreamFormat::Tag => UnitReader::Flv(FlvReader::new(reader)),
            StreamFormat::Box => UnitReader::Box(BoxReader::new(reader)),
        }
    }

    pub fn format(&self) -> StreamFormat {
        match self {
            UnitReader::Flv(_) => StreamFormat::Tag,
            UnitReader::Box(_) => StreamFormat::Box,
        }
    }

    /// Next unit, or `None` at a clean end of stream
    pub async fn next_unit(&mut self) -> Result<Option<MediaUnit<'_>>, TransportError> {
        match self {
            UnitReader::Flv(r) => r.next_unit().await,
            UnitReader::Box(r) => r.next_unit().await,
        }
    }
}

/// Connects or opens `url`
pub async fn open_source(url: &SourceUrl) -> Result<UnitReader<ByteSource>, TransportError> {
    let open_err = |source| TransportError::Open { target: url.to_string(), source };
    let stream: ByteSource = match url {
        SourceUrl::Tcp { addr, .. } => {
            let stream = tokio::net::TcpStream::connect(addr.as_str()).await.map_err(open_err)?;
            Box::new(BufReader::new(stream))
        }
        SourceUrl::File { path, .. } => {
            let file = tokio::fs::File::open(path).await.map_err(open_err)?;
            Box::new(BufReader::new(file))
        }
    };
    info!(source = %url, format = %url.format(), "source opened");
    Ok(UnitReader::new(url.format(), stream))
}

/// Fills `buf` completely. `Ok(false)` on a clean end of stream before the
/// first byte.
async fn read_header<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended {filled} bytes into a {}-byte header", buf.len()),
            ));
        }
        filled += n;
    }
    Ok(true)
}

/// Reads exactly `len` bytes into `body`, replacing its contents
async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    body: &mut BytesMut,
    len: u64,
) -> Result<(), TransportError> {
    if len > MAX_UNIT_SIZE {
        return Err(TransportError::Oversized { size: len, limit: MAX_UNIT_SIZE });
    }
    body.clear();
    body.resize(len as usize, 0);
    reader.read_exact(&mut body[..]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_urls() {
        assert_eq!(
            "flv://127.0.0.1:1935".parse::<SourceUrl>().unwrap(),
            SourceUrl::Tcp { format: StreamFormat::Tag, addr: "127.0.0.1:1935".into() }
        );
        assert_eq!(
            "fmp4://packager:9000".parse::<SourceUrl>().unwrap(),
            SourceUrl::Tcp { format: StreamFormat::Box, addr: "packager:9000".into() }
        );
        assert_eq!(
            "file:///var/media/a.mp4".parse::<SourceUrl>().unwrap(),
            SourceUrl::File { format: StreamFormat::Box, path: "/var/media/a.mp4".into() }
        );
        assert_eq!("file:///tmp/x.flv".parse::<SourceUrl>().unwrap().format(), StreamFormat::Tag);
    }

    #[test]
    fn rejects_unknown_urls() {
        for url in ["rtmp://host/app", "flv://", "file://relative.flv", "file:///tmp/x.ts", "host:1935"] {
            assert!(matches!(url.parse::<SourceUrl>(), Err(TransportError::BadUrl(_))), "{url}");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let url: SourceUrl = "fmp4://packager:9000".parse().unwrap();
        assert_eq!(url.to_string(), "fmp4://packager:9000");
    }

    #[tokio::test]
    async fn header_read_distinguishes_clean_and_torn_eof() {
        let mut buf = [0u8; 4];
        let mut empty: &[u8] = &[];
        assert!(!read_header(&mut empty, &mut buf).await.unwrap());

        let mut torn: &[u8] = &[1, 2];
        let err = read_header(&mut torn, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut full: &[u8] = &[1, 2, 3, 4, 5];
        assert!(read_header(&mut full, &mut buf).await.unwrap());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn open_missing_file_fails() {
        let url: SourceUrl = "file:///nonexistent/stream.flv".parse().unwrap();
        assert!(matches!(open_source(&url).await, Err(TransportError::Open { .. })));
    }
}
