//! Compression codecs for backup files
//!
//! The codec set is closed: an unknown name is rejected when configuration is
//! loaded, never in the middle of a run.

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use xz2::write::XzEncoder;

/// Compression applied to a dump before it is written to disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Plain,
    Gzip,
    #[serde(alias = "xz")]
    Lzma,
    #[serde(alias = "bzip2")]
    Bz2,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown compression method '{0}' (expected plain, gzip, lzma, xz or bz2)")]
pub struct UnknownCompression(pub String);

impl Compression {
    /// Every supported codec
    pub const ALL: [Compression; 4] = [
        Compression::Plain,
        Compression::Gzip,
        Compression::Lzma,
        Compression::Bz2,
    ];

    /// File extension appended after the engine extension (empty for plain)
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Plain => "",
            Compression::Gzip => ".gz",
            Compression::Lzma => ".xz",
            Compression::Bz2 => ".bz2",
        }
    }

    /// Wrap a writer with this codec
    pub fn encoder<W: Write>(&self, writer: W) -> Encoder<W> {
        match self {
            Compression::Plain => Encoder::Plain(writer),
            Compression::Gzip => Encoder::Gzip(GzEncoder::new(writer, flate2::Compression::default())),
            Compression::Lzma => Encoder::Lzma(XzEncoder::new(writer, 6)),
            Compression::Bz2 => Encoder::Bz2(BzEncoder::new(writer, bzip2::Compression::default())),
        }
    }

    /// Wrap a reader with the matching decoder
    pub fn decoder<'a, R: Read + 'a>(&self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::Plain => Box::new(reader),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Lzma => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Bz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
        }
    }
}

impl FromStr for Compression {
    type Err = UnknownCompression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(Compression::Plain),
            "gzip" => Ok(Compression::Gzip),
            "lzma" | "xz" => Ok(Compression::Lzma),
            "bz2" | "bzip2" => Ok(Compression::Bz2),
            _ => Err(UnknownCompression(s.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::Plain => "plain",
            Compression::Gzip => "gzip",
            Compression::Lzma => "lzma",
            Compression::Bz2 => "bz2",
        };
        f.write_str(name)
    }
}

/// A writer that compresses everything written to it
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Lzma(XzEncoder<W>),
    Bz2(BzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Flush the codec trailer and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(e) => e.finish(),
            Encoder::Lzma(e) => e.finish(),
            Encoder::Bz2(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Lzma(e) => e.write(buf),
            Encoder::Bz2(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Lzma(e) => e.flush(),
            Encoder::Bz2(e) => e.flush(),
        }
    }
}
