use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use crate::format::bgzf::VirtualOffset;
use crate::types::CompressionLevel;
use crate::{PbgzfError, Result};

use super::reader::PipelineReader;
use super::types::{OpenMode, PipelineConfig, PipelineState, PipelineStats};
use super::writer::PipelineWriter;

/// Any seekable byte source a read-mode stream can own.
pub trait SeekableSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekableSource for T {}

/// The caller's own source or sink, handed back by [`BgzfStream::close`].
pub enum Released {
    Source(Box<dyn SeekableSource>),
    Sink(Box<dyn Write + Send>),
}

impl fmt::Debug for Released {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Released::Source(_) => f.write_str("Released::Source"),
            Released::Sink(_) => f.write_str("Released::Sink"),
        }
    }
}

enum Inner {
    Read(PipelineReader<Box<dyn SeekableSource>>),
    Write(PipelineWriter<Box<dyn Write + Send>>),
    Closed,
}

/// A container stream whose direction is chosen at open time.
///
/// Operations that do not match the mode fail with [`PbgzfError::Usage`]
/// and leave the stream untouched.
pub struct BgzfStream {
    mode: OpenMode,
    inner: Inner,
    // Set when `open` created the file, so closing the stream closes it too.
    owns_endpoint: bool,
}

impl BgzfStream {
    /// Opens `path` for reading, or creates/truncates it for writing.
    ///
    /// `level` only matters in write mode.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, level: CompressionLevel) -> Result<Self> {
        let config = PipelineConfig::default().with_compression_level(level);
        Self::open_with_config(path, mode, config)
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        config: PipelineConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            OpenMode::Read => {
                let file = File::open(path).map_err(|error| {
                    PbgzfError::from(error).with_context(format!("opening {}", path.display()))
                })?;
                Self::from_reader(file, config).map(Self::owning_endpoint)
            }
            OpenMode::Write => {
                let file = File::create(path).map_err(|error| {
                    PbgzfError::from(error).with_context(format!("creating {}", path.display()))
                })?;
                Self::from_writer(file, config).map(Self::owning_endpoint)
            }
        }
    }

    fn owning_endpoint(mut self) -> Self {
        self.owns_endpoint = true;
        self
    }

    /// Wraps an already open source in a read-mode stream.
    pub fn from_reader<R>(source: R, config: PipelineConfig) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let source: Box<dyn SeekableSource> = Box::new(source);
        Ok(Self {
            mode: OpenMode::Read,
            inner: Inner::Read(PipelineReader::new(source, config)?),
            owns_endpoint: false,
        })
    }

    /// Wraps an already open sink in a write-mode stream.
    pub fn from_writer<W>(sink: W, config: PipelineConfig) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let sink: Box<dyn Write + Send> = Box::new(sink);
        Ok(Self {
            mode: OpenMode::Write,
            inner: Inner::Write(PipelineWriter::new(sink, config)?),
            owns_endpoint: false,
        })
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn state(&self) -> PipelineState {
        match &self.inner {
            Inner::Read(reader) => reader.state(),
            Inner::Write(writer) => writer.state(),
            Inner::Closed => PipelineState::Closed,
        }
    }

    pub fn stats(&self) -> Option<&PipelineStats> {
        match &self.inner {
            Inner::Read(reader) => Some(reader.stats()),
            Inner::Write(writer) => Some(writer.stats()),
            Inner::Closed => None,
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            Inner::Read(reader) => reader.read(buf),
            Inner::Write(_) => Err(PbgzfError::Usage("read on a write-mode stream")),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match &mut self.inner {
            Inner::Write(writer) => writer.write(buf),
            Inner::Read(_) => Err(PbgzfError::Usage("write on a read-mode stream")),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    /// Read mode only.
    pub fn seek(&mut self, offset: VirtualOffset) -> Result<VirtualOffset> {
        match &mut self.inner {
            Inner::Read(reader) => reader.seek(offset),
            Inner::Write(_) => Err(PbgzfError::Usage("seek on a write-mode stream")),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    /// In write mode this flushes first; see [`PipelineWriter::tell`].
    pub fn tell(&mut self) -> Result<VirtualOffset> {
        match &mut self.inner {
            Inner::Read(reader) => Ok(reader.tell()),
            Inner::Write(writer) => writer.tell(),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    /// Write mode only.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.inner {
            Inner::Write(writer) => writer.flush(),
            Inner::Read(_) => Err(PbgzfError::Usage("flush on a read-mode stream")),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    /// Read mode only. See [`PipelineReader::has_eof_marker`].
    pub fn has_eof_marker(&self) -> Result<bool> {
        match &self.inner {
            Inner::Read(reader) => Ok(reader.has_eof_marker()),
            Inner::Write(_) => Err(PbgzfError::Usage("EOF marker check on a write-mode stream")),
            Inner::Closed => Err(PbgzfError::Usage("stream is closed")),
        }
    }

    /// Joins every pipeline thread. Write mode drains pending data and
    /// appends the end-of-file marker first.
    ///
    /// A file opened by [`open`](Self::open) is closed here and `None` is
    /// returned. A source or sink passed to [`from_reader`](Self::from_reader)
    /// or [`from_writer`](Self::from_writer) stays open and is handed back.
    pub fn close(&mut self) -> Result<Option<Released>> {
        let released = match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Read(reader) => Released::Source(reader.close()?),
            Inner::Write(writer) => Released::Sink(writer.close()?),
            Inner::Closed => return Err(PbgzfError::Usage("stream is already closed")),
        };
        Ok((!self.owns_endpoint).then_some(released))
    }
}

impl Read for BgzfStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BgzfStream::read(self, buf).map_err(io::Error::from)
    }
}

impl Write for BgzfStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BgzfStream::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        BgzfStream::flush(self).map_err(io::Error::from)
    }
}
