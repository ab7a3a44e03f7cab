//! Readable byte streams with peek/pushback and optional seeking.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::IngestError;

/// Small reads are served from a refill of this size.
const FILL_CHUNK: usize = 1024;

trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

enum Inner {
    Stream(Box<dyn Read + Send>),
    Seekable(Box<dyn SeekRead>),
}

/// A byte stream the pipeline reads from.
///
/// Bytes handed back with [`unread`](Self::unread) (or left over from a
/// [`peek`](Self::peek)) are served before anything else, so a classifier
/// can look ahead without disturbing what a decoder sees afterwards.
pub struct ByteSource {
    inner: Inner,
    pending: Vec<u8>,
    head: usize,
    pos: u64,
    path: Option<PathBuf>,
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("seekable", &self.is_seekable())
            .field("position", &self.pos)
            .field("pending", &self.pending_len())
            .field("path", &self.path)
            .finish()
    }
}

impl ByteSource {
    fn with_inner(inner: Inner) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            head: 0,
            pos: 0,
            path: None,
        }
    }

    /// Open a file. The source is seekable and remembers its path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut source = Self::with_inner(Inner::Seekable(Box::new(file)));
        source.path = Some(path.to_path_buf());
        Ok(source)
    }

    /// In-memory, seekable source.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::with_inner(Inner::Seekable(Box::new(Cursor::new(data.into()))))
    }

    /// Seekable source over any `Read + Seek`.
    pub fn from_seekable<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        Self::with_inner(Inner::Seekable(Box::new(reader)))
    }

    /// Forward-only source (pipes, sockets, filter output).
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::with_inner(Inner::Stream(Box::new(reader)))
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.inner, Inner::Seekable(_))
    }

    /// Path this source was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Logical read position: bytes consumed so far minus bytes pushed back.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before end of input, when the source can tell.
    ///
    /// Forward-only sources return `None`.
    pub fn remaining(&mut self) -> io::Result<Option<u64>> {
        let pending = self.pending_len() as u64;
        match &mut self.inner {
            Inner::Seekable(r) => {
                let here = r.stream_position()?;
                let end = r.seek(SeekFrom::End(0))?;
                r.seek(SeekFrom::Start(here))?;
                Ok(Some(end.saturating_sub(here) + pending))
            }
            Inner::Stream(_) => Ok(None),
        }
    }

    fn pending_len(&self) -> usize {
        self.pending.len() - self.head
    }

    /// Refill the (empty) pushback buffer with one read from the stream.
    fn fill(&mut self) -> io::Result<usize> {
        self.pending.clear();
        self.head = 0;
        self.pending.resize(FILL_CHUNK, 0);
        match read_inner(&mut self.inner, &mut self.pending) {
            Ok(n) => {
                self.pending.truncate(n);
                Ok(n)
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    /// Look at up to `n` upcoming bytes without consuming them.
    ///
    /// Returns fewer than `n` bytes only at end of stream.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.head > 0 {
            self.pending.drain(..self.head);
            self.head = 0;
        }
        let mut chunk = [0u8; 512];
        while self.pending.len() < n {
            let want = (n - self.pending.len()).min(chunk.len());
            let got = match read_inner(&mut self.inner, &mut chunk[..want]) {
                Ok(got) => got,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if got == 0 {
                break;
            }
            self.pending.extend_from_slice(&chunk[..got]);
        }
        let end = n.min(self.pending.len());
        Ok(&self.pending[..end])
    }

    /// Push bytes back so the next read returns them first.
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut restored = Vec::with_capacity(bytes.len() + self.pending_len());
        restored.extend_from_slice(bytes);
        restored.extend_from_slice(&self.pending[self.head..]);
        self.pending = restored;
        self.head = 0;
        self.pos = self.pos.saturating_sub(bytes.len() as u64);
    }

    /// Read one line including its `\n`, or at most `max` bytes.
    ///
    /// An empty result means end of stream.
    pub fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < max {
            if self.read(&mut byte)? == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(line)
    }

    /// Like [`read_line`](Self::read_line) but leaves the bytes in place.
    pub fn peek_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let line = self.read_line(max)?;
        self.unread(&line);
        Ok(line)
    }

    /// Advance `n` bytes: seeks when possible, reads and discards otherwise.
    pub fn skip(&mut self, n: u64) -> Result<(), IngestError> {
        let from_pending = (n as usize).min(self.pending_len());
        self.head += from_pending;
        self.pos += from_pending as u64;
        let rest = n - from_pending as u64;
        if rest == 0 {
            return Ok(());
        }
        match &mut self.inner {
            Inner::Seekable(r) => {
                let offset = i64::try_from(rest)
                    .map_err(|_| IngestError::InvalidData(format!("skip of {rest} bytes")))?;
                r.seek(SeekFrom::Current(offset))?;
            }
            Inner::Stream(r) => {
                let copied = io::copy(&mut r.take(rest), &mut io::sink())?;
                if copied < rest {
                    self.pos += copied;
                    return Err(IngestError::UnexpectedEof);
                }
            }
        }
        self.pos += rest;
        Ok(())
    }

    /// Move to an absolute logical position.
    ///
    /// Forward moves always work; backward moves need a seekable source.
    pub fn seek_to(&mut self, target: u64) -> Result<(), IngestError> {
        if target >= self.pos {
            return self.skip(target - self.pos);
        }
        let pending = self.pending_len() as u64;
        match &mut self.inner {
            Inner::Seekable(r) => {
                let underlying = self.pos + pending;
                let back = i64::try_from(underlying - target).map_err(|_| {
                    IngestError::InvalidData(format!("seek back to {target}"))
                })?;
                r.seek(SeekFrom::Current(-back))?;
                self.pending.clear();
                self.head = 0;
                self.pos = target;
                Ok(())
            }
            Inner::Stream(_) => Err(IngestError::UnsupportedVariant(format!(
                "cannot seek back from {} to {target} on a forward-only stream",
                self.pos
            ))),
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending_len() == 0 {
            if buf.len() >= FILL_CHUNK {
                let n = read_inner(&mut self.inner, buf)?;
                self.pos += n as u64;
                return Ok(n);
            }
            if self.fill()? == 0 {
                return Ok(0);
            }
        }
        let n = self.pending_len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.head..self.head + n]);
        self.head += n;
        if self.head == self.pending.len() {
            self.pending.clear();
            self.head = 0;
        }
        self.pos += n as u64;
        Ok(n)
    }
}

fn read_inner(inner: &mut Inner, buf: &mut [u8]) -> io::Result<usize> {
    match inner {
        Inner::Stream(r) => r.read(buf),
        Inner::Seekable(r) => r.read(buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut ByteSource) -> Vec<u8> {
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn remaining_counts_pushed_back_bytes() {
        let mut s = ByteSource::from_bytes(b"0123456789".to_vec());
        s.peek(4).unwrap();
        s.skip(3).unwrap();
        assert_eq!(s.remaining().unwrap(), Some(7));
        let mut b = [0u8; 2];
        s.read_exact(&mut b).unwrap();
        assert_eq!(&b, b"34");
        assert_eq!(s.remaining().unwrap(), Some(5));
        assert_eq!(ByteSource::from_reader(&b"abc"[..]).remaining().unwrap(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut s = ByteSource::from_reader(Cursor::new(b"hello world".to_vec()));
        assert_eq!(s.peek(5).unwrap(), b"hello");
        assert_eq!(s.position(), 0);
        assert_eq!(drain(&mut s), b"hello world");
    }

    #[test]
    fn peek_past_end_returns_short() {
        let mut s = ByteSource::from_bytes(b"ab".to_vec());
        assert_eq!(s.peek(10).unwrap(), b"ab");
        assert_eq!(drain(&mut s), b"ab");
    }

    #[test]
    fn unread_restores_bytes_and_position() {
        let mut s = ByteSource::from_reader(Cursor::new(b"P5\n1 1\n255\n".to_vec()));
        let line = s.read_line(80).unwrap();
        assert_eq!(line, b"P5\n");
        assert_eq!(s.position(), 3);
        s.unread(&line);
        assert_eq!(s.position(), 0);
        assert_eq!(drain(&mut s), b"P5\n1 1\n255\n");
    }

    #[test]
    fn read_line_is_bounded() {
        let mut s = ByteSource::from_bytes(b"abcdefgh".to_vec());
        assert_eq!(s.read_line(3).unwrap(), b"abc");
        assert_eq!(s.peek_line(80).unwrap(), b"defgh");
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn skip_forward_only_stream() {
        let mut s = ByteSource::from_reader(Cursor::new((0u8..100).collect::<Vec<_>>()));
        s.peek(4).unwrap();
        s.skip(10).unwrap();
        assert_eq!(s.position(), 10);
        let mut b = [0u8; 1];
        s.read_exact(&mut b).unwrap();
        assert_eq!(b[0], 10);
        assert!(matches!(s.skip(500), Err(IngestError::UnexpectedEof)));
    }

    #[test]
    fn seek_back_requires_seekable() {
        let mut s = ByteSource::from_reader(Cursor::new(vec![1u8; 16]));
        s.skip(8).unwrap();
        assert!(s.seek_to(2).is_err());

        let mut s = ByteSource::from_bytes((0u8..32).collect::<Vec<_>>());
        s.peek(20).unwrap();
        s.skip(12).unwrap();
        s.seek_to(4).unwrap();
        assert_eq!(s.position(), 4);
        let mut b = [0u8; 2];
        s.read_exact(&mut b).unwrap();
        assert_eq!(b, [4, 5]);
    }
}
