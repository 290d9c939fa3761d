use std::io::{self, Write};

/// Sink adapter that escapes XML markup characters on the fly.
///
/// Used to embed a complete XML fragment as the text of another element,
/// e.g. the `LastChange` event of UPnP AV. Only ASCII bytes are rewritten, so
/// a write boundary falling inside a multi-byte UTF-8 sequence is harmless.
pub struct EscapeWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> EscapeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Number of bytes emitted to the underlying sink.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EscapeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, b) in buf.iter().enumerate() {
            let replacement: &[u8] = match b {
                b'&' => b"&amp;",
                b'<' => b"&lt;",
                b'>' => b"&gt;",
                b'"' => b"&quot;",
                b'\'' => b"&apos;",
                _ => continue,
            };
            self.inner.write_all(&buf[start..i])?;
            self.inner.write_all(replacement)?;
            self.written += (i - start) + replacement.len();
            start = i + 1;
        }
        self.inner.write_all(&buf[start..])?;
        self.written += buf.len() - start;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_writer() {
        let mut out = Vec::new();
        let mut w = EscapeWriter::new(&mut out);
        w.write_all(b"<Volume val=\"5\"/>").unwrap();
        let n = w.written();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "&lt;Volume val=&quot;5&quot;/&gt;"
        );
        assert_eq!(n, 33);
    }

    #[test]
    fn test_escape_writer_split_writes() {
        let mut out = Vec::new();
        {
            let mut w = EscapeWriter::new(&mut out);
            w.write_all(b"a&").unwrap();
            w.write_all("é'".as_bytes()).unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "a&amp;é&apos;");
    }
}
