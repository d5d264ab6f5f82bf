//! A `Write` adapter that counts bytes as they pass through.
//!
//! READDIR and READDIRPLUS replies are budgeted in bytes, not entries, so
//! their encoders need to know how much has already gone out before
//! committing the next entry.

use std::io::Write;

pub struct WriteCounter<W> {
    inner: W,
    count: usize,
}

impl<W: Write> WriteCounter<W> {
    pub fn new(inner: W) -> WriteCounter<W> {
        WriteCounter { inner, count: 0 }
    }

    pub fn bytes_written(&self) -> usize {
        self.count
    }
}

impl<W: Write> Write for WriteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_across_writes() {
        let mut sink = Vec::new();
        let mut counter = WriteCounter::new(&mut sink);
        counter.write_all(b"abc").unwrap();
        counter.write_all(b"defg").unwrap();
        assert_eq!(counter.bytes_written(), 7);
        assert_eq!(sink, b"abcdefg");
    }
}
