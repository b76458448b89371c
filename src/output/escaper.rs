use std::io;

///
/// Writer adaptor for text inside a DOT string literal: quotes and
/// backslashes get a backslash in front.
///
pub struct Escaper<W>
where
    W: io::Write,
{
    pub writer: W,
}


impl<W> Escaper<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Escaper {
            writer,
        }
    }
}


impl<W> io::Write for Escaper<W>
where
    W: io::Write
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        for &c in buf
        {
            if c == b'"' || c == b'\\'
            {
                self.writer.write_all(b"\\")?;
            }
            self.writer.write_all(&[c])?;
        }
        // every input byte was consumed
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.writer.flush()
    }
}
