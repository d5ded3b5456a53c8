use std::io;

const CRLF: [u8; 2] = [b'\r', b'\n'];
const LF: [u8; 1] = [b'\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreak {
    Crlf,
    Lf,
}

impl AsRef<[u8]> for LineBreak {
    fn as_ref(&self) -> &[u8] {
        match self {
            LineBreak::Crlf => &CRLF[..],
            LineBreak::Lf => &LF[..],
        }
    }
}

/// A `Write` implementation that splits any written bytes into lines of
/// `N` bytes.
///
/// [`LineWriter::finish`] terminates a trailing partial line, so the
/// output never ends in an empty line.
#[derive(Debug)]
pub struct LineWriter<'a, W: io::Write, const N: usize> {
    line_break: LineBreak,
    w: &'a mut W,
    /// Bytes written to the current line.
    column: usize,
}

impl<'a, W: io::Write, const N: usize> LineWriter<'a, W, N> {
    pub fn new(w: &'a mut W, line_break: LineBreak) -> Self {
        LineWriter {
            line_break,
            w,
            column: 0,
        }
    }

    /// Ends the current line, if it holds any data.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.column > 0 {
            self.w.write_all(self.line_break.as_ref())?;
            self.column = 0;
        }
        self.w.flush()
    }
}

impl<W: io::Write, const N: usize> io::Write for LineWriter<'_, W, N> {
    fn write(&mut self, mut input: &[u8]) -> io::Result<usize> {
        let written = input.len();

        while !input.is_empty() {
            if self.column == N {
                self.w.write_all(self.line_break.as_ref())?;
                self.column = 0;
            }

            let n = (N - self.column).min(input.len());
            self.w.write_all(&input[..n])?;
            self.column += n;
            input = &input[n..];
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}
