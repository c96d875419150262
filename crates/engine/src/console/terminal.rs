use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

pub const MAX_HISTORY_LINES: usize = 64;

/// Line-oriented console over any reader/writer pair.
///
/// Reads one line per prompt and keeps a bounded history of submitted lines.
/// End of input is reported as `Ok(None)` so callers can wind down cleanly.
pub struct LineConsole<R, W> {
    reader: R,
    writer: W,
    history: VecDeque<String>,
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            history: VecDeque::new(),
        }
    }

    /// Writes `prompt` (without newline), then reads one line.
    pub fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.writer, "{prompt}")?;
        self.writer.flush()?;
        self.read_line()
    }

    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = String::new();
        if self.reader.read_line(&mut raw)? == 0 {
            return Ok(None);
        }

        let line = raw.trim_end_matches(['\n', '\r']).to_string();
        push_bounded(&mut self.history, line.clone(), MAX_HISTORY_LINES);
        Ok(Some(line))
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")
    }

    pub fn write_lines<I, S>(&mut self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            writeln!(self.writer, "{}", line.as_ref())?;
        }
        self.writer.flush()
    }

    pub fn write_raw(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

fn push_bounded(lines: &mut VecDeque<String>, line: String, max_len: usize) {
    if lines.len() == max_len {
        lines.pop_front();
    }
    lines.push_back(line);
}
