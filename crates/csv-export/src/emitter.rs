use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use model::options::format::{FieldDelimiter, FormatOptions, LineBreak};
use std::io::{self, Write};

/// Buffered writer of delimiter-separated records.
///
/// Fields are written exactly as given; formatting and quoting are the
/// caller's job. Output is not flushed per record: call [`CsvEmitter::flush`]
/// or [`CsvEmitter::finish`] before treating it as written.
pub struct CsvEmitter<W: Write> {
    writer: Writer<W>,
    line_break: LineBreak,
}

impl<W: Write> CsvEmitter<W> {
    pub fn new(sink: W, delimiter: FieldDelimiter, line_break: LineBreak) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(delimiter_byte(delimiter))
            .terminator(terminator(line_break))
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .flexible(true)
            .from_writer(sink);

        CsvEmitter { writer, line_break }
    }

    pub fn from_options(sink: W, options: &FormatOptions) -> Self {
        Self::new(sink, options.field_delimiter, options.line_break)
    }

    /// Writes the fields joined by the delimiter, followed by the line break.
    pub fn write_record<I, S>(&mut self, fields: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut fields = fields.into_iter().peekable();
        let first = fields.next();

        // csv writes `""` for a record without content, even unquoted.
        if fields.peek().is_none() && first.as_ref().is_none_or(|f| f.as_ref().is_empty()) {
            self.writer.flush()?;
            return self
                .writer
                .get_mut()
                .write_all(self.line_break.as_str().as_bytes());
        }

        self.writer.write_record(first.into_iter().chain(fields))?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Flushes buffered output and returns the underlying sink.
    pub fn finish(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

fn delimiter_byte(delimiter: FieldDelimiter) -> u8 {
    match delimiter {
        FieldDelimiter::Comma => b',',
        FieldDelimiter::Semicolon => b';',
        FieldDelimiter::Pipe => b'|',
    }
}

fn terminator(line_break: LineBreak) -> Terminator {
    match line_break {
        LineBreak::Crlf => Terminator::CRLF,
        LineBreak::Lf => Terminator::Any(b'\n'),
        LineBreak::Cr => Terminator::Any(b'\r'),
    }
}
