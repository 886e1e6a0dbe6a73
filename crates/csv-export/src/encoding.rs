use crate::error::ExportError;
use encoding_rs::{Encoder, EncoderResult, Encoding, REPLACEMENT, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use model::options::format::{FileEncoding, FormatOptions};
use std::io::{self, Write};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16BE_BOM: &[u8] = b"\xFE\xFF";

/// Byte encoding of a written CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Ascii,
    /// Any other WHATWG encoding.
    Legacy(&'static Encoding),
}

impl OutputEncoding {
    /// Resolves `file_encoding` (and `encoding_name` for [`FileEncoding::Other`]).
    pub fn resolve(options: &FormatOptions) -> Result<Self, ExportError> {
        match options.file_encoding {
            FileEncoding::Utf8 => Ok(OutputEncoding::Utf8),
            FileEncoding::Ansi => Ok(OutputEncoding::Legacy(WINDOWS_1252)),
            FileEncoding::Ascii => Ok(OutputEncoding::Ascii),
            FileEncoding::Unicode => Ok(OutputEncoding::Utf16Le),
            FileEncoding::Other => {
                let label = options.encoding_name.as_deref().unwrap_or_default();
                Self::from_label(label)
            }
        }
    }

    pub fn from_label(label: &str) -> Result<Self, ExportError> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("ascii") || label.eq_ignore_ascii_case("us-ascii") {
            return Ok(OutputEncoding::Ascii);
        }

        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) if encoding == UTF_8 => Ok(OutputEncoding::Utf8),
            Some(encoding) if encoding == UTF_16LE => Ok(OutputEncoding::Utf16Le),
            Some(encoding) if encoding == UTF_16BE => Ok(OutputEncoding::Utf16Be),
            Some(encoding) if encoding != REPLACEMENT => Ok(OutputEncoding::Legacy(encoding)),
            _ => Err(ExportError::UnsupportedEncoding(label.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => UTF_8.name(),
            OutputEncoding::Utf16Le => UTF_16LE.name(),
            OutputEncoding::Utf16Be => UTF_16BE.name(),
            OutputEncoding::Ascii => "US-ASCII",
            OutputEncoding::Legacy(encoding) => encoding.name(),
        }
    }

    /// Byte order mark written ahead of the first record. Only Unicode
    /// encodings carry one.
    pub fn preamble(&self, enable_bom: bool) -> &'static [u8] {
        match self {
            OutputEncoding::Utf8 if enable_bom => UTF8_BOM,
            OutputEncoding::Utf16Le if enable_bom => UTF16LE_BOM,
            OutputEncoding::Utf16Be if enable_bom => UTF16BE_BOM,
            _ => &[],
        }
    }
}

enum Target {
    Passthrough,
    Utf16 { big_endian: bool },
    Ascii,
    Legacy(Encoder),
}

/// Re-encodes the UTF-8 written into it before passing it on.
///
/// Characters the target cannot represent are written as `?`. A character
/// split across two writes is held back until its remaining bytes arrive.
pub struct EncodingWriter<W: Write> {
    inner: W,
    target: Target,
    pending: Vec<u8>,
    encoded: Vec<u8>,
}

impl<W: Write> EncodingWriter<W> {
    pub fn new(inner: W, encoding: OutputEncoding) -> Self {
        let target = match encoding {
            OutputEncoding::Utf8 => Target::Passthrough,
            OutputEncoding::Utf16Le => Target::Utf16 { big_endian: false },
            OutputEncoding::Utf16Be => Target::Utf16 { big_endian: true },
            OutputEncoding::Ascii => Target::Ascii,
            OutputEncoding::Legacy(encoding) => Target::Legacy(encoding.new_encoder()),
        };

        EncodingWriter {
            inner,
            target,
            pending: Vec::new(),
            encoded: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Ends the encoder state and returns the sink. Fails on a dangling
    /// partial character.
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "output ends inside a UTF-8 sequence",
            ));
        }
        if let Target::Legacy(encoder) = &mut self.target {
            self.encoded.clear();
            encode_legacy(encoder, "", &mut self.encoded, true);
            self.inner.write_all(&self.encoded)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let EncodingWriter {
            inner,
            target,
            pending,
            encoded,
        } = self;

        if matches!(target, Target::Passthrough) {
            return inner.write(buf);
        }

        pending.extend_from_slice(buf);
        let complete = match std::str::from_utf8(&pending[..]) {
            Ok(text) => Ok(text.len()),
            Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
            Err(e) => Err(e),
        };
        let complete = match complete {
            Ok(complete) => complete,
            Err(e) => {
                pending.clear();
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };
        let text = std::str::from_utf8(&pending[..complete])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        encoded.clear();
        match target {
            Target::Passthrough => encoded.extend_from_slice(text.as_bytes()),
            Target::Utf16 { big_endian } => {
                for unit in text.encode_utf16() {
                    let bytes = if *big_endian {
                        unit.to_be_bytes()
                    } else {
                        unit.to_le_bytes()
                    };
                    encoded.extend_from_slice(&bytes);
                }
            }
            Target::Ascii => encoded.extend(
                text.chars()
                    .map(|c| if c.is_ascii() { c as u8 } else { b'?' }),
            ),
            Target::Legacy(encoder) => encode_legacy(encoder, text, encoded, false),
        }

        inner.write_all(&encoded[..])?;
        pending.drain(..complete);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn encode_legacy(encoder: &mut Encoder, mut text: &str, out: &mut Vec<u8>, last: bool) {
    let mut buf = [0u8; 1024];
    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(text, &mut buf, last);
        out.extend_from_slice(&buf[..written]);
        text = &text[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
}
