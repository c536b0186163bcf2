//! RFC 5322 header handling: byte decoding, unfolding, and RFC 2047
//! encoded-words in display names.
//!
//! Display-name decoding runs an ordered chain of [`NameDecoder`]s. The last
//! one is total, so [`decode_display_name`] always returns something usable.

use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use tracing::{debug, warn};

/// Base64 engine for `B` encoded-words: plenty of mailers drop the padding.
const B64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Unfolded headers of one message, in file order.
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    headers: Vec<(String, String)>,
}

impl MessageHeaders {
    /// Decode and unfold a raw header block.
    pub fn from_bytes(raw_headers: &[u8]) -> Self {
        let text = decode_header_bytes(raw_headers);
        Self {
            headers: unfold_headers(&text),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a header name, in order (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // mbox "From " lines and other garbage are skipped
    }

    result
}

// ── Display-name decoding ───────────────────────────────────────

/// One way of turning a raw display name into text.
///
/// Returns `None` to hand over to the next decoder in the chain.
pub trait NameDecoder {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn decode(&self, raw: &str) -> Option<String>;
}

/// Built-in RFC 2047 decoder that gives up on the first bad encoded-word.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictDecoder;

/// `mail-parser`'s own unstructured-header decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MailParserDecoder;

/// Built-in decoder that leaves undecodable encoded-words as raw text.
/// Never returns `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientDecoder;

impl NameDecoder for StrictDecoder {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn decode(&self, raw: &str) -> Option<String> {
        decode_words(raw, true)
    }
}

impl NameDecoder for MailParserDecoder {
    fn name(&self) -> &'static str {
        "mail-parser"
    }

    fn decode(&self, raw: &str) -> Option<String> {
        use mail_parser::MessageParser;

        // Wrap the text in a minimal message so mail-parser decodes it as a subject.
        let fake_msg = format!("Subject: {raw}\r\n\r\n");
        let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
        let subject = parsed.subject()?;
        if subject.contains("=?") {
            return None;
        }
        Some(subject.to_string())
    }
}

impl NameDecoder for LenientDecoder {
    fn name(&self) -> &'static str {
        "lenient"
    }

    fn decode(&self, raw: &str) -> Option<String> {
        decode_words(raw, false)
    }
}

/// Decoders tried in order by [`decode_display_name`].
pub const DECODER_CHAIN: [&dyn NameDecoder; 3] = [&StrictDecoder, &MailParserDecoder, &LenientDecoder];

/// Decode a raw display name into clean, single-line text.
///
/// Example: `"=?UTF-8?Q?Jos=C3=A9?= Garc=?ISO-8859-1?Q?=EDa?="` → `"José García"`
///
/// Input without encoded-words is returned as-is (apart from whitespace
/// and control-character cleanup).
pub fn decode_display_name(raw: &str) -> String {
    if !raw.contains("=?") {
        return sanitize_text(raw);
    }
    for decoder in DECODER_CHAIN {
        match decoder.decode(raw) {
            Some(text) => return sanitize_text(&text),
            None => debug!(decoder = decoder.name(), input = raw, "Decoder gave up"),
        }
    }
    sanitize_text(raw)
}

/// Remove control characters and collapse whitespace runs to one space.
pub fn sanitize_text(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode every encoded-word in `input`.
///
/// With `strict`, any encoded-word that cannot be decoded makes the whole
/// call return `None`; otherwise such words are kept verbatim.
fn decode_words(input: &str, strict: bool) -> Option<String> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        let Some(word) = split_word(after_start) else {
            // Not an encoded-word at all, just text that happens to contain "=?".
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
            continue;
        };

        match decode_word(&word, strict) {
            Some(text) => {
                result.push_str(&text);
                last_was_encoded = true;
            }
            None if strict => return None,
            None => {
                warn!(charset = word.charset, "Keeping undecodable encoded-word as-is");
                result.push_str(&remaining[start..start + 2 + word.consumed]);
                last_was_encoded = false;
            }
        }
        remaining = &after_start[word.consumed..];
    }

    result.push_str(remaining);
    Some(result)
}

/// The pieces of one `charset?encoding?text?=` run.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn split_word(s: &str) -> Option<EncodedWord<'_>> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let text = &rest2[..end];
    if text.contains(char::is_whitespace) {
        return None;
    }

    Some(EncodedWord {
        charset,
        encoding,
        text,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

fn decode_word(word: &EncodedWord<'_>, strict: bool) -> Option<String> {
    let bytes = match word.encoding {
        "B" | "b" => B64.decode(word.text).ok()?,
        "Q" | "q" => decode_q_encoding(word.text, strict)?,
        _ => return None,
    };
    decode_charset(word.charset, &bytes, strict)
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
///
/// A malformed `=` escape fails in strict mode and is kept literally otherwise.
fn decode_q_encoding(input: &str, strict: bool) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None if strict => return None,
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    Some(result)
}

/// Decode bytes using a named charset (RFC 2231 language suffixes are ignored).
fn decode_charset(charset: &str, bytes: &[u8], strict: bool) -> Option<String> {
    let charset = charset.split('*').next().unwrap_or(charset);
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        return if strict {
            String::from_utf8(bytes.to_vec()).ok()
        } else {
            Some(String::from_utf8_lossy(bytes).into_owned())
        };
    }
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())?;
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if strict && had_errors {
        return None;
    }
    Some(decoded.into_owned())
}
