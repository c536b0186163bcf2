//! Address-list splitting (RFC 5322 §3.4) and address-spec parsing.
//!
//! The splitter is a single forward pass over the header value that tracks
//! quoting and nesting, so commas inside `"Last, First"`, `<…>` or `(…)` are
//! never treated as separators. It never fails: unbalanced brackets simply
//! saturate at depth zero.

use crate::model::address::{find_email, is_email, ParsedAddress};

/// Scanner state while walking an address list.
#[derive(Debug, Default, Clone, Copy)]
struct ScanState {
    in_quote: bool,
    angle_depth: u32,
    paren_depth: u32,
    escape_next: bool,
}

impl ScanState {
    /// Feed one character. Returns `true` if it is a top-level separator.
    fn feed(&mut self, ch: char) -> bool {
        if self.escape_next {
            self.escape_next = false;
            return false;
        }
        match ch {
            '\\' if self.in_quote => self.escape_next = true,
            '"' => self.in_quote = !self.in_quote,
            '<' if !self.in_quote => self.angle_depth += 1,
            '>' if !self.in_quote => self.angle_depth = self.angle_depth.saturating_sub(1),
            '(' if !self.in_quote => self.paren_depth += 1,
            ')' if !self.in_quote => self.paren_depth = self.paren_depth.saturating_sub(1),
            ',' => return !self.in_quote && self.angle_depth == 0 && self.paren_depth == 0,
            _ => {}
        }
        false
    }
}

/// Lazy iterator over the address-specs of one unfolded header value.
///
/// Yields trimmed, non-empty slices of the input. The iterator is `Clone`,
/// so a scan can be replayed from any point.
///
/// A top-level segment without any `@` is an unquoted display-name fragment
/// (`Doe, John <a@b.com>` as written by some clients); it is joined with the
/// segments that follow until one of them carries an address.
#[derive(Debug, Clone)]
pub struct AddressList<'a> {
    input: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> AddressList<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            done: false,
        }
    }

    /// Byte range of the next raw top-level segment.
    fn next_segment(&mut self) -> Option<(usize, usize)> {
        if self.done {
            return None;
        }
        let start = self.pos;
        let mut state = ScanState::default();
        for (i, ch) in self.input[start..].char_indices() {
            if state.feed(ch) {
                self.pos = start + i + 1;
                return Some((start, start + i));
            }
        }
        self.done = true;
        self.pos = self.input.len();
        Some((start, self.input.len()))
    }
}

impl<'a> Iterator for AddressList<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let (start, mut end) = self.next_segment()?;
            if self.input[start..end].trim().is_empty() {
                continue;
            }
            while !self.input[start..end].contains('@') {
                match self.next_segment() {
                    Some((_, next_end)) => end = next_end,
                    None => break,
                }
            }
            let spec = self.input[start..end].trim();
            if !spec.is_empty() {
                return Some(spec);
            }
        }
    }
}

/// Extract the email and raw display name from one address-spec.
///
/// Supported forms:
/// - `"Display Name <user@domain.com>"`
/// - `"\"Last, First\" <user@domain.com>"`
/// - `"<user@domain.com>"`
/// - `"user@domain.com"` or any text containing one email token
///
/// Returns `None` when no email can be found; the spec is then skipped.
pub fn parse_spec(spec: &str) -> Option<ParsedAddress> {
    let spec = spec.trim();
    if let Some(lt) = spec.find('<') {
        if let Some(len) = spec[lt + 1..].find('>') {
            let inner = spec[lt + 1..lt + 1 + len].trim();
            if is_email(inner) {
                let name = unquote(&spec[..lt]);
                return ParsedAddress::new(inner, &name);
            }
        }
    }
    find_email(spec).and_then(|email| ParsedAddress::new(email, ""))
}

/// Split and parse a whole address-list header value.
///
/// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
pub fn parse_address_list(raw: &str) -> Vec<ParsedAddress> {
    AddressList::new(raw).filter_map(parse_spec).collect()
}

/// Trim, then strip one pair of enclosing double quotes and resolve the
/// backslash escapes inside them.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return trimmed.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(raw: &str) -> Vec<&str> {
        AddressList::new(raw).collect()
    }

    #[test]
    fn test_split_unquoted_last_first_and_quoted_comma() {
        let specs = split("Doe, John <a@b.com>, \"Smith, Jane\" <c@d.com>");
        assert_eq!(specs, vec!["Doe, John <a@b.com>", "\"Smith, Jane\" <c@d.com>"]);
    }

    #[test]
    fn test_split_simple_list() {
        let specs = split("User One <a@b.com>, User Two <c@d.com>, plain@addr.com");
        assert_eq!(
            specs,
            vec!["User One <a@b.com>", "User Two <c@d.com>", "plain@addr.com"]
        );
    }

    #[test]
    fn test_split_ignores_commas_in_comments_and_angles() {
        let specs = split("jane@x.org (Doe, Jane), <odd,one@y.org>, last@z.org");
        assert_eq!(
            specs,
            vec!["jane@x.org (Doe, Jane)", "<odd,one@y.org>", "last@z.org"]
        );
    }

    #[test]
    fn test_split_escaped_quote_inside_quotes() {
        let specs = split(r#""Say \"hi, there\"" <a@b.com>, c@d.com"#);
        assert_eq!(specs, vec![r#""Say \"hi, there\"" <a@b.com>"#, "c@d.com"]);
    }

    #[test]
    fn test_split_skips_empty_segments() {
        assert_eq!(split(" , a@b.com,, ,c@d.com, "), vec!["a@b.com", "c@d.com"]);
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
    }

    #[test]
    fn test_split_unbalanced_never_fails() {
        let specs = split("broken <a@b.com, c@d.com>>, e@f.com");
        assert_eq!(specs, vec!["broken <a@b.com, c@d.com>>", "e@f.com"]);
        let specs = split("x@y.com>, (a@b.com");
        assert_eq!(specs, vec!["x@y.com>", "(a@b.com"]);
    }

    #[test]
    fn test_split_trailing_fragment_is_emitted() {
        assert_eq!(split("a@b.com, undisclosed"), vec!["a@b.com", "undisclosed"]);
    }

    #[test]
    fn test_split_is_restartable() {
        let list = AddressList::new("a@b.com, c@d.com");
        let first: Vec<_> = list.clone().collect();
        let second: Vec<_> = list.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = parse_spec("User One <user1@example.com>").unwrap();
        assert_eq!(addr.email, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = parse_spec("\"Last, First\" < user@example.com >").unwrap();
        assert_eq!(addr.email, "user@example.com");
        assert_eq!(addr.display_name, "Last, First");
    }

    #[test]
    fn test_parse_quoted_name_with_escapes() {
        let addr = parse_spec(r#""Jane \"JD\" Doe" <jd@example.com>"#).unwrap();
        assert_eq!(addr.display_name, "Jane \"JD\" Doe");
    }

    #[test]
    fn test_parse_unquoted_last_first() {
        let addr = parse_spec("Doe, John <a@b.com>").unwrap();
        assert_eq!(addr.display_name, "Doe, John");
        assert_eq!(addr.email, "a@b.com");
    }

    #[test]
    fn test_parse_angle_only() {
        let addr = parse_spec("<user@example.com>").unwrap();
        assert_eq!(addr.email, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = parse_spec("user@example.com").unwrap();
        assert_eq!(addr.email, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_bare_address_with_comment() {
        let addr = parse_spec("jane@x.org (Doe, Jane)").unwrap();
        assert_eq!(addr.email, "jane@x.org");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_invalid_bracket_falls_back_to_scan() {
        let addr = parse_spec("Team <team> team@example.com").unwrap();
        assert_eq!(addr.email, "team@example.com");
    }

    #[test]
    fn test_parse_no_email_is_skipped() {
        assert!(parse_spec("undisclosed-recipients:;").is_none());
        assert!(parse_spec("Just A Name").is_none());
        assert!(parse_spec("<>").is_none());
    }

    #[test]
    fn test_parse_address_list() {
        let list = parse_address_list("\"Last, First\" <a@b.com>, nobody, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[1].email, "other@c.com");
    }
}
