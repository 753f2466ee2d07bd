//! ER7 syntax: encoding characters and escape sequences
//!
//! The field separator is the character right after `MSH`; the next four
//! characters of MSH-2 are the component, repetition, escape, and
//! subcomponent separators.

/// Default ER7 separators (`MSH|^~\&`)
pub const DEFAULT_FIELD_SEPARATOR: char = '|';
pub const DEFAULT_COMPONENT_SEPARATOR: char = '^';
pub const DEFAULT_REPETITION_SEPARATOR: char = '~';
pub const DEFAULT_ESCAPE_CHARACTER: char = '\\';
pub const DEFAULT_SUBCOMPONENT_SEPARATOR: char = '&';

/// Segment terminator written by the serializer
pub const SEGMENT_TERMINATOR: char = '\r';

/// Separators used for encoding and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingCharacters {
    /// Field separator (default '|')
    pub field: char,
    /// Component separator (default '^')
    pub component: char,
    /// Repetition separator (default '~')
    pub repetition: char,
    /// Escape character (default '\')
    pub escape: char,
    /// Subcomponent separator (default '&')
    pub subcomponent: char,
}

impl Default for EncodingCharacters {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD_SEPARATOR,
            component: DEFAULT_COMPONENT_SEPARATOR,
            repetition: DEFAULT_REPETITION_SEPARATOR,
            escape: DEFAULT_ESCAPE_CHARACTER,
            subcomponent: DEFAULT_SUBCOMPONENT_SEPARATOR,
        }
    }
}

impl EncodingCharacters {
    /// Build from an MSH-1 value and an MSH-2 value
    pub fn from_fields(field: &str, encoding: &str) -> Option<Self> {
        let mut field_chars = field.chars();
        let field = field_chars.next()?;
        if field_chars.next().is_some() {
            return None;
        }

        let chars: Vec<char> = encoding.chars().collect();
        if chars.len() != 4 {
            return None;
        }
        let candidate = Self {
            field,
            component: chars[0],
            repetition: chars[1],
            escape: chars[2],
            subcomponent: chars[3],
        };
        candidate.is_distinct().then_some(candidate)
    }

    /// Read the separators from the start of an MSH segment
    ///
    /// Format: `MSH|^~\&|...`
    /// Positions: `0123456789`
    pub fn from_msh(segment: &str) -> Option<Self> {
        let rest = segment.strip_prefix("MSH")?;
        let field = rest.chars().next()?;
        let after = &rest[field.len_utf8()..];
        let encoding = after.split(field).next()?;
        Self::from_fields(&rest[..field.len_utf8()], encoding)
    }

    /// The MSH-2 value for these separators
    pub fn to_msh_field2(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    /// Check if a character is a delimiter (needs escaping)
    pub fn is_special(&self, c: char) -> bool {
        c == self.field
            || c == self.component
            || c == self.repetition
            || c == self.escape
            || c == self.subcomponent
    }

    /// Replace delimiters in `text` with `\F\`, `\S\`, `\T\`, `\R\`, `\E\`
    pub fn escape(&self, text: &str) -> String {
        if !text.chars().any(|c| self.is_special(c)) {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            let code = if c == self.field {
                'F'
            } else if c == self.component {
                'S'
            } else if c == self.subcomponent {
                'T'
            } else if c == self.repetition {
                'R'
            } else if c == self.escape {
                'E'
            } else {
                out.push(c);
                continue;
            };
            out.push(self.escape);
            out.push(code);
            out.push(self.escape);
        }
        out
    }

    /// Decode escape sequences; unknown or unterminated sequences stay verbatim
    pub fn unescape(&self, text: &str) -> String {
        if !text.contains(self.escape) {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(self.escape) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.escape.len_utf8()..];
            let Some(end) = after.find(self.escape) else {
                out.push_str(&rest[start..]);
                return out;
            };

            let decoded = match &after[..end] {
                "F" => Some(self.field),
                "S" => Some(self.component),
                "T" => Some(self.subcomponent),
                "R" => Some(self.repetition),
                "E" => Some(self.escape),
                _ => None,
            };
            match decoded {
                Some(c) => {
                    out.push(c);
                    rest = &after[end + self.escape.len_utf8()..];
                }
                None => {
                    // Keep the opening escape and rescan from the closing one
                    out.push(self.escape);
                    out.push_str(&after[..end]);
                    rest = &after[end..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn is_distinct(&self) -> bool {
        let all = [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ];
        all.iter()
            .enumerate()
            .all(|(i, c)| !all[i + 1..].contains(c) && !c.is_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_encoding_characters() {
        let enc = EncodingCharacters::default();
        assert_eq!(enc.field, '|');
        assert_eq!(enc.to_msh_field2(), "^~\\&");
    }

    #[test]
    fn test_from_msh() {
        let enc = EncodingCharacters::from_msh("MSH#$*!@#APP#FAC").unwrap();
        assert_eq!(enc.field, '#');
        assert_eq!(enc.component, '$');
        assert_eq!(enc.repetition, '*');
        assert_eq!(enc.escape, '!');
        assert_eq!(enc.subcomponent, '@');

        assert_eq!(
            EncodingCharacters::from_msh("MSH|^~\\&|SENDER"),
            Some(EncodingCharacters::default())
        );
    }

    #[test]
    fn test_from_msh_rejects_bad_headers() {
        assert!(EncodingCharacters::from_msh("PID|1").is_none());
        assert!(EncodingCharacters::from_msh("MSH|^~|").is_none());
        assert!(EncodingCharacters::from_msh("MSH|^^\\&|").is_none());
        assert!(EncodingCharacters::from_msh("MSH").is_none());
    }

    #[test]
    fn test_escape_all_delimiters() {
        let enc = EncodingCharacters::default();
        assert_eq!(enc.escape("plain"), "plain");
        assert_eq!(enc.escape("a|b^c&d~e\\f"), "a\\F\\b\\S\\c\\T\\d\\R\\e\\E\\f");
    }

    #[test]
    fn test_unescape_inverts_escape() {
        let enc = EncodingCharacters::default();
        let original = "Fish & Chips ^ 100% | ~tilde~ \\back\\";
        assert_eq!(enc.unescape(&enc.escape(original)), original);
    }

    #[test]
    fn test_unescape_leaves_unknown_sequences() {
        let enc = EncodingCharacters::default();
        assert_eq!(enc.unescape("\\H\\bold\\N\\"), "\\H\\bold\\N\\");
        assert_eq!(enc.unescape("dangling \\F"), "dangling \\F");
        assert_eq!(enc.unescape("\\X0D\\\\F\\"), "\\X0D\\|");
    }
}
