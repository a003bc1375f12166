//! A subset of RFC 4515 LDAP search filters.
//!
//! Supported: `(&…)`, `(|…)`, `(!…)`, `(a=v)`, `(a~=v)`, `(a=*)`, substring
//! patterns with `*`, `(a>=v)` and `(a<=v)`. Values may carry `\XX` hex escapes.
//! Attribute names and values compare case-insensitively, the way Active
//! Directory treats its string syntaxes. A filter without surrounding
//! parentheses (`objectClass=user`) is accepted as a single item.

use std::cmp::Ordering;
use std::fmt;

use crate::error::DirectoryError;

/// Read access to an entry's attribute values, for filter evaluation.
pub trait Attributes {
    /// All values of `attribute` (name matched case-insensitively).
    fn values(&self, attribute: &str) -> Vec<&str>;
}

/// Parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal {
        attribute: String,
        value: String,
    },
    Approx {
        attribute: String,
        value: String,
    },
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
    Present {
        attribute: String,
    },
    GreaterOrEqual {
        attribute: String,
        value: String,
    },
    LessOrEqual {
        attribute: String,
        value: String,
    },
}

impl Filter {
    /// Parse a filter string; errors are [`DirectoryError::InvalidFilter`].
    pub fn parse(input: &str) -> Result<Self, DirectoryError> {
        let trimmed = input.trim();
        let wrapped;
        let source = if trimmed.starts_with('(') {
            trimmed
        } else {
            wrapped = format!("({trimmed})");
            wrapped.as_str()
        };
        let mut parser = Parser {
            chars: source.chars().collect(),
            pos: 0,
        };
        let filter = parser
            .filter()
            .map_err(|reason| invalid(input, reason))?;
        if parser.pos != parser.chars.len() {
            return Err(invalid(
                input,
                format!("unexpected trailing input at offset {}", parser.pos),
            ));
        }
        Ok(filter)
    }

    /// Evaluate against one entry.
    pub fn matches(&self, entry: &dyn Attributes) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Equal { attribute, value } | Filter::Approx { attribute, value } => {
                let wanted = value.to_lowercase();
                entry
                    .values(attribute)
                    .iter()
                    .any(|v| v.to_lowercase() == wanted)
            }
            Filter::Present { attribute } => !entry.values(attribute).is_empty(),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => entry
                .values(attribute)
                .iter()
                .any(|v| substring_matches(v, initial.as_deref(), any, last.as_deref())),
            Filter::GreaterOrEqual { attribute, value } => entry
                .values(attribute)
                .iter()
                .any(|v| compare(v, value) != Ordering::Less),
            Filter::LessOrEqual { attribute, value } => entry
                .values(attribute)
                .iter()
                .any(|v| compare(v, value) != Ordering::Greater),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) => {
                write!(f, "(&")?;
                for inner in filters {
                    write!(f, "{inner}")?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for inner in filters {
                    write!(f, "{inner}")?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{inner})"),
            Filter::Equal { attribute, value } => {
                write!(f, "({attribute}={})", escape_value(value))
            }
            Filter::Approx { attribute, value } => {
                write!(f, "({attribute}~={})", escape_value(value))
            }
            Filter::Present { attribute } => write!(f, "({attribute}=*)"),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => {
                write!(f, "({attribute}=")?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape_value(initial))?;
                }
                write!(f, "*")?;
                for part in any {
                    write!(f, "{}*", escape_value(part))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape_value(last))?;
                }
                write!(f, ")")
            }
            Filter::GreaterOrEqual { attribute, value } => {
                write!(f, "({attribute}>={})", escape_value(value))
            }
            Filter::LessOrEqual { attribute, value } => {
                write!(f, "({attribute}<={})", escape_value(value))
            }
        }
    }
}

/// Escape special characters in filter values (RFC 4515).
pub fn escape_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

fn invalid(filter: &str, reason: impl Into<String>) -> DirectoryError {
    DirectoryError::InvalidFilter {
        filter: filter.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, wanted: char) -> Result<(), String> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(format!(
                "expected '{wanted}' at offset {}, found '{c}'",
                self.pos
            )),
            None => Err(format!("expected '{wanted}', found end of input")),
        }
    }

    fn filter(&mut self) -> Result<Filter, String> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err("unexpected end of input".to_string()),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, String> {
        let mut filters = Vec::new();
        while self.peek() == Some('(') {
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            return Err(format!("empty filter list at offset {}", self.pos));
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '>' | '<' | '~' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attribute: String = self.chars[start..self.pos].iter().collect::<String>();
        let attribute = attribute.trim().to_string();
        if attribute.is_empty() {
            return Err(format!("missing attribute name at offset {start}"));
        }

        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                '='
            }
            Some(c @ ('>' | '<' | '~')) => {
                self.pos += 1;
                self.expect('=')?;
                c
            }
            _ => return Err(format!("missing operator after '{attribute}'")),
        };

        let value_start = self.pos;
        while let Some(c) = self.peek() {
            if c == ')' {
                break;
            }
            if c == '(' {
                return Err(format!("unescaped '(' in value at offset {}", self.pos));
            }
            self.pos += 1;
        }
        let raw: String = self.chars[value_start..self.pos].iter().collect();

        match op {
            '=' if raw == "*" => Ok(Filter::Present { attribute }),
            '=' if raw.contains('*') => {
                let mut parts: Vec<String> = raw
                    .split('*')
                    .map(unescape)
                    .collect::<Result<_, _>>()?;
                let last = parts.pop().filter(|p| !p.is_empty());
                let initial = if parts.is_empty() {
                    None
                } else {
                    Some(parts.remove(0)).filter(|p| !p.is_empty())
                };
                let any = parts.into_iter().filter(|p| !p.is_empty()).collect();
                Ok(Filter::Substring {
                    attribute,
                    initial,
                    any,
                    last,
                })
            }
            '=' => Ok(Filter::Equal {
                attribute,
                value: unescape(&raw)?,
            }),
            '~' => Ok(Filter::Approx {
                attribute,
                value: unescape(&raw)?,
            }),
            '>' => Ok(Filter::GreaterOrEqual {
                attribute,
                value: unescape(&raw)?,
            }),
            _ => Ok(Filter::LessOrEqual {
                attribute,
                value: unescape(&raw)?,
            }),
        }
    }
}

/// Decode `\XX` hex escapes.
fn unescape(raw: &str) -> Result<String, String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| format!("invalid escape sequence in '{raw}'"))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| format!("escaped value in '{raw}' is not UTF-8"))
}

fn substring_matches(value: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    let value = value.to_lowercase();
    let mut rest = value.as_str();

    if let Some(initial) = initial {
        let initial = initial.to_lowercase();
        match rest.strip_prefix(initial.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for part in any {
        let part = part.to_lowercase();
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(last.to_lowercase().as_str()),
        None => true,
    }
}

/// Integers compare numerically; everything else case-insensitively.
fn compare(actual: &str, wanted: &str) -> Ordering {
    match (actual.trim().parse::<i64>(), wanted.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.to_lowercase().cmp(&wanted.to_lowercase()),
    }
}
