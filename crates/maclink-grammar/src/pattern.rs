//! Rule pattern language.
//!
//! ```text
//! open [the] (front | back) door
//! <lightaction> lights in [the] <room>
//! {room}
//! ```
//!
//! Words are matched literally, `[..]` is optional, `( a | b )` picks one
//! alternative, `<name>` references another rule and `{name}` references a
//! list whose items are set at runtime.

use std::fmt;
use std::str::FromStr;

/// Parsed rule pattern. Adjacent words are merged into one [`Pattern::Words`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Words(String),
    Rule(String),
    List(String),
    Optional(Box<Pattern>),
    Sequence(Vec<Pattern>),
    Alternatives(Vec<Pattern>),
}

/// Syntax error with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte {offset}")]
pub struct PatternError {
    pub offset: usize,
    pub kind: PatternErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternErrorKind {
    #[error("empty pattern")]
    Empty,
    #[error("unclosed '{0}'")]
    Unclosed(char),
    #[error("unexpected '{0}'")]
    UnexpectedClose(char),
    #[error("empty reference")]
    EmptyReference,
    #[error("empty alternative")]
    EmptyAlternative,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
}

/// Parse one rule pattern.
pub fn parse_pattern(src: &str) -> Result<Pattern, PatternError> {
    Parser { src, pos: 0 }.parse()
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pattern(s)
    }
}

impl Pattern {
    /// Names of every `<rule>` referenced, in order of appearance.
    pub fn rule_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let Pattern::Rule(name) = node {
                out.push(name.as_str());
            }
        });
        out
    }

    /// Names of every `{list}` referenced, in order of appearance.
    pub fn list_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.visit(&mut |node| {
            if let Pattern::List(name) = node {
                out.push(name.as_str());
            }
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Pattern)) {
        f(self);
        match self {
            Pattern::Optional(inner) => inner.visit(f),
            Pattern::Sequence(items) | Pattern::Alternatives(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Pattern::Words(_) | Pattern::Rule(_) | Pattern::List(_) => {}
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Words(words) => f.write_str(words),
            Pattern::Rule(name) => write!(f, "<{name}>"),
            Pattern::List(name) => write!(f, "{{{name}}}"),
            Pattern::Optional(inner) => write!(f, "[{inner}]"),
            Pattern::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Pattern::Alternatives(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '(' | ')' | '<' | '>' | '{' | '}' | '|')
}

/// An open group: its opening and closing characters and where it opened.
#[derive(Clone, Copy)]
struct Group {
    open: char,
    close: char,
    offset: usize,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<Pattern, PatternError> {
        self.skip_ws();
        if self.peek().is_none() {
            return Err(self.error(PatternErrorKind::Empty));
        }
        self.alternatives(None)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, kind: PatternErrorKind) -> PatternError {
        PatternError {
            offset: self.pos,
            kind,
        }
    }

    /// Parse `seq ('|' seq)*` up to, but not including, the group's close.
    fn alternatives(&mut self, group: Option<Group>) -> Result<Pattern, PatternError> {
        let mut alts = Vec::new();
        loop {
            let seq = self.sequence()?;
            self.skip_ws();
            let next = self.peek();
            let Some(seq) = seq else {
                return Err(match (next, group) {
                    (None, Some(group)) => PatternError {
                        offset: group.offset,
                        kind: PatternErrorKind::Unclosed(group.open),
                    },
                    _ => self.error(PatternErrorKind::EmptyAlternative),
                });
            };
            alts.push(seq);

            match next {
                Some('|') => {
                    self.bump();
                }
                Some(c) if group.is_some_and(|g| g.close == c) => break,
                Some(c) if matches!(c, ')' | ']') => {
                    return Err(self.error(PatternErrorKind::UnexpectedClose(c)));
                }
                Some(c) => return Err(self.error(PatternErrorKind::UnexpectedChar(c))),
                None => match group {
                    Some(group) => {
                        return Err(PatternError {
                            offset: group.offset,
                            kind: PatternErrorKind::Unclosed(group.open),
                        })
                    }
                    None => break,
                },
            }
        }

        Ok(if alts.len() == 1 {
            alts.remove(0)
        } else {
            Pattern::Alternatives(alts)
        })
    }

    /// Parse items until `|`, a closing bracket, or the end of input.
    fn sequence(&mut self) -> Result<Option<Pattern>, PatternError> {
        let mut items: Vec<Pattern> = Vec::new();
        loop {
            self.skip_ws();
            let item = match self.peek() {
                None | Some('|' | ')' | ']') => break,
                Some('[') => Pattern::Optional(Box::new(self.group('[', ']')?)),
                Some('(') => self.group('(', ')')?,
                Some('<') => Pattern::Rule(self.reference('<', '>')?),
                Some('{') => Pattern::List(self.reference('{', '}')?),
                Some(c) if is_special(c) => {
                    return Err(self.error(PatternErrorKind::UnexpectedChar(c)));
                }
                Some(_) => {
                    let word = self.word();
                    if let Some(Pattern::Words(prev)) = items.last_mut() {
                        prev.push(' ');
                        prev.push_str(word);
                        continue;
                    }
                    Pattern::Words(word.to_string())
                }
            };
            items.push(item);
        }

        Ok(match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Pattern::Sequence(items)),
        })
    }

    fn group(&mut self, open: char, close: char) -> Result<Pattern, PatternError> {
        let group = Group {
            open,
            close,
            offset: self.pos,
        };
        self.bump();
        let inner = self.alternatives(Some(group))?;
        self.bump();
        Ok(inner)
    }

    fn reference(&mut self, open: char, close: char) -> Result<String, PatternError> {
        let start = self.pos;
        self.bump();
        let name_start = self.pos;
        loop {
            match self.peek() {
                None => {
                    return Err(PatternError {
                        offset: start,
                        kind: PatternErrorKind::Unclosed(open),
                    })
                }
                Some(c) if c == close => break,
                Some(c) if c.is_whitespace() || is_special(c) => {
                    return Err(self.error(PatternErrorKind::UnexpectedChar(c)));
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let name = &self.src[name_start..self.pos];
        if name.is_empty() {
            return Err(PatternError {
                offset: start,
                kind: PatternErrorKind::EmptyReference,
            });
        }
        self.bump();
        Ok(name.to_string())
    }

    fn word(&mut self) -> &str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !is_special(c))
        {
            self.bump();
        }
        &self.src[start..self.pos]
    }
}
