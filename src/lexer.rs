use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("Unterminated string literal on line {line}")]
    UnterminatedString { line: usize },
    #[error("Indentation must be a multiple of two spaces on line {line}")]
    OddIndentation { line: usize },
    #[error("Invalid integer literal '{literal}' on line {line}")]
    InvalidIntegerLiteral { literal: String, line: usize },
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
}

pub type LexResult<T> = Result<T, LexerError>;

/// Tokenizes the whole input up front and exposes a cursor over the buffer.
///
/// Indentation is tracked in units of two spaces and surfaces as explicit
/// `Indent`/`Dedent` tokens. Blank lines (spaces only, or spaces followed by
/// a `#` comment) produce no tokens and leave the indentation level alone.
pub struct Lexer {
    tokens: Vec<Token>,
    current_index: usize,
}

impl Lexer {
    pub fn new(input: &str) -> LexResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            current_index: 0,
        })
    }

    /// The token the cursor is parked on. Starts at the first token.
    pub fn current(&self) -> &Token {
        &self.tokens[self.current_index]
    }

    /// Advance the cursor and return the new current token.
    ///
    /// Advancing past `Eof` is a no-op; the cursor stays on `Eof`.
    pub fn next_token(&mut self) -> &Token {
        if self.current_index + 1 < self.tokens.len() {
            self.current_index += 1;
        }
        self.current()
    }

    /// Assert that the current token equals `expected`, payload included.
    pub fn expect(&self, expected: &Token) -> LexResult<()> {
        if self.current() != expected {
            return Err(LexerError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.current().to_string(),
            });
        }
        Ok(())
    }

    /// Assert that the current token is an identifier and return its name.
    pub fn expect_id(&self) -> LexResult<&str> {
        match self.current() {
            Token::Id(name) => Ok(name),
            other => Err(LexerError::UnexpectedToken {
                expected: "Id".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Assert that the current token is a number literal and return its value.
    pub fn expect_number(&self) -> LexResult<i64> {
        match self.current() {
            Token::Number(value) => Ok(*value),
            other => Err(LexerError::UnexpectedToken {
                expected: "Number".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Advance, then assert the new current token equals `expected`.
    pub fn expect_next(&mut self, expected: &Token) -> LexResult<()> {
        self.next_token();
        self.expect(expected)
    }

    /// Advance, then assert the new current token is an identifier.
    pub fn expect_next_id(&mut self) -> LexResult<&str> {
        self.next_token();
        self.expect_id()
    }
}

/// A line is blank if it holds only spaces, optionally followed by a comment.
fn is_blank(line: &str) -> bool {
    for c in line.chars() {
        if c != ' ' {
            return c == '#';
        }
    }
    true
}

fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut indent = 0usize;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        if is_blank(line) {
            continue;
        }

        let spaces = line.chars().take_while(|c| *c == ' ').count();
        if spaces % 2 != 0 {
            return Err(LexerError::OddIndentation { line: line_number });
        }
        while indent < spaces {
            tokens.push(Token::Indent);
            indent += 2;
        }
        while indent > spaces {
            tokens.push(Token::Dedent);
            indent -= 2;
        }

        scan_line(&line[spaces..], line_number, &mut tokens)?;
        if tokens.last() != Some(&Token::Newline) {
            tokens.push(Token::Newline);
        }
    }

    while indent > 0 {
        tokens.push(Token::Dedent);
        indent -= 2;
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

fn scan_line(line: &str, line_number: usize, tokens: &mut Vec<Token>) -> LexResult<()> {
    let chars: Vec<char> = line.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c == ' ' {
            pos += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let literal: String = chars[start..pos].iter().collect();
            let value =
                literal
                    .parse::<i64>()
                    .map_err(|_| LexerError::InvalidIntegerLiteral {
                        literal: literal.clone(),
                        line: line_number,
                    })?;
            tokens.push(Token::Number(value));
            continue;
        }
        if c == '"' || c == '\'' {
            pos = scan_string(&chars, pos, line_number, tokens)?;
            continue;
        }
        if c == '_' || c.is_alphabetic() {
            let start = pos;
            while pos < chars.len() && (chars[pos] == '_' || chars[pos].is_alphanumeric()) {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(Token::from_word(&word));
            continue;
        }
        if matches!(c, '=' | '!' | '<' | '>') && chars.get(pos + 1) == Some(&'=') {
            tokens.push(match c {
                '=' => Token::Eq,
                '!' => Token::NotEq,
                '<' => Token::LessOrEq,
                _ => Token::GreaterOrEq,
            });
            pos += 2;
            continue;
        }
        // Everything else is a single punctuation token; the parser decides
        // whether it belongs to the grammar.
        tokens.push(Token::Char(c));
        pos += 1;
    }
    Ok(())
}

/// Scan a quoted literal starting at the opening delimiter; returns the
/// position just past the closing delimiter.
fn scan_string(
    chars: &[char],
    start: usize,
    line_number: usize,
    tokens: &mut Vec<Token>,
) -> LexResult<usize> {
    let delimiter = chars[start];
    let mut pos = start + 1;
    let mut decoded = String::new();

    while pos < chars.len() {
        match chars[pos] {
            c if c == delimiter => {
                tokens.push(Token::String(decoded));
                return Ok(pos + 1);
            }
            '\\' => {
                // Only \n, \t, \' and \" decode to a character; any other
                // escape is consumed without producing one.
                match chars.get(pos + 1) {
                    Some('n') => decoded.push('\n'),
                    Some('t') => decoded.push('\t'),
                    Some(c @ ('\'' | '"')) => decoded.push(*c),
                    _ => {}
                }
                pos += 2;
            }
            c => {
                decoded.push(c);
                pos += 1;
            }
        }
    }
    Err(LexerError::UnterminatedString { line: line_number })
}
