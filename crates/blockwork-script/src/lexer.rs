//! Lexer for kernel script.
//!
//! Produces a stream of [`SpannedToken`]s from source text. Newlines and
//! `;` both end a statement; newlines inside brackets are ignored.

/// A token with source location.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

/// Token types for kernel script.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Record,
    Del,

    // Literals
    Ident(String),
    Number(f64),
    Str(String),

    // Symbols
    Equals,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Ellipsis, // ...

    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Meta
    Newline,
    Eof,
}

/// Lexical error with source location.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Tokenize source text into a vector of spanned tokens.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens: Vec<SpannedToken> = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut line = 1;
    let mut col = 1;
    let mut depth = 0usize;

    while pos < chars.len() {
        let ch = chars[pos];

        // Line comments
        if ch == '#' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        if ch == '\n' || ch == ';' {
            let at_statement_start = tokens
                .last()
                .map_or(true, |t| t.token == Token::Newline);
            if depth == 0 && !at_statement_start {
                tokens.push(SpannedToken { token: Token::Newline, line, col });
            }
            pos += 1;
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            continue;
        }

        if ch == ' ' || ch == '\t' || ch == '\r' {
            pos += 1;
            col += 1;
            continue;
        }

        // Ellipsis before numbers so "..." never lexes as a float
        if ch == '.' && chars.get(pos + 1) == Some(&'.') && chars.get(pos + 2) == Some(&'.') {
            tokens.push(SpannedToken { token: Token::Ellipsis, line, col });
            pos += 3;
            col += 3;
            continue;
        }

        if ch.is_ascii_digit() {
            let start = pos;
            let start_col = col;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos] == '.'
                && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit())
            {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                let mut look = pos + 1;
                if look < chars.len() && (chars[look] == '+' || chars[look] == '-') {
                    look += 1;
                }
                if look < chars.len() && chars[look].is_ascii_digit() {
                    pos = look;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let value: f64 = text.parse().map_err(|_| LexError {
                message: format!("invalid number '{text}'"),
                line,
                col: start_col,
            })?;
            col += pos - start;
            tokens.push(SpannedToken {
                token: Token::Number(value),
                line,
                col: start_col,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = pos;
            let start_col = col;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            col += pos - start;
            let token = match word.as_str() {
                "record" => Token::Record,
                "del" => Token::Del,
                _ => Token::Ident(word),
            };
            tokens.push(SpannedToken { token, line, col: start_col });
            continue;
        }

        if ch == '"' || ch == '\'' {
            let quote = ch;
            let start_col = col;
            pos += 1;
            col += 1;
            let mut text = String::new();
            loop {
                match chars.get(pos) {
                    Some(&c) if c == quote => {
                        pos += 1;
                        col += 1;
                        break;
                    }
                    Some('\n') | None => {
                        return Err(LexError {
                            message: "unterminated string".into(),
                            line,
                            col: start_col,
                        });
                    }
                    Some(&c) => {
                        text.push(c);
                        pos += 1;
                        col += 1;
                    }
                }
            }
            tokens.push(SpannedToken {
                token: Token::Str(text),
                line,
                col: start_col,
            });
            continue;
        }

        let token = match ch {
            '=' => Token::Equals,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    line,
                    col,
                });
            }
        };
        match token {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            _ => {}
        }
        tokens.push(SpannedToken { token, line, col });
        pos += 1;
        col += 1;
    }

    tokens.push(SpannedToken { token: Token::Eof, line, col });
    Ok(tokens)
}
