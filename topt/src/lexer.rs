//! Line-oriented lexer for the transform surface syntax.
//!
//! `;` starts a comment. `Name:` and `Pre:` lines are captured whole; the
//! rest of the grammar is tokenized per line.

/// One lexical token. Carries no position; the lexer pairs each token with
/// its line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A whole `Name: ...` line.
    Name(String),
    /// A whole `Pre: ...` line.
    Pre(String),
    /// `label:`
    Label(String),
    /// `%identifier`
    Ident(String),
    /// A bare word that is not a keyword (constant function names).
    Word(String),
    Num(i64),
    /// `i<n>`
    IntTy(u32),
    /// `=>`
    Arrow,
    Equals,
    Comma,
    LParen,
    RParen,
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    Shl,
    LShr,
    AShr,
    Ret,
    Unreachable,
    Nsw,
    Nuw,
    Exact,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(s) => write!(f, "Name: {s}"),
            Self::Pre(s) => write!(f, "Pre: {s}"),
            Self::Label(s) => write!(f, "{s}:"),
            Self::Ident(s) | Self::Word(s) => write!(f, "{s}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::IntTy(w) => write!(f, "i{w}"),
            Self::Arrow => write!(f, "=>"),
            Self::Equals => write!(f, "="),
            Self::Comma => write!(f, ","),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Add => write!(f, "add"),
            Self::Sub => write!(f, "sub"),
            Self::Mul => write!(f, "mul"),
            Self::SDiv => write!(f, "sdiv"),
            Self::UDiv => write!(f, "udiv"),
            Self::Shl => write!(f, "shl"),
            Self::LShr => write!(f, "lshr"),
            Self::AShr => write!(f, "ashr"),
            Self::Ret => write!(f, "ret"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Nsw => write!(f, "nsw"),
            Self::Nuw => write!(f, "nuw"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct LexError {
    pub line: u32,
    pub message: String,
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "add" => Token::Add,
        "sub" => Token::Sub,
        "mul" => Token::Mul,
        "sdiv" => Token::SDiv,
        "udiv" => Token::UDiv,
        "shl" => Token::Shl,
        "lshr" => Token::LShr,
        "ashr" => Token::AShr,
        "ret" => Token::Ret,
        "unreachable" => Token::Unreachable,
        "nsw" => Token::Nsw,
        "nuw" => Token::Nuw,
        "exact" => Token::Exact,
        _ => return None,
    })
}

fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

pub(crate) fn lex(buf: &str) -> Result<Vec<(Token, u32)>, LexError> {
    let mut out = Vec::new();
    for (i, raw) in buf.lines().enumerate() {
        let line = u32::try_from(i + 1).expect("line number fits in u32");
        let text = raw.split(';').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        if let Some(rest) = text.strip_prefix("Name:") {
            out.push((Token::Name(rest.trim().to_string()), line));
            continue;
        }
        if let Some(rest) = text.strip_prefix("Pre:") {
            out.push((Token::Pre(rest.trim().to_string()), line));
            continue;
        }
        lex_line(text, line, &mut out)?;
    }
    Ok(out)
}

fn lex_line(text: &str, line: u32, out: &mut Vec<(Token, u32)>) -> Result<(), LexError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b',' => {
                out.push((Token::Comma, line));
                i += 1;
            }
            b'(' => {
                out.push((Token::LParen, line));
                i += 1;
            }
            b')' => {
                out.push((Token::RParen, line));
                i += 1;
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    out.push((Token::Arrow, line));
                    i += 2;
                } else {
                    out.push((Token::Equals, line));
                    i += 1;
                }
            }
            b'%' => {
                let start = i;
                i += 1;
                while i < bytes.len() && is_word_char(bytes[i]) {
                    i += 1;
                }
                if i == start + 1 {
                    return Err(LexError {
                        line,
                        message: "empty identifier after '%'".to_string(),
                    });
                }
                out.push((Token::Ident(text[start..i].to_string()), line));
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                if bytes[i] == b'-' {
                    i += 1;
                    if i >= bytes.len() || !bytes[i].is_ascii_digit() {
                        return Err(LexError {
                            line,
                            message: "expected digits after '-'".to_string(),
                        });
                    }
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n: i64 = text[start..i].parse().map_err(|_| LexError {
                    line,
                    message: format!("integer literal out of range: {}", &text[start..i]),
                })?;
                out.push((Token::Num(n), line));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && is_word_char(bytes[i]) {
                    i += 1;
                }
                let word = &text[start..i];
                if i < bytes.len() && bytes[i] == b':' {
                    out.push((Token::Label(word.to_string()), line));
                    i += 1;
                } else if let Some(tok) = keyword(word) {
                    out.push((tok, line));
                } else if let Some(width) = int_type_width(word) {
                    out.push((Token::IntTy(width), line));
                } else {
                    out.push((Token::Word(word.to_string()), line));
                }
            }
            c => {
                return Err(LexError {
                    line,
                    message: format!("unexpected character '{}'", c as char),
                })
            }
        }
    }
    Ok(())
}

fn int_type_width(word: &str) -> Option<u32> {
    let digits = word.strip_prefix('i')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
