//! Lexer for the Strand programming language.
//!
//! Built on the logos library: an internal `LogosToken` enum drives the
//! scanner and is converted to the public [`Token`] enum with source spans.
//! Regex literals are context-sensitive (a `/` in prefix position starts a
//! regex, otherwise it is division), so they are lexed by a manual takeover
//! from the logos stream.

use crate::token::{Span, Token};
use logos::Logos;
use thiserror::Error;

/// Logos-based token enum for lexing.
///
/// Used internally for efficient tokenization and converted to the public
/// Token enum after each match.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    // Whitespace (skip)
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*", lex_block_comment)]
    BlockComment,

    // Keywords (must come before identifiers)
    #[token("function")]
    Function,

    #[token("go")]
    Go,

    #[token("await")]
    Await,

    #[token("let")]
    Let,

    #[token("var")]
    Var,

    #[token("const")]
    Const,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("for")]
    For,

    #[token("in")]
    In,

    #[token("return")]
    Return,

    #[token("switch")]
    Switch,

    #[token("case")]
    Case,

    #[token("default")]
    Default,

    #[token("break")]
    Break,

    #[token("import")]
    Import,

    #[token("export")]
    Export,

    #[token("from")]
    From,

    #[token("as")]
    As,

    #[token("new")]
    New,

    #[token("class")]
    Class,

    #[token("extends")]
    Extends,

    #[token("super")]
    Super,

    #[token("this")]
    This,

    #[token("constructor")]
    Constructor,

    #[token("operator")]
    Operator,

    #[token("public")]
    Public,

    #[token("private")]
    Private,

    #[token("protected")]
    Protected,

    #[token("static")]
    Static,

    #[token("true")]
    True,

    #[token("false")]
    False,

    // Identifiers (after keywords)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Numbers: decimal and fractional
    #[regex(r"[0-9]+\.[0-9]+", parse_number)]
    #[regex(r"[0-9]+", parse_number)]
    Number(f64),

    // Strings (single or double quoted)
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", parse_string)]
    StringLit(String),

    // Operators (longest match wins)
    #[token("===")]
    EqualEqualEqual,

    #[token("**=")]
    StarStarEqual,

    #[token("==")]
    EqualEqual,

    #[token("!=")]
    BangEqual,

    #[token("<=")]
    LessEqual,

    #[token(">=")]
    GreaterEqual,

    #[token("&&")]
    AmpAmp,

    #[token("||")]
    PipePipe,

    #[token("**")]
    StarStar,

    #[token("++")]
    PlusPlus,

    #[token("--")]
    MinusMinus,

    #[token("+=")]
    PlusEqual,

    #[token("-=")]
    MinusEqual,

    #[token("*=")]
    StarEqual,

    #[token("/=")]
    SlashEqual,

    // Single-character tokens
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("=")]
    Equal,

    #[token("?")]
    Question,

    #[token(".")]
    Dot,

    #[token(":")]
    Colon,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,
}

fn lex_block_comment(lex: &mut logos::Lexer<LogosToken>) -> logos::Skip {
    // "/*" already consumed, find the closing "*/" (non-nesting)
    let remainder = lex.remainder();
    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
    } else {
        lex.bump(remainder.len());
    }
    logos::Skip
}

fn parse_number(lex: &mut logos::Lexer<LogosToken>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<LogosToken>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1];
    Some(unescape_string(inner))
}

fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(c) => result.push(c),
                None => break,
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character '{char}' at {span}")]
    UnexpectedCharacter { char: char, span: Span },

    #[error("unterminated string literal at {span}")]
    UnterminatedString { span: Span },

    #[error("unterminated regex literal at {span}")]
    UnterminatedRegex { span: Span },

    #[error("invalid number literal '{text}' at {span}")]
    InvalidNumber { text: String, span: Span },
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the whole input, ending with an `Eof` sentinel.
    pub fn tokenize(mut self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let mut logos_lexer = LogosToken::lexer(self.source);
        let mut line = 1u32;
        let mut column = 1u32;
        let mut last_end = 0usize;

        while let Some(token_result) = logos_lexer.next() {
            let range = logos_lexer.span();

            // Advance line/column over any skipped text
            for c in self.source[last_end..range.start].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            let span = Span::new(range.start, range.end, line, column);

            match token_result {
                Ok(LogosToken::Slash) if self.at_regex_position() => {
                    // Manual takeover: lex a regex literal from the source
                    match lex_regex(self.source, range.end) {
                        Ok((pattern, flags, end_pos)) => {
                            let consumed = end_pos - range.end;
                            logos_lexer.bump(consumed);
                            let span = Span::new(range.start, end_pos, line, column);
                            for c in self.source[range.start..end_pos].chars() {
                                if c == '\n' {
                                    line += 1;
                                    column = 1;
                                } else {
                                    column += 1;
                                }
                            }
                            self.tokens.push((Token::Regex(pattern, flags), span));
                            last_end = end_pos;
                            continue;
                        }
                        Err(()) => {
                            self.errors.push(LexError::UnterminatedRegex { span });
                            last_end = range.end;
                            continue;
                        }
                    }
                }
                Ok(logos_token) => {
                    let token = convert_token(logos_token);
                    self.tokens.push((token, span));
                }
                Err(_) => {
                    let char = self.source[range.start..].chars().next().unwrap_or('\0');
                    let error = match char {
                        '"' | '\'' => LexError::UnterminatedString { span },
                        c if c.is_ascii_digit() => LexError::InvalidNumber {
                            text: self.source[range.start..range.end].to_string(),
                            span,
                        },
                        _ => LexError::UnexpectedCharacter { char, span },
                    };
                    self.errors.push(error);
                }
            }

            for c in self.source[range.start..range.end].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            last_end = range.end;
        }

        let eof_span = Span::new(self.source.len(), self.source.len(), line, column);
        self.tokens.push((Token::Eof, eof_span));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    /// A `/` starts a regex literal when the previous token cannot end an
    /// expression (start of input, after an operator, `(`, `,`, `return`, …).
    fn at_regex_position(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some((tok, _)) => !tok.ends_expression(),
        }
    }
}

/// Scan a regex literal body starting just after the opening `/`.
///
/// Returns (pattern, flags, byte offset one past the last flag char).
fn lex_regex(source: &str, start: usize) -> Result<(String, String, usize), ()> {
    let bytes = source.as_bytes();
    let mut pos = start;
    let mut pattern = String::new();
    let mut in_class = false;

    loop {
        if pos >= bytes.len() {
            return Err(());
        }
        let c = bytes[pos] as char;
        match c {
            '\\' => {
                if pos + 1 >= bytes.len() {
                    return Err(());
                }
                pattern.push('\\');
                pattern.push(bytes[pos + 1] as char);
                pos += 2;
            }
            '[' => {
                in_class = true;
                pattern.push(c);
                pos += 1;
            }
            ']' => {
                in_class = false;
                pattern.push(c);
                pos += 1;
            }
            '/' if !in_class => {
                pos += 1;
                break;
            }
            '\n' => return Err(()),
            _ => {
                pattern.push(c);
                pos += 1;
            }
        }
    }

    let mut flags = String::new();
    while pos < bytes.len() && (bytes[pos] as char).is_ascii_alphabetic() {
        flags.push(bytes[pos] as char);
        pos += 1;
    }

    Ok((pattern, flags, pos))
}

fn convert_token(logos_token: LogosToken) -> Token {
    match logos_token {
        LogosToken::Function => Token::Function,
        LogosToken::Go => Token::Go,
        LogosToken::Await => Token::Await,
        LogosToken::Let => Token::Let,
        LogosToken::Var => Token::Var,
        LogosToken::Const => Token::Const,
        LogosToken::If => Token::If,
        LogosToken::Else => Token::Else,
        LogosToken::For => Token::For,
        LogosToken::In => Token::In,
        LogosToken::Return => Token::Return,
        LogosToken::Switch => Token::Switch,
        LogosToken::Case => Token::Case,
        LogosToken::Default => Token::Default,
        LogosToken::Break => Token::Break,
        LogosToken::Import => Token::Import,
        LogosToken::Export => Token::Export,
        LogosToken::From => Token::From,
        LogosToken::As => Token::As,
        LogosToken::New => Token::New,
        LogosToken::Class => Token::Class,
        LogosToken::Extends => Token::Extends,
        LogosToken::Super => Token::Super,
        LogosToken::This => Token::This,
        LogosToken::Constructor => Token::Constructor,
        LogosToken::Operator => Token::Operator,
        LogosToken::Public => Token::Public,
        LogosToken::Private => Token::Private,
        LogosToken::Protected => Token::Protected,
        LogosToken::Static => Token::Static,
        LogosToken::True => Token::True,
        LogosToken::False => Token::False,
        LogosToken::Identifier(s) => Token::Identifier(s),
        LogosToken::Number(n) => Token::Number(n),
        LogosToken::StringLit(s) => Token::StringLit(s),
        LogosToken::EqualEqualEqual => Token::EqualEqualEqual,
        LogosToken::StarStarEqual => Token::StarStarEqual,
        LogosToken::EqualEqual => Token::EqualEqual,
        LogosToken::BangEqual => Token::BangEqual,
        LogosToken::LessEqual => Token::LessEqual,
        LogosToken::GreaterEqual => Token::GreaterEqual,
        LogosToken::AmpAmp => Token::AmpAmp,
        LogosToken::PipePipe => Token::PipePipe,
        LogosToken::StarStar => Token::StarStar,
        LogosToken::PlusPlus => Token::PlusPlus,
        LogosToken::MinusMinus => Token::MinusMinus,
        LogosToken::PlusEqual => Token::PlusEqual,
        LogosToken::MinusEqual => Token::MinusEqual,
        LogosToken::StarEqual => Token::StarEqual,
        LogosToken::SlashEqual => Token::SlashEqual,
        LogosToken::Plus => Token::Plus,
        LogosToken::Minus => Token::Minus,
        LogosToken::Star => Token::Star,
        LogosToken::Slash => Token::Slash,
        LogosToken::Percent => Token::Percent,
        LogosToken::Bang => Token::Bang,
        LogosToken::Less => Token::Less,
        LogosToken::Greater => Token::Greater,
        LogosToken::Equal => Token::Equal,
        LogosToken::Question => Token::Question,
        LogosToken::Dot => Token::Dot,
        LogosToken::Colon => Token::Colon,
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Whitespace | LogosToken::LineComment | LogosToken::BlockComment => {
            unreachable!("whitespace and comments are skipped")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("lex failure")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = lex("let x = go f;");
        assert_eq!(
            tokens,
            vec![
                Token::Let,
                Token::Identifier("x".into()),
                Token::Equal,
                Token::Go,
                Token::Identifier("f".into()),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42")[0], Token::Number(42.0));
        assert_eq!(lex("3.25")[0], Token::Number(3.25));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""a\nb\t\"c\"""#)[0],
            Token::StringLit("a\nb\t\"c\"".into())
        );
        assert_eq!(lex(r"'it\'s'")[0], Token::StringLit("it's".into()));
    }

    #[test]
    fn test_three_char_operators() {
        let tokens = lex("a === b ** 2; a **= 2;");
        assert!(tokens.contains(&Token::EqualEqualEqual));
        assert!(tokens.contains(&Token::StarStar));
        assert!(tokens.contains(&Token::StarStarEqual));
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = lex("1 // comment\n /* block\n comment */ 2");
        assert_eq!(tokens, vec![Token::Number(1.0), Token::Number(2.0), Token::Eof]);
    }

    #[test]
    fn test_regex_vs_division() {
        // Prefix position: regex literal
        let tokens = lex("let r = /ab+c/gi;");
        assert!(tokens.contains(&Token::Regex("ab+c".into(), "gi".into())));

        // After an identifier: division
        let tokens = lex("a / b");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".into()),
                Token::Slash,
                Token::Identifier("b".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_regex_with_class_and_escape() {
        let tokens = lex(r"let r = /[a/b]\/x/;");
        assert!(tokens.contains(&Token::Regex(r"[a/b]\/x".into(), "".into())));
    }

    #[test]
    fn test_unterminated_string_errors() {
        let errors = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_line_column_tracking() {
        let tokens = Lexer::new("let\n  x").tokenize().unwrap();
        let (_, span) = &tokens[1];
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 3);
    }
}
