//! Parser for the small PowerShell subset the policy scripts use:
//! assignments, cmdlet invocations with named parameters, quoted literals,
//! backtick escapes, `$variable` references, `exit` and `if`/`else`.
//!
//! `if` conditions are kept as raw text; the interpreter decides which ones
//! it can evaluate.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Text(String),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Bare(String),
    Quoted(Vec<Piece>),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Param {
    pub name: String,
    pub value: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Statement {
    Assign { name: String, value: Token },
    Invoke { cmdlet: String, params: Vec<Param> },
    Exit(i32),
    If {
        condition: String,
        then: Vec<Statement>,
        otherwise: Vec<Statement>,
    },
}

enum RawStatement {
    Tokens(usize, Vec<Token>),
    If {
        line: usize,
        condition: String,
        then: String,
        otherwise: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub line: usize,
    pub message: String,
}

fn is_double_quote(ch: char) -> bool {
    matches!(ch, '"' | '\u{201C}' | '\u{201D}' | '\u{201E}')
}

fn is_ident(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn unescape(ch: char) -> char {
    match ch {
        '0' => '\0',
        'a' => '\u{07}',
        'b' => '\u{08}',
        'e' => '\u{1B}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        other => other,
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if ch == Some('\n') {
            self.line += 1;
        }
        ch
    }

    fn read_ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(&ch) = self.chars.peek() {
            if !is_ident(ch) {
                break;
            }
            name.push(ch);
            self.chars.next();
        }
        name
    }

    fn read_double_quoted(&mut self) -> Result<Token, ParseError> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        loop {
            let Some(ch) = self.next_char() else {
                return Err(self.error("missing terminator for double-quoted string"));
            };
            match ch {
                '`' => {
                    let Some(escaped) = self.next_char() else {
                        return Err(self.error("escape at end of script"));
                    };
                    text.push(unescape(escaped));
                }
                q if is_double_quote(q) => match self.chars.peek() {
                    Some(&next) if is_double_quote(next) => {
                        text.push(next);
                        self.chars.next();
                    }
                    _ => break,
                },
                '$' => match self.chars.peek() {
                    Some(&next) if is_ident(next) => {
                        if !text.is_empty() {
                            pieces.push(Piece::Text(std::mem::take(&mut text)));
                        }
                        pieces.push(Piece::Variable(self.read_ident()));
                    }
                    _ => text.push('$'),
                },
                other => text.push(other),
            }
        }
        if !text.is_empty() || pieces.is_empty() {
            pieces.push(Piece::Text(text));
        }
        Ok(Token::Quoted(pieces))
    }

    fn read_single_quoted(&mut self) -> Result<Token, ParseError> {
        let mut text = String::new();
        loop {
            match self.next_char() {
                None => return Err(self.error("missing terminator for single-quoted string")),
                Some('\'') => {
                    if self.chars.peek() == Some(&'\'') {
                        text.push('\'');
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                Some(other) => text.push(other),
            }
        }
        Ok(Token::Quoted(vec![Piece::Text(text)]))
    }

    fn skip_blanks(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' || !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn expect(&mut self, wanted: char, context: &str) -> Result<(), ParseError> {
        self.skip_blanks();
        match self.next_char() {
            Some(ch) if ch == wanted => Ok(()),
            _ => Err(self.error(format!("missing '{wanted}' {context}"))),
        }
    }

    /// Reads up to the `close` matching an already consumed `open`. Quoted
    /// text is copied verbatim and never closes the block.
    fn read_balanced(&mut self, open: char, close: char) -> Result<String, ParseError> {
        let mut text = String::new();
        let mut depth = 1;
        let mut single = false;
        let mut double = false;
        loop {
            let Some(ch) = self.next_char() else {
                return Err(self.error(format!("missing closing '{close}'")));
            };
            if double && ch == '`' {
                text.push(ch);
                if let Some(escaped) = self.next_char() {
                    text.push(escaped);
                }
                continue;
            }
            if ch == '\'' && !double {
                single = !single;
            } else if is_double_quote(ch) && !single {
                double = !double;
            } else if !single && !double {
                if ch == open {
                    depth += 1;
                } else if ch == close {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
            }
            text.push(ch);
        }
    }

    /// Everything after the `if` keyword: condition, body, optional `else`.
    fn read_if(&mut self, line: usize) -> Result<RawStatement, ParseError> {
        self.expect('(', "after if")?;
        let condition = self.read_balanced('(', ')')?;
        self.expect('{', "before if body")?;
        let then = self.read_balanced('{', '}')?;

        self.skip_blanks();
        let otherwise = match self.chars.peek() {
            Some(&ch) if is_ident(ch) => {
                let word = self.read_ident();
                if !word.eq_ignore_ascii_case("else") {
                    return Err(self.error(format!("unexpected {word:?} after if body")));
                }
                self.expect('{', "before else body")?;
                Some(self.read_balanced('{', '}')?)
            }
            _ => None,
        };
        Ok(RawStatement::If {
            line,
            condition,
            then,
            otherwise,
        })
    }

    fn read_bare(&mut self, first: char) -> Result<Token, ParseError> {
        let mut word = String::from(first);
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == ';' {
                break;
            }
            if is_double_quote(ch) || ch == '\'' {
                return Err(self.error(format!("unexpected quote in {word:?}")));
            }
            word.push(ch);
            self.chars.next();
        }
        Ok(Token::Bare(word))
    }
}

/// Splits a script into statements of tokens. The whole script is parsed
/// before anything runs, the same way PowerShell rejects a script with a
/// syntax error without executing any of it.
fn tokenize(script: &str) -> Result<Vec<RawStatement>, ParseError> {
    let mut lexer = Lexer {
        chars: script.chars().peekable(),
        line: 1,
    };
    let mut statements = Vec::new();
    let mut current = Vec::new();
    let mut start_line = 1;

    while let Some(ch) = lexer.next_char() {
        match ch {
            '\n' | ';' => {
                if !current.is_empty() {
                    statements.push(RawStatement::Tokens(start_line, std::mem::take(&mut current)));
                }
            }
            ch if ch.is_whitespace() => {}
            '#' => {
                while let Some(&next) = lexer.chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    lexer.chars.next();
                }
            }
            _ => {
                if current.is_empty() {
                    start_line = lexer.line;
                }
                let token = match ch {
                    '\'' => lexer.read_single_quoted()?,
                    q if is_double_quote(q) => lexer.read_double_quoted()?,
                    '$' => match lexer.chars.peek() {
                        Some(&next) if is_ident(next) => Token::Variable(lexer.read_ident()),
                        _ => lexer.read_bare('$')?,
                    },
                    other => lexer.read_bare(other)?,
                };
                if current.is_empty()
                    && matches!(&token, Token::Bare(word) if word.eq_ignore_ascii_case("if"))
                {
                    statements.push(lexer.read_if(start_line)?);
                    continue;
                }
                current.push(token);
            }
        }
    }
    if !current.is_empty() {
        statements.push(RawStatement::Tokens(start_line, current));
    }
    Ok(statements)
}

fn build_statement(line: usize, tokens: Vec<Token>) -> Result<Statement, ParseError> {
    let error = |message: String| ParseError { line, message };
    let mut iter = tokens.into_iter().peekable();

    match iter.next() {
        Some(Token::Variable(name)) => {
            match iter.next() {
                Some(Token::Bare(op)) if op == "=" => {}
                _ => return Err(error(format!("expected '=' after ${name}"))),
            }
            let Some(value) = iter.next() else {
                return Err(error(format!("missing value for ${name}")));
            };
            if iter.next().is_some() {
                return Err(error(format!("unexpected token after value of ${name}")));
            }
            Ok(Statement::Assign { name, value })
        }
        Some(Token::Bare(keyword)) if keyword.eq_ignore_ascii_case("exit") => {
            let code = match iter.next() {
                None => 0,
                Some(Token::Bare(code)) => code
                    .parse::<i32>()
                    .map_err(|_| error(format!("exit code {code:?} is not an integer")))?,
                Some(_) => return Err(error("exit code must be a literal integer".to_string())),
            };
            if iter.next().is_some() {
                return Err(error("unexpected token after exit code".to_string()));
            }
            Ok(Statement::Exit(code))
        }
        Some(Token::Bare(cmdlet)) => {
            let mut params = Vec::new();
            while let Some(token) = iter.next() {
                let Token::Bare(word) = token else {
                    return Err(error(format!("positional argument to {cmdlet} is not supported")));
                };
                let Some(flag) = word.strip_prefix('-').filter(|flag| !flag.is_empty()) else {
                    return Err(error(format!("positional argument {word:?} to {cmdlet} is not supported")));
                };
                if let Some((name, inline)) = flag.split_once(':') {
                    params.push(Param {
                        name: name.to_string(),
                        value: Some(Token::Bare(inline.to_string())),
                    });
                    continue;
                }
                let takes_value = match iter.peek() {
                    None => false,
                    Some(Token::Bare(next)) => !next.starts_with('-'),
                    Some(_) => true,
                };
                let value = if takes_value { iter.next() } else { None };
                params.push(Param {
                    name: flag.to_string(),
                    value,
                });
            }
            Ok(Statement::Invoke { cmdlet, params })
        }
        _ => Err(error("statement must start with a cmdlet or a variable".to_string())),
    }
}

fn parse_block(source: &str, line: usize) -> Result<Vec<Statement>, ParseError> {
    parse_script(source).map_err(|err| ParseError {
        line: line + err.line - 1,
        message: err.message,
    })
}

pub(crate) fn parse_script(script: &str) -> Result<Vec<Statement>, ParseError> {
    tokenize(script)?
        .into_iter()
        .map(|raw| match raw {
            RawStatement::Tokens(line, tokens) => build_statement(line, tokens),
            RawStatement::If {
                line,
                condition,
                then,
                otherwise,
            } => Ok(Statement::If {
                condition,
                then: parse_block(&then, line)?,
                otherwise: match otherwise {
                    Some(source) => parse_block(&source, line)?,
                    None => Vec::new(),
                },
            }),
        })
        .collect()
}
