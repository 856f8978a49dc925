//! Indicator spec parser.
//!
//! Turns tokens such as `macd(12,26,9)` or `ma(20)` into typed
//! [`IndicatorRequest`]s. Errors carry the character offset of the problem
//! so they can be rendered with [`SpecParseError::display_with_context`].

use crate::domain::error::{MarketDataError, SpecParseError};
use crate::domain::indicator::{IndicatorKind, IndicatorRequest};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String, position: usize) -> SpecParseError {
        SpecParseError { message, position }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), SpecParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(
                format!("expected '{}', found '{}'", expected, ch),
                self.pos,
            )),
            None => Err(self.error(
                format!("expected '{}', found end of input", expected),
                self.pos,
            )),
        }
    }

    fn parse_name(&mut self) -> Result<IndicatorKind, SpecParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let name = &self.input[start..self.pos];
        if name.is_empty() {
            return Err(self.error("expected indicator name".to_string(), start));
        }
        IndicatorKind::from_name(name).ok_or_else(|| {
            let supported: Vec<&str> = IndicatorKind::ALL.iter().map(|k| k.name()).collect();
            self.error(
                format!(
                    "unknown indicator '{}', expected one of {}",
                    name,
                    supported.join(", ")
                ),
                start,
            )
        })
    }

    fn parse_integer(&mut self) -> Result<usize, SpecParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let num_str = &self.input[start..self.pos];
        if num_str.is_empty() {
            let found = self
                .peek()
                .map(|c| format!("'{}'", c))
                .unwrap_or_else(|| "end of input".to_string());
            return Err(self.error(format!("expected integer, found {}", found), start));
        }

        let value = num_str
            .parse::<usize>()
            .map_err(|_| self.error(format!("invalid integer: {}", num_str), start))?;
        if value == 0 {
            return Err(self.error("parameter must be positive".to_string(), start));
        }
        Ok(value)
    }

    fn parse_params(&mut self) -> Result<Vec<usize>, SpecParseError> {
        self.expect_char('(')?;
        let mut params = vec![self.parse_integer()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                    params.push(self.parse_integer()?);
                }
                _ => break,
            }
        }
        self.expect_char(')')?;
        Ok(params)
    }

    fn parse(&mut self) -> Result<IndicatorRequest, SpecParseError> {
        let kind = self.parse_name()?;
        let params_at = self.pos;
        let params = self.parse_params()?;

        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(
                format!("unexpected input after indicator: '{}'", self.remaining()),
                self.pos,
            ));
        }

        IndicatorRequest::from_params(kind, &params).ok_or_else(|| {
            self.error(
                format!(
                    "{} takes {} parameter{}, found {}; usage: {}",
                    kind.name(),
                    kind.arity(),
                    if kind.arity() == 1 { "" } else { "s" },
                    params.len(),
                    kind.usage()
                ),
                params_at,
            )
        })
    }
}

/// Parse a single indicator token.
pub fn parse(input: &str) -> Result<IndicatorRequest, SpecParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

/// Parse a single token, attaching the token text to any failure.
pub fn parse_indicator(token: &str) -> Result<IndicatorRequest, MarketDataError> {
    parse(token).map_err(|source| MarketDataError::IndicatorSpec {
        token: token.trim().to_string(),
        source,
    })
}

/// Split a whitespace-separated indicator list. Whitespace inside parentheses
/// belongs to the token, so `macd(12, 26, 9) rsi(14)` yields two tokens.
pub fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&text[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

/// Parse every token of a whitespace-separated list, stopping at the first
/// invalid one. An empty or blank list yields no requests.
pub fn parse_indicator_list(text: &str) -> Result<Vec<IndicatorRequest>, MarketDataError> {
    split_tokens(text).into_iter().map(parse_indicator).collect()
}
