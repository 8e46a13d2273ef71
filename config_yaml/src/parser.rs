use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::lexer::{Lexer, Loc, Token, TokenType};

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub message: String,
    pub loc: Loc,
    pub context: Vec<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}, col {}", self.message, self.loc.line, self.loc.col)?;
        for frame in &self.context {
            write!(f, "\n  while {}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

pub type ParseResult<T> = Result<T, ConfigError>;

/// Recursive-descent parser over an indentation-significant YAML subset:
/// scalars, inline `[a, b]` lists, block `- item` lists, and indented
/// `key: value` maps. No anchors, no flow maps, no multi-document streams.
pub struct ConfigParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ConfigParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_kind(&self) -> Option<&TokenType> {
        self.peek_token().map(|t| &t.kind)
    }

    pub fn peek_kind_at(&self, offset: usize) -> Option<&TokenType> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    pub fn peek_loc(&self) -> Loc {
        self.peek_token().map(|t| t.loc).unwrap_or(Loc { line: 0, col: 0 })
    }

    pub fn next_token(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ConfigError {
        ConfigError { message: message.into(), loc: self.peek_loc(), context: vec![] }
    }

    pub fn consume(&mut self, expected: &TokenType) -> ParseResult<Token> {
        match self.peek_kind() {
            Some(k) if std::mem::discriminant(k) == std::mem::discriminant(expected) => {
                Ok(self.next_token().unwrap())
            }
            other => Err(self.err(format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    /// Consumes the `key:` pair this parser just peeked via `parse_map_key`.
    pub fn consume_key(&mut self, _key: &str) -> ParseResult<()> {
        self.consume(&TokenType::Colon)?;
        Ok(())
    }

    pub fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), Some(TokenType::Newline)) {
            self.pos += 1;
        }
    }

    /// Skips blank lines only, stopping at the first Indent/content token,
    /// without consuming indentation.
    pub fn skip_newlines_only(&mut self) {
        while matches!(self.peek_kind(), Some(TokenType::Newline)) {
            self.pos += 1;
        }
    }

    pub fn is_end_of_block(&self) -> bool {
        self.peek_kind().is_none()
    }

    /// Checks whether the next line is indented at least `min_indent`.
    /// `struct_indent` pins the indentation level once the first field of a
    /// block is seen, so subsequent fields must match exactly.
    pub fn check_indentation(
        &mut self,
        min_indent: usize,
        struct_indent: &mut Option<usize>,
    ) -> ParseResult<bool> {
        self.skip_newlines_only();
        match self.peek_kind().cloned() {
            Some(TokenType::Indent(n)) => {
                if n < min_indent {
                    return Ok(false);
                }
                match struct_indent {
                    Some(fixed) if n != *fixed => Ok(false),
                    Some(_) => {
                        self.pos += 1;
                        Ok(true)
                    }
                    None => {
                        *struct_indent = Some(n);
                        self.pos += 1;
                        Ok(true)
                    }
                }
            }
            None => Ok(false),
            _ => {
                if min_indent == 0 && struct_indent.is_none() {
                    *struct_indent = Some(0);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub fn parse_map_key(&mut self) -> ParseResult<Option<String>> {
        match self.peek_kind().cloned() {
            Some(TokenType::Text(s)) => {
                self.pos += 1;
                Ok(Some(s))
            }
            Some(TokenType::StringLit(s)) => {
                self.pos += 1;
                Ok(Some(s))
            }
            Some(TokenType::Number(n)) => {
                self.pos += 1;
                Ok(Some(n.to_string()))
            }
            _ => Ok(None),
        }
    }

    pub fn parse_scalar_string(&mut self) -> ParseResult<String> {
        match self.peek_kind().cloned() {
            Some(TokenType::Text(s)) => {
                self.pos += 1;
                Ok(s)
            }
            Some(TokenType::StringLit(s)) => {
                self.pos += 1;
                Ok(s)
            }
            Some(TokenType::Number(n)) => {
                self.pos += 1;
                Ok(n.to_string())
            }
            other => Err(self.err(format!("expected scalar, found {:?}", other))),
        }
    }

    pub fn parse_scalar_number(&mut self) -> ParseResult<u64> {
        match self.peek_kind().cloned() {
            Some(TokenType::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(TokenType::Text(s)) => {
                let n = s.parse::<u64>().map_err(|_| self.err(format!("expected number, found '{}'", s)))?;
                self.pos += 1;
                Ok(n)
            }
            other => Err(self.err(format!("expected number, found {:?}", other))),
        }
    }

    /// Skips an entire value (scalar, inline list, or indented block),
    /// used to ignore unrecognized config keys without failing the parse.
    pub fn skip_value(&mut self, min_indent: usize) -> ParseResult<()> {
        self.skip_newlines_only();
        match self.peek_kind().cloned() {
            Some(TokenType::LBracket) => {
                let mut depth = 0;
                loop {
                    match self.peek_kind() {
                        Some(TokenType::LBracket) => {
                            depth += 1;
                            self.pos += 1;
                        }
                        Some(TokenType::RBracket) => {
                            depth -= 1;
                            self.pos += 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        None => break,
                        _ => {
                            self.pos += 1;
                        }
                    }
                }
                Ok(())
            }
            Some(TokenType::Text(_)) | Some(TokenType::StringLit(_)) | Some(TokenType::Number(_)) => {
                self.pos += 1;
                // Could be `key: value` trailing scalar, or start of a nested
                // block/list; consume any indented continuation lines too.
                let mut struct_indent = None;
                loop {
                    let save = self.pos;
                    if !self.check_indentation(min_indent + 1, &mut struct_indent)? {
                        self.pos = save;
                        break;
                    }
                    if matches!(self.peek_kind(), Some(TokenType::Dash)) {
                        self.pos += 1;
                    }
                    if self.parse_map_key()?.is_some() {
                        if matches!(self.peek_kind(), Some(TokenType::Colon)) {
                            self.pos += 1;
                        }
                    }
                    self.skip_value(struct_indent.unwrap_or(min_indent))?;
                }
                Ok(())
            }
            Some(TokenType::Dash) => {
                let mut struct_indent = None;
                loop {
                    let save = self.pos;
                    if !self.check_indentation(min_indent, &mut struct_indent)? {
                        self.pos = save;
                        break;
                    }
                    if !matches!(self.peek_kind(), Some(TokenType::Dash)) {
                        self.pos = save;
                        break;
                    }
                    self.pos += 1;
                    self.skip_value(struct_indent.unwrap_or(min_indent) + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Implemented for every type that can be produced from a YAML-subset
/// document; `#[derive(FromYaml)]` generates field-by-field dispatch
/// against this trait.
pub trait FromYaml: Sized {
    fn from_yaml(parser: &mut ConfigParser, min_indent: usize) -> ParseResult<Self>;

    fn from_str(input: &str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().map_err(|message| ConfigError {
            message,
            loc: Loc { line: 0, col: 0 },
            context: vec![],
        })?;
        let mut parser = ConfigParser::new(tokens);
        let value = Self::from_yaml(&mut parser, 0)?;
        parser.skip_newlines();
        if !parser.is_end_of_block() {
            return Err(ConfigError {
                message: "trailing content after document".to_string(),
                loc: parser.peek_loc(),
                context: vec![],
            });
        }
        Ok(value)
    }
}

impl FromYaml for String {
    fn from_yaml(parser: &mut ConfigParser, _min_indent: usize) -> ParseResult<Self> {
        parser.parse_scalar_string()
    }
}

impl FromYaml for bool {
    fn from_yaml(parser: &mut ConfigParser, _min_indent: usize) -> ParseResult<Self> {
        let s = parser.parse_scalar_string()?;
        match s.as_str() {
            "true" | "yes" | "on" => Ok(true),
            "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError {
                message: format!("expected boolean, found '{}'", other),
                loc: parser.peek_loc(),
                context: vec![],
            }),
        }
    }
}

macro_rules! impl_from_yaml_int {
    ($($t:ty),*) => {
        $(impl FromYaml for $t {
            fn from_yaml(parser: &mut ConfigParser, _min_indent: usize) -> ParseResult<Self> {
                let n = parser.parse_scalar_number()?;
                <$t>::try_from(n).map_err(|_| ConfigError {
                    message: format!("{} out of range for {}", n, stringify!($t)),
                    loc: parser.peek_loc(),
                    context: vec![],
                })
            }
        })*
    };
}

impl_from_yaml_int!(u16, u32, u64, usize);

impl<T: FromYaml> FromYaml for Option<T> {
    fn from_yaml(parser: &mut ConfigParser, min_indent: usize) -> ParseResult<Self> {
        T::from_yaml(parser, min_indent).map(Some)
    }
}

impl<T: FromYaml> FromYaml for Vec<T> {
    fn from_yaml(parser: &mut ConfigParser, min_indent: usize) -> ParseResult<Self> {
        if matches!(parser.peek_kind(), Some(TokenType::LBracket)) {
            return parse_inline_list(parser);
        }
        parse_block_list(parser, min_indent)
    }
}

fn parse_inline_list<T: FromYaml>(parser: &mut ConfigParser) -> ParseResult<Vec<T>> {
    parser.consume(&TokenType::LBracket)?;
    let mut items = Vec::new();
    loop {
        match parser.peek_kind() {
            Some(TokenType::RBracket) => {
                parser.next_token();
                break;
            }
            None => {
                return Err(ConfigError {
                    message: "unterminated inline list".to_string(),
                    loc: parser.peek_loc(),
                    context: vec![],
                });
            }
            _ => {
                items.push(T::from_yaml(parser, 0)?);
                if matches!(parser.peek_kind(), Some(TokenType::Comma)) {
                    parser.next_token();
                }
            }
        }
    }
    Ok(items)
}

fn parse_block_list<T: FromYaml>(parser: &mut ConfigParser, min_indent: usize) -> ParseResult<Vec<T>> {
    let mut items = Vec::new();
    let mut list_indent: Option<usize> = None;
    loop {
        let save = parser.pos;
        if !parser.check_indentation(min_indent, &mut list_indent)? {
            parser.pos = save;
            break;
        }
        if !matches!(parser.peek_kind(), Some(TokenType::Dash)) {
            parser.pos = save;
            break;
        }
        parser.next_token();
        let item_indent = list_indent.unwrap_or(min_indent) + 1;
        items.push(T::from_yaml(parser, item_indent)?);
    }
    Ok(items)
}

impl<K, V> FromYaml for HashMap<K, V>
where
    K: FromStr + Eq + Hash,
    V: FromYaml,
{
    fn from_yaml(parser: &mut ConfigParser, min_indent: usize) -> ParseResult<Self> {
        let mut map = HashMap::new();
        let mut block_indent: Option<usize> = None;
        loop {
            let save = parser.pos;
            if !parser.check_indentation(min_indent, &mut block_indent)? {
                parser.pos = save;
                break;
            }
            let key = match parser.parse_map_key()? {
                Some(k) => k,
                None => {
                    parser.pos = save;
                    break;
                }
            };
            let key: K = key.parse().map_err(|_| ConfigError {
                message: format!("invalid map key '{}'", key),
                loc: parser.peek_loc(),
                context: vec![],
            })?;
            parser.consume(&TokenType::Colon)?;
            let value = V::from_yaml(parser, block_indent.unwrap_or(min_indent) + 1)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_fields_via_hashmap() {
        let map: HashMap<String, String> = FromYaml::from_str("host: 0.0.0.0\nport: 11371\n").unwrap();
        assert_eq!(map.get("host").unwrap(), "0.0.0.0");
        assert_eq!(map.get("port").unwrap(), "11371");
    }

    #[test]
    fn parses_inline_list() {
        let v: Vec<String> = FromYaml::from_str("[a, b, c]").unwrap();
        assert_eq!(v, vec!["a", "b", "c"]);
    }

    #[test]
    fn parses_block_list() {
        let v: Vec<String> = FromYaml::from_str("- a\n- b\n- c\n").unwrap();
        assert_eq!(v, vec!["a", "b", "c"]);
    }
}
