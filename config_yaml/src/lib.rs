pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Loc, Token, TokenType};
pub use parser::{ConfigError, ConfigParser, FromYaml, ParseResult};
