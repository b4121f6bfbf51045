use super::{ParserOptions, SourceParseError};
use crate::module::{ModuleDescriptor, ModuleRequirement, PackageExport, ServiceProvision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Dot,
    Semicolon,
    Comma,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    At,
    Star,
    Literal,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

/// Splits Java source into the tokens a module declaration needs.
/// Comments are dropped; literals are kept opaque.
pub struct Tokenizer {
    chars: Vec<char>,
    current: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, SourceParseError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            let line = self.line;
            let column = self.column;
            match ch {
                ch if ch.is_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(SourceParseError::Unterminated {
                                    what: "comment",
                                    line,
                                    column,
                                })
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                '"' | '\'' => {
                    let lexeme = self.literal(ch, line, column)?;
                    tokens.push(Token {
                        kind: TokenKind::Literal,
                        lexeme,
                        line,
                        column,
                    });
                }
                ch if is_identifier_start(ch) => {
                    let mut lexeme = String::new();
                    while let Some(ch) = self.peek().filter(|ch| is_identifier_part(*ch)) {
                        lexeme.push(ch);
                        self.advance();
                    }
                    tokens.push(Token {
                        kind: TokenKind::Identifier,
                        lexeme,
                        line,
                        column,
                    });
                }
                _ => {
                    let kind = match ch {
                        '.' => TokenKind::Dot,
                        ';' => TokenKind::Semicolon,
                        ',' => TokenKind::Comma,
                        '{' => TokenKind::LeftBrace,
                        '}' => TokenKind::RightBrace,
                        '(' => TokenKind::LeftParen,
                        ')' => TokenKind::RightParen,
                        '@' => TokenKind::At,
                        '*' => TokenKind::Star,
                        '=' | '+' | '-' | '[' | ']' | '<' | '>' | '?' | ':' | '&' | '|' | '!'
                        | '~' | '^' | '%' | '/' => TokenKind::Other,
                        ch if ch.is_ascii_digit() => TokenKind::Literal,
                        ch => return Err(SourceParseError::UnexpectedChar { ch, line, column }),
                    };
                    tokens.push(Token {
                        kind,
                        lexeme: ch.to_string(),
                        line,
                        column,
                    });
                    self.advance();
                }
            }
        }
        Ok(tokens)
    }

    fn literal(
        &mut self,
        quote: char,
        line: usize,
        column: usize,
    ) -> Result<String, SourceParseError> {
        let mut lexeme = String::from(quote);
        self.advance();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(SourceParseError::Unterminated {
                        what: "literal",
                        line,
                        column,
                    })
                }
                Some('\\') => {
                    lexeme.push('\\');
                    self.advance();
                    if let Some(escaped) = self.peek() {
                        lexeme.push(escaped);
                        self.advance();
                    }
                }
                Some(ch) => {
                    lexeme.push(ch);
                    self.advance();
                    if ch == quote {
                        return Ok(lexeme);
                    }
                }
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.current + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.current += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Parses the module declaration of a `module-info.java` compilation unit.
pub fn parse_module_declaration(
    text: &str,
    options: &ParserOptions,
) -> Result<ModuleDescriptor, SourceParseError> {
    if !options.supports_modules() {
        return Err(SourceParseError::ModulesUnsupported {
            level: options.source_level,
        });
    }
    let tokens = Tokenizer::new(text).tokenize()?;
    ModuleParser { tokens, position: 0 }.compilation_unit()
}

struct ModuleParser {
    tokens: Vec<Token>,
    position: usize,
}

impl ModuleParser {
    fn compilation_unit(mut self) -> Result<ModuleDescriptor, SourceParseError> {
        while self.at_keyword("import") {
            self.skip_through_semicolon()?;
        }
        while self.at(TokenKind::At) {
            self.annotation()?;
        }
        if self.peek().is_none() {
            return Err(SourceParseError::MissingModuleDeclaration);
        }

        let open = self.eat_keyword("open");
        if !self.eat_keyword("module") {
            return Err(self.unexpected("'module'"));
        }
        let mut module = ModuleDescriptor::new(self.qualified_name()?);
        module.open = open;
        self.expect(TokenKind::LeftBrace, "'{'")?;

        loop {
            let Some(token) = self.peek() else {
                return Err(SourceParseError::UnexpectedEof {
                    expected: "'}'".to_string(),
                });
            };
            if token.kind == TokenKind::RightBrace {
                self.position += 1;
                break;
            }
            let keyword = token.lexeme.clone();
            match keyword.as_str() {
                "requires" => {
                    self.position += 1;
                    module.requires.push(self.requires()?);
                }
                "exports" => {
                    self.position += 1;
                    module.exports.push(self.package_directive()?);
                }
                "opens" => {
                    self.position += 1;
                    module.opens.push(self.package_directive()?);
                }
                "uses" => {
                    self.position += 1;
                    module.uses.push(self.qualified_name()?);
                    self.expect(TokenKind::Semicolon, "';'")?;
                }
                "provides" => {
                    self.position += 1;
                    module.provides.push(self.provides()?);
                }
                _ => return Err(self.unexpected("a module directive")),
            }
        }

        match self.peek() {
            None => Ok(module),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    fn requires(&mut self) -> Result<ModuleRequirement, SourceParseError> {
        let mut transitive = false;
        let mut is_static = false;
        loop {
            let modifier = ["transitive", "static"]
                .into_iter()
                .find(|keyword| self.at_keyword(keyword));
            let followed_by_name = matches!(
                self.peek_at(1).map(|token| token.kind),
                Some(TokenKind::Identifier)
            );
            match modifier {
                Some("transitive") if followed_by_name => transitive = true,
                Some("static") if followed_by_name => is_static = true,
                _ => break,
            }
            self.position += 1;
        }
        let name = self.qualified_name()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(ModuleRequirement {
            name,
            transitive,
            is_static,
        })
    }

    fn package_directive(&mut self) -> Result<PackageExport, SourceParseError> {
        let package = self.qualified_name()?;
        let mut targets = Vec::new();
        if self.eat_keyword("to") {
            targets = self.name_list()?;
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(PackageExport { package, targets })
    }

    fn provides(&mut self) -> Result<ServiceProvision, SourceParseError> {
        let service = self.qualified_name()?;
        if !self.eat_keyword("with") {
            return Err(self.unexpected("'with'"));
        }
        let implementations = self.name_list()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(ServiceProvision {
            service,
            implementations,
        })
    }

    fn name_list(&mut self) -> Result<Vec<String>, SourceParseError> {
        let mut names = vec![self.qualified_name()?];
        while self.at(TokenKind::Comma) {
            self.position += 1;
            names.push(self.qualified_name()?);
        }
        Ok(names)
    }

    fn qualified_name(&mut self) -> Result<String, SourceParseError> {
        let mut name = self.identifier()?;
        while self.at(TokenKind::Dot) {
            self.position += 1;
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn identifier(&mut self) -> Result<String, SourceParseError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                let lexeme = token.lexeme.clone();
                self.position += 1;
                Ok(lexeme)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// `@Name` or `@Name(...)` with balanced parentheses.
    fn annotation(&mut self) -> Result<(), SourceParseError> {
        self.expect(TokenKind::At, "'@'")?;
        self.qualified_name()?;
        if !self.at(TokenKind::LeftParen) {
            return Ok(());
        }
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth -= 1,
                _ => {}
            }
            self.position += 1;
            if depth == 0 {
                return Ok(());
            }
        }
        Err(SourceParseError::UnexpectedEof {
            expected: "')'".to_string(),
        })
    }

    fn skip_through_semicolon(&mut self) -> Result<(), SourceParseError> {
        while let Some(token) = self.peek() {
            let done = token.kind == TokenKind::Semicolon;
            self.position += 1;
            if done {
                return Ok(());
            }
        }
        Err(SourceParseError::UnexpectedEof {
            expected: "';'".to_string(),
        })
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), SourceParseError> {
        if self.at(kind) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Identifier && token.lexeme == keyword)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn unexpected(&self, expected: &str) -> SourceParseError {
        match self.peek() {
            Some(token) => SourceParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.lexeme.clone(),
                line: token.line,
                column: token.column,
            },
            None => SourceParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }
}
