//! Recursive-descent parser over the lexer cursor.
//!
//! Classes are resolved at parse time: a class must be declared before it is
//! instantiated or named as a parent, and the class object is embedded in
//! the AST node that uses it. Method bodies are wrapped in `MethodBody` so
//! `return` unwinds no further than its own method.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::Statement;
use crate::lexer::{Lexer, LexerError};
use crate::runtime::compare::Comparator;
use crate::runtime::object::{Class, Method};
use crate::token::Token;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("Unexpected token {found}")]
    UnexpectedToken { found: String },
    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },
    #[error("Unknown callable '{name}'")]
    UnknownCallable { name: String },
    #[error("The first parameter of method '{method}' must be 'self'")]
    MissingSelfParameter { method: String },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a whole program into its top-level `Compound` node.
pub fn parse(lexer: &mut Lexer) -> ParseResult<Statement> {
    Parser::new(lexer).parse_program()
}

struct Parser<'a> {
    lexer: &'a mut Lexer,
    classes: HashMap<String, Rc<Class>>,
}

impl<'a> Parser<'a> {
    fn new(lexer: &'a mut Lexer) -> Self {
        Self {
            lexer,
            classes: HashMap::new(),
        }
    }

    fn parse_program(mut self) -> ParseResult<Statement> {
        let mut statements = Vec::new();
        while self.lexer.current() != &Token::Eof {
            statements.push(self.parse_statement()?);
        }
        Ok(Statement::Compound(statements))
    }

    fn advance(&mut self) {
        self.lexer.next_token();
    }

    /// Assert the current token and step past it.
    fn consume(&mut self, expected: &Token) -> ParseResult<()> {
        self.lexer.expect(expected)?;
        self.advance();
        Ok(())
    }

    fn consume_id(&mut self) -> ParseResult<String> {
        let name = self.lexer.expect_id()?.to_string();
        self.advance();
        Ok(name)
    }

    fn unexpected<T>(&self) -> ParseResult<T> {
        Err(ParseError::UnexpectedToken {
            found: self.lexer.current().to_string(),
        })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.lexer.current() {
            Token::Class => self.parse_class(),
            Token::If => self.parse_if(),
            Token::Return => self.parse_return(),
            Token::Print => self.parse_print(),
            Token::Id(_) => self.parse_assignment_or_call(),
            _ => self.unexpected(),
        }
    }

    fn parse_class(&mut self) -> ParseResult<Statement> {
        self.consume(&Token::Class)?;
        let name = self.consume_id()?;
        let parent = if self.lexer.current() == &Token::Char('(') {
            self.advance();
            let parent_name = self.consume_id()?;
            self.consume(&Token::Char(')'))?;
            let parent = self
                .classes
                .get(&parent_name)
                .cloned()
                .ok_or(ParseError::UnknownClass { name: parent_name })?;
            Some(parent)
        } else {
            None
        };
        self.consume(&Token::Char(':'))?;
        self.consume(&Token::Newline)?;
        self.consume(&Token::Indent)?;
        let mut methods = Vec::new();
        while self.lexer.current() == &Token::Def {
            methods.push(self.parse_method()?);
        }
        self.consume(&Token::Dedent)?;

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, class.clone());
        Ok(Statement::class_definition(class))
    }

    fn parse_method(&mut self) -> ParseResult<Method> {
        self.consume(&Token::Def)?;
        let name = self.consume_id()?;
        self.consume(&Token::Char('('))?;
        let receiver = self.consume_id()?;
        if receiver != "self" {
            return Err(ParseError::MissingSelfParameter { method: name });
        }
        // `self` is bound by the runtime, not listed as a formal.
        let mut formal_params = Vec::new();
        while self.lexer.current() == &Token::Char(',') {
            self.advance();
            formal_params.push(self.consume_id()?);
        }
        self.consume(&Token::Char(')'))?;
        self.consume(&Token::Char(':'))?;
        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Statement::MethodBody(Box::new(body)),
        })
    }

    /// An indented block: NEWLINE INDENT statement+ DEDENT.
    fn parse_suite(&mut self) -> ParseResult<Statement> {
        self.consume(&Token::Newline)?;
        self.consume(&Token::Indent)?;
        let mut statements = Vec::new();
        while self.lexer.current() != &Token::Dedent {
            statements.push(self.parse_statement()?);
        }
        self.consume(&Token::Dedent)?;
        Ok(Statement::Compound(statements))
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.consume(&Token::If)?;
        let condition = self.parse_test()?;
        self.consume(&Token::Char(':'))?;
        let if_body = self.parse_suite()?;
        let else_body = if self.lexer.current() == &Token::Else {
            self.advance();
            self.consume(&Token::Char(':'))?;
            Some(Box::new(self.parse_suite()?))
        } else {
            None
        };
        Ok(Statement::IfElse {
            condition: Box::new(condition),
            if_body: Box::new(if_body),
            else_body,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Statement> {
        self.consume(&Token::Return)?;
        let value = if self.lexer.current() == &Token::Newline {
            Statement::None
        } else {
            self.parse_test()?
        };
        self.consume(&Token::Newline)?;
        Ok(Statement::Return(Box::new(value)))
    }

    fn parse_print(&mut self) -> ParseResult<Statement> {
        self.consume(&Token::Print)?;
        let mut args = Vec::new();
        if self.lexer.current() != &Token::Newline {
            args.push(self.parse_test()?);
            while self.lexer.current() == &Token::Char(',') {
                self.advance();
                args.push(self.parse_test()?);
            }
        }
        self.consume(&Token::Newline)?;
        Ok(Statement::Print { args })
    }

    /// Statements rooted at an identifier: an assignment to a name or a
    /// dotted field, a call used for effect, or a bare variable reference.
    fn parse_assignment_or_call(&mut self) -> ParseResult<Statement> {
        let first = self.consume_id()?;
        if self.lexer.current() == &Token::Char('(') {
            let node = self.parse_bare_call(first)?;
            let node = self.parse_postfix_calls(node)?;
            self.consume(&Token::Newline)?;
            return Ok(node);
        }

        let mut ids = vec![first];
        while self.lexer.current() == &Token::Char('.') {
            self.advance();
            let segment = self.consume_id()?;
            if self.lexer.current() == &Token::Char('(') {
                let object = Statement::VariableValue { dotted_ids: ids };
                let args = self.parse_call_args()?;
                let node = Statement::MethodCall {
                    object: Box::new(object),
                    method: segment,
                    args,
                };
                let node = self.parse_postfix_calls(node)?;
                self.consume(&Token::Newline)?;
                return Ok(node);
            }
            ids.push(segment);
        }

        if self.lexer.current() == &Token::Char('=') {
            self.advance();
            let value = Box::new(self.parse_test()?);
            self.consume(&Token::Newline)?;
            let Some(field) = ids.pop() else {
                return self.unexpected();
            };
            return Ok(if ids.is_empty() {
                Statement::Assignment { var: field, value }
            } else {
                Statement::FieldAssignment {
                    object: ids,
                    field,
                    value,
                }
            });
        }

        // A bare reference; legal, if useless, as a statement.
        let node = Statement::VariableValue { dotted_ids: ids };
        self.consume(&Token::Newline)?;
        Ok(node)
    }

    /// `name(args)` where `name` is not preceded by a dot: `str(...)` or a
    /// declared class constructor. The language has no free functions.
    fn parse_bare_call(&mut self, name: String) -> ParseResult<Statement> {
        if name == "str" {
            self.consume(&Token::Char('('))?;
            let arg = self.parse_test()?;
            self.consume(&Token::Char(')'))?;
            return Ok(Statement::Stringify(Box::new(arg)));
        }
        if let Some(class) = self.classes.get(&name).cloned() {
            let args = self.parse_call_args()?;
            return Ok(Statement::NewInstance { class, args });
        }
        Err(ParseError::UnknownCallable { name })
    }

    fn parse_call_args(&mut self) -> ParseResult<Vec<Statement>> {
        self.consume(&Token::Char('('))?;
        let mut args = Vec::new();
        if self.lexer.current() != &Token::Char(')') {
            args.push(self.parse_test()?);
            while self.lexer.current() == &Token::Char(',') {
                self.advance();
                args.push(self.parse_test()?);
            }
        }
        self.consume(&Token::Char(')'))?;
        Ok(args)
    }

    /// Chained `.method(args)` postfixes on an already-parsed receiver.
    fn parse_postfix_calls(&mut self, mut node: Statement) -> ParseResult<Statement> {
        while self.lexer.current() == &Token::Char('.') {
            self.advance();
            let method = self.consume_id()?;
            let args = self.parse_call_args()?;
            node = Statement::MethodCall {
                object: Box::new(node),
                method,
                args,
            };
        }
        Ok(node)
    }

    fn parse_test(&mut self) -> ParseResult<Statement> {
        self.parse_or_test()
    }

    fn parse_or_test(&mut self) -> ParseResult<Statement> {
        let mut node = self.parse_and_test()?;
        while self.lexer.current() == &Token::Or {
            self.advance();
            let rhs = self.parse_and_test()?;
            node = Statement::Or {
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_and_test(&mut self) -> ParseResult<Statement> {
        let mut node = self.parse_not_test()?;
        while self.lexer.current() == &Token::And {
            self.advance();
            let rhs = self.parse_not_test()?;
            node = Statement::And {
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_not_test(&mut self) -> ParseResult<Statement> {
        if self.lexer.current() == &Token::Not {
            self.advance();
            let arg = self.parse_not_test()?;
            return Ok(Statement::Not(Box::new(arg)));
        }
        self.parse_comparison()
    }

    /// A single optional comparison; chained comparisons are not in the
    /// grammar.
    fn parse_comparison(&mut self) -> ParseResult<Statement> {
        let lhs = self.parse_expr()?;
        let cmp = match self.lexer.current() {
            Token::Eq => Comparator::Equal,
            Token::NotEq => Comparator::NotEqual,
            Token::LessOrEq => Comparator::LessOrEqual,
            Token::GreaterOrEq => Comparator::GreaterOrEqual,
            Token::Char('<') => Comparator::Less,
            Token::Char('>') => Comparator::Greater,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_expr()?;
        Ok(Statement::Comparison {
            cmp,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_expr(&mut self) -> ParseResult<Statement> {
        let mut node = self.parse_term()?;
        loop {
            match self.lexer.current() {
                Token::Char('+') => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    node = Statement::Add {
                        lhs: Box::new(node),
                        rhs: Box::new(rhs),
                    };
                }
                Token::Char('-') => {
                    self.advance();
                    let rhs = self.parse_term()?;
                    node = Statement::Sub {
                        lhs: Box::new(node),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_term(&mut self) -> ParseResult<Statement> {
        let mut node = self.parse_factor()?;
        loop {
            match self.lexer.current() {
                Token::Char('*') => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    node = Statement::Mult {
                        lhs: Box::new(node),
                        rhs: Box::new(rhs),
                    };
                }
                Token::Char('/') => {
                    self.advance();
                    let rhs = self.parse_factor()?;
                    node = Statement::Div {
                        lhs: Box::new(node),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_factor(&mut self) -> ParseResult<Statement> {
        match self.lexer.current().clone() {
            Token::Number(value) => {
                self.advance();
                Ok(Statement::numeric(value))
            }
            Token::String(value) => {
                self.advance();
                Ok(Statement::string(value))
            }
            Token::True => {
                self.advance();
                Ok(Statement::boolean(true))
            }
            Token::False => {
                self.advance();
                Ok(Statement::boolean(false))
            }
            Token::None => {
                self.advance();
                Ok(Statement::None)
            }
            Token::Char('(') => {
                self.advance();
                let inner = self.parse_test()?;
                self.consume(&Token::Char(')'))?;
                self.parse_postfix_calls(inner)
            }
            Token::Id(name) => {
                self.advance();
                self.parse_primary_chain(name)
            }
            _ => self.unexpected(),
        }
    }

    /// An identifier-rooted primary: a variable chain, a bare call, or a
    /// method call, with optional postfix calls on the result.
    fn parse_primary_chain(&mut self, name: String) -> ParseResult<Statement> {
        if self.lexer.current() == &Token::Char('(') {
            let node = self.parse_bare_call(name)?;
            return self.parse_postfix_calls(node);
        }
        let mut ids = vec![name];
        while self.lexer.current() == &Token::Char('.') {
            self.advance();
            let segment = self.consume_id()?;
            if self.lexer.current() == &Token::Char('(') {
                let object = Statement::VariableValue { dotted_ids: ids };
                let args = self.parse_call_args()?;
                let node = Statement::MethodCall {
                    object: Box::new(object),
                    method: segment,
                    args,
                };
                return self.parse_postfix_calls(node);
            }
            ids.push(segment);
        }
        Ok(Statement::VariableValue { dotted_ids: ids })
    }
}
