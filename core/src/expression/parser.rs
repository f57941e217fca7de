//! Expression parser for two-variable formulas.
//!
//! Supports:
//! - Numbers (integers, floats, scientific notation), optionally with a
//!   bracketed unit suffix: `9.81[m/s^2]`
//! - The two declared variable names
//! - Arithmetic operators (+, -, *, /, ^ and **)
//! - Parentheses for grouping
//! - The functions of [`Function`] with checked arity
//! - Built-in constants (pi, e)

use super::ast::{BinaryOperator, Expr, ExprKind, Function, Slot, Span, UnaryOperator};
use crate::error::{ContourError, ContourResult, SymbolKind};
use std::iter::Peekable;
use std::str::Chars;

/// Default cap on nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number { value: f64, unit: Option<String> },
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eof,
}

fn syntax(message: impl Into<String>, span: Span) -> ContourError {
    ContourError::Syntax {
        message: message.into(),
        span,
    }
}

/// Tokenizer
struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    fn next_token(&mut self) -> ContourResult<(Token, Span)> {
        self.skip_whitespace();

        let pos = self.position;
        let single = |lexer: &mut Self, token: Token| -> ContourResult<(Token, Span)> {
            lexer.advance();
            Ok((token, Span::new(pos, pos + 1)))
        };

        match self.chars.peek() {
            None => Ok((Token::Eof, Span::new(pos, pos))),
            Some(&c) => match c {
                '+' => single(self, Token::Plus),
                '-' => single(self, Token::Minus),
                '*' => {
                    self.advance();
                    if self.chars.peek() == Some(&'*') {
                        self.advance();
                        Ok((Token::Caret, Span::new(pos, pos + 2)))
                    } else {
                        Ok((Token::Star, Span::new(pos, pos + 1)))
                    }
                }
                '/' => single(self, Token::Slash),
                '^' => single(self, Token::Caret),
                '(' => single(self, Token::LParen),
                ')' => single(self, Token::RParen),
                ',' => single(self, Token::Comma),
                c if c.is_ascii_digit() || c == '.' => self.read_number(),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let name = self.read_identifier();
                    Ok((Token::Identifier(name), Span::new(pos, self.position)))
                }
                _ => Err(syntax(
                    format!("Unexpected character: '{}'", c),
                    Span::new(pos, pos + 1),
                )),
            },
        }
    }

    fn advance(&mut self) -> Option<char> {
        self.position += 1;
        self.chars.next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> ContourResult<(Token, Span)> {
        let pos = self.position;
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                num_str.push(c);
                self.advance();
            } else if c == '.' && !has_dot {
                has_dot = true;
                num_str.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Scientific notation (1e10, 1.5e-3)
        if let Some(&c) = self.chars.peek() {
            if c == 'e' || c == 'E' {
                num_str.push(c);
                self.advance();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        num_str.push(sign);
                        self.advance();
                    }
                }
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        num_str.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let value = num_str.parse::<f64>().map_err(|_| {
            syntax(
                format!("Invalid number: '{}'", num_str),
                Span::new(pos, self.position),
            )
        })?;

        let mut end = self.position;
        self.skip_whitespace();
        let unit = if self.chars.peek() == Some(&'[') {
            let unit = self.read_unit_suffix(pos)?;
            end = self.position;
            Some(unit)
        } else {
            None
        };

        Ok((Token::Number { value, unit }, Span::new(pos, end)))
    }

    fn read_unit_suffix(&mut self, number_start: usize) -> ContourResult<String> {
        self.advance(); // consume '['
        let mut unit = String::new();
        loop {
            match self.advance() {
                Some(']') => break,
                Some('[') | None => {
                    return Err(syntax(
                        "Unterminated unit suffix, expected ']'",
                        Span::new(number_start, self.position),
                    ))
                }
                Some(c) => unit.push(c),
            }
        }
        Ok(unit.trim().to_string())
    }

    fn read_identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }
}

/// Parser for expressions
struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    span: Span,
    symbols: [&'a str; 2],
    max_depth: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, symbols: [&'a str; 2], max_depth: usize) -> ContourResult<Self> {
        let mut lexer = Lexer::new(input);
        let (current, span) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            span,
            symbols,
            max_depth,
            depth: 0,
        })
    }

    fn advance(&mut self) -> ContourResult<()> {
        let (token, span) = self.lexer.next_token()?;
        self.current = token;
        self.span = span;
        Ok(())
    }

    fn enter(&mut self) -> ContourResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ContourError::LimitExceeded(format!(
                "expression nesting deeper than {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn parse(&mut self) -> ContourResult<Expr> {
        let expr = self.parse_additive()?;
        if self.current != Token::Eof {
            return Err(syntax(
                format!("Unexpected token after expression: {:?}", self.current),
                self.span,
            ));
        }
        Ok(expr)
    }

    // Additive: term (('+' | '-') term)*
    fn parse_additive(&mut self) -> ContourResult<Expr> {
        self.enter()?;
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        self.depth -= 1;
        Ok(left)
    }

    // Multiplicative: unary (('*' | '/') unary)*
    fn parse_multiplicative(&mut self) -> ContourResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current {
                Token::Star => BinaryOperator::Mul,
                Token::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    // Unary: ('-' | '+') unary | power
    fn parse_unary(&mut self) -> ContourResult<Expr> {
        match self.current {
            Token::Minus => {
                let start = self.span;
                self.advance()?;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                let span = start.to(operand.span);
                Ok(Expr::new(
                    ExprKind::UnaryOp {
                        op: UnaryOperator::Neg,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            Token::Plus => {
                // No-op; a run of them is consumed without recursing.
                while self.current == Token::Plus {
                    self.advance()?;
                }
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // Power: primary ('^' unary)?  (right associative, -x^2 == -(x^2))
    fn parse_power(&mut self) -> ContourResult<Expr> {
        let base = self.parse_primary()?;

        if self.current == Token::Caret {
            self.advance()?;
            self.enter()?;
            let exp = self.parse_unary()?;
            self.depth -= 1;
            let span = base.span.to(exp.span);
            Ok(Expr::new(
                ExprKind::BinaryOp {
                    op: BinaryOperator::Pow,
                    left: Box::new(base),
                    right: Box::new(exp),
                },
                span,
            ))
        } else {
            Ok(base)
        }
    }

    // Primary: number | variable | constant | function_call | '(' expr ')'
    fn parse_primary(&mut self) -> ContourResult<Expr> {
        let span = self.span;
        match &self.current {
            Token::Number { value, unit } => {
                let kind = ExprKind::Literal {
                    value: *value,
                    unit: unit.clone(),
                };
                self.advance()?;
                Ok(Expr::new(kind, span))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;

                if self.current == Token::LParen {
                    return self.parse_call(name, span);
                }
                if name == self.symbols[0] {
                    return Ok(Expr::new(ExprKind::Variable { slot: Slot::First, name }, span));
                }
                if name == self.symbols[1] {
                    return Ok(Expr::new(ExprKind::Variable { slot: Slot::Second, name }, span));
                }
                match name.as_str() {
                    "PI" | "pi" => Ok(constant(std::f64::consts::PI, span)),
                    "E" | "e" => Ok(constant(std::f64::consts::E, span)),
                    _ => Err(ContourError::UnknownSymbol {
                        name,
                        kind: SymbolKind::Variable,
                        span,
                    }),
                }
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_additive()?;
                if self.current != Token::RParen {
                    return Err(syntax("Expected ')'", self.span));
                }
                let close = self.span;
                self.advance()?;
                Ok(Expr::new(expr.kind, span.to(close)))
            }
            Token::Eof => Err(syntax("Unexpected end of expression", span)),
            other => Err(syntax(format!("Unexpected token: {:?}", other), span)),
        }
    }

    fn parse_call(&mut self, name: String, name_span: Span) -> ContourResult<Expr> {
        let function = Function::from_name(&name).ok_or_else(|| ContourError::UnknownSymbol {
            name: name.clone(),
            kind: SymbolKind::Function,
            span: name_span,
        })?;
        self.advance()?; // consume '('

        let mut args = Vec::new();
        if self.current != Token::RParen {
            loop {
                args.push(self.parse_additive()?);
                if self.current == Token::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        if self.current != Token::RParen {
            return Err(syntax(
                format!("Expected ')' after arguments of {}", name),
                self.span,
            ));
        }
        let span = name_span.to(self.span);
        self.advance()?; // consume ')'

        if args.len() != function.arity() {
            return Err(syntax(
                format!(
                    "{} expects {} argument{}, got {}",
                    name,
                    function.arity(),
                    if function.arity() == 1 { "" } else { "s" },
                    args.len()
                ),
                span,
            ));
        }
        Ok(Expr::new(ExprKind::Call { function, args }, span))
    }
}

fn constant(value: f64, span: Span) -> Expr {
    Expr::new(ExprKind::Literal { value, unit: None }, span)
}

/// Parse an expression over the two variable names in `symbols`.
pub fn parse_expression(input: &str, symbols: [&str; 2]) -> ContourResult<Expr> {
    parse_expression_with_depth(input, symbols, DEFAULT_MAX_DEPTH)
}

/// [`parse_expression`] with an explicit nesting cap.
pub fn parse_expression_with_depth(
    input: &str,
    symbols: [&str; 2],
    max_depth: usize,
) -> ContourResult<Expr> {
    if input.trim().is_empty() {
        return Err(syntax("Empty expression", Span::new(0, 0)));
    }
    let mut parser = Parser::new(input, symbols, max_depth)?;
    let expr = parser.parse()?;
    // Flat operator chains nest without recursing in the parser.
    if expr.depth() > max_depth {
        return Err(ContourError::LimitExceeded(format!(
            "expression tree deeper than {}",
            max_depth
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    const XY: [&str; 2] = ["x", "y"];

    fn parse(input: &str) -> Expr {
        parse_expression(input, XY).unwrap()
    }

    fn lit(value: f64) -> ExprKind {
        ExprKind::Literal { value, unit: None }
    }

    #[test]
    fn test_parse_simple_number() {
        assert_eq!(parse("42").kind, lit(42.0));
    }

    #[test]
    fn test_parse_scientific_notation() {
        if let ExprKind::Literal { value, .. } = parse("1.5e-3").kind {
            assert!((value - 0.0015).abs() < 1e-10);
        } else {
            panic!("Expected number");
        }
    }

    #[test]
    fn test_parse_literal_unit_suffix() {
        let expr = parse("9.81 [m/s^2]");
        assert_eq!(
            expr.kind,
            ExprKind::Literal {
                value: 9.81,
                unit: Some("m/s^2".to_string())
            }
        );
        assert_eq!(expr.span, Span::new(0, 12));
    }

    #[test]
    fn test_parse_variables_bind_to_slots() {
        let expr = parse_expression("a * b", ["a", "b"]).unwrap();
        match expr.kind {
            ExprKind::BinaryOp { left, right, .. } => {
                assert!(matches!(left.kind, ExprKind::Variable { slot: Slot::First, .. }));
                assert!(matches!(right.kind, ExprKind::Variable { slot: Slot::Second, .. }));
            }
            _ => panic!("Expected binary op"),
        }
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 should parse as 1 + (2 * 3)
        match parse("1 + 2 * 3").kind {
            ExprKind::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::Add);
                assert_eq!(left.kind, lit(1.0));
                assert!(matches!(right.kind, ExprKind::BinaryOp { op: BinaryOperator::Mul, .. }));
            }
            _ => panic!("Expected binary op"),
        }
    }

    #[test]
    fn test_parse_subtraction_left_associative() {
        // 8 - 4 - 2 == (8 - 4) - 2
        match parse("8 - 4 - 2").kind {
            ExprKind::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::Sub);
                assert_eq!(right.kind, lit(2.0));
                assert!(matches!(left.kind, ExprKind::BinaryOp { op: BinaryOperator::Sub, .. }));
            }
            _ => panic!("Expected binary op"),
        }
    }

    #[test]
    fn test_parse_power_right_associative() {
        // 2 ^ 3 ** 2 == 2 ^ (3 ^ 2)
        match parse("2 ^ 3 ** 2").kind {
            ExprKind::BinaryOp { op, left, right } => {
                assert_eq!(op, BinaryOperator::Pow);
                assert_eq!(left.kind, lit(2.0));
                assert!(matches!(right.kind, ExprKind::BinaryOp { op: BinaryOperator::Pow, .. }));
            }
            _ => panic!("Expected binary op"),
        }
    }

    #[test]
    fn test_parse_negation_binds_looser_than_power() {
        match parse("-x^2").kind {
            ExprKind::UnaryOp { op, operand } => {
                assert_eq!(op, UnaryOperator::Neg);
                assert!(matches!(operand.kind, ExprKind::BinaryOp { op: BinaryOperator::Pow, .. }));
            }
            _ => panic!("Expected unary op"),
        }
    }

    #[test]
    fn test_parse_negative_exponent() {
        match parse("x^-2").kind {
            ExprKind::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Pow);
                assert!(matches!(right.kind, ExprKind::UnaryOp { .. }));
            }
            _ => panic!("Expected binary op"),
        }
    }

    #[test]
    fn test_parse_function() {
        match parse("sqrt(16)").kind {
            ExprKind::Call { function, args } => {
                assert_eq!(function, Function::Sqrt);
                assert_eq!(args.len(), 1);
                assert_eq!(args[0].kind, lit(16.0));
            }
            _ => panic!("Expected function call"),
        }
    }

    #[test]
    fn test_parse_two_argument_function() {
        match parse("atan2(y, x)").kind {
            ExprKind::Call { function, args } => {
                assert_eq!(function, Function::Atan2);
                assert_eq!(args.len(), 2);
            }
            _ => panic!("Expected function call"),
        }
    }

    #[test]
    fn test_parse_log_is_natural_log() {
        assert!(matches!(
            parse("log(x)").kind,
            ExprKind::Call { function: Function::Log, .. }
        ));
    }

    #[test]
    fn test_parse_constant_pi() {
        assert_eq!(parse("pi").kind, lit(std::f64::consts::PI));
    }

    #[test]
    fn test_parse_span_covers_parentheses() {
        let expr = parse("(x + y) * 2");
        assert_eq!(expr.span, Span::new(0, 11));
    }

    #[test]
    fn test_parse_empty_error() {
        assert!(matches!(
            parse_expression("   ", XY),
            Err(ContourError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_token_error() {
        match parse_expression("1 $ 2", XY) {
            Err(ContourError::Syntax { span, .. }) => assert_eq!(span, Span::new(2, 3)),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_paren_error() {
        assert!(matches!(
            parse_expression("(1 + 2", XY),
            Err(ContourError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_unknown_variable() {
        match parse_expression("x + z", XY) {
            Err(ContourError::UnknownSymbol { name, kind, span }) => {
                assert_eq!(name, "z");
                assert_eq!(kind, SymbolKind::Variable);
                assert_eq!(span, Span::new(4, 5));
            }
            other => panic!("Expected unknown symbol, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_function() {
        assert!(matches!(
            parse_expression("mystery(x)", XY),
            Err(ContourError::UnknownSymbol { kind: SymbolKind::Function, .. })
        ));
    }

    #[test]
    fn test_parse_wrong_arity() {
        assert!(matches!(
            parse_expression("sin(x, y)", XY),
            Err(ContourError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_unterminated_unit_suffix() {
        assert!(matches!(
            parse_expression("2[m", XY),
            Err(ContourError::Syntax { .. })
        ));
    }

    #[test]
    fn test_parse_depth_limit() {
        let deep = format!("{}x{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            parse_expression_with_depth(&deep, XY, 16),
            Err(ContourError::LimitExceeded(_))
        ));
        assert!(parse_expression_with_depth(&deep, XY, 64).is_ok());
    }

    #[test]
    fn test_parse_long_chain_hits_depth_limit() {
        let chain = vec!["x"; 40].join(" + ");
        assert!(matches!(
            parse_expression_with_depth(&chain, XY, 16),
            Err(ContourError::LimitExceeded(_))
        ));
        assert!(parse_expression_with_depth(&chain, XY, 64).is_ok());
    }

    #[test]
    fn test_parse_unary_plus_run() {
        let pluses = format!("{}x", "+".repeat(4000));
        assert_eq!(
            parse_expression_with_depth(&pluses, XY, 16).unwrap().kind,
            ExprKind::Variable {
                slot: Slot::First,
                name: "x".to_string()
            }
        );

        // Interleaved minus signs still count against the limit.
        let mixed = format!("{}x", "+-".repeat(40));
        assert!(matches!(
            parse_expression_with_depth(&mixed, XY, 16),
            Err(ContourError::LimitExceeded(_))
        ));
        assert!(parse_expression_with_depth(&mixed, XY, 64).is_ok());
    }
}
