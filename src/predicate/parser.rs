//! Tokenizer and recursive-descent parser for `when` expressions.
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! expr       := and_expr (OR and_expr)*
//! and_expr   := unary (AND unary)*
//! unary      := NOT unary | primary
//! primary    := '(' expr ')' | TRUE | FALSE | comparison
//! comparison := operand cmp_op operand
//!             | operand [NOT] BETWEEN operand AND operand
//! operand    := timestamp() | 'literal' | "literal"
//! ```
//!
//! Every comparison must involve `timestamp()`; the literal side must parse as
//! an instant. Anything else is rejected here, so the evaluator never sees a
//! malformed tree.

use super::ast::{CmpOp, TemporalExpr};
use super::instant::parse_instant;
use crate::error::{Result, TimecellError};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Word(String),
    Literal(String),
    Op(CmpOp),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '\'' | '"' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == c {
                        // A doubled quote is an escaped quote character.
                        if matches!(chars.peek(), Some(&(_, next)) if next == c) {
                            chars.next();
                            literal.push(c);
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    literal.push(ch);
                }
                if !closed {
                    return Err(TimecellError::malformed(pos, "unterminated string literal"));
                }
                TokenKind::Literal(literal)
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '=')) => {
                        chars.next();
                        TokenKind::Op(CmpOp::Le)
                    }
                    Some(&(_, '>')) => {
                        chars.next();
                        TokenKind::Op(CmpOp::Ne)
                    }
                    _ => TokenKind::Op(CmpOp::Lt),
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    TokenKind::Op(CmpOp::Ge)
                } else {
                    TokenKind::Op(CmpOp::Gt)
                }
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                }
                TokenKind::Op(CmpOp::Eq)
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    TokenKind::Op(CmpOp::Ne)
                } else {
                    return Err(TimecellError::malformed(pos, "expected '=' after '!'"));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Word(word)
            }
            c if c.is_ascii_digit() => {
                return Err(TimecellError::malformed(
                    pos,
                    "numeric literals are not instants; quote the instant as a string",
                ));
            }
            other => {
                return Err(TimecellError::malformed(
                    pos,
                    format!("unexpected character '{}'", other),
                ));
            }
        };

        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

const KEYWORDS: &[&str] = &["and", "or", "not", "between", "true", "false"];

fn is_keyword(word: &str, keyword: &str) -> bool {
    word.eq_ignore_ascii_case(keyword)
}

#[derive(Debug, Clone, Copy)]
enum Operand {
    Timestamp,
    Instant(SystemTime),
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Word(w), .. }) if is_keyword(w, keyword)
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(TimecellError::malformed(
                self.position(),
                format!("expected {}", keyword.to_ascii_uppercase()),
            ))
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.cursor += 1;
                Ok(())
            }
            _ => Err(TimecellError::malformed(
                self.position(),
                format!("expected {}", what),
            )),
        }
    }

    fn parse_or(&mut self) -> Result<TemporalExpr> {
        let mut expr = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            expr = expr.or(rhs);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<TemporalExpr> {
        let mut expr = self.parse_unary()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_unary()?;
            expr = expr.and(rhs);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<TemporalExpr> {
        if self.eat_keyword("not") {
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<TemporalExpr> {
        if matches!(self.peek(), Some(Token { kind: TokenKind::LParen, .. })) {
            self.cursor += 1;
            let expr = self.parse_or()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(expr);
        }
        if self.eat_keyword("true") {
            return Ok(TemporalExpr::Const(true));
        }
        if self.eat_keyword("false") {
            return Ok(TemporalExpr::Const(false));
        }
        self.parse_comparison()
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let pos = self.position();
        let Some(token) = self.advance() else {
            return Err(TimecellError::malformed(
                pos,
                "unexpected end of expression; expected timestamp() or a quoted instant",
            ));
        };

        match token.kind {
            TokenKind::Literal(text) => parse_instant(&text)
                .map(Operand::Instant)
                .ok_or_else(|| {
                    TimecellError::malformed(
                        pos,
                        format!("cannot parse '{}' as an instant", text),
                    )
                }),
            TokenKind::Word(word) if is_keyword(&word, "timestamp") => {
                self.expect(TokenKind::LParen, "'(' after timestamp")?;
                self.expect(TokenKind::RParen, "')' after timestamp(")?;
                Ok(Operand::Timestamp)
            }
            TokenKind::Word(word) if KEYWORDS.iter().any(|k| is_keyword(&word, k)) => {
                Err(TimecellError::malformed(
                    pos,
                    format!(
                        "unexpected keyword {}; expected timestamp() or a quoted instant",
                        word.to_ascii_uppercase()
                    ),
                ))
            }
            TokenKind::Word(word) => {
                let is_call = matches!(self.peek(), Some(Token { kind: TokenKind::LParen, .. }));
                let message = if is_call {
                    format!(
                        "unsupported function '{}()'; only timestamp() may be referenced",
                        word
                    )
                } else {
                    format!(
                        "unsupported reference '{}'; only timestamp() may be referenced",
                        word
                    )
                };
                Err(TimecellError::malformed(pos, message))
            }
            _ => Err(TimecellError::malformed(
                pos,
                "expected timestamp() or a quoted instant",
            )),
        }
    }

    fn parse_comparison(&mut self) -> Result<TemporalExpr> {
        let start = self.position();
        let lhs = self.parse_operand()?;

        let negated_between = self.peek_keyword("not");
        if negated_between {
            self.cursor += 1;
            if !self.peek_keyword("between") {
                return Err(TimecellError::malformed(
                    self.position(),
                    "expected BETWEEN after NOT",
                ));
            }
        }

        if self.eat_keyword("between") {
            let low_pos = self.position();
            let low = self.parse_operand()?;
            self.expect_keyword("and")?;
            let high_pos = self.position();
            let high = self.parse_operand()?;

            let Operand::Timestamp = lhs else {
                return Err(TimecellError::malformed(
                    start,
                    "BETWEEN requires timestamp() as its subject",
                ));
            };
            let low = require_instant(low, low_pos)?;
            let high = require_instant(high, high_pos)?;

            let expr = TemporalExpr::between(low, high);
            return Ok(if negated_between { expr.negate() } else { expr });
        }

        let op_pos = self.position();
        let op = match self.advance() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => op,
            _ => {
                return Err(TimecellError::malformed(
                    op_pos,
                    "expected a comparison operator or BETWEEN",
                ));
            }
        };

        let rhs_pos = self.position();
        let rhs = self.parse_operand()?;

        match (lhs, rhs) {
            (Operand::Timestamp, Operand::Instant(instant)) => Ok(TemporalExpr::cmp(op, instant)),
            (Operand::Instant(instant), Operand::Timestamp) => {
                Ok(TemporalExpr::cmp(op.flip(), instant))
            }
            (Operand::Instant(a), Operand::Instant(b)) => Ok(TemporalExpr::Const(op.apply(a, b))),
            (Operand::Timestamp, Operand::Timestamp) => Err(TimecellError::malformed(
                rhs_pos,
                "timestamp() cannot be compared with itself",
            )),
        }
    }
}

fn require_instant(operand: Operand, pos: usize) -> Result<SystemTime> {
    match operand {
        Operand::Instant(instant) => Ok(instant),
        Operand::Timestamp => Err(TimecellError::malformed(
            pos,
            "BETWEEN bounds must be quoted instants",
        )),
    }
}

/// Parse a `when` expression into a [`TemporalExpr`].
pub fn parse(input: &str) -> Result<TemporalExpr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(TimecellError::malformed(0, "empty expression"));
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: input.len(),
    };
    let expr = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        let message = match token.kind {
            TokenKind::RParen => "unbalanced ')'".to_string(),
            _ => "unexpected trailing input".to_string(),
        };
        return Err(TimecellError::malformed(token.pos, message));
    }

    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::instant::parse_instant as instant;

    fn at(s: &str) -> SystemTime {
        instant(s).unwrap()
    }

    fn error_position(input: &str) -> usize {
        match parse(input) {
            Err(TimecellError::MalformedPredicate { position, .. }) => position,
            other => panic!("expected malformed predicate for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_parse_between() {
        let expr = parse("timestamp() BETWEEN '2015-01-01' AND '2030-01-06'").unwrap();
        assert_eq!(
            expr,
            TemporalExpr::between(at("2015-01-01"), at("2030-01-06"))
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let upper = parse("TIMESTAMP() BETWEEN '2015-01-01' AND '2016-01-01'").unwrap();
        let lower = parse("timestamp() between '2015-01-01' and '2016-01-01'").unwrap();
        let mixed = parse("TimeStamp() BeTwEeN '2015-01-01' aNd '2016-01-01'").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_parse_comparisons() {
        let t = at("2015-06-01");
        let cases = [
            ("timestamp() < '2015-06-01'", CmpOp::Lt),
            ("timestamp() <= '2015-06-01'", CmpOp::Le),
            ("timestamp() > '2015-06-01'", CmpOp::Gt),
            ("timestamp() >= '2015-06-01'", CmpOp::Ge),
            ("timestamp() = '2015-06-01'", CmpOp::Eq),
            ("timestamp() == '2015-06-01'", CmpOp::Eq),
            ("timestamp() != '2015-06-01'", CmpOp::Ne),
            ("timestamp() <> '2015-06-01'", CmpOp::Ne),
        ];
        for (input, op) in cases {
            assert_eq!(parse(input).unwrap(), TemporalExpr::cmp(op, t), "{}", input);
        }
    }

    #[test]
    fn test_literal_on_left_is_flipped() {
        let expr = parse("'2015-06-01' < timestamp()").unwrap();
        assert_eq!(expr, TemporalExpr::cmp(CmpOp::Gt, at("2015-06-01")));
    }

    #[test]
    fn test_literal_comparison_folds() {
        assert_eq!(
            parse("'2015-01-01' < '2016-01-01'").unwrap(),
            TemporalExpr::Const(true)
        );
        assert_eq!(
            parse("'2015-01-01' > '2016-01-01' OR timestamp() < '2015-01-01'").unwrap(),
            TemporalExpr::cmp(CmpOp::Lt, at("2015-01-01"))
        );
    }

    #[test]
    fn test_precedence() {
        let a = TemporalExpr::cmp(CmpOp::Lt, at("2015-01-01"));
        let b = TemporalExpr::cmp(CmpOp::Gt, at("2016-01-01"));
        let c = TemporalExpr::cmp(CmpOp::Eq, at("2017-01-01"));

        let expr = parse(
            "timestamp() < '2015-01-01' OR timestamp() > '2016-01-01' \
             AND timestamp() = '2017-01-01'",
        )
        .unwrap();
        assert_eq!(expr, a.clone().or(b.clone().and(c.clone())));

        let expr = parse(
            "(timestamp() < '2015-01-01' OR timestamp() > '2016-01-01') \
             AND timestamp() = '2017-01-01'",
        )
        .unwrap();
        assert_eq!(expr, a.clone().or(b.clone()).and(c));

        let expr = parse("NOT timestamp() < '2015-01-01' AND timestamp() > '2016-01-01'").unwrap();
        assert_eq!(expr, a.negate().and(b));
    }

    #[test]
    fn test_not_between() {
        let expr = parse("timestamp() NOT BETWEEN '2015-01-01' AND '2016-01-01'").unwrap();
        assert_eq!(
            expr,
            TemporalExpr::between(at("2015-01-01"), at("2016-01-01")).negate()
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(parse("TRUE").unwrap(), TemporalExpr::Const(true));
        assert_eq!(
            parse("false OR timestamp() > '2015-01-01'").unwrap(),
            TemporalExpr::cmp(CmpOp::Gt, at("2015-01-01"))
        );
    }

    #[test]
    fn test_double_quoted_and_escaped_literals() {
        assert_eq!(
            parse("timestamp() < \"2015-01-01\"").unwrap(),
            TemporalExpr::cmp(CmpOp::Lt, at("2015-01-01"))
        );
        // Escaped quote makes the literal unparseable as an instant.
        assert!(parse("timestamp() < '2015''01'").is_err());
    }

    #[test]
    fn test_python_style_timestamps() {
        let expr = parse(
            "timestamp() between '2015-10-05 14:03:22.123456' and '2015-10-05 16:03:22.123456'",
        )
        .unwrap();
        assert_eq!(
            expr,
            TemporalExpr::between(
                at("2015-10-05T14:03:22.123456Z"),
                at("2015-10-05T16:03:22.123456Z")
            )
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let inputs = [
            "",
            "   ",
            "timestamp()",
            "timestamp() < 'not a date'",
            "timestamp() < 2015",
            "x < '2015-01-01'",
            "rowName() = '9'",
            "latest_timestamp() < '2015-01-01'",
            "timestamp < '2015-01-01'",
            "timestamp() < timestamp()",
            "timestamp() BETWEEN '2015-01-01'",
            "timestamp() BETWEEN '2015-01-01' OR '2016-01-01'",
            "timestamp() BETWEEN timestamp() AND '2016-01-01'",
            "'2015-01-01' BETWEEN timestamp() AND '2016-01-01'",
            "(timestamp() < '2015-01-01'",
            "timestamp() < '2015-01-01')",
            "timestamp() < '2015-01-01' timestamp() > '2014-01-01'",
            "timestamp() LIKE '2015-01-01'",
            "timestamp() < '2015-01-01",
            "timestamp() ! '2015-01-01'",
            "timestamp() ~ '2015-01-01'",
            "timestamp() NOT '2015-01-01'",
            "timestamp() < AND",
            "AND timestamp() < '2015-01-01'",
        ];
        for input in inputs {
            let err = parse(input).unwrap_err();
            assert!(err.is_malformed_predicate(), "{:?} -> {:?}", input, err);
        }
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(error_position(""), 0);
        assert_eq!(error_position("timestamp() < 'soon'"), 14);
        assert_eq!(error_position("x < '2015-01-01'"), 0);
        assert_eq!(error_position("timestamp() < '2015-01-01')"), 26);
        assert_eq!(error_position("timestamp()"), 11);
        assert_eq!(error_position("timestamp() < '2015"), 14);
    }
}
