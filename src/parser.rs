use crate::ast::*;
use crate::error::{ExprError, Position};
use crate::value::Value;

/// Deepest nesting of parentheses and prefix operators.
const MAX_DEPTH: usize = 100;
/// Most operators in one expression. Operator chains nest the tree too.
const MAX_OPERATORS: usize = 1024;

/// Parser state: tracks position in the input string.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
    operators: usize,
}

/// Parse a built expression string into an expression tree.
///
/// An input consisting only of whitespace parses to `undefined`.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
        operators: 0,
    };

    parser.skip_ws();
    if parser.at_end() {
        return Ok(Expr::Literal(Value::Undefined));
    }
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if !parser.at_end() {
        let begin = parser.position();
        parser.pos = parser.input.len();
        return Err(parser.error_span("Unexpected trailing input".to_string(), begin));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.advance(s.len());
            true
        } else {
            false
        }
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), ExprError> {
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.error_point(format!("Expected '{}'", ch)))
        }
    }

    /// Eat `word` only when it is not the prefix of a longer identifier.
    fn eat_keyword(&mut self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }
        let next = self.remaining()[word.len()..].chars().next();
        if next.map_or(false, is_ident_char) {
            return false;
        }
        self.advance(word.len());
        true
    }

    /// Current position in the source.
    fn position(&self) -> Position {
        Position {
            column: self.input[..self.pos].chars().count(),
            offset: self.pos,
        }
    }

    /// Create an error at a single point (current position).
    fn error_point(&self, message: String) -> ExprError {
        let pos = self.position();
        ExprError::syntax_error(message, pos, pos)
    }

    /// Create an error spanning from `begin` to the current position.
    fn error_span(&self, message: String, begin: Position) -> ExprError {
        ExprError::syntax_error(message, begin, self.position())
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_point("Expression nested too deeply".to_string()));
        }
        Ok(())
    }

    fn count_operator(&mut self) -> Result<(), ExprError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(self.error_point("Expression has too many operators".to_string()));
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
    }

    // ── Binary levels, loosest first ────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.eat_str("||") || self.eat_keyword("or") {
                self.count_operator()?;
                let right = self.parse_and()?;
                left = Expr::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_ws();
            if self.eat_str("&&") || self.eat_keyword("and") {
                self.count_operator()?;
                let right = self.parse_equality()?;
                left = Expr::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_relational()?;
        loop {
            self.skip_ws();
            // Longest operators first so `===` is not read as `==` + `=`.
            let op = if self.eat_str("===") {
                BinaryOp::StrictEq
            } else if self.eat_str("!==") {
                BinaryOp::StrictNe
            } else if self.eat_str("==") {
                BinaryOp::Eq
            } else if self.eat_str("!=") {
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            self.count_operator()?;
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("<=") {
                BinaryOp::Le
            } else if self.eat_str(">=") {
                BinaryOp::Ge
            } else if self.eat_char('<') {
                BinaryOp::Lt
            } else if self.eat_char('>') {
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            self.count_operator()?;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            let op = if self.eat_char('+') {
                BinaryOp::Add
            } else if self.eat_char('-') {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            self.count_operator()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            let op = if self.eat_char('*') {
                BinaryOp::Mul
            } else if self.eat_char('/') {
                BinaryOp::Div
            } else if self.eat_char('%') {
                BinaryOp::Rem
            } else {
                return Ok(left);
            };
            self.count_operator()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        let op = if self.eat_char('!') || self.eat_keyword("not") {
            UnaryOp::Not
        } else if self.eat_char('-') {
            UnaryOp::Neg
        } else if self.eat_char('+') {
            UnaryOp::Plus
        } else {
            return self.parse_primary();
        };
        self.count_operator()?;
        self.descend()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    // ── Primaries ───────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        self.skip_ws();
        match self.peek_char() {
            Some('(') => {
                self.advance(1);
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.skip_ws();
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(quote) if quote == '"' || quote == '\'' => self
                .parse_quoted_string(quote)
                .map(|s| Expr::Literal(Value::String(s))),
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.parse_number(),
            Some(ch) if is_ident_start(ch) => self.parse_identifier(),
            Some(_) => Err(self.error_point("Expected a value".to_string())),
            None => Err(self.error_point("Unexpected end of expression".to_string())),
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ExprError> {
        let begin = self.position();
        let start = self.pos;
        self.consume_digits();
        if self.eat_char('.') {
            self.consume_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let saved = self.pos;
            self.advance(1);
            if !self.eat_char('+') {
                self.eat_char('-');
            }
            if self.consume_digits() == 0 {
                self.pos = saved;
            }
        }
        let text = &self.input[start..self.pos];
        if self.peek_char().map_or(false, is_ident_char) {
            return Err(self.error_span(format!("Invalid number literal {:?}", text), begin));
        }
        text.parse::<f64>()
            .map(|n| Expr::Literal(Value::Number(n)))
            .map_err(|_| self.error_span(format!("Invalid number literal {:?}", text), begin))
    }

    fn consume_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                self.advance(1);
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn parse_quoted_string(&mut self, quote: char) -> Result<String, ExprError> {
        let begin = self.position();
        self.expect_char(quote)?;
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error_span("Unterminated string".to_string(), begin));
                }
                Some(ch) if ch == quote => {
                    self.advance(1);
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance(1);
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(ch) => ch,
                        None => {
                            return Err(self.error_span("Unterminated string".to_string(), begin));
                        }
                    };
                    self.advance(escaped.len_utf8().max(1));
                    result.push(escaped);
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }

    fn parse_identifier(&mut self) -> Result<Expr, ExprError> {
        let begin = self.position();
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
        let name = &self.input[start..self.pos];
        let literal = match name {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            "and" | "or" | "not" => {
                return Err(self.error_span(format!("Unexpected keyword '{}'", name), begin));
            }
            _ => {
                return Ok(Expr::Name {
                    name: name.to_string(),
                    begin,
                    end: self.position(),
                })
            }
        };
        Ok(Expr::Literal(literal))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
