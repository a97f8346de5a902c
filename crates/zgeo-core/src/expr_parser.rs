//! 表达式文本解析器
//!
//! 解析 [`Expr`] 渲染出的文本语法：
//! - 数字: `12`、`0.5`
//! - 符号: `x7`、`y_12`
//! - 运算: `+ - * /`、一元负号、括号
//! - 函数: `sqrt(...)`

use crate::error::SimplifyError;
use crate::expr::Expr;
use crate::math::Rational;

/// 解析表达式文本
pub fn parse(input: &str) -> Result<Expr, SimplifyError> {
    let mut parser = Parser {
        chars: input.char_indices().collect(),
        pos: 0,
    };
    let expr = parser.expression()?;
    parser.skip_whitespace();
    if let Some((offset, c)) = parser.peek_char() {
        return Err(parser.error_at(offset, format!("Unexpected '{}'", c)));
    }
    Ok(expr)
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek_char(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or_else(|| self.chars.last().map_or(0, |(i, c)| i + c.len_utf8()), |(i, _)| *i)
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> SimplifyError {
        SimplifyError::Parse {
            position,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some((_, c)) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// 跳过空白后若下一个字符为 `expected` 则消费它
    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if matches!(self.peek_char(), Some((_, c)) if c == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, SimplifyError> {
        let mut lhs = self.term()?;
        loop {
            if self.eat('+') {
                lhs = lhs + self.term()?;
            } else if self.eat('-') {
                lhs = lhs - self.term()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Expr, SimplifyError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat('*') {
                lhs = lhs * self.unary()?;
            } else if self.eat('/') {
                lhs = lhs / self.unary()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    // unary := ('-' | '+') unary | primary
    fn unary(&mut self) -> Result<Expr, SimplifyError> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.primary()
    }

    // primary := number | identifier | 'sqrt' '(' expression ')' | '(' expression ')'
    fn primary(&mut self) -> Result<Expr, SimplifyError> {
        self.skip_whitespace();
        let Some((offset, c)) = self.peek_char() else {
            return Err(self.error_at(self.offset(), "Unexpected end of input"));
        };

        if c == '(' {
            self.pos += 1;
            let inner = self.expression()?;
            if !self.eat(')') {
                return Err(self.error_at(self.offset(), "Expected ')'"));
            }
            return Ok(inner);
        }

        if c.is_ascii_digit() || c == '.' {
            let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
            return Rational::parse_decimal(&text)
                .map(Expr::Const)
                .ok_or_else(|| self.error_at(offset, format!("Invalid number: {}", text)));
        }

        if c.is_alphabetic() || c == '_' {
            let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
            if self.eat('(') {
                if name != "sqrt" {
                    return Err(self.error_at(offset, format!("Unknown function: {}", name)));
                }
                let arg = self.expression()?;
                if !self.eat(')') {
                    return Err(self.error_at(self.offset(), "Expected ')'"));
                }
                return Ok(arg.sqrt());
            }
            return Ok(Expr::Symbol(name));
        }

        Err(self.error_at(offset, format!("Unexpected '{}'", c)))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some((_, c)) = self.peek_char() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rendered_expression() {
        let x = Expr::symbol("x5");
        let e = (x.clone() + Expr::int(1)) * Expr::int(3).sqrt() - x.clone() / Expr::int(2);
        let reparsed = parse(&e.to_string()).unwrap();
        assert_eq!(reparsed.to_string(), e.to_string());
    }

    #[test]
    fn test_parse_folds_constants() {
        assert_eq!(
            parse("1/2 + 0.25").unwrap(),
            Expr::Const(Rational::new(3, 4).unwrap())
        );
        assert_eq!(parse("-(2 - 5)").unwrap(), Expr::int(3));
        assert_eq!(parse("sqrt(9/4)").unwrap(), Expr::Const(Rational::new(3, 2).unwrap()));
    }

    #[test]
    fn test_parse_precedence() {
        let value = parse("1 + 2*3 - 4/2").unwrap();
        assert_eq!(value, Expr::int(5));
        let value = parse("-2*3").unwrap();
        assert_eq!(value, Expr::int(-6));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse(""), Err(SimplifyError::Parse { .. })));
        assert!(matches!(parse("1 +"), Err(SimplifyError::Parse { .. })));
        assert!(matches!(parse("(1 + 2"), Err(SimplifyError::Parse { .. })));
        assert!(matches!(parse("cos(1)"), Err(SimplifyError::Parse { .. })));
        assert!(matches!(parse("1 $ 2"), Err(SimplifyError::Parse { position: 2, .. })));
    }
}
