//! Calculator Tool (§4.4): evaluates a restricted arithmetic grammar —
//! `+ - * / ^ ( )`, unary minus, decimal literals — with a small
//! recursive-descent parser rather than a scripting engine or `eval`.
//! Mirrors the original's calculator tool, which stops short of the
//! sandboxed-interpreter territory of its "Python tool" (out of scope
//! here, per §4.4's Non-goals).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::progress::ProgressHandle;

use super::Tool;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    expression: String,
}

/// The Calculator Tool: evaluates a single arithmetic expression.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression (+, -, *, /, ^, parentheses) and returns the numeric result."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string", "description": "Arithmetic expression to evaluate, e.g. \"(3 + 4) * 2\"."}
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, input: Value, _progress: Option<&ProgressHandle>) -> Result<Value> {
        let args: CalculatorInput = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => {
                return Ok(serde_json::json!({ "error": format!("invalid calculator arguments: {e}") }));
            }
        };

        match evaluate(&args.expression) {
            Ok(result) => Ok(serde_json::json!({ "result": result })),
            Err(message) => Ok(serde_json::json!({ "error": message })),
        }
    }
}

/// Evaluates a restricted arithmetic expression.
///
/// # Errors
///
/// Returns a user-facing message on malformed input, division by zero,
/// or trailing/unexpected tokens.
fn evaluate(expression: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal: {literal}"))?;
                tokens.push(Token::Number(number));
            }
            other => return Err(format!("unexpected character: {other}")),
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser over `expr := term (('+'|'-') term)*`,
/// `term := factor (('*'|'/') factor)*`, `factor := power`,
/// `power := unary ('^' unary)?` (right-associative), and
/// `unary := '-' unary | primary`.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse_expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.parse_power()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.parse_power()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let divisor = self.parse_power()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_power(&mut self) -> std::result::Result<f64, String> {
        let base = self.parse_unary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.parse_power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> std::result::Result<f64, String> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(-self.parse_unary()?);
        }
        if matches!(self.peek(), Some(Token::Plus)) {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> std::result::Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let value = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("expected closing parenthesis".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected token: {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_basic_arithmetic() {
        assert_eq!(evaluate("2 + 3").unwrap(), 5.0);
        assert_eq!(evaluate("10 - 4").unwrap(), 6.0);
        assert_eq!(evaluate("3 * 4").unwrap(), 12.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
    }

    #[test]
    fn test_evaluate_operator_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn test_evaluate_power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
    }

    #[test]
    fn test_evaluate_unary_minus() {
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("3 * -2").unwrap(), -6.0);
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn test_evaluate_rejects_garbage() {
        assert!(evaluate("2 + ").is_err());
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("import os").is_err());
    }

    #[tokio::test]
    async fn test_tool_execute_returns_result() {
        let tool = CalculatorTool;
        let result = tool
            .execute(serde_json::json!({"expression": "(1 + 2) * 3"}), None)
            .await
            .unwrap();
        assert_eq!(result["result"], 9.0);
    }

    #[tokio::test]
    async fn test_tool_execute_invalid_input_never_errors_the_call() {
        let tool = CalculatorTool;
        let result = tool.execute(serde_json::json!({}), None).await.unwrap();
        assert!(result["error"].is_string());
    }

    #[tokio::test]
    async fn test_tool_execute_malformed_expression_never_errors_the_call() {
        let tool = CalculatorTool;
        let result = tool
            .execute(serde_json::json!({"expression": "1 / 0"}), None)
            .await
            .unwrap();
        assert!(result["error"].is_string());
    }
}
