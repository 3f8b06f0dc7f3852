//! Predicate tokenizer and recursive-descent parser

use serde_json::Value;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    BeginsWith,
    EndsWith,
}

/// Parsed predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    True,
    False,
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
        case_insensitive: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CompareOp),
    CaseFlag,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "CONTAINS" => Token::Op(CompareOp::Contains),
        "BEGINSWITH" => Token::Op(CompareOp::BeginsWith),
        "ENDSWITH" => Token::Op(CompareOp::EndsWith),
        "TRUE" => Token::Literal(Value::Bool(true)),
        "FALSE" => Token::Literal(Value::Bool(false)),
        "NULL" | "NIL" => Token::Literal(Value::Null),
        _ => return None,
    };
    Some(token)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                let flag: String = chars[i..].iter().take(3).collect();
                if !flag.eq_ignore_ascii_case("[c]") {
                    return Err(format!("unexpected '[' at {}", i));
                }
                tokens.push(Token::CaseFlag);
                i += 3;
            }
            '=' => {
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Le));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    i += 1;
                }
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(format!("expected '{}{}' at {}", c, c, i));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Literal(parse_number(&text)?));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.' | '$'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(&word).unwrap_or(Token::Ident(word)));
            }
            other => return Err(format!("unexpected character '{}' at {}", other, i)),
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Value, String> {
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Value::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("invalid number '{}'", text))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("TRUEPREDICATE") => {
                Ok(Expr::True)
            }
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("FALSEPREDICATE") => {
                Ok(Expr::False)
            }
            Some(Token::Ident(field)) => self.parse_comparison(field),
            Some(other) => Err(format!("unexpected token {:?}", other)),
            None => Err("unexpected end of predicate".to_string()),
        }
    }

    fn parse_comparison(&mut self, field: String) -> Result<Expr, String> {
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            _ => return Err(format!("expected operator after '{}'", field)),
        };
        let case_insensitive = if self.peek() == Some(&Token::CaseFlag) {
            self.pos += 1;
            true
        } else {
            false
        };
        let value = match self.next() {
            Some(Token::Literal(value)) => value,
            _ => return Err(format!("expected literal after '{}'", field)),
        };
        Ok(Expr::Compare {
            field,
            op,
            value,
            case_insensitive,
        })
    }
}

/// Parse a predicate string into an expression tree
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty predicate".to_string());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!("unexpected trailing {:?}", parser.tokens[parser.pos]));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmp(field: &str, op: CompareOp, value: Value) -> Expr {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
            case_insensitive: false,
        }
    }

    #[test]
    fn test_single_equals() {
        assert_eq!(parse("id=1").unwrap(), cmp("id", CompareOp::Eq, json!(1)));
        assert_eq!(parse("id == 1").unwrap(), cmp("id", CompareOp::Eq, json!(1)));
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let expr = parse("a = 1 OR b = 2 AND c = 3").unwrap();
        assert!(matches!(expr, Expr::Or(_, ref right) if matches!(**right, Expr::And(_, _))));
    }

    #[test]
    fn test_strings_and_case_flag() {
        let expr = parse("name BEGINSWITH[c] 're'").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                field: "name".to_string(),
                op: CompareOp::BeginsWith,
                value: json!("re"),
                case_insensitive: true,
            }
        );
        assert_eq!(
            parse(r#"breed != "Lab""#).unwrap(),
            cmp("breed", CompareOp::Ne, json!("Lab"))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("age > -2.5").unwrap(), cmp("age", CompareOp::Gt, json!(-2.5)));
        assert_eq!(parse("age == nil").unwrap(), cmp("age", CompareOp::Eq, Value::Null));
        assert_eq!(parse("ok && !(done = true)").unwrap_err(), "expected operator after 'ok'");
    }

    #[test]
    fn test_malformed() {
        assert!(parse("").is_err());
        assert!(parse("id =").is_err());
        assert!(parse("(id = 1").is_err());
        assert!(parse("id = 1 2").is_err());
        assert!(parse("name = 'open").is_err());
    }

    #[test]
    fn test_truepredicate() {
        assert_eq!(parse("TRUEPREDICATE").unwrap(), Expr::True);
        assert_eq!(parse("NOT falsepredicate").unwrap(), Expr::Not(Box::new(Expr::False)));
    }
}
