//! TNL 标注文本解析器
//!
//! 将标注 FST 输出的扁平字符串解析为嵌套 token 序列：
//!
//! ```text
//! tokens { measure { cardinal { integer: "2" } units: "kg" } } tokens { name: "ok" }
//! ```
//!
//! 叶子值必须加双引号（反斜杠转义原样保留），`true` / `false` 为布尔标记。

use crate::error::ParseError;
use crate::tnl::types::{Token, TokenValue};

/// 标注文本解析器
pub struct TokenParser<'a> {
    text: &'a str,
    /// 当前字节位置
    pos: usize,
}

impl<'a> TokenParser<'a> {
    /// 解析整段标注文本
    ///
    /// 返回顶层 token 列表（保持源顺序），每个元素形如 `tokens { ... }`
    pub fn parse(text: &'a str) -> Result<Vec<Token>, ParseError> {
        let mut parser = TokenParser { text, pos: 0 };
        parser.parse_sequence()
    }

    fn parse_sequence(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek().is_none() {
                break;
            }

            let key = self.parse_key()?;
            self.skip_whitespace();
            self.expect('{', "'{'")?;
            let inner = self.parse_fields()?;
            self.expect('}', "'}'")?;

            tokens.push(Token::new(vec![(key, TokenValue::Nested(inner))]));
        }

        Ok(tokens)
    }

    /// 解析 `{` 与 `}` 之间的字段（不消费右括号）
    fn parse_fields(&mut self) -> Result<Token, ParseError> {
        let mut fields = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError::UnexpectedEnd {
                        position: self.pos,
                        expected: "'}'",
                    })
                }
                Some('}') => break,
                Some(_) => {}
            }

            let key = self.parse_key()?;
            self.skip_whitespace();

            match self.peek() {
                Some(':') => {
                    self.bump();
                    self.skip_whitespace();
                    let value = self.parse_value()?;
                    fields.push((key, value));
                }
                Some('{') => {
                    self.bump();
                    let nested = self.parse_fields()?;
                    self.expect('}', "'}'")?;
                    fields.push((key, TokenValue::Nested(nested)));
                }
                Some(found) => {
                    return Err(ParseError::UnexpectedChar {
                        position: self.pos,
                        found,
                        expected: "':' 或 '{'",
                    })
                }
                None => {
                    return Err(ParseError::UnexpectedEnd {
                        position: self.pos,
                        expected: "':' 或 '{'",
                    })
                }
            }
        }

        Ok(Token::new(fields))
    }

    fn parse_key(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if Self::is_key_char(ch) {
                self.bump();
            } else {
                break;
            }
        }

        if self.pos > start {
            return Ok(self.text[start..self.pos].to_string());
        }

        match self.peek() {
            Some(':') | Some('{') => Err(ParseError::EmptyKey { position: start }),
            Some(found) => Err(ParseError::UnexpectedChar {
                position: start,
                found,
                expected: "字段名",
            }),
            None => Err(ParseError::UnexpectedEnd {
                position: start,
                expected: "字段名",
            }),
        }
    }

    fn parse_value(&mut self) -> Result<TokenValue, ParseError> {
        match self.peek() {
            Some('"') => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.peek() {
                        None => {
                            return Err(ParseError::UnexpectedEnd {
                                position: self.pos,
                                expected: "'\"'",
                            })
                        }
                        Some('"') => break,
                        Some('\\') => {
                            // 转义字符连同下一个字符原样保留
                            self.bump();
                            if self.peek().is_some() {
                                self.bump();
                            }
                        }
                        Some(_) => self.bump(),
                    }
                }
                let value = self.text[start..self.pos].to_string();
                self.bump();
                Ok(TokenValue::Leaf(value))
            }
            Some(_) => {
                let start = self.pos;
                while let Some(ch) = self.peek() {
                    if ch.is_alphanumeric() {
                        self.bump();
                    } else {
                        break;
                    }
                }
                match &self.text[start..self.pos] {
                    "true" => Ok(TokenValue::Flag(true)),
                    "false" => Ok(TokenValue::Flag(false)),
                    "" => Err(ParseError::UnexpectedChar {
                        position: start,
                        found: self.peek().unwrap_or(' '),
                        expected: "带引号的值或 true/false",
                    }),
                    other => Err(ParseError::InvalidValue {
                        position: start,
                        value: other.to_string(),
                    }),
                }
            }
            None => Err(ParseError::UnexpectedEnd {
                position: self.pos,
                expected: "带引号的值或 true/false",
            }),
        }
    }

    fn expect(&mut self, expected_char: char, expected: &'static str) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected_char => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(ParseError::UnexpectedChar {
                position: self.pos,
                found,
                expected,
            }),
            None => Err(ParseError::UnexpectedEnd {
                position: self.pos,
                expected,
            }),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    /// 字段名字符：字母、数字、下划线
    fn is_key_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_'
    }
}
