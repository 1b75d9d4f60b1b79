use crate::js::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Num { value: f64, float: bool },
    Str(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub pos: usize,
    /// 与上一个 token 之间有换行（用于自动分号）
    pub newline_before: bool,
}

// 最长匹配优先
const PUNCTS: &[&str] = &[
    ">>>=", "===", "!==", ">>>", "<<=", ">>=", "...", "==", "!=", "<=", ">=", "&&", "||", "++",
    "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "=>", "{", "}", "(", ")",
    "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~", "?", ":",
    "=", ".",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut newline = false;

    while pos < src.len() {
        let rest = &src[pos..];
        let c = rest.chars().next().unwrap_or('\0');

        if c == '\n' || c == '\r' || c == '\u{2028}' || c == '\u{2029}' {
            newline = true;
            pos += c.len_utf8();
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if rest.starts_with("//") {
            pos += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .ok_or_else(|| ParseError::syntax("unterminated comment", pos))?;
            if rest[..end + 2].contains('\n') {
                newline = true;
            }
            pos += end + 4;
            continue;
        }

        let start = pos;
        let tok = if c == '"' || c == '\'' || c == '`' {
            let (s, len) = read_string(rest, c, start)?;
            pos += len;
            Tok::Str(s)
        } else if c.is_ascii_digit() || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (tok, len) = read_number(rest, start)?;
            pos += len;
            tok
        } else if is_ident_start(c) {
            let len = rest
                .char_indices()
                .find(|(_, ch)| !is_ident_part(*ch))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            pos += len;
            Tok::Ident(rest[..len].to_string())
        } else if let Some(p) = PUNCTS.iter().find(|p| rest.starts_with(**p)) {
            pos += p.len();
            Tok::Punct(*p)
        } else {
            return Err(ParseError::syntax(format!("unexpected character `{}`", c), pos));
        };

        tokens.push(Token {
            tok,
            pos: start,
            newline_before: newline,
        });
        newline = false;
    }

    tokens.push(Token {
        tok: Tok::Eof,
        pos: src.len(),
        newline_before: newline,
    });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_alphanumeric()
}

fn read_number(rest: &str, pos: usize) -> Result<(Tok, usize), ParseError> {
    let b = rest.as_bytes();
    if b.len() > 1 && b[0] == b'0' && (b[1] == b'x' || b[1] == b'X') {
        let len = 2 + rest[2..]
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(rest.len() - 2);
        let value = i64::from_str_radix(&rest[2..len], 16)
            .map_err(|_| ParseError::syntax("invalid hex literal", pos))?;
        return Ok((
            Tok::Num {
                value: value as f64,
                float: false,
            },
            len,
        ));
    }

    let mut len = 0;
    let mut float = false;
    while len < b.len() && b[len].is_ascii_digit() {
        len += 1;
    }
    if len < b.len() && b[len] == b'.' {
        float = true;
        len += 1;
        while len < b.len() && b[len].is_ascii_digit() {
            len += 1;
        }
    }
    if len < b.len() && (b[len] == b'e' || b[len] == b'E') {
        let mut exp = len + 1;
        if exp < b.len() && (b[exp] == b'+' || b[exp] == b'-') {
            exp += 1;
        }
        if exp < b.len() && b[exp].is_ascii_digit() {
            float = true;
            len = exp;
            while len < b.len() && b[len].is_ascii_digit() {
                len += 1;
            }
        }
    }
    let value = rest[..len]
        .parse::<f64>()
        .map_err(|_| ParseError::syntax("invalid number", pos))?;
    Ok((Tok::Num { value, float }, len))
}

/// 返回（解码后的字符串，消耗的字节数）
fn read_string(rest: &str, quote: char, pos: usize) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut chars = rest.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((out, i + 1));
        }
        if c == '\n' && quote != '`' {
            break;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, esc)) = chars.next() else { break };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            // 交给插值扫描处理
            '$' => out.push_str("\\$"),
            'x' => {
                let hex: String = chars.by_ref().take(2).map(|(_, c)| c).collect();
                out.push(decode_hex(&hex, pos)?);
            }
            'u' => {
                let hex: String = match chars.clone().next() {
                    Some((_, '{')) => {
                        chars.next();
                        chars
                            .by_ref()
                            .map(|(_, c)| c)
                            .take_while(|c| *c != '}')
                            .collect()
                    }
                    _ => chars.by_ref().take(4).map(|(_, c)| c).collect(),
                };
                out.push(decode_hex(&hex, pos)?);
            }
            other => out.push(other),
        }
    }
    Err(ParseError::syntax("unterminated string literal", pos))
}

fn decode_hex(hex: &str, pos: usize) -> Result<char, ParseError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| ParseError::syntax("invalid escape sequence", pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_punct_longest_match() {
        assert_eq!(
            toks("a !== b"),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("!=="),
                Tok::Ident("b".into()),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(toks("1")[0], Tok::Num { value: 1.0, float: false });
        assert_eq!(toks("1.0")[0], Tok::Num { value: 1.0, float: true });
        assert_eq!(toks(".5")[0], Tok::Num { value: 0.5, float: true });
        assert_eq!(toks("0x1f")[0], Tok::Num { value: 31.0, float: false });
        assert_eq!(toks("2e3")[0], Tok::Num { value: 2000.0, float: true });
    }

    #[test]
    fn test_strings() {
        assert_eq!(toks(r#""a\"b""#)[0], Tok::Str("a\"b".into()));
        assert_eq!(toks(r"'A\x42'")[0], Tok::Str("AB".into()));
        assert_eq!(toks(r#""\$${x}""#)[0], Tok::Str("\\$${x}".into()));
        assert_eq!(toks("`a\nb`")[0], Tok::Str("a\nb".into()));
        assert!(tokenize("'abc").is_err());
    }

    #[test]
    fn test_newline_tracking() {
        let tokens = tokenize("a\nb").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
    }
}
