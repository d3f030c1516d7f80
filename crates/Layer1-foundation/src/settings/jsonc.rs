//! JSONC / JSON5 관용 파싱
//!
//! `//`, `/* */` 주석과 후행 쉼표를 제거한 뒤 `serde_json`으로 파싱합니다.

use serde_json::Value;

/// JSON 주석 제거 (// 및 /* */)
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            output.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            output.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            output.push(c);
            continue;
        }

        if !in_string && c == '/' {
            match chars.peek() {
                Some('/') => {
                    // 라인 주석 스킵
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '\n' {
                            output.push(c);
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    // 블록 주석 스킵
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '*' && chars.peek() == Some(&'/') {
                            chars.next();
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
        }

        output.push(c);
    }

    output
}

/// 후행 쉼표 제거 (`[1, 2,]`, `{"a": 1,}`)
pub fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if escape_next {
            output.push(c);
            escape_next = false;
            continue;
        }

        if in_string {
            if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            output.push(c);
            continue;
        }

        if c == '"' {
            in_string = true;
            output.push(c);
            continue;
        }

        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }

        output.push(c);
    }

    output
}

/// JSONC 텍스트 파싱
pub fn parse_jsonc(input: &str) -> serde_json::Result<Value> {
    let cleaned = strip_trailing_commas(&strip_json_comments(input));
    serde_json::from_str(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_comments() {
        let input = r#"{
            // This is a comment
            "key": "value", /* inline comment */
            "url": "https://example.com/path"
        }"#;

        let output = strip_json_comments(input);
        assert!(!output.contains("comment"));
        assert!(output.contains("https://example.com/path"));
    }

    #[test]
    fn test_trailing_commas() {
        let value = parse_jsonc(r#"{ "list": [1, 2, ], "nested": { "a": "x,]", }, }"#).unwrap();

        assert_eq!(value["list"], serde_json::json!([1, 2]));
        assert_eq!(value["nested"]["a"], "x,]");
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let value = parse_jsonc(r#"{ "a": "say \"hi\" // not a comment" }"#).unwrap();
        assert_eq!(value["a"], "say \"hi\" // not a comment");
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_jsonc("{ \"a\": }").is_err());
    }
}
