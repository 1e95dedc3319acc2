use std::borrow::Cow;

const MAX_BODY_LEN: usize = 512;

/// 把错误响应体压成单行并截断，便于写入日志与错误信息。
pub fn summarize_error_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    if single_line.len() > MAX_BODY_LEN {
        let mut cut = MAX_BODY_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}

/// 日志里的地址/交易 ID 缩写。
pub fn short_id(id: &str) -> Cow<'_, str> {
    if id.len() <= 12 {
        Cow::Borrowed(id)
    } else {
        Cow::Owned(format!("{}..{}", &id[..6], &id[id.len() - 4..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_flattened_and_truncated() {
        assert_eq!(summarize_error_body("  ".into()), "(empty response body)");
        assert_eq!(summarize_error_body("a\nb\r\nc".into()), "a b  c");
        let long = "中".repeat(400);
        let summary = summarize_error_body(long);
        assert!(summary.ends_with('…'));
        assert!(summary.len() <= MAX_BODY_LEN + '…'.len_utf8());
    }

    #[test]
    fn short_id_keeps_head_and_tail() {
        assert_eq!(short_id("ABC"), "ABC");
        assert_eq!(
            short_id("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ"),
            "AAAAAA..HFKQ"
        );
    }
}
