use crate::error::LedgerErrorCode;

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if ch.is_ascii_graphic() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Single grep-friendly line for failures that are swallowed.
pub fn format_line(code: LedgerErrorCode, stage: &str, key: &str, reason: &str, err: &str) -> String {
    format!(
        "LEDGER_WARN code={} stage={} key={} reason={} err={}",
        code.as_str(),
        sanitize_value(stage),
        sanitize_value(key),
        sanitize_value(reason),
        sanitize_value(err),
    )
}

pub fn emit(code: LedgerErrorCode, stage: &str, key: &str, reason: &str, err: &str) {
    let line = format_line(code, stage, key, reason, err);
    tracing::warn!(code = code.as_str(), "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn format_line_carries_code_and_fields() {
        let line = format_line(
            LedgerErrorCode::E002StoreWriteFailed,
            "persist",
            "d1",
            "store write",
            "Permission denied (os error 13)",
        );
        assert_eq!(
            line,
            "LEDGER_WARN code=E002_STORE_WRITE_FAILED stage=persist key=d1 reason=store_write err=Permission_denied_(os_error_13)"
        );
    }
}
