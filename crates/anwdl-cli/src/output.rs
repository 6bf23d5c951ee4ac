//! Output helpers: a consistent `{status, message, data}` envelope when
//! `--json` is passed, a bare message otherwise.

use serde_json::Value;

/// Prints either the JSON envelope or a plain message, depending on `json`.
pub fn emit(json: bool, success: bool, message: &str, data: Value) {
    if json {
        let status = if success { "ok" } else { "error" };
        println!(
            "{}",
            serde_json::json!({ "status": status, "message": message, "data": data })
        );
    } else {
        println!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_plain_text_prints_bare_message() {
        // Smoke test only: emit() writes to stdout, nothing to assert on
        // beyond "it does not panic".
        emit(false, true, "started", serde_json::json!({}));
    }
}
