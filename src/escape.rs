//! Quote command-line arguments for `cmd.exe`.
//!
//! Arguments made up only of characters that `cmd.exe` and the usual Windows argument parsers
//! leave alone are passed through. Anything else is wrapped in double quotes, with embedded double
//! quotes doubled. Backslashes right before a double quote, or before the closing one, are doubled
//! too, since the argument parser would otherwise read them as escaping the quote. Note that `%` still triggers variable expansion inside quotes; there is no
//! portable way to prevent that from the command line.

fn whitelisted(ch: char) -> bool {
    matches!(ch,
        'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '=' | '/' | ',' | '.' | '+' | ':' | '\\')
}

/// Quote `s` so that it reaches the remote program as a single argument.
pub(crate) fn escape(s: &str) -> String {
    if !s.is_empty() && s.chars().all(whitelisted) {
        return s.to_owned();
    }

    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('"');
    let mut backslashes = 0;
    for ch in s.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                escaped.extend(std::iter::repeat('\\').take(backslashes));
                escaped.push('"');
                backslashes = 0;
            }
            _ => backslashes = 0,
        }
        escaped.push(ch);
    }
    escaped.extend(std::iter::repeat('\\').take(backslashes));
    escaped.push('"');
    escaped
}
