/// Make a display name acceptable as a completion API participant name.
///
/// Runs of whitespace become a single `_`, then everything outside
/// `[A-Za-z0-9_]` is dropped.
pub fn sanitize_username(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        }
    }
    out
}
