fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((idx, _)) => &s[..idx],
    }
}

pub fn git_sha() -> &'static str {
    truncate(env!("VERGEN_GIT_SHA"), 8)
}

pub fn build_timestamp() -> &'static str {
    env!("VERGEN_BUILD_TIMESTAMP")
}

pub fn get_version_string() -> String {
    format!(
        "{} v{}-{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        git_sha()
    )
}
