pub const SLUG_MAX_LEN: usize = 50;

/// Lowercase, hyphen-separated ASCII slug. Returns an empty string when the
/// input has no ASCII alphanumerics; callers decide what that means.
pub fn sanitize_slug(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    let collapsed = sanitized
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let truncated = if collapsed.len() > SLUG_MAX_LEN {
        &collapsed[..SLUG_MAX_LEN]
    } else {
        &collapsed
    };

    truncated.trim_end_matches('-').to_string()
}

/// Text after the first `/`, or the whole branch when it has no namespace.
pub fn slug_from_branch(branch: &str) -> &str {
    branch
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(branch)
}

/// Text before the first `/`, if any.
pub fn branch_namespace(branch: &str) -> Option<&str> {
    branch.split_once('/').map(|(prefix, _)| prefix)
}

/// Re-attaches the original branch's namespace to a new slug.
pub fn renamed_branch(original: &str, slug: &str) -> String {
    match branch_namespace(original) {
        Some(prefix) => format!("{}/{}", prefix, slug),
        None => slug.to_string(),
    }
}
