//! Artifact name generation

const MAX_NAME_LEN: usize = 96;

/// Reduce an uploaded file name to `[A-Za-z0-9._-]`, without leading dots or `..` runs.
///
/// Directory components are discarded. Falls back to `file` (keeping the extension when one
/// survives) for names that sanitize to nothing.
pub fn sanitize_name(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", ".");
    }
    let sanitized = sanitized.trim_start_matches('.');

    let sanitized = if sanitized.is_empty() {
        "file".to_string()
    } else if sanitized.len() > MAX_NAME_LEN {
        truncate_keeping_extension(sanitized)
    } else {
        sanitized.to_string()
    };

    if sanitized.chars().all(|c| c == '_' || c == '.') {
        return "file".to_string();
    }
    sanitized
}

fn truncate_keeping_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < 16 => {
            let keep = MAX_NAME_LEN - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..MAX_NAME_LEN].to_string(),
    }
}

const TOKEN_LEN: usize = 16;

/// Random hex segment that keeps stored names from being guessed out of time and sequence
pub(crate) fn random_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Compose the stored name from the creation time, a sequence number and a random token
pub(crate) fn compose(millis: i64, sequence: u64, token: &str, sanitized: &str) -> String {
    format!("{}-{}-{}-{}", millis, sequence, token, sanitized)
}

/// Whether `name` can only refer to a direct child of a namespace directory
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
