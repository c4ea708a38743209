//! Format selector shorthands accepted in chat commands

/// Selector used when a request carries no format
pub const DEFAULT_FORMAT: &str = "bestvideo+bestaudio/best";

/// Heights accepted as bare shorthand tokens (`720`, `1080p`, ...)
const HEIGHT_SHORTHANDS: &[u32] = &[144, 240, 360, 480, 720, 1080, 1440, 2160];

/// Named shorthands mapped to explicit selectors
const NAMED_SHORTHANDS: &[(&str, &str)] = &[
    ("best", DEFAULT_FORMAT),
    ("audio", "bestaudio/best"),
];

/// Expand a shorthand format token into an explicit selector.
///
/// Unknown tokens are returned unchanged, so running an already expanded
/// selector through this function again is a no-op.
pub fn normalize(token: &str) -> String {
    let token = token.trim();

    if let Some(height) = parse_height(token) {
        return capped_height(height);
    }

    NAMED_SHORTHANDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, selector)| selector.to_string())
        .unwrap_or_else(|| token.to_string())
}

/// Selector stored on a job: the normalized token when one was given,
/// `default` otherwise
pub fn resolve(format: Option<&str>, default: &str) -> String {
    match format.map(str::trim).filter(|f| !f.is_empty()) {
        Some(token) => normalize(token),
        None => default.to_string(),
    }
}

fn parse_height(token: &str) -> Option<u32> {
    let digits = token
        .strip_suffix('p')
        .or_else(|| token.strip_suffix('P'))
        .unwrap_or(token);
    let height = digits.parse::<u32>().ok()?;
    HEIGHT_SHORTHANDS.contains(&height).then_some(height)
}

fn capped_height(height: u32) -> String {
    format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
}
