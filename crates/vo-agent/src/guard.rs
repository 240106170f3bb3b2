//! Group-chat output guard.
//!
//! In group channels nothing is streamed; after the turn completes this
//! module decides whether the response is delivered at all.

/// Literal responses that mean "stay silent". Matched case-sensitively.
const SILENCE_TOKENS: &[&str] = &["\u{2205}", "NO_REPLY"];

/// True when a group-chat response asks for silence.
///
/// Accepts the token alone, at the start, or at the end of the trimmed
/// response, with only non-alphanumeric characters around it (so
/// `NO_REPLY.` stays silent but `NO_REPLY needed here` does not).
pub fn is_silence_token(response: &str) -> bool {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return true;
    }
    SILENCE_TOKENS.iter().any(|token| {
        if trimmed == *token {
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix(token) {
            if rest.chars().all(|c| !c.is_alphanumeric()) {
                return true;
            }
        }
        if let Some(rest) = trimmed.strip_suffix(token) {
            if rest.chars().all(|c| !c.is_alphanumeric()) {
                return true;
            }
        }
        false
    })
}

/// True when the bot was directly addressed in a group channel.
///
/// Either the adapter flagged a platform mention, or the input text contains
/// the configured bot name (case-insensitive).
pub fn is_direct_ping(input: &str, bot_name: &str, mentioned: bool) -> bool {
    if mentioned {
        return true;
    }
    if bot_name.is_empty() {
        return false;
    }
    input.to_lowercase().contains(&bot_name.to_lowercase())
}
