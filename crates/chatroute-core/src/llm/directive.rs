//! Action directive parsing.
//!
//! Models are asked to end a reply with a single trailing line of the form
//!
//! ```text
//! ACTION_SUGGESTED: <verb>-<target>[-<description>]
//! ```
//!
//! `verb` is `[A-Za-z_]+` and `target` is `[A-Za-z0-9_]+`. The visible text
//! ends at the first marker. If the reply contains the marker more than
//! once, the last occurrence supplies the action. A marker whose directive
//! does not parse is still stripped but yields no action.

use chatroute_types::llm::SuggestedAction;

pub const ACTION_MARKER: &str = "ACTION_SUGGESTED:";

/// Model reply split into visible text and an optional action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub text: String,
    pub action: Option<SuggestedAction>,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let (Some(first), Some(last)) = (raw.find(ACTION_MARKER), raw.rfind(ACTION_MARKER)) else {
        return ParsedReply {
            text: raw.trim().to_string(),
            action: None,
        };
    };

    let text = raw[..first].trim().to_string();
    let directive = &raw[last + ACTION_MARKER.len()..];
    ParsedReply {
        text,
        action: parse_directive(directive),
    }
}

/// Parse the part after the marker, e.g. `create-cliente-Novo cliente João`.
pub fn parse_directive(directive: &str) -> Option<SuggestedAction> {
    let directive = directive.trim();

    let (verb, rest) = directive.split_once('-')?;
    if verb.is_empty() || !verb.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }

    let target_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let (target, tail) = rest.split_at(target_len);
    if target.is_empty() {
        return None;
    }

    // The description is separated by '-' or whitespace; anything else
    // directly after the target means the kind itself is malformed.
    let description = match tail.chars().next() {
        None => "",
        Some('-') => &tail[1..],
        Some(c) if c.is_whitespace() => tail,
        Some(_) => return None,
    };

    Some(SuggestedAction::new(
        format!("{verb}-{target}"),
        description.trim(),
    ))
}
