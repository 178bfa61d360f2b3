// Works out the new nickname for every member a replacement touches.

use super::nickname_models::{
    MemberNickname, NicknameChange, NicknameError, ReplacementMode, ReplacementPlan,
    MAX_NICKNAME_CHARS,
};
use regex::RegexBuilder;

const REGEX_SIZE_LIMIT: usize = 1 << 16;

enum Matcher {
    Literal { needle: String, replacement: String },
    Regex { re: regex::Regex, template: String },
}

impl Matcher {
    fn apply(&self, name: &str) -> Option<String> {
        match self {
            Matcher::Literal { needle, replacement } => name
                .contains(needle.as_str())
                .then(|| name.replace(needle.as_str(), replacement)),
            Matcher::Regex { re, template } => re
                .is_match(name)
                .then(|| re.replace_all(name, template.as_str()).into_owned()),
        }
    }
}

/// Rewrite a `$1`-style replacement into the regex crate's `${1}` syntax.
///
/// `$N` and `$NN` refer to a group only when it exists, preferring two digits,
/// so `$1B` is group 1 then "B" and `$10` is group 1 then "0" unless the
/// pattern has ten groups. `$&` is the whole match and `$<name>` a named group.
/// Anything else after a `$` is kept as typed.
fn expand_template(replacement: &str, groups: usize) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::with_capacity(replacement.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let digit = |at: usize| chars.get(at).and_then(|c| c.to_digit(10)).map(|d| d as usize);
        match chars.get(i + 1) {
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            Some('&') => {
                out.push_str("${0}");
                i += 2;
            }
            Some('<') => {
                let close = chars[i + 2..].iter().position(|&c| c == '>');
                match close {
                    Some(len) if len > 0 => {
                        let name: String = chars[i + 2..i + 2 + len].iter().collect();
                        out.push_str(&format!("${{{}}}", name));
                        i += len + 3;
                    }
                    _ => {
                        out.push_str("$$");
                        i += 1;
                    }
                }
            }
            _ => match (digit(i + 1), digit(i + 2)) {
                (Some(a), Some(b)) if (1..groups).contains(&(a * 10 + b)) => {
                    out.push_str(&format!("${{{}}}", a * 10 + b));
                    i += 3;
                }
                (Some(a), _) if (1..groups).contains(&a) => {
                    out.push_str(&format!("${{{}}}", a));
                    i += 2;
                }
                _ => {
                    out.push_str("$$");
                    i += 1;
                }
            },
        }
    }
    out
}

fn clamp_nickname(raw: &str) -> String {
    let cut: String = raw.trim().chars().take(MAX_NICKNAME_CHARS).collect();
    cut.trim_end().to_string()
}

/// Build the list of nickname changes for `members`.
///
/// Members whose display name doesn't match, or whose name wouldn't change,
/// are left out. Results are trimmed and cut to Discord's 32 character limit;
/// an empty result clears the nickname.
pub fn plan_replacement(
    members: &[MemberNickname],
    pattern: &str,
    replacement: &str,
    mode: ReplacementMode,
) -> Result<ReplacementPlan, NicknameError> {
    if pattern.is_empty() {
        return Err(NicknameError::EmptyPattern);
    }
    if replacement.chars().count() > MAX_NICKNAME_CHARS {
        return Err(NicknameError::ReplacementTooLong);
    }

    let matcher = match mode {
        ReplacementMode::Literal => Matcher::Literal {
            needle: pattern.to_string(),
            replacement: replacement.to_string(),
        },
        ReplacementMode::Regex => {
            let re = RegexBuilder::new(pattern)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
                .map_err(|e| NicknameError::InvalidPattern(e.to_string()))?;
            let template = expand_template(replacement, re.captures_len());
            Matcher::Regex { re, template }
        }
    };

    let mut plan = ReplacementPlan::default();
    for member in members {
        let before = member.display_name();
        let Some(replaced) = matcher.apply(before) else {
            continue;
        };

        let after = clamp_nickname(&replaced);
        if after == before {
            continue;
        }
        if member.is_owner {
            plan.skipped_owner += 1;
            continue;
        }

        let after = if after.is_empty() { None } else { Some(after) };
        if after.is_none() && member.nickname.is_none() {
            continue;
        }

        plan.changes.push(NicknameChange {
            user_id: member.user_id,
            before: before.to_string(),
            after,
        });
    }

    Ok(plan)
}
