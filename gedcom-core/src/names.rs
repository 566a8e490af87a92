//! Personal name splitting

use serde::{Deserialize, Serialize};

/// A `NAME` value split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    /// Given name, surname and suffix joined by single spaces
    pub full: String,
    /// Everything before the surname
    pub given: String,
    /// The slash-delimited surname
    pub surname: String,
    /// Everything after the surname
    pub suffix: String,
    /// A double-quoted nickname, without the quotes
    pub nickname: String,
}

/// Split a name of the form `Given "Nick" /Surname/ Suffix`
///
/// The surname is the first `/`-delimited part with no space just inside
/// either slash. Directly following parts of the same shape extend it, so
/// `/Fetters/Fletcher/` is one surname. When no such part exists the whole
/// name, minus trailing slashes and spaces, is the given name.
pub fn split_personal_name(name: &str) -> ParsedName {
    let (name, nickname) = take_nickname(name.trim());

    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() == 1 {
        return ParsedName {
            full: name.clone(),
            given: name,
            nickname,
            ..Default::default()
        };
    }

    for i in 1..parts.len() {
        if !is_surname_part(parts[i]) {
            continue;
        }

        let mut surname = parts[i].to_string();
        let mut end = i;
        for part in &parts[i + 1..] {
            if !is_surname_part(part) {
                break;
            }
            surname.push('/');
            surname.push_str(part);
            end += 1;
        }

        let given = parts[..i].join("/").trim().to_string();
        let suffix = parts[end + 1..].join("/").trim().to_string();
        let full = [given.as_str(), surname.as_str(), suffix.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        return ParsedName {
            full,
            given,
            surname,
            suffix,
            nickname,
        };
    }

    let trimmed = name.trim_end_matches(['/', ' ']).to_string();
    ParsedName {
        full: trimmed.clone(),
        given: trimmed,
        nickname,
        ..Default::default()
    }
}

fn is_surname_part(part: &str) -> bool {
    !part.is_empty() && !part.starts_with(' ') && !part.ends_with(' ')
}

/// Remove the first `"..."` segment, returning the remaining name and the nickname
fn take_nickname(name: &str) -> (String, String) {
    let Some(open) = name.find('"') else {
        return (name.to_string(), String::new());
    };
    let Some(len) = name[open + 1..].find('"') else {
        return (name.to_string(), String::new());
    };
    let close = open + 1 + len;

    let nickname = name[open + 1..close].trim().to_string();
    let before = name[..open].trim_end();
    let after = name[close + 1..].trim_start();
    let rest = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{} {}", before, after),
    };
    (rest, nickname)
}
