use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailList {
    Black,
    White,
}

impl EmailList {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailList::Black => "black",
            EmailList::White => "white",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "black" => Some(EmailList::Black),
            "white" => Some(EmailList::White),
            _ => None,
        }
    }
}

/// SQL LIKE style pattern: `%` matches any run, `_` one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPattern {
    pub pattern: String,
    pub list: EmailList,
}

impl EmailPattern {
    pub fn new(list: EmailList, pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            list,
        }
    }

    pub fn matches(&self, email: &str) -> Result<bool, regex::Error> {
        Ok(like_to_regex(&self.pattern)?.is_match(email))
    }
}

fn like_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr)
}

/// Blacklist first, then whitelist; no match means not academic.
pub fn classify_email(email: &str, patterns: &[EmailPattern]) -> Result<(bool, String), regex::Error> {
    for list in [EmailList::Black, EmailList::White] {
        for pattern in patterns.iter().filter(|pattern| pattern.list == list) {
            if pattern.matches(email)? {
                let academic = list == EmailList::White;
                return Ok((
                    academic,
                    format!("{} matches {}list pattern '{}'", email, list.as_str(), pattern.pattern),
                ));
            }
        }
    }

    Ok((false, format!("{email} matches no academic pattern")))
}
