use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::endorsement::UserId;

const USAGE: &str = "usage: endorse [--config <path>] [--submit] [--negative] [--comment <text>] \
<vote <endorser-id> <endorsee-id> | admin <admin-id> <endorsee-id> | auto <endorsee-id> | eligible <endorser-id>> <category>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vote { endorser_id: UserId, endorsee_id: UserId },
    Admin { admin_id: UserId, endorsee_id: UserId },
    Auto { endorsee_id: UserId },
    Eligible { endorser_id: UserId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub command: Command,
    pub archive: String,
    pub subject_class: String,
    pub submit: bool,
    pub positive: bool,
    pub comment: String,
}

fn user_id(value: Option<String>, what: &str) -> Result<UserId> {
    let value = value.ok_or_else(|| anyhow!("missing {what}. {USAGE}"))?;
    value
        .parse()
        .map_err(|_| anyhow!("{what} must be an integer, got '{value}'"))
}

/// `cs.AI` names archive and subject class; a bare `hep-th` leaves the subject empty.
pub fn split_category(category: &str) -> (String, String) {
    match category.split_once('.') {
        Some((archive, subject_class)) if subject_class != "*" => {
            (archive.to_string(), subject_class.to_string())
        }
        Some((archive, _)) => (archive.to_string(), String::new()),
        None => (category.to_string(), String::new()),
    }
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut submit = false;
    let mut positive = true;
    let mut comment = String::new();
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--comment" => {
                comment = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --comment"))?;
            }
            "--submit" => submit = true,
            "--negative" => positive = false,
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown argument: {other}. {USAGE}"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let verb = positional
        .next()
        .ok_or_else(|| anyhow!("missing command. {USAGE}"))?;
    let command = match verb.as_str() {
        "vote" => Command::Vote {
            endorser_id: user_id(positional.next(), "endorser id")?,
            endorsee_id: user_id(positional.next(), "endorsee id")?,
        },
        "admin" => Command::Admin {
            admin_id: user_id(positional.next(), "admin id")?,
            endorsee_id: user_id(positional.next(), "endorsee id")?,
        },
        "auto" => Command::Auto {
            endorsee_id: user_id(positional.next(), "endorsee id")?,
        },
        "eligible" => Command::Eligible {
            endorser_id: user_id(positional.next(), "endorser id")?,
        },
        other => return Err(anyhow!("unknown command: {other}. {USAGE}")),
    };
    let category = positional
        .next()
        .ok_or_else(|| anyhow!("missing category. {USAGE}"))?;
    if let Some(extra) = positional.next() {
        return Err(anyhow!("unexpected argument: {extra}. {USAGE}"));
    }
    let (archive, subject_class) = split_category(&category);

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./endorse.jsonc")),
        command,
        archive,
        subject_class,
        submit,
        positive,
        comment,
    })
}
