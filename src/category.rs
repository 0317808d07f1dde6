use std::fmt;

use serde::{Deserialize, Serialize};

/// Legacy (archive, subject_class) pairs and the category they now live under.
/// `None` keeps the incoming subject class.
const LEGACY_REMAP: &[(&str, &str, &str, Option<&str>)] = &[
    ("math", "MP", "math-ph", Some("")),
    ("stat", "TH", "math", Some("ST")),
    ("math", "IT", "cs", None),
    ("q-fin", "EC", "econ", Some("GN")),
    ("cs", "NA", "math", Some("NA")),
    ("cs", "SY", "eess", Some("SY")),
];

/// Maps a legacy archive/subject class pair onto its canonical category.
/// Pairs without a remap entry pass through untouched.
pub fn canonicalize(archive: &str, subject_class: &str) -> (String, String) {
    for (from_archive, from_subject, to_archive, to_subject) in LEGACY_REMAP {
        if archive == *from_archive && subject_class == *from_subject {
            let subject = to_subject.unwrap_or(subject_class);
            return (to_archive.to_string(), subject.to_string());
        }
    }

    (archive.to_string(), subject_class.to_string())
}

pub fn pretty_category(archive: &str, subject_class: &str) -> String {
    if subject_class.is_empty() {
        format!("{archive}.*")
    } else {
        format!("{archive}.{subject_class}")
    }
}

/// A category reference that has already been through [`canonicalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryRef {
    pub archive: String,
    pub subject_class: String,
}

impl CategoryRef {
    pub fn canonical(archive: &str, subject_class: &str) -> Self {
        let (archive, subject_class) = canonicalize(archive, subject_class);
        Self {
            archive,
            subject_class,
        }
    }

    /// Keeps the pair as given. Only used as the fallback lookup key.
    pub fn raw(archive: &str, subject_class: &str) -> Self {
        Self {
            archive: archive.to_string(),
            subject_class: subject_class.to_string(),
        }
    }

    pub fn pretty(&self) -> String {
        pretty_category(&self.archive, &self.subject_class)
    }
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}
