//! Email domain classification.
//!
//! Emails are personal (free-mail providers), academic (educational
//! domains) or work (everything else). Consolidation prefers personal over
//! work over academic.

use crate::columns::VALUE_SEPARATOR;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

static PERSONAL_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "gmail.com",
        "yahoo.com",
        "hotmail.com",
        "outlook.com",
        "aol.com",
        "icloud.com",
        "me.com",
        "mac.com",
        "msn.com",
        "live.com",
        "yahoo.co.uk",
        "yahoo.ca",
        "yahoo.fr",
        "yahoo.de",
        "yahoo.es",
        "yahoo.it",
        "googlemail.com",
        "ymail.com",
        "rocketmail.com",
        "protonmail.com",
        "proton.me",
        "pm.me",
        "mail.com",
        "email.com",
        "usa.com",
        "fastmail.com",
        "fastmail.fm",
        "zoho.com",
        "qq.com",
        "163.com",
        "126.com",
        "sina.com",
        "gmx.com",
        "gmx.net",
        "web.de",
        "tutanota.com",
        "tutanota.de",
        "tuta.io",
        "comcast.net",
        "verizon.net",
        "att.net",
        "sbcglobal.net",
        "bellsouth.net",
        "cox.net",
    ]
    .into_iter()
    .collect()
});

const ACADEMIC_SUFFIXES: [&str; 7] = [
    ".edu", ".ac.uk", ".ac.jp", ".ac.cn", ".ac.in", ".edu.au", ".edu.cn",
];

const ACADEMIC_TERMS: [&str; 4] = ["university", "college", "institute", "academia"];

/// Class of an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailClass {
    /// Free-mail provider
    Personal,
    /// Company domain
    Work,
    /// Educational institution
    Academic,
}

impl EmailClass {
    /// Consolidation priority; lower wins.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Personal => 1,
            Self::Work => 2,
            Self::Academic => 3,
        }
    }

    /// Whether the address belongs to an employer.
    #[must_use]
    pub fn is_corporate(self) -> bool {
        self == Self::Work
    }
}

impl fmt::Display for EmailClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Personal => "personal",
            Self::Work => "work",
            Self::Academic => "academic",
        };
        write!(f, "{s}")
    }
}

/// Lower-cased domain of `email`, if it has one.
#[must_use]
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().split_once('@')?;
    let domain = domain.trim().to_ascii_lowercase();
    (!domain.is_empty()).then_some(domain)
}

/// Classify an email address; `None` if it is not an address.
#[must_use]
pub fn classify_email(email: &str) -> Option<EmailClass> {
    let domain = email_domain(email)?;

    if ACADEMIC_SUFFIXES.iter().any(|s| domain.ends_with(s))
        || ACADEMIC_TERMS.iter().any(|t| domain.contains(t))
    {
        Some(EmailClass::Academic)
    } else if PERSONAL_DOMAINS.contains(domain.as_str()) {
        Some(EmailClass::Personal)
    } else {
        Some(EmailClass::Work)
    }
}

/// Split a multi-value cell into trimmed email addresses.
pub fn split_emails(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(';')
        .map(str::trim)
        .filter(|e| !e.is_empty() && e.contains('@'))
}

/// Join addresses back into a multi-value cell.
#[must_use]
pub fn join_values<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values.into_iter().collect::<Vec<_>>().join(VALUE_SEPARATOR)
}

/// The highest-priority address; the first one wins ties.
#[must_use]
pub fn best_email<'a>(emails: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    emails
        .into_iter()
        .filter_map(|e| classify_email(e).map(|class| (class.priority(), e)))
        .min_by_key(|(priority, _)| *priority)
        .map(|(_, e)| e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(classify_email("jane@Gmail.com"), Some(EmailClass::Personal));
        assert_eq!(classify_email("jane@acme.io"), Some(EmailClass::Work));
        assert_eq!(classify_email("jane@cs.stanford.edu"), Some(EmailClass::Academic));
        assert_eq!(classify_email("j@ox.ac.uk"), Some(EmailClass::Academic));
        assert_eq!(
            classify_email("j@state-university.org"),
            Some(EmailClass::Academic)
        );
        assert_eq!(classify_email("not-an-email"), None);
        assert_eq!(classify_email("trailing@"), None);
    }

    #[test]
    fn test_priority_order() {
        assert!(EmailClass::Personal.priority() < EmailClass::Work.priority());
        assert!(EmailClass::Work.priority() < EmailClass::Academic.priority());
    }

    #[test]
    fn test_best_email() {
        let emails = ["a@mit.edu", "a@acme.com", "a@yahoo.com", "b@gmail.com"];
        assert_eq!(best_email(emails), Some("a@yahoo.com"));
        assert_eq!(best_email(["a@mit.edu", "a@acme.com"]), Some("a@acme.com"));
        assert_eq!(best_email(["junk"]), None);
    }

    #[test]
    fn test_split_and_join() {
        let cell = " a@acme.com;b@gmail.com ; ;nonsense";
        let emails: Vec<&str> = split_emails(cell).collect();
        assert_eq!(emails, vec!["a@acme.com", "b@gmail.com"]);
        assert_eq!(join_values(emails), "a@acme.com; b@gmail.com");
    }
}
