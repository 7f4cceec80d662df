//! Pipeline stages and the pure dataset transforms behind them.
//!
//! Each stage has a fixed 1-based ordinal that doubles as its checkpoint
//! step. The I/O-bound stages (load, enrich, persist) live with the
//! orchestrator; the transforms here only touch the [`Dataset`].

use crate::classify::{
    best_email, classify_email, email_domain, join_values, split_emails, EmailClass,
};
use crate::columns;
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of domains listed in an [`AnalysisReport`].
pub const TOP_DOMAINS: usize = 10;

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Read the input table
    Load,
    /// Drop pre-existing email columns
    Clean,
    /// Enrich identifiers through the remote service
    Enrich,
    /// Keep rows with emails and prefer personal addresses
    Filter,
    /// Pick one email per row
    Consolidate,
    /// Write the final table
    Persist,
    /// Summarize the result
    Analyze,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 7] = [
        Self::Load,
        Self::Clean,
        Self::Enrich,
        Self::Filter,
        Self::Consolidate,
        Self::Persist,
        Self::Analyze,
    ];

    /// Checkpoint ordinal written after this stage completes.
    #[must_use]
    pub fn ordinal(self) -> u32 {
        match self {
            Self::Load => 1,
            Self::Clean => 2,
            Self::Enrich => 3,
            Self::Filter => 4,
            Self::Consolidate => 5,
            Self::Persist => 6,
            Self::Analyze => 7,
        }
    }

    /// Stage whose checkpoint ordinal is `ordinal`.
    #[must_use]
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.ordinal() == ordinal)
    }

    /// The stage after this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// Whether this is the last stage.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Analyze
    }

    /// Lower-case stage name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Clean => "clean",
            Self::Enrich => "enrich",
            Self::Filter => "filter",
            Self::Consolidate => "consolidate",
            Self::Persist => "persist",
            Self::Analyze => "analyze",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Drop the configured columns. Returns the names actually removed.
pub fn clean(dataset: &mut Dataset, drop_columns: &[String]) -> Vec<String> {
    let removed = dataset.drop_columns(drop_columns);
    if !removed.is_empty() {
        tracing::info!(columns = ?removed, "Dropped pre-existing email columns");
    }
    removed
}

/// Row counts around the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    /// Rows before filtering
    pub before: usize,
    /// Rows kept
    pub after: usize,
    /// Kept rows that only have corporate addresses
    pub only_corporate: usize,
}

/// Keep rows with at least one enriched email, then drop corporate
/// addresses from rows that also have a personal one.
pub fn filter(dataset: &mut Dataset) -> FilterSummary {
    let before = dataset.len();
    let work = dataset.ensure_column(columns::WORK_EMAIL);
    let personal = dataset.ensure_column(columns::PERSONAL_EMAIL);

    dataset.retain_rows(|row| {
        split_emails(&row[work]).next().is_some() || split_emails(&row[personal]).next().is_some()
    });

    let mut only_corporate = 0;
    for row in 0..dataset.len() {
        let cells = [
            dataset.cell(row, work).unwrap_or_default().to_string(),
            dataset.cell(row, personal).unwrap_or_default().to_string(),
        ];
        let has_personal = cells
            .iter()
            .flat_map(|cell| split_emails(cell))
            .any(|email| !is_corporate(email));

        if !has_personal {
            only_corporate += 1;
            continue;
        }

        for (column, cell) in [work, personal].into_iter().zip(&cells) {
            let kept = join_values(split_emails(cell).filter(|email| !is_corporate(email)));
            dataset.set_cell(row, column, kept);
        }
    }

    let summary = FilterSummary {
        before,
        after: dataset.len(),
        only_corporate,
    };
    tracing::info!(
        before = summary.before,
        after = summary.after,
        only_corporate = summary.only_corporate,
        "Filtered rows without emails"
    );
    summary
}

fn is_corporate(email: &str) -> bool {
    classify_email(email).is_some_and(EmailClass::is_corporate)
}

/// Fill `Consolidated Email` with the best address of each row.
///
/// Returns the number of rows that received an address.
pub fn consolidate(dataset: &mut Dataset) -> usize {
    let work = dataset.ensure_column(columns::WORK_EMAIL);
    let personal = dataset.ensure_column(columns::PERSONAL_EMAIL);
    let target = dataset.ensure_column(columns::CONSOLIDATED_EMAIL);

    let mut filled = 0;
    for row in 0..dataset.len() {
        let best = {
            let work_cell = dataset.cell(row, work).unwrap_or_default();
            let personal_cell = dataset.cell(row, personal).unwrap_or_default();
            best_email(split_emails(personal_cell).chain(split_emails(work_cell)))
                .map(str::to_string)
        };
        if best.is_some() {
            filled += 1;
        }
        dataset.set_cell(row, target, best.unwrap_or_default());
    }

    tracing::info!(rows = dataset.len(), filled, "Consolidated emails");
    filled
}

/// Summary of a finished dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Dataset the report is about
    pub dataset: String,
    /// Rows in the final table
    pub total_rows: usize,
    /// Rows with a consolidated email
    pub with_email: usize,
    /// Consolidated emails on personal domains
    pub personal: usize,
    /// Consolidated emails on company domains
    pub work: usize,
    /// Consolidated emails on academic domains
    pub academic: usize,
    /// Most common consolidated email domains with their counts
    pub top_domains: Vec<(String, usize)>,
}

/// Compute and log the [`AnalysisReport`] for `dataset`.
#[must_use]
pub fn analyze(dataset: &Dataset, name: &str) -> AnalysisReport {
    let mut report = AnalysisReport {
        dataset: name.to_string(),
        total_rows: dataset.len(),
        with_email: 0,
        personal: 0,
        work: 0,
        academic: 0,
        top_domains: Vec::new(),
    };
    let mut domains: HashMap<String, usize> = HashMap::new();

    if let Some(column) = dataset.column_index(columns::CONSOLIDATED_EMAIL) {
        for row in dataset.rows() {
            let email = row[column].trim();
            let Some(class) = classify_email(email) else {
                continue;
            };
            report.with_email += 1;
            match class {
                EmailClass::Personal => report.personal += 1,
                EmailClass::Work => report.work += 1,
                EmailClass::Academic => report.academic += 1,
            }
            if let Some(domain) = email_domain(email) {
                *domains.entry(domain).or_default() += 1;
            }
        }
    }

    let mut top: Vec<(String, usize)> = domains.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(TOP_DOMAINS);
    report.top_domains = top;

    tracing::info!(
        dataset = %report.dataset,
        total_rows = report.total_rows,
        with_email = report.with_email,
        personal = report.personal,
        work = report.work,
        academic = report.academic,
        "Analysis complete"
    );
    for (domain, count) in &report.top_domains {
        tracing::info!(dataset = %report.dataset, %domain, count, "Top domain");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched(rows: &[(&str, &str)]) -> Dataset {
        let mut ds = Dataset::new(vec![
            "Name".to_string(),
            columns::WORK_EMAIL.to_string(),
            columns::PERSONAL_EMAIL.to_string(),
        ]);
        for (i, (work, personal)) in rows.iter().enumerate() {
            ds.push_row(vec![format!("p{i}"), (*work).to_string(), (*personal).to_string()]);
        }
        ds
    }

    #[test]
    fn test_stage_ordinals() {
        assert_eq!(Stage::Load.ordinal(), 1);
        assert_eq!(Stage::Analyze.ordinal(), 7);
        assert_eq!(Stage::from_ordinal(4), Some(Stage::Filter));
        assert_eq!(Stage::Filter.next(), Some(Stage::Consolidate));
        assert_eq!(Stage::Analyze.next(), None);
        assert_eq!(Stage::from_ordinal(0), None);
        assert!(Stage::Analyze.is_terminal());
        assert_eq!(Stage::Consolidate.to_string(), "consolidate");
    }

    #[test]
    fn test_filter_drops_rows_without_email() {
        let mut ds = enriched(&[("a@acme.com", ""), ("", ""), ("", "b@gmail.com"), (" ; ", "")]);
        let summary = filter(&mut ds);
        assert_eq!(summary.before, 4);
        assert_eq!(summary.after, 2);
        assert_eq!(ds.cell(0, 0), Some("p0"));
        assert_eq!(ds.cell(1, 0), Some("p2"));
    }

    #[test]
    fn test_filter_prefers_personal_addresses() {
        let mut ds = enriched(&[
            ("a@acme.com; a@mit.edu", "a@gmail.com"),
            ("b@acme.com", ""),
        ]);
        let summary = filter(&mut ds);
        assert_eq!(summary.only_corporate, 1);
        assert_eq!(ds.cell_by_name(0, columns::WORK_EMAIL), Some("a@mit.edu"));
        assert_eq!(ds.cell_by_name(0, columns::PERSONAL_EMAIL), Some("a@gmail.com"));
        assert_eq!(ds.cell_by_name(1, columns::WORK_EMAIL), Some("b@acme.com"));
    }

    #[test]
    fn test_consolidate_priority() {
        let mut ds = enriched(&[
            ("w@acme.com", "p@yahoo.com"),
            ("w@acme.com", "x@harvard.edu"),
            ("", ""),
        ]);
        assert_eq!(consolidate(&mut ds), 2);
        assert_eq!(ds.cell_by_name(0, columns::CONSOLIDATED_EMAIL), Some("p@yahoo.com"));
        assert_eq!(ds.cell_by_name(1, columns::CONSOLIDATED_EMAIL), Some("w@acme.com"));
        assert_eq!(ds.cell_by_name(2, columns::CONSOLIDATED_EMAIL), Some(""));
    }

    #[test]
    fn test_analyze_report() {
        let mut ds = enriched(&[
            ("", "a@gmail.com"),
            ("", "b@gmail.com"),
            ("c@acme.com", ""),
            ("d@ox.ac.uk", ""),
            ("", ""),
        ]);
        consolidate(&mut ds);
        let report = analyze(&ds, "leads");
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.with_email, 4);
        assert_eq!((report.personal, report.work, report.academic), (2, 1, 1));
        assert_eq!(report.top_domains[0], ("gmail.com".to_string(), 2));
        assert_eq!(report.top_domains[1], ("acme.com".to_string(), 1));
    }

    #[test]
    fn test_clean_ignores_missing_columns() {
        let mut ds = enriched(&[("a@acme.com", "")]);
        let removed = clean(
            &mut ds,
            &["Email".to_string(), columns::WORK_EMAIL.to_string()],
        );
        assert_eq!(removed, vec![columns::WORK_EMAIL.to_string()]);
        assert_eq!(ds.columns().len(), 2);
    }
}
