use serde::Serialize;
use time::{Date, Duration};

use crate::dates::iso_date_option;

pub const WINDOW_DAYS: i64 = 30;
pub const CRITICAL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractSource {
    ContractorList,
    BillTracker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Warning,
}

impl Urgency {
    pub fn for_days(days: i64) -> Self {
        if days <= CRITICAL_DAYS {
            Urgency::Critical
        } else {
            Urgency::Warning
        }
    }
}

/// A row that has an end date, as read from either table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryCandidate {
    pub id: i64,
    pub source: ContractSource,
    pub contractor: String,
    pub efile: String,
    pub end_date: Date,
    pub value: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringContract {
    pub id: i64,
    pub source: ContractSource,
    pub contractor: String,
    pub contractor_name: String,
    pub efile: String,
    #[serde(with = "iso_date_option")]
    pub end_date: Option<Date>,
    pub value: String,
    pub description: String,
    pub days_until_expiry: i64,
    pub urgency: Urgency,
}

/// Inclusive bounds of the scan window starting at `today`.
pub fn window(today: Date) -> (Date, Date) {
    (today, today + Duration::days(WINDOW_DAYS))
}

pub fn scan(candidates: Vec<ExpiryCandidate>, today: Date) -> Vec<ExpiringContract> {
    let mut out: Vec<ExpiringContract> = candidates
        .into_iter()
        .filter_map(|c| {
            let days = (c.end_date - today).whole_days();
            if !(0..=WINDOW_DAYS).contains(&days) {
                return None;
            }
            let contractor_name = if c.contractor.is_empty() {
                "Unknown Contractor".to_string()
            } else {
                c.contractor.clone()
            };
            Some(ExpiringContract {
                id: c.id,
                source: c.source,
                contractor: c.contractor,
                contractor_name,
                efile: c.efile,
                end_date: Some(c.end_date),
                value: c.value,
                description: c.description,
                days_until_expiry: days,
                urgency: Urgency::for_days(days),
            })
        })
        .collect();

    out.sort_by(|a, b| {
        a.end_date
            .cmp(&b.end_date)
            .then(a.source.cmp(&b.source))
            .then(a.id.cmp(&b.id))
    });
    out
}
