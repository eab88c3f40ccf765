//! Header normalisation for spreadsheet imports.
//!
//! Each page type has a fixed table of header spellings. Matching is on the
//! trimmed, lower-cased header text; unknown headers are dropped.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

use super::duration::duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    ContractorList,
    BillTracker,
    Epbg,
}

impl PageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "contractor_list" => Some(PageType::ContractorList),
            "bill_tracker" => Some(PageType::BillTracker),
            "epbg" => Some(PageType::Epbg),
            _ => None,
        }
    }

    /// Every field a mapped row of this type carries.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            PageType::ContractorList => &[
                "sno",
                "efile",
                "contractor",
                "description",
                "value",
                "gst",
                "startDate",
                "endDate",
            ],
            PageType::BillTracker => &[
                "sno",
                "efile",
                "contractor",
                "approvedDate",
                "approvedAmount",
                "billFrequency",
                "billDate",
                "billDueDate",
                "billPaidDate",
                "paidAmount",
                "startDate",
                "endDate",
                "remarks",
            ],
            PageType::Epbg => &[
                "sno",
                "contractor",
                "poNo",
                "bgNo",
                "bgDate",
                "bgAmount",
                "bgValidity",
                "gemBidNo",
                "refEfileNo",
            ],
        }
    }

    fn synonyms(self) -> &'static HashMap<&'static str, &'static str> {
        match self {
            PageType::ContractorList => &CONTRACTOR_HEADERS,
            PageType::BillTracker => &BILL_HEADERS,
            PageType::Epbg => &EPBG_HEADERS,
        }
    }

    /// Canonical field for a raw header, if it is recognised.
    pub fn field_for(self, header: &str) -> Option<&'static str> {
        self.synonyms().get(header.trim().to_lowercase().as_str()).copied()
    }
}

lazy_static! {
    static ref CONTRACTOR_HEADERS: HashMap<&'static str, &'static str> = HashMap::from([
        ("s.no", "sno"),
        ("sno", "sno"),
        ("serial", "sno"),
        ("e-file", "efile"),
        ("efile", "efile"),
        ("e file", "efile"),
        ("contractor", "contractor"),
        ("description", "description"),
        ("value", "value"),
        ("amount", "value"),
        ("gst", "gst"),
        ("tax", "gst"),
        ("start date", "startDate"),
        ("startdate", "startDate"),
        ("end date", "endDate"),
        ("enddate", "endDate"),
    ]);
    static ref BILL_HEADERS: HashMap<&'static str, &'static str> = HashMap::from([
        ("s.no", "sno"),
        ("sno", "sno"),
        ("e-file", "efile"),
        ("efile", "efile"),
        ("contractor", "contractor"),
        ("approved date", "approvedDate"),
        ("approved_date", "approvedDate"),
        ("approved amount", "approvedAmount"),
        ("bill frequency", "billFrequency"),
        ("bill date", "billDate"),
        ("bill_date", "billDate"),
        ("bill due date", "billDueDate"),
        ("bill_due_date", "billDueDate"),
        ("bill paid date", "billPaidDate"),
        ("bill_paid_date", "billPaidDate"),
        ("paid amount", "paidAmount"),
        ("start date", "startDate"),
        ("end date", "endDate"),
        ("remarks", "remarks"),
    ]);
    static ref EPBG_HEADERS: HashMap<&'static str, &'static str> = HashMap::from([
        ("s.no", "sno"),
        ("sno", "sno"),
        ("contractor", "contractor"),
        ("po no", "poNo"),
        ("po_no", "poNo"),
        ("bg no", "bgNo"),
        ("bg_no", "bgNo"),
        ("bg date", "bgDate"),
        ("bg_date", "bgDate"),
        ("bg amount", "bgAmount"),
        ("bg validity", "bgValidity"),
        ("gem bid no", "gemBidNo"),
        ("gem_bid_no", "gemBidNo"),
        ("ref efile no", "refEfileNo"),
        ("ref_efile_no", "refEfileNo"),
    ]);
}

pub type MappedRow = BTreeMap<&'static str, String>;

/// Maps raw rows onto the page type's fields. When two headers resolve to
/// the same field the right-most column is used.
pub fn map_rows(page: PageType, headers: &[String], rows: &[Vec<String>]) -> Vec<MappedRow> {
    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(field) = page.field_for(header) {
            columns.insert(field, idx);
        }
    }

    rows.iter()
        .map(|row| {
            let mut mapped: MappedRow = page
                .fields()
                .iter()
                .map(|field| {
                    let value = columns
                        .get(field)
                        .and_then(|&idx| row.get(idx))
                        .map(|cell| cell.trim().to_string())
                        .unwrap_or_default();
                    (*field, value)
                })
                .collect();
            if page == PageType::ContractorList {
                let span = duration(&mapped["startDate"], &mapped["endDate"]);
                mapped.insert("duration", span);
            }
            mapped
        })
        .collect()
}
