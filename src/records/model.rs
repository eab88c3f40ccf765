use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use time::Date;

use crate::dates::{de_flexible_date, iso_date_option};

/// Text cells arrive as strings, numbers or null from the dashboard; all are
/// stored as trimmed text.
fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!("expected text, got {other}")));
        }
    })
}

/// Attachment fields are passed through verbatim; blank means absent.
fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = de_text(deserializer)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractorRecord {
    pub id: i64,
    pub sno: String,
    pub efile: String,
    pub contractor: String,
    pub description: String,
    pub value: String,
    pub gst: String,
    #[serde(with = "iso_date_option")]
    pub start_date: Option<Date>,
    #[serde(with = "iso_date_option")]
    pub end_date: Option<Date>,
    pub duration: String,
    pub file_name: Option<String>,
    pub file_base64: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewContractorRecord {
    #[serde(default, deserialize_with = "de_text")]
    pub sno: String,
    #[serde(default, deserialize_with = "de_text")]
    pub efile: String,
    #[serde(default, deserialize_with = "de_text")]
    pub contractor: String,
    #[serde(default, deserialize_with = "de_text")]
    pub description: String,
    #[serde(default, deserialize_with = "de_text")]
    pub value: String,
    #[serde(default, deserialize_with = "de_text")]
    pub gst: String,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub start_date: Option<Date>,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub end_date: Option<Date>,
    #[serde(default, deserialize_with = "de_text")]
    pub duration: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_base64: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillTrackerRecord {
    pub id: i64,
    pub sno: String,
    pub efile: String,
    pub contractor: String,
    #[serde(with = "iso_date_option")]
    pub approved_date: Option<Date>,
    pub approved_amount: String,
    pub bill_frequency: String,
    #[serde(with = "iso_date_option")]
    pub bill_date: Option<Date>,
    #[serde(with = "iso_date_option")]
    pub bill_due_date: Option<Date>,
    #[serde(with = "iso_date_option")]
    pub bill_paid_date: Option<Date>,
    pub paid_amount: String,
    #[serde(with = "iso_date_option")]
    pub start_date: Option<Date>,
    #[serde(with = "iso_date_option")]
    pub end_date: Option<Date>,
    pub duration: String,
    pub remarks: String,
    pub file_name: Option<String>,
    pub file_base64: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewBillTrackerRecord {
    #[serde(default, deserialize_with = "de_text")]
    pub sno: String,
    #[serde(default, deserialize_with = "de_text", alias = "efileNo")]
    pub efile: String,
    #[serde(default, deserialize_with = "de_text")]
    pub contractor: String,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub approved_date: Option<Date>,
    #[serde(default, deserialize_with = "de_text")]
    pub approved_amount: String,
    #[serde(default, deserialize_with = "de_text")]
    pub bill_frequency: String,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub bill_date: Option<Date>,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub bill_due_date: Option<Date>,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub bill_paid_date: Option<Date>,
    #[serde(default, deserialize_with = "de_text")]
    pub paid_amount: String,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub start_date: Option<Date>,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub end_date: Option<Date>,
    #[serde(default, deserialize_with = "de_text")]
    pub duration: String,
    #[serde(default, deserialize_with = "de_text")]
    pub remarks: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_base64: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EpbgRecord {
    pub id: i64,
    pub sno: String,
    pub contractor: String,
    pub po_no: String,
    pub bg_no: String,
    #[serde(with = "iso_date_option")]
    pub bg_date: Option<Date>,
    pub bg_amount: String,
    pub bg_validity: String,
    pub gem_bid_no: String,
    pub ref_efile_no: String,
    pub file_name: Option<String>,
    pub file_base64: Option<String>,
    pub file_type: Option<String>,
    pub bg_no_attachment_name: Option<String>,
    pub bg_no_attachment_base64: Option<String>,
    pub bg_no_attachment_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewEpbgRecord {
    #[serde(default, deserialize_with = "de_text")]
    pub sno: String,
    #[serde(default, deserialize_with = "de_text")]
    pub contractor: String,
    #[serde(default, deserialize_with = "de_text")]
    pub po_no: String,
    #[serde(default, deserialize_with = "de_text")]
    pub bg_no: String,
    #[serde(default, deserialize_with = "de_flexible_date")]
    pub bg_date: Option<Date>,
    #[serde(default, deserialize_with = "de_text")]
    pub bg_amount: String,
    #[serde(default, deserialize_with = "de_text")]
    pub bg_validity: String,
    #[serde(default, deserialize_with = "de_text", alias = "gemBid")]
    pub gem_bid_no: String,
    #[serde(default, deserialize_with = "de_text", alias = "refEfile")]
    pub ref_efile_no: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_base64: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub file_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub bg_no_attachment_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub bg_no_attachment_base64: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub bg_no_attachment_type: Option<String>,
}

/// Entry of the contractor name lookup list.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Contractor {
    pub id: i64,
    pub name: String,
}
