use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::model::{
    BillTrackerRecord, ContractorRecord, EpbgRecord, NewBillTrackerRecord, NewContractorRecord, NewEpbgRecord,
};
use crate::db::{Store, StoreError};

/// A dashboard table that is listed whole and saved whole.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Used in the save confirmation, e.g. "EPBG saved successfully".
    const LABEL: &'static str;

    type Record: Serialize + Send;
    type New: DeserializeOwned + Send + Sync;

    async fn list(store: &dyn Store) -> Result<Vec<Self::Record>, StoreError>;
    async fn replace(store: &dyn Store, records: &[Self::New]) -> Result<usize, StoreError>;
}

pub struct ContractorList;
pub struct BillTracker;
pub struct Epbg;

#[async_trait]
impl Resource for ContractorList {
    const LABEL: &'static str = "Contractor list";
    type Record = ContractorRecord;
    type New = NewContractorRecord;

    async fn list(store: &dyn Store) -> Result<Vec<Self::Record>, StoreError> {
        store.list_contractor_records().await
    }

    async fn replace(store: &dyn Store, records: &[Self::New]) -> Result<usize, StoreError> {
        store.replace_contractor_records(records).await
    }
}

#[async_trait]
impl Resource for BillTracker {
    const LABEL: &'static str = "Bill tracker";
    type Record = BillTrackerRecord;
    type New = NewBillTrackerRecord;

    async fn list(store: &dyn Store) -> Result<Vec<Self::Record>, StoreError> {
        store.list_bill_records().await
    }

    async fn replace(store: &dyn Store, records: &[Self::New]) -> Result<usize, StoreError> {
        store.replace_bill_records(records).await
    }
}

#[async_trait]
impl Resource for Epbg {
    const LABEL: &'static str = "EPBG";
    type Record = EpbgRecord;
    type New = NewEpbgRecord;

    async fn list(store: &dyn Store) -> Result<Vec<Self::Record>, StoreError> {
        store.list_epbg_records().await
    }

    async fn replace(store: &dyn Store, records: &[Self::New]) -> Result<usize, StoreError> {
        store.replace_epbg_records(records).await
    }
}
