//! In-process [`Store`] for tests. Mirrors the Postgres semantics closely
//! enough for handler tests: unique users, cascading sessions, full-replace
//! saves and single-use resets.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
    auth::repo_types::{NewUser, PasswordReset, Theme, User, UserPatch},
    records::model::{
        BillTrackerRecord, Contractor, ContractorRecord, EpbgRecord, NewBillTrackerRecord,
        NewContractorRecord, NewEpbgRecord,
    },
    renewal::scan::{ContractSource, ExpiryCandidate},
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    sessions: HashMap<Uuid, (i64, OffsetDateTime)>,
    resets: Vec<PasswordReset>,
    contractor_records: Vec<ContractorRecord>,
    bill_records: Vec<BillTrackerRecord>,
    epbg_records: Vec<EpbgRecord>,
    contractors: Vec<Contractor>,
}

impl Inner {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// Every reset row ever written, used or not.
    pub fn reset_rows(&self) -> Vec<PasswordReset> {
        self.inner.lock().unwrap().resets.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let by_email = login.contains('@');
        Ok(inner
            .users
            .iter()
            .find(|u| if by_email { u.email == login } else { u.username == login })
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut users = inner.users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().users.len() as i64)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict("Username or Email already exists".into()));
        }
        let id = inner.id();
        let created = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            name: user.name.clone(),
            role: user.role,
            theme_preference: Theme::Light,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(email) = &patch.email {
            if inner.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict("Username or Email already exists".into()));
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(password) = &patch.password {
            user.password = password.clone();
        }
        Ok(true)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        inner.sessions.retain(|_, (user_id, _)| *user_id != id);
        Ok(inner.users.len() != before)
    }

    async fn set_theme(&self, id: i64, theme: Theme) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.theme_preference = theme;
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i64, expires_at: OffsetDateTime) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(id, (user_id, expires_at));
        Ok(id)
    }

    async fn session_user(&self, session_id: Uuid, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some((user_id, expires_at)) = inner.sessions.get(&session_id).copied() else {
            return Ok(None);
        };
        if expires_at <= now {
            return Ok(None);
        }
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.inner.lock().unwrap().sessions.remove(&session_id);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn insert_reset(
        &self,
        email: &str,
        otp_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.resets.push(PasswordReset {
            id,
            email: email.to_string(),
            otp_hash: otp_hash.to_string(),
            created_at,
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn active_resets(&self, email: &str, now: OffsetDateTime) -> Result<Vec<PasswordReset>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<PasswordReset> = inner
            .resets
            .iter()
            .filter(|r| r.email == email && !r.used && r.expires_at > now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn complete_reset(&self, reset_id: i64, email: &str, new_password: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(reset) = inner.resets.iter_mut().find(|r| r.id == reset_id && !r.used) else {
            return Ok(false);
        };
        reset.used = true;
        if let Some(user) = inner.users.iter_mut().find(|u| u.email == email) {
            user.password = new_password.to_string();
        }
        Ok(true)
    }

    async fn list_contractor_records(&self) -> Result<Vec<ContractorRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().contractor_records.clone())
    }

    async fn replace_contractor_records(&self, records: &[NewContractorRecord]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            rows.push(ContractorRecord {
                id: inner.id(),
                sno: r.sno.clone(),
                efile: r.efile.clone(),
                contractor: r.contractor.clone(),
                description: r.description.clone(),
                value: r.value.clone(),
                gst: r.gst.clone(),
                start_date: r.start_date,
                end_date: r.end_date,
                duration: r.duration.clone(),
                file_name: r.file_name.clone(),
                file_base64: r.file_base64.clone(),
                file_type: r.file_type.clone(),
            });
        }
        inner.contractor_records = rows;
        Ok(records.len())
    }

    async fn list_bill_records(&self) -> Result<Vec<BillTrackerRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().bill_records.clone())
    }

    async fn replace_bill_records(&self, records: &[NewBillTrackerRecord]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            rows.push(BillTrackerRecord {
                id: inner.id(),
                sno: r.sno.clone(),
                efile: r.efile.clone(),
                contractor: r.contractor.clone(),
                approved_date: r.approved_date,
                approved_amount: r.approved_amount.clone(),
                bill_frequency: r.bill_frequency.clone(),
                bill_date: r.bill_date,
                bill_due_date: r.bill_due_date,
                bill_paid_date: r.bill_paid_date,
                paid_amount: r.paid_amount.clone(),
                start_date: r.start_date,
                end_date: r.end_date,
                duration: r.duration.clone(),
                remarks: r.remarks.clone(),
                file_name: r.file_name.clone(),
                file_base64: r.file_base64.clone(),
                file_type: r.file_type.clone(),
            });
        }
        inner.bill_records = rows;
        Ok(records.len())
    }

    async fn list_epbg_records(&self) -> Result<Vec<EpbgRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().epbg_records.clone())
    }

    async fn replace_epbg_records(&self, records: &[NewEpbgRecord]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            rows.push(EpbgRecord {
                id: inner.id(),
                sno: r.sno.clone(),
                contractor: r.contractor.clone(),
                po_no: r.po_no.clone(),
                bg_no: r.bg_no.clone(),
                bg_date: r.bg_date,
                bg_amount: r.bg_amount.clone(),
                bg_validity: r.bg_validity.clone(),
                gem_bid_no: r.gem_bid_no.clone(),
                ref_efile_no: r.ref_efile_no.clone(),
                file_name: r.file_name.clone(),
                file_base64: r.file_base64.clone(),
                file_type: r.file_type.clone(),
                bg_no_attachment_name: r.bg_no_attachment_name.clone(),
                bg_no_attachment_base64: r.bg_no_attachment_base64.clone(),
                bg_no_attachment_type: r.bg_no_attachment_type.clone(),
            });
        }
        inner.epbg_records = rows;
        Ok(records.len())
    }

    async fn list_contractors(&self) -> Result<Vec<Contractor>, StoreError> {
        let mut rows = self.inner.lock().unwrap().contractors.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn add_contractor(&self, name: &str) -> Result<Contractor, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.contractors.iter().any(|c| c.name == name) {
            return Err(StoreError::Conflict("Contractor already exists".into()));
        }
        let contractor = Contractor {
            id: inner.id(),
            name: name.to_string(),
        };
        inner.contractors.push(contractor.clone());
        Ok(contractor)
    }

    async fn contracts_ending_between(&self, from: Date, to: Date) -> Result<Vec<ExpiryCandidate>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let in_window = |d: Option<Date>| d.filter(|d| *d >= from && *d <= to);

        let contracts = inner.contractor_records.iter().filter_map(|r| {
            in_window(r.end_date).map(|end_date| ExpiryCandidate {
                id: r.id,
                source: ContractSource::ContractorList,
                contractor: r.contractor.clone(),
                efile: r.efile.clone(),
                end_date,
                value: r.value.clone(),
                description: r.description.clone(),
            })
        });
        let bills = inner.bill_records.iter().filter_map(|r| {
            in_window(r.end_date).map(|end_date| ExpiryCandidate {
                id: r.id,
                source: ContractSource::BillTracker,
                contractor: r.contractor.clone(),
                efile: r.efile.clone(),
                end_date,
                value: r.approved_amount.clone(),
                description: r.remarks.clone(),
            })
        });
        Ok(contracts.chain(bills).collect())
    }
}
