use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
    auth::repo_types::{NewUser, PasswordReset, Theme, User, UserPatch},
    config::AppConfig,
    records::model::{
        BillTrackerRecord, Contractor, ContractorRecord, EpbgRecord, NewBillTrackerRecord,
        NewContractorRecord, NewEpbgRecord,
    },
    renewal::scan::{ContractSource, ExpiryCandidate},
};

const USER_COLUMNS: &str =
    "id, username, email, password, name, role, theme_preference, created_at";

const DUPLICATE_USER: &str = "Username or Email already exists";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        info!("database migrations applied");
        Ok(())
    }
}

fn unique_as_conflict(e: sqlx::Error, message: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message.into()),
        _ => StoreError::Database(e),
    }
}

#[derive(FromRow)]
struct CandidateRow {
    id: i64,
    contractor: String,
    efile: String,
    end_date: Date,
    value: String,
    description: String,
}

impl CandidateRow {
    fn into_candidate(self, source: ContractSource) -> ExpiryCandidate {
        ExpiryCandidate {
            id: self.id,
            source,
            contractor: self.contractor,
            efile: self.efile,
            end_date: self.end_date,
            value: self.value,
            description: self.description,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let column = if login.contains('@') { "email" } else { "username" };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await?;
        if taken {
            return Err(StoreError::Conflict(DUPLICATE_USER.into()));
        }

        let sql = format!(
            r#"
            INSERT INTO users (username, email, password, name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password)
            .bind(&user.name)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_as_conflict(e, DUPLICATE_USER))
    }

    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET name       = COALESCE($2, name),
                   email      = COALESCE($3, email),
                   role       = COALESCE($4, role),
                   password   = COALESCE($5, password),
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.role.map(|r| r.as_str()))
        .bind(patch.password.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_conflict(e, DUPLICATE_USER))?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_theme(&self, id: i64, theme: Theme) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET theme_preference = $1, updated_at = now() WHERE id = $2")
            .bind(theme.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session(&self, user_id: i64, expires_at: OffsetDateTime) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn session_user(&self, session_id: Uuid, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password, u.name, u.role,
                   u.theme_preference, u.created_at
              FROM sessions s
              JOIN users u ON u.id = s.user_id
             WHERE s.id = $1 AND s.expires_at > $2
            "#,
        )
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(purged)
    }

    async fn insert_reset(
        &self,
        email: &str,
        otp_hash: &str,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (email, otp_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(email)
        .bind(otp_hash)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_resets(&self, email: &str, now: OffsetDateTime) -> Result<Vec<PasswordReset>, StoreError> {
        let rows = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id, email, otp_hash, created_at, expires_at, used
              FROM password_resets
             WHERE email = $1 AND used = FALSE AND expires_at > $2
             ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(email)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn complete_reset(&self, reset_id: i64, email: &str, new_password: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("UPDATE password_resets SET used = TRUE WHERE id = $1 AND used = FALSE")
            .bind(reset_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if consumed == 0 {
            debug!(reset_id, "reset already consumed");
            return Ok(false);
        }

        sqlx::query("UPDATE users SET password = $1, updated_at = now() WHERE email = $2")
            .bind(new_password)
            .bind(email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_contractor_records(&self) -> Result<Vec<ContractorRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ContractorRecord>(
            r#"
            SELECT id, sno, efile, contractor, description, value, gst, start_date, end_date,
                   duration, file_name, file_base64, file_type
              FROM contractor_list
             ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn replace_contractor_records(&self, records: &[NewContractorRecord]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM contractor_list").execute(&mut *tx).await?;
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO contractor_list
                    (sno, efile, contractor, description, value, gst, start_date, end_date,
                     duration, file_name, file_base64, file_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&r.sno)
            .bind(&r.efile)
            .bind(&r.contractor)
            .bind(&r.description)
            .bind(&r.value)
            .bind(&r.gst)
            .bind(r.start_date)
            .bind(r.end_date)
            .bind(&r.duration)
            .bind(&r.file_name)
            .bind(&r.file_base64)
            .bind(&r.file_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn list_bill_records(&self) -> Result<Vec<BillTrackerRecord>, StoreError> {
        let rows = sqlx::query_as::<_, BillTrackerRecord>(
            r#"
            SELECT id, sno, efile, contractor, approved_date, approved_amount, bill_frequency,
                   bill_date, bill_due_date, bill_paid_date, paid_amount, start_date, end_date,
                   duration, remarks, file_name, file_base64, file_type
              FROM bill_tracker
             ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn replace_bill_records(&self, records: &[NewBillTrackerRecord]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM bill_tracker").execute(&mut *tx).await?;
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO bill_tracker
                    (sno, efile, contractor, approved_date, approved_amount, bill_frequency,
                     bill_date, bill_due_date, bill_paid_date, paid_amount, start_date, end_date,
                     duration, remarks, file_name, file_base64, file_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(&r.sno)
            .bind(&r.efile)
            .bind(&r.contractor)
            .bind(r.approved_date)
            .bind(&r.approved_amount)
            .bind(&r.bill_frequency)
            .bind(r.bill_date)
            .bind(r.bill_due_date)
            .bind(r.bill_paid_date)
            .bind(&r.paid_amount)
            .bind(r.start_date)
            .bind(r.end_date)
            .bind(&r.duration)
            .bind(&r.remarks)
            .bind(&r.file_name)
            .bind(&r.file_base64)
            .bind(&r.file_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn list_epbg_records(&self) -> Result<Vec<EpbgRecord>, StoreError> {
        let rows = sqlx::query_as::<_, EpbgRecord>(
            r#"
            SELECT id, sno, contractor, po_no, bg_no, bg_date, bg_amount, bg_validity, gem_bid_no,
                   ref_efile_no, file_name, file_base64, file_type, bg_no_attachment_name,
                   bg_no_attachment_base64, bg_no_attachment_type
              FROM epbg
             ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn replace_epbg_records(&self, records: &[NewEpbgRecord]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM epbg").execute(&mut *tx).await?;
        for r in records {
            sqlx::query(
                r#"
                INSERT INTO epbg
                    (sno, contractor, po_no, bg_no, bg_date, bg_amount, bg_validity, gem_bid_no,
                     ref_efile_no, file_name, file_base64, file_type, bg_no_attachment_name,
                     bg_no_attachment_base64, bg_no_attachment_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(&r.sno)
            .bind(&r.contractor)
            .bind(&r.po_no)
            .bind(&r.bg_no)
            .bind(r.bg_date)
            .bind(&r.bg_amount)
            .bind(&r.bg_validity)
            .bind(&r.gem_bid_no)
            .bind(&r.ref_efile_no)
            .bind(&r.file_name)
            .bind(&r.file_base64)
            .bind(&r.file_type)
            .bind(&r.bg_no_attachment_name)
            .bind(&r.bg_no_attachment_base64)
            .bind(&r.bg_no_attachment_type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    async fn list_contractors(&self) -> Result<Vec<Contractor>, StoreError> {
        let rows = sqlx::query_as::<_, Contractor>("SELECT id, name FROM contractors ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn add_contractor(&self, name: &str) -> Result<Contractor, StoreError> {
        sqlx::query_as::<_, Contractor>("INSERT INTO contractors (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_as_conflict(e, "Contractor already exists"))
    }

    async fn contracts_ending_between(&self, from: Date, to: Date) -> Result<Vec<ExpiryCandidate>, StoreError> {
        let contracts = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, contractor, efile, end_date, value, description
              FROM contractor_list
             WHERE end_date BETWEEN $1 AND $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let bills = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, contractor, efile, end_date,
                   approved_amount AS value, remarks AS description
              FROM bill_tracker
             WHERE end_date BETWEEN $1 AND $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(contracts
            .into_iter()
            .map(|r| r.into_candidate(ContractSource::ContractorList))
            .chain(bills.into_iter().map(|r| r.into_candidate(ContractSource::BillTracker)))
            .collect())
    }
}
