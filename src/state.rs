use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::repo_types::{NewUser, Role};
use crate::config::AppConfig;
use crate::db::{PgStore, Store};
use crate::mail::{DisabledMailer, Mailer, SmtpMailer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pg = PgStore::connect(&config).await?;
        pg.migrate().await?;
        let store = Arc::new(pg) as Arc<dyn Store>;

        let mailer = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>,
            None => {
                warn!("SMTP not configured; password reset mails will fail");
                Arc::new(DisabledMailer) as Arc<dyn Mailer>
            }
        };

        let state = Self::from_parts(store, config, mailer);
        state.bootstrap_admin().await?;
        Ok(state)
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            config,
            mailer,
        }
    }

    async fn bootstrap_admin(&self) -> anyhow::Result<()> {
        let Some(admin) = &self.config.bootstrap_admin else {
            return Ok(());
        };
        if self.store.count_users().await? > 0 {
            return Ok(());
        }
        let user = self
            .store
            .create_user(&NewUser {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password: admin.password.clone(),
                name: admin.name.clone(),
                role: Role::Admin,
            })
            .await?;
        info!(user_id = user.id, username = %user.username, "bootstrap admin created");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::config::SessionConfig;
    use crate::db::memory::MemoryStore;
    use crate::mail::RecordingMailer;

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".into(),
            database_max_connections: 1,
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
                cookie_name: "dashboard_session".into(),
                cookie_secure: false,
            },
            otp_ttl_minutes: 5,
            smtp: None,
            upload_limit_bytes: 1024 * 1024,
            static_dir: None,
            bootstrap_admin: None,
            utc_offset: time::UtcOffset::UTC,
        }
    }

    /// State over an in-memory store, with handles to the concrete fakes.
    pub struct TestState {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub mailer: Arc<RecordingMailer>,
    }

    impl TestState {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let mailer = Arc::new(RecordingMailer::default());
            let state = AppState::from_parts(
                store.clone() as Arc<dyn Store>,
                Arc::new(test_config()),
                mailer.clone() as Arc<dyn Mailer>,
            );
            Self { state, store, mailer }
        }

        pub async fn user(&self, username: &str, role: Role) -> crate::auth::repo_types::User {
            self.store
                .create_user(&NewUser {
                    username: username.into(),
                    email: format!("{username}@company.com"),
                    password: format!("{username}-pass1"),
                    name: username.into(),
                    role,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_only_when_empty() {
        let t = TestState::new();
        let mut config = test_config();
        config.bootstrap_admin = Some(crate::config::BootstrapAdmin {
            username: "root".into(),
            email: "root@company.com".into(),
            password: "Root@1234".into(),
            name: "Root".into(),
        });
        let state = AppState::from_parts(t.state.store.clone(), Arc::new(config), t.state.mailer.clone());

        state.bootstrap_admin().await.unwrap();
        state.bootstrap_admin().await.unwrap();

        let users = t.store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
    }
}
