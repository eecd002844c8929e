use {
    anyhow::Result,
    calbridge_common::{CalendarProvider, ConnectedCalendar},
    chrono::{SecondsFormat, Utc},
    secrecy::SecretString,
};

/// A stored calendar access token. One per (user, provider).
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: String,
    pub user_id: String,
    pub provider: CalendarProvider,
    pub access_token: SecretString,
    pub scope: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    /// ISO-8601 UTC with millisecond precision.
    pub connected_at: String,
}

impl TokenRecord {
    #[must_use]
    pub fn summary(&self) -> ConnectedCalendar {
        ConnectedCalendar {
            provider: self.provider.to_string(),
            scope: self.scope.clone(),
            expires_at: self.expires_at,
            connected_at: self.connected_at.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    user_id: String,
    provider: String,
    access_token: String,
    scope: String,
    expires_at: i64,
    connected_at: String,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = anyhow::Error;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .parse::<CalendarProvider>()
            .map_err(|_| anyhow::anyhow!("invalid provider '{}'", row.provider))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            provider,
            access_token: SecretString::new(row.access_token),
            scope: row.scope,
            expires_at: row.expires_at,
            connected_at: row.connected_at,
        })
    }
}

/// Fields written by [`TokenStore::upsert`].
#[derive(Debug)]
pub struct NewToken<'a> {
    pub user_id: &'a str,
    pub provider: CalendarProvider,
    pub access_token: &'a str,
    pub scope: &'a str,
    pub expires_in_secs: i64,
}

pub struct TokenStore {
    pool: sqlx::SqlitePool,
}

impl TokenStore {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `calendar_tokens` table and its indexes if missing.
    pub async fn init(pool: &sqlx::SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS calendar_tokens (
                id           TEXT    PRIMARY KEY,
                user_id      TEXT    NOT NULL,
                provider     TEXT    NOT NULL,
                access_token TEXT    NOT NULL,
                scope        TEXT    NOT NULL DEFAULT '',
                expires_at   INTEGER NOT NULL,
                connected_at TEXT    NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_calendar_tokens_user_provider ON calendar_tokens(user_id, provider)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert the token, or overwrite the caller's existing token for the
    /// same provider. The record id survives an overwrite.
    pub async fn upsert(&self, token: NewToken<'_>) -> Result<TokenRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now
            .timestamp_millis()
            .saturating_add(token.expires_in_secs.saturating_mul(1000));
        let connected_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);

        sqlx::query(
            r#"INSERT INTO calendar_tokens (
                id, user_id, provider, access_token, scope, expires_at, connected_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                scope        = excluded.scope,
                expires_at   = excluded.expires_at,
                connected_at = excluded.connected_at"#,
        )
        .bind(&id)
        .bind(token.user_id)
        .bind(token.provider.as_str())
        .bind(token.access_token)
        .bind(token.scope)
        .bind(expires_at)
        .bind(&connected_at)
        .execute(&self.pool)
        .await?;

        self.get(token.user_id, token.provider)
            .await?
            .ok_or_else(|| anyhow::anyhow!("stored calendar token not found"))
    }

    pub async fn get(
        &self,
        user_id: &str,
        provider: CalendarProvider,
    ) -> Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT * FROM calendar_tokens WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, TokenRow>(
            "SELECT * FROM calendar_tokens WHERE user_id = ? ORDER BY provider",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TokenRecord::try_from).collect()
    }

    pub async fn delete(&self, user_id: &str, provider: CalendarProvider) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM calendar_tokens WHERE user_id = ? AND provider = ?")
                .bind(user_id)
                .bind(provider.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    async fn test_store() -> TokenStore {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        TokenStore::init(&pool).await.unwrap();
        TokenStore::new(pool)
    }

    fn google<'a>(user_id: &'a str, access_token: &'a str) -> NewToken<'a> {
        NewToken {
            user_id,
            provider: CalendarProvider::Google,
            access_token,
            scope: "https://www.googleapis.com/auth/calendar.readonly",
            expires_in_secs: 3600,
        }
    }

    #[tokio::test]
    async fn upsert_records_expiry_and_connected_at() {
        let store = test_store().await;
        let before = Utc::now().timestamp_millis();

        let record = store.upsert(google("u1", "tok")).await.unwrap();

        assert_eq!(record.user_id, "u1");
        assert_eq!(record.provider, CalendarProvider::Google);
        assert_eq!(record.access_token.expose_secret(), "tok");
        assert!(record.expires_at >= before + 3_600_000);
        assert!(record.expires_at <= Utc::now().timestamp_millis() + 3_600_000);
        // e.g. 2026-01-02T03:04:05.678Z
        assert_eq!(record.connected_at.len(), 24);
        assert!(record.connected_at.ends_with('Z'));
    }

    #[tokio::test]
    async fn second_store_overwrites_same_provider() {
        let store = test_store().await;

        let first = store.upsert(google("u1", "old")).await.unwrap();
        let second = store.upsert(google("u1", "new")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token.expose_secret(), "new");
        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tokens_are_scoped_per_user() {
        let store = test_store().await;
        store.upsert(google("u1", "a")).await.unwrap();
        store.upsert(google("u2", "b")).await.unwrap();
        store
            .upsert(NewToken {
                provider: CalendarProvider::Microsoft,
                scope: "Calendars.Read",
                ..google("u1", "c")
            })
            .await
            .unwrap();

        let u1: Vec<_> = store
            .list_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.provider)
            .collect();
        assert_eq!(u1, vec![CalendarProvider::Google, CalendarProvider::Microsoft]);
        assert_eq!(store.list_for_user("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_token_existed() {
        let store = test_store().await;
        store.upsert(google("u1", "a")).await.unwrap();

        assert!(store.delete("u1", CalendarProvider::Google).await.unwrap());
        assert!(!store.delete("u1", CalendarProvider::Google).await.unwrap());
        assert!(
            store
                .get("u1", CalendarProvider::Google)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn summary_omits_token() {
        let store = test_store().await;
        let record = store.upsert(google("u1", "secret-token")).await.unwrap();
        let json = serde_json::to_string(&record.summary()).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("\"provider\":\"google\""));
    }
}
