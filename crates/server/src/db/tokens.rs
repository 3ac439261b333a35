use anyhow::Result;
use uuid::Uuid;

use super::{now, ChangeRequest, ChangeRequestKind, Database};

impl Database {
    // Refresh tokens

    pub async fn create_refresh_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Revokes the token and returns its (user_id, expires_at) in one
    /// statement, so a token can never be redeemed twice.
    pub async fn consume_refresh_token(&self, token: &str) -> Result<Option<(String, String)>> {
        let row = sqlx::query_as::<_, (String, String)>(
            r#"
            UPDATE refresh_tokens SET revoked = 1
            WHERE token = ? AND revoked = 0
            RETURNING user_id, expires_at
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    // Email verification tokens

    pub async fn create_email_verification_token(
        &self,
        user_id: &str,
        token: &str,
        expires_at: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO email_verification_tokens (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Deletes the token row and returns (user_id, expires_at) if it
    /// existed. The caller decides what an expired row means.
    pub async fn consume_email_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<(String, String)>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "DELETE FROM email_verification_tokens WHERE token = ? RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    // Change requests (email/password change and password reset)

    pub async fn create_change_request(
        &self,
        user_id: &str,
        kind: ChangeRequestKind,
        new_value: &str,
        token: &str,
        expires_at: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO change_requests (id, user_id, kind, new_value, token, expires_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(kind)
        .bind(new_value)
        .bind(token)
        .bind(expires_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Atomically removes the request row keyed by token. A second
    /// confirmation attempt on the same token finds nothing.
    pub async fn consume_change_request(&self, token: &str) -> Result<Option<ChangeRequest>> {
        let request = sqlx::query_as::<_, ChangeRequest>(
            r#"
            DELETE FROM change_requests WHERE token = ?
            RETURNING id, user_id, kind, new_value, token, expires_at
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::super::users::sample_user;
    use super::super::{test_db, Role};
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_refresh_token_single_use() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let expires = (Utc::now() + Duration::days(7)).to_rfc3339();
        db.create_refresh_token(&user.id, "tok-1", &expires)
            .await
            .unwrap();

        let first = db.consume_refresh_token("tok-1").await.unwrap();
        assert_eq!(first.unwrap().0, user.id);

        // Already revoked: second redemption fails
        assert!(db.consume_refresh_token("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_request_consumed_exactly_once() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let expires = (Utc::now() + Duration::hours(24)).to_rfc3339();
        db.create_change_request(
            &user.id,
            ChangeRequestKind::Email,
            "new@example.com",
            "change-tok",
            &expires,
        )
        .await
        .unwrap();

        let request = db
            .consume_change_request("change-tok")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.kind, ChangeRequestKind::Email);
        assert_eq!(request.new_value, "new@example.com");

        // The row is gone: the duplicate confirm sees nothing
        assert!(db
            .consume_change_request("change-tok")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_change_request_is_consumed_once() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let expired = (Utc::now() - Duration::hours(1)).to_rfc3339();
        db.create_change_request(
            &user.id,
            ChangeRequestKind::Password,
            "hash",
            "stale-tok",
            &expired,
        )
        .await
        .unwrap();

        // The row comes back once; the caller rejects it by its expiry
        let request = db
            .consume_change_request("stale-tok")
            .await
            .unwrap()
            .unwrap();
        let expires = chrono::DateTime::parse_from_rfc3339(&request.expires_at).unwrap();
        assert!(expires < Utc::now());

        // Either way the token is spent
        assert!(db
            .consume_change_request("stale-tok")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_tokens_return_none() {
        let db = test_db().await;
        assert!(db.consume_refresh_token("missing").await.unwrap().is_none());
        assert!(db
            .consume_email_verification_token("missing")
            .await
            .unwrap()
            .is_none());
        assert!(db.consume_change_request("missing").await.unwrap().is_none());
    }
}
