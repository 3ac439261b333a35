use anyhow::Result;

use super::{now, Database, Role, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_email_verified, \
     paypal_credentials, listing_limit, avatar_url, bio, created_at, updated_at";

impl Database {
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_email_verified,
                               paypal_credentials, listing_limit, avatar_url, bio,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_email_verified)
        .bind(&user.paypal_credentials)
        .bind(user.listing_limit)
        .bind(&user.avatar_url)
        .bind(&user.bio)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    /// Every user except the given one (admin listing).
    pub async fn list_users_except(&self, id: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id != ? ORDER BY created_at ASC"
        ))
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(users)
    }

    /// True when the email already belongs to a different account.
    pub async fn email_in_use_by_other(&self, email: &str, user_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Partial profile update. None fields are left untouched; returns the
    /// refreshed row.
    pub async fn update_user_profile(
        &self,
        id: &str,
        username: Option<&str>,
        avatar_url: Option<&str>,
        bio: Option<&str>,
        paypal_credentials: Option<&str>,
    ) -> Result<Option<User>> {
        sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                avatar_url = COALESCE(?, avatar_url),
                bio = COALESCE(?, bio),
                paypal_credentials = COALESCE(?, paypal_credentials),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(username)
        .bind(avatar_url)
        .bind(bio)
        .bind(paypal_credentials)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_user_by_id(id).await
    }

    /// Admin-side update: may additionally change email, role and
    /// listing limit.
    #[allow(clippy::too_many_arguments)]
    pub async fn admin_update_user(
        &self,
        id: &str,
        username: Option<&str>,
        avatar_url: Option<&str>,
        bio: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
        listing_limit: Option<i64>,
    ) -> Result<Option<User>> {
        sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                avatar_url = COALESCE(?, avatar_url),
                bio = COALESCE(?, bio),
                email = COALESCE(?, email),
                role = COALESCE(?, role),
                listing_limit = COALESCE(?, listing_limit),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(username)
        .bind(avatar_url)
        .bind(bio)
        .bind(email)
        .bind(role)
        .bind(listing_limit)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_user_by_id(id).await
    }

    pub async fn set_email_verified(&self, user_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET is_email_verified = 1, updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_user_email(&self, user_id: &str, email: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
            .bind(email)
            .bind(now())
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_user_password(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(now())
                .bind(user_id)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // OAuth provider credentials

    /// Which account a Google identity is linked to, if any.
    pub async fn get_google_credential_owner(&self, google_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM google_oauth_credentials WHERE google_id = ?")
                .bind(google_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    pub async fn upsert_google_credentials(
        &self,
        user_id: &str,
        google_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expiry: Option<&str>,
    ) -> Result<()> {
        let timestamp = now();
        sqlx::query(
            r#"
            INSERT INTO google_oauth_credentials (id, user_id, google_id, access_token, refresh_token, token_expiry, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                google_id = excluded.google_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expiry = excluded.token_expiry,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(google_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expiry)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_facebook_credential_owner(&self, facebook_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM facebook_oauth_credentials WHERE facebook_id = ?")
                .bind(facebook_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    pub async fn upsert_facebook_credentials(
        &self,
        user_id: &str,
        facebook_id: &str,
        access_token: &str,
        token_expiry: Option<&str>,
    ) -> Result<()> {
        let timestamp = now();
        sqlx::query(
            r#"
            INSERT INTO facebook_oauth_credentials (id, user_id, facebook_id, access_token, token_expiry, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                facebook_id = excluded.facebook_id,
                access_token = excluded.access_token,
                token_expiry = excluded.token_expiry,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(facebook_id)
        .bind(access_token)
        .bind(token_expiry)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_user(role: Role) -> User {
    let id = uuid::Uuid::new_v4().to_string();
    User {
        username: format!("user-{id}"),
        email: format!("{id}@example.com"),
        password_hash: Some("hash".to_string()),
        role,
        is_email_verified: true,
        paypal_credentials: None,
        listing_limit: role.default_listing_limit(),
        avatar_url: "https://example.com/avatar.png".to_string(),
        bio: "This section is yet empty.".to_string(),
        created_at: now(),
        updated_at: now(),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_db;
    use super::*;

    #[tokio::test]
    async fn test_user_crud() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let fetched = db.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email, user.email);
        assert_eq!(fetched.role, Role::RenterBuyer);
        assert_eq!(fetched.listing_limit, 5);

        let by_email = db.get_user_by_email(&user.email).await.unwrap();
        assert!(by_email.is_some());

        assert!(db.delete_user(&user.id).await.unwrap());
        assert!(db.get_user_by_id(&user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_in_use_by_other() {
        let db = test_db().await;
        let a = sample_user(Role::RenterBuyer);
        let b = sample_user(Role::Agency);
        db.create_user(&a).await.unwrap();
        db.create_user(&b).await.unwrap();

        assert!(db.email_in_use_by_other(&a.email, &b.id).await.unwrap());
        assert!(!db.email_in_use_by_other(&a.email, &a.id).await.unwrap());
        assert!(!db
            .email_in_use_by_other("nobody@example.com", &a.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_partial_profile_update_leaves_other_fields() {
        let db = test_db().await;
        let user = sample_user(Role::PrivateSeller);
        db.create_user(&user).await.unwrap();

        let updated = db
            .update_user_profile(&user.id, Some("renamed"), None, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.bio, user.bio);
        assert_eq!(updated.avatar_url, user.avatar_url);
    }

    #[tokio::test]
    async fn test_admin_role_change() {
        let db = test_db().await;
        let user = sample_user(Role::PrivateSeller);
        db.create_user(&user).await.unwrap();

        let updated = db
            .admin_update_user(&user.id, None, None, None, None, Some(Role::Moderator), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Moderator);
        assert_eq!(updated.username, user.username);
    }
}
