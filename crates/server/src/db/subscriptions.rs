use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use super::{now, Database, Role, SubscriptionPlan};

/// Subscription summary shown on a user's public profile.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub plan_name: Option<String>,
    pub plan_price: Option<f64>,
    pub plan_currency: Option<String>,
}

impl Database {
    pub async fn list_subscription_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT id, name, description, price, currency, duration_days, is_active, created_at, updated_at FROM subscription_plans ORDER BY price ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(plans)
    }

    pub async fn get_subscription_plan(&self, id: &str) -> Result<Option<SubscriptionPlan>> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT id, name, description, price, currency, duration_days, is_active, created_at, updated_at FROM subscription_plans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(plan)
    }

    /// Insert the default plans when the table is empty.
    pub async fn seed_subscription_plans(&self) -> Result<()> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscription_plans")
            .fetch_one(self.pool())
            .await?;
        if count.0 > 0 {
            return Ok(());
        }

        let plans = [
            (
                "Agency Monthly",
                "Agency account with up to 1000 active listings, billed monthly.",
                49.99,
                30i64,
            ),
            (
                "Agency Yearly",
                "Agency account with up to 1000 active listings, billed yearly.",
                499.99,
                365i64,
            ),
        ];

        for (name, description, price, duration_days) in plans {
            let timestamp = now();
            sqlx::query(
                r#"
                INSERT INTO subscription_plans (id, name, description, price, currency, duration_days, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, 'USD', ?, 1, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(description)
            .bind(price)
            .bind(duration_days)
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(self.pool())
            .await?;
        }
        tracing::info!("Seeded default subscription plans");
        Ok(())
    }

    /// Record a paid subscription and upgrade the user to the agency role
    /// in one transaction. A repeat purchase replaces the user's current
    /// subscription row.
    pub async fn activate_subscription(
        &self,
        user_id: &str,
        plan_id: &str,
        paypal_order_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let timestamp = now();
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, subscription_plan_id, paypal_order_id, status, start_date, end_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                subscription_plan_id = excluded.subscription_plan_id,
                paypal_order_id = excluded.paypal_order_id,
                status = excluded.status,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(plan_id)
        .bind(paypal_order_id)
        .bind(start_date)
        .bind(end_date)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(Role::Agency)
            .bind(&timestamp)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The user's subscription joined with its plan, when still running.
    pub async fn get_current_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionSummary>> {
        let summary = sqlx::query_as::<_, SubscriptionSummary>(
            r#"
            SELECT
                s.status AS status,
                s.start_date AS start_date,
                s.end_date AS end_date,
                p.name AS plan_name,
                p.price AS plan_price,
                p.currency AS plan_currency
            FROM subscriptions s
            LEFT JOIN subscription_plans p ON s.subscription_plan_id = p.id
            WHERE s.user_id = ? AND s.end_date >= ?
            "#,
        )
        .bind(user_id)
        .bind(now())
        .fetch_optional(self.pool())
        .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::super::users::sample_user;
    use super::super::{test_db, Role};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_seed_plans_once() {
        let db = test_db().await;
        db.seed_subscription_plans().await.unwrap();
        db.seed_subscription_plans().await.unwrap();

        let plans = db.list_subscription_plans().await.unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans[0].price <= plans[1].price);
    }

    #[tokio::test]
    async fn test_activate_subscription_upgrades_role() {
        let db = test_db().await;
        db.seed_subscription_plans().await.unwrap();
        let user = sample_user(Role::PrivateSeller);
        db.create_user(&user).await.unwrap();

        let plan = &db.list_subscription_plans().await.unwrap()[0];
        let start = Utc::now();
        let end = start + Duration::days(plan.duration_days);
        db.activate_subscription(
            &user.id,
            &plan.id,
            "ORDER-123",
            &start.to_rfc3339(),
            &end.to_rfc3339(),
        )
        .await
        .unwrap();

        let upgraded = db.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(upgraded.role, Role::Agency);

        let current = db.get_current_subscription(&user.id).await.unwrap().unwrap();
        assert_eq!(current.status, "active");
        assert_eq!(current.plan_name.as_deref(), Some(plan.name.as_str()));
    }

    #[tokio::test]
    async fn test_expired_subscription_not_current() {
        let db = test_db().await;
        db.seed_subscription_plans().await.unwrap();
        let user = sample_user(Role::PrivateSeller);
        db.create_user(&user).await.unwrap();

        let plan = &db.list_subscription_plans().await.unwrap()[0];
        let start = Utc::now() - Duration::days(60);
        let end = start + Duration::days(30);
        db.activate_subscription(
            &user.id,
            &plan.id,
            "ORDER-456",
            &start.to_rfc3339(),
            &end.to_rfc3339(),
        )
        .await
        .unwrap();

        assert!(db
            .get_current_subscription(&user.id)
            .await
            .unwrap()
            .is_none());
    }
}
