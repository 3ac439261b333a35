use anyhow::Result;
use serde::Serialize;

use super::Database;

/// Regions recognized by the statistics endpoints. Listings are matched
/// to a region by address substring.
pub const REGIONS: &[&str] = &[
    "Вінницька",
    "Волинська",
    "Дніпропетровська",
    "Донецька",
    "Житомирська",
    "Закарпатська",
    "Запорізька",
    "Івано-Франківська",
    "Київська",
    "Кіровоградська",
    "Луганська",
    "Львівська",
    "Миколаївська",
    "Одеська",
    "Полтавська",
    "Рівненська",
    "Сумська",
    "Тернопільська",
    "Харківська",
    "Херсонська",
    "Хмельницька",
    "Черкаська",
    "Чернівецька",
    "Чернігівська",
];

#[derive(Debug, Clone, Serialize)]
pub struct RegionCount {
    pub region: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionPriceStats {
    pub region: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionPriceGrowth {
    pub region: String,
    pub previous_avg: Option<f64>,
    pub current_avg: Option<f64>,
    pub growth_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesTotals {
    pub total_sales: i64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopViewedProperty {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub address: String,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserStats {
    pub new_buyers: i64,
    pub new_sellers: i64,
    pub new_agencies: i64,
}

impl Database {
    pub async fn listings_by_region(&self, start: &str, end: &str) -> Result<Vec<RegionCount>> {
        let mut results = Vec::with_capacity(REGIONS.len());
        for region in REGIONS {
            let row: (i64,) = sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM properties
                WHERE created_at BETWEEN ? AND ?
                AND address LIKE '%' || ? || '%'
                "#,
            )
            .bind(start)
            .bind(end)
            .bind(region)
            .fetch_one(self.pool())
            .await?;
            results.push(RegionCount {
                region: region.to_string(),
                total: row.0,
            });
        }
        Ok(results)
    }

    pub async fn price_stats_by_region(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<RegionPriceStats>> {
        let mut results = Vec::with_capacity(REGIONS.len());
        for region in REGIONS {
            let row: (Option<f64>, Option<f64>, Option<f64>) = sqlx::query_as(
                r#"
                SELECT MIN(price), MAX(price), AVG(price) FROM properties
                WHERE created_at BETWEEN ? AND ?
                AND address LIKE '%' || ? || '%'
                "#,
            )
            .bind(start)
            .bind(end)
            .bind(region)
            .fetch_one(self.pool())
            .await?;
            results.push(RegionPriceStats {
                region: region.to_string(),
                min: row.0,
                max: row.1,
                avg: row.2,
            });
        }
        Ok(results)
    }

    pub async fn top_regions(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<RegionCount>> {
        let mut counts = self.listings_by_region(start, end).await?;
        counts.sort_by(|a, b| b.total.cmp(&a.total));
        counts.truncate(limit);
        Ok(counts)
    }

    pub async fn average_price_growth(
        &self,
        previous_start: &str,
        previous_end: &str,
        current_start: &str,
        current_end: &str,
    ) -> Result<Vec<RegionPriceGrowth>> {
        let mut results = Vec::with_capacity(REGIONS.len());
        for region in REGIONS {
            let previous: (Option<f64>,) = sqlx::query_as(
                r#"
                SELECT AVG(price) FROM properties
                WHERE created_at BETWEEN ? AND ?
                AND address LIKE '%' || ? || '%'
                "#,
            )
            .bind(previous_start)
            .bind(previous_end)
            .bind(region)
            .fetch_one(self.pool())
            .await?;
            let current: (Option<f64>,) = sqlx::query_as(
                r#"
                SELECT AVG(price) FROM properties
                WHERE created_at BETWEEN ? AND ?
                AND address LIKE '%' || ? || '%'
                "#,
            )
            .bind(current_start)
            .bind(current_end)
            .bind(region)
            .fetch_one(self.pool())
            .await?;

            let growth_percent = match (previous.0, current.0) {
                (Some(prev), Some(curr)) if prev != 0.0 => {
                    Some((curr - prev) / prev * 100.0)
                }
                _ => None,
            };

            results.push(RegionPriceGrowth {
                region: region.to_string(),
                previous_avg: previous.0,
                current_avg: current.0,
                growth_percent,
            });
        }
        Ok(results)
    }

    pub async fn property_view_count(
        &self,
        property_id: &str,
        start: &str,
        end: &str,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM property_views WHERE property_id = ? AND viewed_at BETWEEN ? AND ?",
        )
        .bind(property_id)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }

    /// Count and total value of listings marked sold or rented in the
    /// period (by their last update).
    pub async fn total_sales(&self, start: &str, end: &str) -> Result<SalesTotals> {
        let row: (i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(price) FROM properties
            WHERE updated_at BETWEEN ? AND ?
            AND status IN ('sold', 'rented')
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool())
        .await?;
        Ok(SalesTotals {
            total_sales: row.0,
            total_amount: row.1.unwrap_or(0.0),
        })
    }

    pub async fn top_viewed_properties(
        &self,
        start: &str,
        end: &str,
        limit: i64,
    ) -> Result<Vec<TopViewedProperty>> {
        let rows = sqlx::query_as::<_, TopViewedProperty>(
            r#"
            SELECT
                p.id,
                p.title,
                p.price,
                p.address,
                COUNT(pv.id) AS view_count
            FROM properties p
            LEFT JOIN property_views pv
                ON p.id = pv.property_id
                AND pv.viewed_at BETWEEN ? AND ?
            GROUP BY p.id, p.title, p.price, p.address
            ORDER BY view_count DESC
            LIMIT ?
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn new_users_stats(&self, start: &str, end: &str) -> Result<NewUserStats> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(CASE WHEN role = 'renter_buyer' THEN 1 END),
                COUNT(CASE WHEN role = 'private_seller' THEN 1 END),
                COUNT(CASE WHEN role = 'agency' THEN 1 END)
            FROM users
            WHERE created_at BETWEEN ? AND ?
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool())
        .await?;
        Ok(NewUserStats {
            new_buyers: row.0,
            new_sellers: row.1,
            new_agencies: row.2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::properties::sample_property;
    use super::super::users::sample_user;
    use super::super::{test_db, PropertyStatus, Role};
    use super::*;
    use chrono::{Duration, Utc};

    fn range() -> (String, String) {
        (
            (Utc::now() - Duration::days(1)).to_rfc3339(),
            (Utc::now() + Duration::days(1)).to_rfc3339(),
        )
    }

    #[tokio::test]
    async fn test_listings_and_top_regions() {
        let db = test_db().await;
        let owner = sample_user(Role::Agency);
        db.create_user(&owner).await.unwrap();

        // Two listings in Київська, one in Львівська
        for address in ["вул. Хрещатик, Київська", "пр. Перемоги, Київська", "Львівська обл."] {
            let mut property = sample_property(&owner.id);
            property.address = address.to_string();
            db.insert_property(&property, &[]).await.unwrap();
        }

        let (start, end) = range();
        let counts = db.listings_by_region(&start, &end).await.unwrap();
        let kyiv = counts.iter().find(|c| c.region == "Київська").unwrap();
        assert_eq!(kyiv.total, 2);

        let top = db.top_regions(&start, &end, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].region, "Київська");
    }

    #[tokio::test]
    async fn test_total_sales_counts_sold_and_rented() {
        let db = test_db().await;
        let owner = sample_user(Role::Agency);
        db.create_user(&owner).await.unwrap();

        let mut sold = sample_property(&owner.id);
        sold.status = PropertyStatus::Sold;
        sold.price = 100.0;
        db.insert_property(&sold, &[]).await.unwrap();

        let mut rented = sample_property(&owner.id);
        rented.status = PropertyStatus::Rented;
        rented.price = 50.0;
        db.insert_property(&rented, &[]).await.unwrap();

        let active = sample_property(&owner.id);
        db.insert_property(&active, &[]).await.unwrap();

        let (start, end) = range();
        let totals = db.total_sales(&start, &end).await.unwrap();
        assert_eq!(totals.total_sales, 2);
        assert_eq!(totals.total_amount, 150.0);
    }

    #[tokio::test]
    async fn test_new_users_stats_by_role() {
        let db = test_db().await;
        db.create_user(&sample_user(Role::RenterBuyer)).await.unwrap();
        db.create_user(&sample_user(Role::RenterBuyer)).await.unwrap();
        db.create_user(&sample_user(Role::Agency)).await.unwrap();
        db.create_user(&sample_user(Role::Moderator)).await.unwrap();

        let (start, end) = range();
        let stats = db.new_users_stats(&start, &end).await.unwrap();
        assert_eq!(stats.new_buyers, 2);
        assert_eq!(stats.new_sellers, 0);
        assert_eq!(stats.new_agencies, 1);
    }

    #[tokio::test]
    async fn test_property_view_count_in_range() {
        let db = test_db().await;
        let owner = sample_user(Role::Agency);
        let viewer = sample_user(Role::RenterBuyer);
        db.create_user(&owner).await.unwrap();
        db.create_user(&viewer).await.unwrap();
        let property = sample_property(&owner.id);
        db.insert_property(&property, &[]).await.unwrap();
        db.record_property_view(&viewer.id, &property.id)
            .await
            .unwrap();

        let (start, end) = range();
        assert_eq!(
            db.property_view_count(&property.id, &start, &end)
                .await
                .unwrap(),
            1
        );

        let past_end = (Utc::now() - Duration::days(2)).to_rfc3339();
        assert_eq!(
            db.property_view_count(&property.id, &start, &past_end)
                .await
                .unwrap(),
            0
        );
    }
}
