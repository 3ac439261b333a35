use anyhow::Result;
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    now, Database, PricingHistory, Property, PropertyImage, PropertyImageInput, PropertyUpdate,
    PropertyView, PropertyWithRelations, WishlistItem,
};

const PROPERTY_COLUMNS: &str = "id, owner_id, is_verified, title, description, property_type, \
     transaction_type, price, currency, size, rooms, address, status, document_url, \
     verification_comments, created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, property_id, image_url, is_primary, created_at";
const VIEW_COLUMNS: &str = "id, property_id, user_id, viewed_at";
const PRICING_COLUMNS: &str = "id, property_id, price, currency, effective_date";

impl Database {
    /// Insert a property plus its images and the opening pricing-history
    /// row in one transaction.
    pub async fn insert_property(
        &self,
        property: &Property,
        images: &[PropertyImageInput],
    ) -> Result<PropertyWithRelations> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO properties (id, owner_id, is_verified, title, description, property_type,
                                    transaction_type, price, currency, size, rooms, address,
                                    status, document_url, verification_comments, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&property.id)
        .bind(&property.owner_id)
        .bind(property.is_verified)
        .bind(&property.title)
        .bind(&property.description)
        .bind(property.property_type)
        .bind(property.transaction_type)
        .bind(property.price)
        .bind(&property.currency)
        .bind(property.size)
        .bind(property.rooms)
        .bind(&property.address)
        .bind(property.status)
        .bind(&property.document_url)
        .bind(&property.verification_comments)
        .bind(&property.created_at)
        .bind(&property.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut inserted_images = Vec::with_capacity(images.len());
        for input in images {
            let image = PropertyImage {
                id: Uuid::new_v4().to_string(),
                property_id: property.id.clone(),
                image_url: input.image_url.clone(),
                is_primary: input.is_primary,
                created_at: now(),
            };
            sqlx::query(
                "INSERT INTO property_images (id, property_id, image_url, is_primary, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&image.id)
            .bind(&image.property_id)
            .bind(&image.image_url)
            .bind(image.is_primary)
            .bind(&image.created_at)
            .execute(&mut *tx)
            .await?;
            inserted_images.push(image);
        }

        let pricing = PricingHistory {
            id: Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            price: property.price,
            currency: property.currency.clone(),
            effective_date: now(),
        };
        sqlx::query(
            "INSERT INTO pricing_history (id, property_id, price, currency, effective_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&pricing.id)
        .bind(&pricing.property_id)
        .bind(pricing.price)
        .bind(&pricing.currency)
        .bind(&pricing.effective_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PropertyWithRelations {
            property: property.clone(),
            images: inserted_images,
            views: Vec::new(),
            pricing_history: vec![pricing],
        })
    }

    pub async fn list_properties(&self) -> Result<Vec<PropertyWithRelations>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        if properties.is_empty() {
            return Ok(Vec::new());
        }

        let images = sqlx::query_as::<_, PropertyImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM property_images"
        ))
        .fetch_all(self.pool())
        .await?;
        let views =
            sqlx::query_as::<_, PropertyView>(&format!("SELECT {VIEW_COLUMNS} FROM property_views"))
                .fetch_all(self.pool())
                .await?;
        let pricing = sqlx::query_as::<_, PricingHistory>(&format!(
            "SELECT {PRICING_COLUMNS} FROM pricing_history"
        ))
        .fetch_all(self.pool())
        .await?;

        let mut images_by_property: HashMap<String, Vec<PropertyImage>> = HashMap::new();
        for image in images {
            images_by_property
                .entry(image.property_id.clone())
                .or_default()
                .push(image);
        }
        let mut views_by_property: HashMap<String, Vec<PropertyView>> = HashMap::new();
        for view in views {
            views_by_property
                .entry(view.property_id.clone())
                .or_default()
                .push(view);
        }
        let mut pricing_by_property: HashMap<String, Vec<PricingHistory>> = HashMap::new();
        for entry in pricing {
            pricing_by_property
                .entry(entry.property_id.clone())
                .or_default()
                .push(entry);
        }

        Ok(properties
            .into_iter()
            .map(|property| {
                let id = property.id.clone();
                PropertyWithRelations {
                    property,
                    images: images_by_property.remove(&id).unwrap_or_default(),
                    views: views_by_property.remove(&id).unwrap_or_default(),
                    pricing_history: pricing_by_property.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub async fn get_property_row(&self, id: &str) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(property)
    }

    pub async fn get_property(&self, id: &str) -> Result<Option<PropertyWithRelations>> {
        let Some(property) = self.get_property_row(id).await? else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, PropertyImage>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM property_images WHERE property_id = ?"
        ))
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        let views = sqlx::query_as::<_, PropertyView>(&format!(
            "SELECT {VIEW_COLUMNS} FROM property_views WHERE property_id = ?"
        ))
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        let pricing_history = sqlx::query_as::<_, PricingHistory>(&format!(
            "SELECT {PRICING_COLUMNS} FROM pricing_history WHERE property_id = ? ORDER BY effective_date ASC"
        ))
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(PropertyWithRelations {
            property,
            images,
            views,
            pricing_history,
        }))
    }

    /// Verified listings of one owner, with images (public profile view).
    pub async fn list_verified_properties_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<PropertyWithRelations>> {
        let properties = sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE owner_id = ? AND is_verified = 1"
        ))
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;

        let mut result = Vec::with_capacity(properties.len());
        for property in properties {
            let images = sqlx::query_as::<_, PropertyImage>(&format!(
                "SELECT {IMAGE_COLUMNS} FROM property_images WHERE property_id = ?"
            ))
            .bind(&property.id)
            .fetch_all(self.pool())
            .await?;
            result.push(PropertyWithRelations {
                property,
                images,
                views: Vec::new(),
                pricing_history: Vec::new(),
            });
        }
        Ok(result)
    }

    pub async fn count_properties_for_owner(&self, owner_id: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM properties WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    /// Partial update of property columns. Absent fields keep their value.
    pub async fn update_property_fields(
        &self,
        id: &str,
        update: &PropertyUpdate,
    ) -> Result<Option<Property>> {
        sqlx::query(
            r#"
            UPDATE properties SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                property_type = COALESCE(?, property_type),
                transaction_type = COALESCE(?, transaction_type),
                price = COALESCE(?, price),
                currency = COALESCE(?, currency),
                size = COALESCE(?, size),
                rooms = COALESCE(?, rooms),
                address = COALESCE(?, address),
                status = COALESCE(?, status),
                document_url = COALESCE(?, document_url),
                verification_comments = COALESCE(?, verification_comments),
                is_verified = COALESCE(?, is_verified),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.property_type)
        .bind(update.transaction_type)
        .bind(update.price)
        .bind(&update.currency)
        .bind(update.size)
        .bind(update.rooms)
        .bind(&update.address)
        .bind(update.status)
        .bind(&update.document_url)
        .bind(&update.verification_comments)
        .bind(update.is_verified)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_property_row(id).await
    }

    /// Drop and re-insert the property's image set.
    pub async fn replace_property_images(
        &self,
        property_id: &str,
        images: &[PropertyImageInput],
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM property_images WHERE property_id = ?")
            .bind(property_id)
            .execute(&mut *tx)
            .await?;

        for input in images {
            sqlx::query(
                "INSERT INTO property_images (id, property_id, image_url, is_primary, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(property_id)
            .bind(&input.image_url)
            .bind(input.is_primary)
            .bind(now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn append_pricing_history(
        &self,
        property_id: &str,
        price: f64,
        currency: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO pricing_history (id, property_id, price, currency, effective_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(property_id)
        .bind(price)
        .bind(currency)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_property(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_property_verified(
        &self,
        id: &str,
        is_verified: bool,
        comments: Option<&str>,
    ) -> Result<Option<Property>> {
        sqlx::query(
            r#"
            UPDATE properties SET
                is_verified = ?,
                verification_comments = COALESCE(?, verification_comments),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(is_verified)
        .bind(comments)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_property_row(id).await
    }

    // Property views

    /// Record a view, updating the timestamp in place when the user has
    /// seen the property before.
    pub async fn record_property_view(&self, user_id: &str, property_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO property_views (id, property_id, user_id, viewed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, property_id) DO UPDATE SET viewed_at = excluded.viewed_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(property_id)
        .bind(user_id)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // Wishlist

    pub async fn get_wishlist(&self, user_id: &str) -> Result<Vec<WishlistItem>> {
        let items = sqlx::query_as::<_, WishlistItem>(
            "SELECT id, user_id, property_id, created_at FROM wishlist WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(items)
    }

    pub async fn is_in_wishlist(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM wishlist WHERE user_id = ? AND property_id = ?")
                .bind(user_id)
                .bind(property_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn add_to_wishlist(&self, user_id: &str, property_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO wishlist (id, user_id, property_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(property_id)
        .bind(now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn remove_from_wishlist(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM wishlist WHERE user_id = ? AND property_id = ?")
            .bind(user_id)
            .bind(property_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Filter aggregates over active listings

    pub async fn price_range(&self) -> Result<Option<(f64, f64)>> {
        let row: (Option<f64>, Option<f64>) = sqlx::query_as(
            "SELECT MIN(price), MAX(price) FROM properties WHERE status = 'active'",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(match row {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    pub async fn area_range(&self) -> Result<Option<(f64, f64)>> {
        let row: (Option<f64>, Option<f64>) = sqlx::query_as(
            "SELECT MIN(size), MAX(size) FROM properties WHERE status = 'active' AND size IS NOT NULL",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(match row {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    pub async fn distinct_rooms(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT rooms FROM properties WHERE status = 'active' AND rooms IS NOT NULL ORDER BY rooms ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(rooms,)| rooms).collect())
    }

    pub async fn distinct_transaction_types(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT transaction_type FROM properties WHERE status = 'active'",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    pub async fn distinct_property_types(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT property_type FROM properties WHERE status = 'active'",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }
}

#[cfg(test)]
pub(crate) fn sample_property(owner_id: &str) -> Property {
    use super::{PropertyStatus, PropertyType, TransactionType};

    Property {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        is_verified: false,
        title: "Modern Downtown Apartment".to_string(),
        description: Some("Bright two-bedroom close to transit.".to_string()),
        property_type: PropertyType::Apartment,
        transaction_type: TransactionType::Sale,
        price: 280000.0,
        currency: "USD".to_string(),
        size: Some(85.0),
        rooms: Some(2),
        address: "Main Street 1, Київська".to_string(),
        status: PropertyStatus::Active,
        document_url: None,
        verification_comments: None,
        created_at: now(),
        updated_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::users::sample_user;
    use super::super::{test_db, PropertyStatus, PropertyUpdate, Role};
    use super::*;

    #[tokio::test]
    async fn test_insert_property_with_relations() {
        let db = test_db().await;
        let owner = sample_user(Role::PrivateSeller);
        db.create_user(&owner).await.unwrap();

        let property = sample_property(&owner.id);
        let images = vec![PropertyImageInput {
            image_url: "https://example.com/1.jpg".to_string(),
            is_primary: true,
        }];
        let created = db.insert_property(&property, &images).await.unwrap();

        assert_eq!(created.images.len(), 1);
        assert_eq!(created.pricing_history.len(), 1);
        assert_eq!(created.pricing_history[0].price, 280000.0);

        let fetched = db.get_property(&property.id).await.unwrap().unwrap();
        assert_eq!(fetched.property.title, property.title);
        assert_eq!(fetched.images.len(), 1);
    }

    #[tokio::test]
    async fn test_price_update_appends_pricing_history() {
        let db = test_db().await;
        let owner = sample_user(Role::PrivateSeller);
        db.create_user(&owner).await.unwrap();
        let property = sample_property(&owner.id);
        db.insert_property(&property, &[]).await.unwrap();

        let update = PropertyUpdate {
            price: Some(295000.0),
            ..Default::default()
        };
        let updated = db
            .update_property_fields(&property.id, &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, 295000.0);

        db.append_pricing_history(&property.id, updated.price, &updated.currency)
            .await
            .unwrap();
        let fetched = db.get_property(&property.id).await.unwrap().unwrap();
        assert_eq!(fetched.pricing_history.len(), 2);
    }

    #[tokio::test]
    async fn test_view_upsert_keeps_single_row() {
        let db = test_db().await;
        let owner = sample_user(Role::PrivateSeller);
        let viewer = sample_user(Role::RenterBuyer);
        db.create_user(&owner).await.unwrap();
        db.create_user(&viewer).await.unwrap();
        let property = sample_property(&owner.id);
        db.insert_property(&property, &[]).await.unwrap();

        db.record_property_view(&viewer.id, &property.id)
            .await
            .unwrap();
        db.record_property_view(&viewer.id, &property.id)
            .await
            .unwrap();

        let fetched = db.get_property(&property.id).await.unwrap().unwrap();
        assert_eq!(fetched.views.len(), 1);
    }

    #[tokio::test]
    async fn test_wishlist_round_trip() {
        let db = test_db().await;
        let owner = sample_user(Role::PrivateSeller);
        let buyer = sample_user(Role::RenterBuyer);
        db.create_user(&owner).await.unwrap();
        db.create_user(&buyer).await.unwrap();
        let property = sample_property(&owner.id);
        db.insert_property(&property, &[]).await.unwrap();

        assert!(!db.is_in_wishlist(&buyer.id, &property.id).await.unwrap());
        db.add_to_wishlist(&buyer.id, &property.id).await.unwrap();
        assert!(db.is_in_wishlist(&buyer.id, &property.id).await.unwrap());
        assert_eq!(db.get_wishlist(&buyer.id).await.unwrap().len(), 1);

        assert!(db
            .remove_from_wishlist(&buyer.id, &property.id)
            .await
            .unwrap());
        assert!(db.get_wishlist(&buyer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_over_active_listings_only() {
        let db = test_db().await;
        let owner = sample_user(Role::Agency);
        db.create_user(&owner).await.unwrap();

        assert!(db.price_range().await.unwrap().is_none());

        let mut cheap = sample_property(&owner.id);
        cheap.price = 100000.0;
        db.insert_property(&cheap, &[]).await.unwrap();

        let mut expensive = sample_property(&owner.id);
        expensive.price = 500000.0;
        expensive.rooms = Some(5);
        db.insert_property(&expensive, &[]).await.unwrap();

        let mut sold = sample_property(&owner.id);
        sold.price = 900000.0;
        sold.status = PropertyStatus::Sold;
        db.insert_property(&sold, &[]).await.unwrap();

        assert_eq!(db.price_range().await.unwrap(), Some((100000.0, 500000.0)));
        assert_eq!(db.distinct_rooms().await.unwrap(), vec![2, 5]);
        assert_eq!(db.distinct_property_types().await.unwrap(), vec!["apartment"]);
    }
}
