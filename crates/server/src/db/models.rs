use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User roles. The role gates authorization checks, the listing limit
/// granted at registration and which default system prompt seeds a
/// conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    RenterBuyer,
    PrivateSeller,
    Agency,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::RenterBuyer => "renter_buyer",
            Role::PrivateSeller => "private_seller",
            Role::Agency => "agency",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Name of the default system prompt for this role's audience.
    pub fn default_prompt_name(&self) -> &'static str {
        match self {
            Role::RenterBuyer => "default-renter-buyer",
            _ => "default-seller-agency",
        }
    }

    /// Listing limit granted at registration. -1 means unlimited.
    pub fn default_listing_limit(&self) -> i64 {
        match self {
            Role::RenterBuyer => 5,
            Role::Agency => 1000,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    pub paypal_credentials: Option<String>,
    pub listing_limit: i64,
    pub avatar_url: String,
    pub bio: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "house",
            PropertyType::Apartment => "apartment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Rent,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Rent => "rent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PropertyStatus {
    Active,
    Inactive,
    Sold,
    Rented,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "active",
            PropertyStatus::Inactive => "inactive",
            PropertyStatus::Sold => "sold",
            PropertyStatus::Rented => "rented",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub owner_id: String,
    pub is_verified: bool,
    pub title: String,
    pub description: Option<String>,
    pub property_type: PropertyType,
    pub transaction_type: TransactionType,
    pub price: f64,
    pub currency: String,
    pub size: Option<f64>,
    pub rooms: Option<i64>,
    pub address: String,
    pub status: PropertyStatus,
    pub document_url: Option<String>,
    pub verification_comments: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImage {
    pub id: String,
    pub property_id: String,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingHistory {
    pub id: String,
    pub property_id: String,
    pub price: f64,
    pub currency: String,
    pub effective_date: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub id: String,
    pub property_id: String,
    pub user_id: Option<String>,
    pub viewed_at: String,
}

/// A property together with its related rows, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWithRelations {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub views: Vec<PropertyView>,
    pub pricing_history: Vec<PricingHistory>,
}

/// Image payload accepted on property create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyImageInput {
    pub image_url: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Partial property update. Absent fields are left untouched; a present
/// `images` list replaces the property's images wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
    pub transaction_type: Option<TransactionType>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub size: Option<f64>,
    pub rooms: Option<i64>,
    pub address: Option<String>,
    pub status: Option<PropertyStatus>,
    pub document_url: Option<String>,
    pub verification_comments: Option<String>,
    pub is_verified: Option<bool>,
    pub images: Option<Vec<PropertyImageInput>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: String,
    pub user_id: String,
    pub property_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPrompt {
    pub id: String,
    pub name: String,
    pub content: String,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub system_prompt_id: Option<String>,
    pub title: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Who authored a message. "system" rows carry the hidden prompt seeding
/// the model; they are never shown to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub token_count: Option<i64>,
    pub is_visible: bool,
    pub property_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ChangeRequestKind {
    Email,
    Password,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChangeRequest {
    pub id: String,
    pub user_id: String,
    pub kind: ChangeRequestKind,
    pub new_value: String,
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub duration_days: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_prompt_mapping() {
        assert_eq!(Role::RenterBuyer.default_prompt_name(), "default-renter-buyer");
        assert_eq!(Role::PrivateSeller.default_prompt_name(), "default-seller-agency");
        assert_eq!(Role::Agency.default_prompt_name(), "default-seller-agency");
        assert_eq!(Role::Admin.default_prompt_name(), "default-seller-agency");
    }

    #[test]
    fn test_role_listing_limits() {
        assert_eq!(Role::RenterBuyer.default_listing_limit(), 5);
        assert_eq!(Role::Agency.default_listing_limit(), 1000);
        assert_eq!(Role::PrivateSeller.default_listing_limit(), -1);
    }

    #[test]
    fn test_role_serde_snake_case() {
        let json = serde_json::to_string(&Role::RenterBuyer).unwrap();
        assert_eq!(json, "\"renter_buyer\"");
        let parsed: Role = serde_json::from_str("\"private_seller\"").unwrap();
        assert_eq!(parsed, Role::PrivateSeller);
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: Some("secret-hash".to_string()),
            role: Role::RenterBuyer,
            is_email_verified: true,
            paypal_credentials: None,
            listing_limit: 5,
            avatar_url: "".to_string(),
            bio: "".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"isEmailVerified\":true"));
    }
}
