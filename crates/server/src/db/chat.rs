use anyhow::Result;
use uuid::Uuid;

use super::{now, Conversation, Database, Message, Sender, SystemPrompt};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender, content, token_count, is_visible, property_id, created_at";

const PROMPT_COLUMNS: &str = "id, name, content, is_default, created_at, updated_at";

impl Database {
    // System prompts

    pub async fn get_default_system_prompt(&self, name: &str) -> Result<Option<SystemPrompt>> {
        let prompt = sqlx::query_as::<_, SystemPrompt>(&format!(
            "SELECT {PROMPT_COLUMNS} FROM system_prompts WHERE is_default = 1 AND name = ? LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        Ok(prompt)
    }

    /// Overwrite a prompt's content by name. Returns the refreshed row,
    /// or None when no prompt has that name.
    pub async fn update_system_prompt(
        &self,
        name: &str,
        content: &str,
    ) -> Result<Option<SystemPrompt>> {
        let prompt = sqlx::query_as::<_, SystemPrompt>(&format!(
            r#"
            UPDATE system_prompts SET content = ?, updated_at = ?
            WHERE name = ?
            RETURNING {PROMPT_COLUMNS}
            "#
        ))
        .bind(content)
        .bind(now())
        .bind(name)
        .fetch_optional(self.pool())
        .await?;
        Ok(prompt)
    }

    /// Insert a default prompt unless one with this name already exists.
    pub async fn seed_system_prompt(&self, name: &str, content: &str) -> Result<()> {
        let existing = self.get_default_system_prompt(name).await?;
        if existing.is_some() {
            return Ok(());
        }

        let timestamp = now();
        sqlx::query(
            "INSERT INTO system_prompts (id, name, content, is_default, created_at, updated_at) VALUES (?, ?, ?, 1, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(content)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(self.pool())
        .await?;
        tracing::info!("Seeded default system prompt: {}", name);
        Ok(())
    }

    // Conversations

    /// Create a conversation together with its hidden system seed message
    /// and the visible AI welcome message, in one transaction. The partial
    /// unique index on active conversations makes a concurrent duplicate
    /// fail with a unique violation.
    pub async fn create_conversation(
        &self,
        user_id: &str,
        system_prompt_id: &str,
        title: &str,
        seed_content: &str,
        welcome_content: &str,
    ) -> Result<(Conversation, Message, Message)> {
        let mut tx = self.pool().begin().await?;

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            system_prompt_id: Some(system_prompt_id.to_string()),
            title: title.to_string(),
            is_active: true,
            created_at: now(),
            updated_at: now(),
        };

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, system_prompt_id, title, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.system_prompt_id)
        .bind(&conversation.title)
        .bind(&conversation.created_at)
        .bind(&conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        let seed = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender: Sender::System,
            content: seed_content.to_string(),
            token_count: None,
            is_visible: false,
            property_id: None,
            created_at: now(),
        };
        let welcome = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender: Sender::Ai,
            content: welcome_content.to_string(),
            token_count: None,
            is_visible: true,
            property_id: None,
            created_at: now(),
        };

        for message in [&seed, &welcome] {
            sqlx::query(
                r#"
                INSERT INTO messages (id, conversation_id, sender, content, token_count, is_visible, property_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&message.id)
            .bind(&message.conversation_id)
            .bind(message.sender)
            .bind(&message.content)
            .bind(message.token_count)
            .bind(message.is_visible)
            .bind(&message.property_id)
            .bind(&message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((conversation, seed, welcome))
    }

    pub async fn get_active_conversation(&self, user_id: &str) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, user_id, system_prompt_id, title, is_active, created_at, updated_at
            FROM conversations WHERE user_id = ? AND is_active = 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(conversation)
    }

    pub async fn touch_conversation(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // Messages

    pub async fn insert_message(
        &self,
        conversation_id: &str,
        sender: Sender,
        content: &str,
        is_visible: bool,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender,
            content: content.to_string(),
            token_count: None,
            is_visible,
            property_id: None,
            created_at: now(),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender, content, token_count, is_visible, property_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.sender)
        .bind(&message.content)
        .bind(message.token_count)
        .bind(message.is_visible)
        .bind(&message.property_id)
        .bind(&message.created_at)
        .execute(self.pool())
        .await?;

        Ok(message)
    }

    /// All messages of a conversation in creation order. The rowid
    /// tiebreak keeps insertion order for rows created within the same
    /// timestamp.
    pub async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }

    pub async fn get_visible_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? AND is_visible = 1 ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::super::users::sample_user;
    use super::super::{test_db, Role};
    use super::*;
    use crate::error::is_unique_violation;

    async fn seeded_conversation(db: &Database, user_id: &str) -> (Conversation, Message, Message) {
        db.seed_system_prompt("default-renter-buyer", "You are a helpful assistant.")
            .await
            .unwrap();
        let prompt = db
            .get_default_system_prompt("default-renter-buyer")
            .await
            .unwrap()
            .unwrap();
        db.create_conversation(
            user_id,
            &prompt.id,
            "Property Analysis Chat",
            "seed content",
            "welcome",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_second_active_conversation_is_rejected() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let (conversation, _, _) = seeded_conversation(&db, &user.id).await;
        assert!(conversation.is_active);

        let prompt = db
            .get_default_system_prompt("default-renter-buyer")
            .await
            .unwrap()
            .unwrap();
        let err = db
            .create_conversation(&user.id, &prompt.id, "Second", "seed", "welcome")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        // The failed attempt left no partial rows behind
        let messages = db.get_messages(&conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_messages_ordered_and_visibility_filtered() {
        let db = test_db().await;
        let user = sample_user(Role::RenterBuyer);
        db.create_user(&user).await.unwrap();

        let (conversation, seed, welcome) = seeded_conversation(&db, &user.id).await;
        db.insert_message(&conversation.id, Sender::User, "first question", true)
            .await
            .unwrap();
        db.insert_message(&conversation.id, Sender::Ai, "first answer", true)
            .await
            .unwrap();

        let all = db.get_messages(&conversation.id).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].id, seed.id);
        assert_eq!(all[1].id, welcome.id);
        assert!(all
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));

        let visible = db.get_visible_messages(&conversation.id).await.unwrap();
        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|m| m.is_visible));
        assert!(!visible.iter().any(|m| m.sender == Sender::System));
    }

    #[tokio::test]
    async fn test_update_system_prompt() {
        let db = test_db().await;
        db.seed_system_prompt("default-seller-agency", "old content")
            .await
            .unwrap();

        let before = db
            .get_default_system_prompt("default-seller-agency")
            .await
            .unwrap()
            .unwrap();

        let updated = db
            .update_system_prompt("default-seller-agency", "new content")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "new content");
        assert!(updated.updated_at >= before.updated_at);

        assert!(db
            .update_system_prompt("no-such-prompt", "content")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = test_db().await;
        db.seed_system_prompt("default-renter-buyer", "v1")
            .await
            .unwrap();
        db.seed_system_prompt("default-renter-buyer", "v2")
            .await
            .unwrap();

        let prompt = db
            .get_default_system_prompt("default-renter-buyer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prompt.content, "v1");
    }
}
