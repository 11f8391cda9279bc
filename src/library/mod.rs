//! Saved content library
//!
//! Every read and write is scoped by the owning account. A missing item and
//! someone else's item both surface as `NotFound`.

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::{SavedContentItem, Storage};
use crate::error::{AppError, DatabaseError};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct SaveContentRequest {
    pub content: String,
    pub content_type: String,
    pub platform: String,
    pub title: Option<String>,
    pub business_name: Option<String>,
}

impl SaveContentRequest {
    /// Falls back to "{content_type} for {business_name}" when no title is
    /// given.
    pub fn resolved_title(&self) -> String {
        match (&self.title, &self.business_name) {
            (Some(title), _) if !title.trim().is_empty() => title.trim().to_string(),
            (_, Some(business)) if !business.trim().is_empty() => {
                format!("{} for {}", self.content_type, business.trim())
            }
            _ => self.content_type.clone(),
        }
    }
}

pub struct ContentLibrary {
    store: Arc<dyn Storage>,
}

impl ContentLibrary {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub async fn save(&self, account_id: Uuid, request: &SaveContentRequest) -> Result<SavedContentItem> {
        if request.content.trim().is_empty() {
            return Err(AppError::ValidationError("content must not be empty".to_string()));
        }

        let item = SavedContentItem::new(
            account_id,
            request.resolved_title(),
            request.content.clone(),
            request.content_type.clone(),
            request.platform.clone(),
        );
        let item = self.store.insert_item(&item).await?;
        info!(%account_id, item_id = %item.id, platform = %item.platform, "Content saved");
        Ok(item)
    }

    pub async fn list(&self, account_id: Uuid, platform: Option<&str>) -> Result<Vec<SavedContentItem>> {
        self.store.list_items(account_id, platform).await
    }

    pub async fn get(&self, account_id: Uuid, item_id: Uuid) -> Result<SavedContentItem> {
        self.store
            .find_item(account_id, item_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound.into())
    }

    pub async fn delete(&self, account_id: Uuid, item_id: Uuid) -> Result<()> {
        if !self.store.delete_item(account_id, item_id).await? {
            return Err(DatabaseError::NotFound.into());
        }
        info!(%account_id, %item_id, "Content deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn request(platform: &str, title: Option<&str>) -> SaveContentRequest {
        SaveContentRequest {
            content: "🌟 အထူးကမ်းလှမ်းချက်".to_string(),
            content_type: "promotion".to_string(),
            platform: platform.to_string(),
            title: title.map(String::from),
            business_name: Some("Shwe Tea".to_string()),
        }
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(request("facebook", None).resolved_title(), "promotion for Shwe Tea");
        assert_eq!(request("facebook", Some("Launch")).resolved_title(), "Launch");
        assert_eq!(request("facebook", Some("  ")).resolved_title(), "promotion for Shwe Tea");

        let mut bare = request("facebook", None);
        bare.business_name = None;
        assert_eq!(bare.resolved_title(), "promotion");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let library = ContentLibrary::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();

        let first = library.save(owner, &request("facebook", Some("one"))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = library.save(owner, &request("instagram", Some("two"))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let third = library.save(owner, &request("facebook", Some("three"))).await.unwrap();

        let all = library.list(owner, None).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let facebook = library.list(owner, Some("facebook")).await.unwrap();
        assert_eq!(facebook.len(), 2);
        assert!(facebook.iter().all(|i| i.platform == "facebook"));

        // Listing holds no cursor state.
        assert_eq!(library.list(owner, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_accounts_cannot_see_or_delete() {
        let library = ContentLibrary::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let item = library.save(owner, &request("facebook", None)).await.unwrap();

        let foreign = library.get(intruder, item.id).await.unwrap_err();
        let missing = library.get(intruder, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(foreign.kind(), "not_found");
        assert_eq!(foreign.to_string(), missing.to_string());

        assert_eq!(library.delete(intruder, item.id).await.unwrap_err().kind(), "not_found");
        assert_eq!(library.get(owner, item.id).await.unwrap().id, item.id);

        library.delete(owner, item.id).await.unwrap();
        assert_eq!(library.delete(owner, item.id).await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let library = ContentLibrary::new(Arc::new(MemoryStore::new()));
        let mut empty = request("facebook", None);
        empty.content = " ".to_string();
        assert!(matches!(
            library.save(Uuid::new_v4(), &empty).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
