//! Channel folder management
//!
//! Folders are user-owned groupings of monitored channels. The manager is a
//! stateless service over the storage trait; ownership is enforced here —
//! any operation against a folder that does not belong to the calling
//! identity surfaces as `NotFound`, indistinguishable from a folder that
//! never existed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::storage::schema::ChannelFolder;
use crate::storage::{StorageBackend, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    /// The folder does not exist, or belongs to another identity.
    #[error("folder not found")]
    NotFound,

    #[error("folder name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Stateless CRUD service for channel folders.
#[derive(Clone)]
pub struct FolderManager {
    storage: Arc<dyn StorageBackend>,
}

impl FolderManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Create a folder with an empty membership.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        owner: &str,
        name: &str,
        description: Option<String>,
        monitoring_enabled: bool,
    ) -> Result<ChannelFolder, FolderError> {
        if name.trim().is_empty() {
            return Err(FolderError::EmptyName);
        }

        let folder = ChannelFolder {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            name: name.to_string(),
            description,
            channel_ids: Vec::new(),
            monitoring_enabled,
            created_at: Utc::now(),
        };

        self.storage.insert_folder(folder.clone()).await?;
        debug!("created folder {} ({name}) for {owner}", folder.id);

        Ok(folder)
    }

    /// All folders for an identity, with resolved membership.
    pub async fn list(&self, owner: &str) -> Result<Vec<ChannelFolder>, FolderError> {
        Ok(self.storage.list_folders(owner).await?)
    }

    /// One folder, scoped to its owner.
    pub async fn get(&self, owner: &str, id: Uuid) -> Result<ChannelFolder, FolderError> {
        self.storage
            .get_folder(owner, id)
            .await?
            .ok_or(FolderError::NotFound)
    }

    /// Add channels to a folder. Set semantics: a channel that is already
    /// a member is skipped, not an error.
    #[instrument(skip(self, channel_ids))]
    pub async fn add_channels(
        &self,
        owner: &str,
        id: Uuid,
        channel_ids: &[String],
    ) -> Result<ChannelFolder, FolderError> {
        let mut folder = self.get(owner, id).await?;

        for channel_id in channel_ids {
            if !folder.channel_ids.contains(channel_id) {
                folder.channel_ids.push(channel_id.clone());
            }
        }

        self.storage.update_folder(folder.clone()).await?;
        Ok(folder)
    }

    /// Remove a channel from a folder's membership. Removing a
    /// non-member is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_channel(
        &self,
        owner: &str,
        id: Uuid,
        channel_id: &str,
    ) -> Result<ChannelFolder, FolderError> {
        let mut folder = self.get(owner, id).await?;
        folder.channel_ids.retain(|c| c != channel_id);

        self.storage.update_folder(folder.clone()).await?;
        Ok(folder)
    }

    /// Toggle whether the scheduler includes this folder's channels.
    pub async fn set_monitoring(
        &self,
        owner: &str,
        id: Uuid,
        enabled: bool,
    ) -> Result<ChannelFolder, FolderError> {
        let mut folder = self.get(owner, id).await?;
        folder.monitoring_enabled = enabled;

        self.storage.update_folder(folder.clone()).await?;
        Ok(folder)
    }

    /// Delete a folder and its membership. Shared channel data (the
    /// observations keyed by channel) is never touched.
    #[instrument(skip(self))]
    pub async fn delete(&self, owner: &str, id: Uuid) -> Result<(), FolderError> {
        if self.storage.delete_folder(owner, id).await? {
            debug!("deleted folder {id} for {owner}");
            Ok(())
        } else {
            Err(FolderError::NotFound)
        }
    }
}
