//! Device token resolution and first-steward bootstrap

use super::names::gen_human_name;
use super::token::generate_invitation_token;
use crate::neo4j::models::Invitation;
use crate::neo4j::GraphStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolves device tokens to invitations, upserting devices on first contact
pub struct DeviceResolver {
    store: Arc<dyn GraphStore>,
    bootstrap_lock: Mutex<()>,
}

impl DeviceResolver {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            bootstrap_lock: Mutex::new(()),
        }
    }

    /// Invitation bound to a device token, if any.
    ///
    /// Records the device when it is new. While the store holds no
    /// invitation at all, the device is bound to a freshly created steward
    /// invitation.
    pub async fn resolve(&self, device_token: &str) -> Result<Option<Invitation>> {
        if let Some(invitation) = self.store.invitation_from_device_token(device_token).await? {
            return Ok(Some(invitation));
        }

        // Serializes the zero-invitation check so two first devices cannot both become steward
        let _guard = self.bootstrap_lock.lock().await;

        let mut device = self.store.device_from_token(device_token).await?;
        if let Some(invitation_id) = &device.invitation {
            if let Some(invitation) = self.store.get_invitation(invitation_id).await? {
                return Ok(Some(invitation));
            }
        }

        if self.store.count_invitations().await? > 0 {
            return Ok(None);
        }

        let invitation = self
            .store
            .insert_invitation(&Invitation {
                token: Some(generate_invitation_token()),
                name: Some(gen_human_name()),
                is_steward: true,
                ..Default::default()
            })
            .await?;
        device.invitation = Some(invitation.id.clone());
        self.store.update_device(&device).await?;

        tracing::info!(invitation = %invitation.id, "Bootstrapped first steward invitation");
        Ok(Some(invitation))
    }

    /// Bind a device to the invitation holding `invitation_token`.
    ///
    /// Returns `None` when no invitation has that token.
    pub async fn connect(
        &self,
        device_token: &str,
        invitation_token: &str,
    ) -> Result<Option<Invitation>> {
        let Some(invitation) = self.store.invitation_from_token(invitation_token).await? else {
            return Ok(None);
        };
        let mut device = self.store.device_from_token(device_token).await?;
        device.invitation = Some(invitation.id.clone());
        self.store.update_device(&device).await?;

        tracing::debug!(invitation = %invitation.id, "Device connected to invitation");
        Ok(Some(invitation))
    }
}
