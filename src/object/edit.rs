//! Edit state: Clean and Editing, with a field-level backup that exists exactly while editing.

use super::{BusinessObject, EditBackup};
use crate::client::Client;
use crate::events::ObjectEvent;
use crate::notification::NotificationType;
use crate::query::Row;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

impl BusinessObject {
    pub fn is_in_edit(&self) -> bool {
        self.state.read().is_in_edit
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().is_dirty
    }

    /// Enter edit mode, snapshotting every attribute.
    pub fn edit(&self) {
        self.set_in_edit(true);
    }

    pub(crate) fn set_in_edit(&self, in_edit: bool) {
        let changed = {
            let mut state = self.state.write();
            if state.is_in_edit == in_edit {
                false
            } else {
                state.is_in_edit = in_edit;
                true
            }
        };

        if changed {
            if in_edit {
                self.snapshot();
            } else {
                self.state.write().backup = None;
                for attribute in &self.attributes {
                    attribute.drop_backup();
                }
                self.set_dirty(false);
            }
            self.events.emit(ObjectEvent::EditStateChanged { in_edit });
        }
        self.sync_edit_actions(in_edit);
    }

    /// Dirty only sticks while editing.
    pub(crate) fn set_dirty(&self, dirty: bool) {
        let changed = {
            let mut state = self.state.write();
            let dirty = dirty && state.is_in_edit;
            if state.is_dirty == dirty {
                None
            } else {
                state.is_dirty = dirty;
                Some(dirty)
            }
        };
        let dirty = self.is_dirty();
        if let Some(end_edit) = self.action("EndEdit") {
            end_edit.set_can_execute(dirty);
        }
        if let Some(dirty) = changed {
            self.events.emit(ObjectEvent::DirtyChanged { dirty });
        }
    }

    fn snapshot(&self) {
        {
            let mut state = self.state.write();
            state.backup = Some(EditBackup {
                security_token: state.security_token.clone(),
            });
        }
        for attribute in &self.attributes {
            attribute.take_backup();
        }
    }

    fn sync_edit_actions(&self, in_edit: bool) {
        if let Some(edit) = self.action("Edit") {
            edit.set_visible(!in_edit);
            edit.set_can_execute(!in_edit);
        }
        if let Some(end_edit) = self.action("EndEdit") {
            end_edit.set_visible(in_edit);
            end_edit.set_can_execute(in_edit && self.is_dirty());
        }
        if let Some(cancel) = self.action("CancelEdit") {
            cancel.set_visible(in_edit);
            cancel.set_can_execute(in_edit);
        }
    }

    /// Restore the edit snapshot and leave edit mode, unless the object stays in edit.
    pub fn cancel_edit(&self) {
        if !self.is_in_edit() {
            return;
        }

        {
            let mut state = self.state.write();
            if let Some(backup) = state.backup.take() {
                state.security_token = backup.security_token;
            }
        }
        for attribute in &self.attributes {
            attribute.restore_backup();
        }
        self.set_notification(None, NotificationType::default());

        if self.state_behavior.stay_in_edit {
            self.snapshot();
            self.set_dirty(false);
        } else {
            self.set_in_edit(false);
        }
        self.events.emit(ObjectEvent::Refreshed);
    }

    /// Save through the server. Returns false when the object ends up with an error notification.
    #[instrument(skip(self, client), fields(object = %self.full_type_name))]
    pub async fn save(&self, client: &Client) -> bool {
        let Some(this) = self.self_ref.upgrade() else {
            return false;
        };
        if !self.is_in_edit() {
            return true;
        }

        let result = match client
            .execute_action("PersistentObject.Save", Some(&this), None, &[], None)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Save failed");
                self.set_notification(Some(&e.to_string()), NotificationType::Error);
                return false;
            }
        };
        let Some(result) = result else {
            return !self.has_error_notification();
        };
        self.refresh_from_result(client, &result).await;
        if self.has_error_notification() {
            return false;
        }

        self.set_dirty(false);
        if self.state_behavior.stay_in_edit {
            self.snapshot();
        } else {
            self.set_in_edit(false);
        }

        if let Some(reference) = self.owner_reference_attribute() {
            let object_id = self.object_id();
            if reference.object_id() != object_id {
                if let Some(id) = object_id {
                    debug!(attribute = %reference.name(), "Pointing owner reference at saved object");
                    if let Some(owner) = reference.parent() {
                        owner.edit();
                    }
                    if let Err(e) = reference
                        .change_reference(client, Some(Arc::new(Row::detached(id))))
                        .await
                    {
                        warn!(error = %e, "Reference change after save failed");
                    }
                }
            }
        } else if let Some(query) = self.owner_query() {
            query.refresh(client).await;
            if let Some(owner) = query.semantic_zoom_owner() {
                owner.refresh(client).await;
            }
        }
        true
    }
}
