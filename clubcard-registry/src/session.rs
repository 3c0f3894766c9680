//! Edit session state machine
//!
//! One session per operator: `Viewing -> Editing -> Saving -> Viewing`.
//! The session never renders anything; callers turn its state into views.
//!
//! Saving is a fixed sequence against a store that does not guarantee
//! read-after-write:
//! 1. convert the draft's membership date back to display form
//! 2. build a patch (row, scalars, all ten modification slots)
//! 3. dispatch it through the gateway (transport failure aborts the save)
//! 4. apply the patch to the in-memory record
//! 5. wait the settle delay
//! 6. reload the store
//! 7. re-resolve the record by its original plate

use clubcard_common::config::ReconcileFailurePolicy;
use clubcard_common::dates::{display_to_iso, iso_to_display};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::gateway::{GatewayError, RecordPatch, SyncGateway};
use crate::plate;
use crate::record::{
    MemberRecord, Modifications, COLOR_KEY, LOCATION_KEY, MOD_SLOTS, MODEL_KEY, NAME_KEY,
    TIMESTAMP_KEY,
};
use crate::store::{RecordStore, StoreError};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No member selected")]
    NoSelection,

    #[error("Session is not in edit mode")]
    NotEditing,

    /// A save is in flight
    #[error("A save is already in progress")]
    Busy,

    /// Dispatch failed; the draft is kept for a retry
    #[error("Failed to save changes: {0}")]
    Transport(#[source] GatewayError),

    /// The saved record was not found after reload
    #[error("Saved member {plate} could not be found after reload; changes are unverified")]
    Reconciliation { plate: String },

    /// The post-save reload failed; changes are unverified
    #[error("Reload after save failed: {0}")]
    Reload(#[source] StoreError),

    #[error("Save task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// Save completed locally but the remote state could not be confirmed
    pub fn is_unverified(&self) -> bool {
        matches!(
            self,
            SessionError::Reconciliation { .. } | SessionError::Reload(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Viewing,
    Editing,
    Saving,
}

/// Timing and failure policy for the save protocol
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait between dispatch and reload for the remote store to catch up
    pub settle_delay: Duration,
    pub on_reconcile_failure: ReconcileFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(clubcard_common::config::DEFAULT_SETTLE_DELAY_MS),
            on_reconcile_failure: ReconcileFailurePolicy::default(),
        }
    }
}

/// Mutable edit state for the selected record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Display form while viewing, calendar form (YYYY-MM-DD) while editing
    pub member_since: String,
    pub name: String,
    pub location: String,
    pub plate: String,
    pub color: String,
    pub model: String,
    pub modifications: Modifications,
}

impl Draft {
    /// Verbatim copy of a record's editable values
    pub fn from_record(record: &MemberRecord) -> Self {
        Self {
            member_since: record.field(TIMESTAMP_KEY).to_string(),
            name: record.field(NAME_KEY).to_string(),
            location: record.field(LOCATION_KEY).to_string(),
            plate: record.plate().to_string(),
            color: record.field(COLOR_KEY).to_string(),
            model: record.field(MODEL_KEY).to_string(),
            modifications: record.modifications.clone(),
        }
    }

    /// Copy for editing: the membership date is converted to calendar form
    fn for_editing(record: &MemberRecord) -> Self {
        let mut draft = Self::from_record(record);
        draft.member_since = display_to_iso(&draft.member_since);
        draft
    }

    /// Patch for `row` with trimmed values and the date in display form
    fn to_patch(&self, row: usize) -> RecordPatch {
        let mut modifications = Modifications::default();
        for (slot, value) in self.modifications.iter().enumerate() {
            modifications[slot] = value.trim().to_string();
        }

        RecordPatch {
            row,
            timestamp: iso_to_display(self.member_since.trim()),
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            plate: self.plate.trim().to_string(),
            color: self.color.trim().to_string(),
            model: self.model.trim().to_string(),
            modifications,
        }
    }
}

/// Partial draft update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DraftUpdate {
    pub member_since: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub plate: Option<String>,
    pub color: Option<String>,
    pub model: Option<String>,
    /// Modification values keyed by slot number 1..10
    pub modifications: BTreeMap<usize, String>,
}

impl DraftUpdate {
    fn apply(self, draft: &mut Draft) {
        let scalars = [
            (self.member_since, &mut draft.member_since),
            (self.name, &mut draft.name),
            (self.location, &mut draft.location),
            (self.plate, &mut draft.plate),
            (self.color, &mut draft.color),
            (self.model, &mut draft.model),
        ];
        for (value, target) in scalars {
            if let Some(value) = value {
                *target = value;
            }
        }

        for (slot, value) in self.modifications {
            match slot.checked_sub(1).filter(|&i| i < MOD_SLOTS) {
                Some(index) => draft.modifications[index] = value,
                None => warn!(slot, "Ignoring draft update for nonexistent modification slot"),
            }
        }
    }
}

/// Serializable view of the session for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub mode: Mode,
    pub busy: bool,
    /// False after a save whose result could not be confirmed
    pub verified: bool,
    pub record: Option<MemberRecord>,
    pub draft: Option<Draft>,
}

/// Edit state for one selected record
#[derive(Debug)]
pub struct EditSession {
    selected: Option<MemberRecord>,
    draft: Draft,
    mode: Mode,
    verified: bool,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    /// Session with no selection
    pub fn new() -> Self {
        Self {
            selected: None,
            draft: Draft::default(),
            mode: Mode::Viewing,
            verified: true,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.mode == Mode::Saving
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn selected(&self) -> Option<&MemberRecord> {
        self.selected.as_ref()
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.selected.as_ref().map(|_| &self.draft)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            mode: self.mode,
            busy: self.is_busy(),
            verified: self.verified,
            record: self.selected.clone(),
            draft: self.draft().cloned(),
        }
    }

    /// Select a record (any state -> Viewing), resetting the draft
    pub fn select(&mut self, record: MemberRecord) {
        self.draft = Draft::from_record(&record);
        self.selected = Some(record);
        self.mode = Mode::Viewing;
        self.verified = true;
    }

    /// Drop the selection after a failed lookup
    pub fn clear(&mut self) {
        self.selected = None;
        self.draft = Draft::default();
        self.mode = Mode::Viewing;
        self.verified = true;
    }

    /// Viewing -> Editing, seeding the draft from the selected record
    ///
    /// Without a selection nothing changes. Calling it while already editing
    /// keeps the current draft.
    pub fn begin_edit(&mut self) -> Result<&Draft, SessionError> {
        match self.mode {
            Mode::Saving => return Err(SessionError::Busy),
            Mode::Editing => return Ok(&self.draft),
            Mode::Viewing => {}
        }
        let record = self.selected.as_ref().ok_or(SessionError::NoSelection)?;

        self.draft = Draft::for_editing(record);
        self.mode = Mode::Editing;
        Ok(&self.draft)
    }

    /// Change draft values while editing
    pub fn update_draft(&mut self, update: DraftUpdate) -> Result<&Draft, SessionError> {
        match self.mode {
            Mode::Editing => {
                update.apply(&mut self.draft);
                Ok(&self.draft)
            }
            Mode::Saving => Err(SessionError::Busy),
            Mode::Viewing => Err(SessionError::NotEditing),
        }
    }

    /// Editing -> Viewing, discarding the draft; a no-op in other modes
    pub fn cancel(&mut self) {
        if self.mode != Mode::Editing {
            return;
        }
        if let Some(record) = &self.selected {
            self.draft = Draft::from_record(record);
        }
        self.mode = Mode::Viewing;
    }

    /// Editing -> Saving -> Viewing
    ///
    /// Returns the refreshed record on success. On `Transport` the session is
    /// back in `Editing` with the draft intact. On `Reconciliation` or
    /// `Reload` the session is in `Viewing` holding the optimistic record
    /// (or nothing, under `ClearSelection`) and is flagged unverified.
    pub async fn save(
        &mut self,
        gateway: &dyn SyncGateway,
        store: &RecordStore,
        config: &SessionConfig,
    ) -> Result<MemberRecord, SessionError> {
        match self.mode {
            Mode::Saving => return Err(SessionError::Busy),
            Mode::Viewing => return Err(SessionError::NotEditing),
            Mode::Editing => {}
        }
        let (row, original_plate) = match &self.selected {
            Some(record) => (record.source_row, record.plate().to_string()),
            None => return Err(SessionError::NoSelection),
        };

        self.mode = Mode::Saving;
        let patch = self.draft.to_patch(row);

        info!(row, plate = %original_plate, "Saving member changes");
        if let Err(e) = gateway.write(&patch).await {
            error!(row, plate = %original_plate, "Error saving changes: {}", e);
            self.mode = Mode::Editing;
            return Err(SessionError::Transport(e));
        }

        if let Some(record) = self.selected.as_mut() {
            patch.apply_to(record);
        }
        self.verified = false;

        if !config.settle_delay.is_zero() {
            tokio::time::sleep(config.settle_delay).await;
        }

        let snapshot = match store.reload().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(row, "Reload after save failed, keeping optimistic state: {}", e);
                self.finish_unverified(config);
                return Err(SessionError::Reload(e));
            }
        };

        match plate::find(&snapshot, &original_plate) {
            Some(refreshed) => {
                let refreshed = refreshed.clone();
                info!(
                    plate = %original_plate,
                    row = refreshed.source_row,
                    "Member information updated"
                );
                self.select(refreshed.clone());
                Ok(refreshed)
            }
            None => {
                warn!(
                    plate = %original_plate,
                    "Saved member not found after reload, changes unverified"
                );
                self.finish_unverified(config);
                Err(SessionError::Reconciliation {
                    plate: original_plate,
                })
            }
        }
    }

    fn finish_unverified(&mut self, config: &SessionConfig) {
        match config.on_reconcile_failure {
            ReconcileFailurePolicy::KeepOptimistic => {
                if let Some(record) = &self.selected {
                    self.draft = Draft::from_record(record);
                }
                self.mode = Mode::Viewing;
            }
            ReconcileFailurePolicy::ClearSelection => self.clear(),
        }
        self.verified = false;
    }
}

/// A failed shared save and the session's selection when it ended
///
/// After an unverified save `selected` is the optimistic record (or `None`
/// under `ClearSelection`), read while the save still held the lock.
#[derive(Debug)]
pub struct SaveFailure {
    pub error: SessionError,
    pub selected: Option<MemberRecord>,
}

impl From<SessionError> for SaveFailure {
    fn from(error: SessionError) -> Self {
        Self {
            error,
            selected: None,
        }
    }
}

/// Shared handle used by concurrent request handlers
///
/// Any operation attempted while a save holds the session fails with
/// `Busy` instead of waiting.
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<EditSession>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session, or `Busy` if a save is running
    pub fn try_lock(&self) -> Result<MutexGuard<'_, EditSession>, SessionError> {
        self.inner.try_lock().map_err(|_| SessionError::Busy)
    }

    /// Run the save protocol on its own task
    ///
    /// The task owns the session lock, so dropping the caller does not
    /// interrupt a dispatched save halfway through.
    pub async fn save(
        &self,
        gateway: Arc<dyn SyncGateway>,
        store: Arc<RecordStore>,
        config: SessionConfig,
    ) -> Result<MemberRecord, SaveFailure> {
        let mut session = Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| SessionError::Busy)?;

        let task = tokio::spawn(async move {
            match session
                .save(gateway.as_ref(), store.as_ref(), &config)
                .await
            {
                Ok(record) => Ok(record),
                Err(error) => Err(SaveFailure {
                    error,
                    selected: session.selected().cloned(),
                }),
            }
        });

        task.await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PLATE_KEY;

    fn record() -> MemberRecord {
        let mut record = MemberRecord {
            source_row: 5,
            ..MemberRecord::default()
        };
        record.set_field(TIMESTAMP_KEY, "Apr 18, 25");
        record.set_field(NAME_KEY, "Mei Ling");
        record.set_field(PLATE_KEY, "PKR 88");
        record.set_field(LOCATION_KEY, "Perak");
        record.modifications[1] = "Spoiler".to_string();
        record
    }

    #[test]
    fn test_new_session_has_no_selection() {
        let session = EditSession::new();
        assert_eq!(session.mode(), Mode::Viewing);
        assert!(session.selected().is_none());
        assert!(session.draft().is_none());
    }

    #[test]
    fn test_begin_edit_without_selection_is_noop() {
        let mut session = EditSession::new();
        assert!(matches!(
            session.begin_edit(),
            Err(SessionError::NoSelection)
        ));
        assert_eq!(session.mode(), Mode::Viewing);
        assert!(session.selected().is_none());
    }

    #[test]
    fn test_begin_edit_converts_date_to_calendar_form() {
        let mut session = EditSession::new();
        session.select(record());

        let draft = session.begin_edit().unwrap();
        assert_eq!(draft.member_since, "2025-04-18");
        assert_eq!(draft.name, "Mei Ling");
        assert_eq!(draft.modifications[1], "Spoiler");
        assert_eq!(session.mode(), Mode::Editing);
    }

    #[test]
    fn test_begin_edit_with_unparsable_date_yields_empty() {
        let mut rec = record();
        rec.set_field(TIMESTAMP_KEY, "sometime");
        let mut session = EditSession::new();
        session.select(rec);

        assert_eq!(session.begin_edit().unwrap().member_since, "");
    }

    #[test]
    fn test_cancel_discards_draft() {
        let mut session = EditSession::new();
        session.select(record());
        session.begin_edit().unwrap();
        session
            .update_draft(DraftUpdate {
                name: Some("Changed".to_string()),
                ..DraftUpdate::default()
            })
            .unwrap();

        session.cancel();

        assert_eq!(session.mode(), Mode::Viewing);
        assert_eq!(session.draft().unwrap().name, "Mei Ling");
        assert_eq!(session.selected().unwrap().field(NAME_KEY), "Mei Ling");
    }

    #[test]
    fn test_update_draft_requires_editing() {
        let mut session = EditSession::new();
        session.select(record());
        assert!(matches!(
            session.update_draft(DraftUpdate::default()),
            Err(SessionError::NotEditing)
        ));
    }

    #[test]
    fn test_update_draft_ignores_bad_slots() {
        let mut session = EditSession::new();
        session.select(record());
        session.begin_edit().unwrap();

        let mut update = DraftUpdate::default();
        update.modifications.insert(0, "zero".to_string());
        update.modifications.insert(11, "eleven".to_string());
        update.modifications.insert(10, "Tint".to_string());
        update.modifications.insert(2, String::new());

        let draft = session.update_draft(update).unwrap();
        assert_eq!(draft.modifications[9], "Tint");
        assert_eq!(draft.modifications[1], "");
        assert_eq!(draft.modifications.iter().filter(|m| !m.is_empty()).count(), 1);
    }

    #[test]
    fn test_patch_carries_display_date_and_all_slots() {
        let mut session = EditSession::new();
        session.select(record());
        session.begin_edit().unwrap();
        session
            .update_draft(DraftUpdate {
                member_since: Some("2024-01-09".to_string()),
                name: Some("  Mei  ".to_string()),
                ..DraftUpdate::default()
            })
            .unwrap();

        let patch = session.draft.to_patch(5);
        assert_eq!(patch.row, 5);
        assert_eq!(patch.timestamp, "Jan 9, 24");
        assert_eq!(patch.name, "Mei");
        assert_eq!(patch.plate, "PKR 88");
        assert_eq!(patch.modifications.len(), MOD_SLOTS);
    }

    #[test]
    fn test_empty_date_maps_to_empty_display() {
        let draft = Draft::default();
        assert_eq!(draft.to_patch(2).timestamp, "");
    }

    #[test]
    fn test_select_resets_any_state() {
        let mut session = EditSession::new();
        session.select(record());
        session.begin_edit().unwrap();

        let mut other = record();
        other.set_field(PLATE_KEY, "JHR 1");
        session.select(other);

        assert_eq!(session.mode(), Mode::Viewing);
        assert_eq!(session.draft().unwrap().plate, "JHR 1");
        assert_eq!(session.draft().unwrap().member_since, "Apr 18, 25");
    }
}
