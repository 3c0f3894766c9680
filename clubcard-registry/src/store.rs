//! Record store: normalised member snapshots
//!
//! A snapshot is immutable once loaded. Reload builds a fresh snapshot and
//! swaps it in wholesale; readers holding the previous `Arc<Snapshot>` keep a
//! consistent view for as long as they need it.

use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{error, info};

use crate::gateway::{GatewayError, SyncGateway};
use crate::record::{mod_slot, MemberRecord, FIRST_DATA_ROW};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The source returned a header but no data rows (or nothing at all)
    #[error("Member source returned no data rows")]
    EmptySource,

    #[error("Failed to fetch member rows: {0}")]
    Fetch(#[from] GatewayError),
}

/// One fully loaded, ordered set of member records
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    headers: Vec<String>,
    records: Vec<MemberRecord>,
}

impl Snapshot {
    /// Build records from a header row and data rows
    ///
    /// Columns missing from a short row read as empty. "Mod1".."Mod10"
    /// columns fill the modification slots; every other column becomes a
    /// field. The i-th data row (zero-based) gets `source_row = i + 2`.
    pub fn load(header_row: &[String], data_rows: &[Vec<String>]) -> Result<Self, StoreError> {
        if data_rows.is_empty() {
            return Err(StoreError::EmptySource);
        }

        let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();

        let records = data_rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                let mut record = MemberRecord {
                    source_row: position + FIRST_DATA_ROW,
                    ..MemberRecord::default()
                };
                for (column, header) in headers.iter().enumerate() {
                    let value = row.get(column).cloned().unwrap_or_default();
                    match mod_slot(header) {
                        Some(slot) => record.modifications[slot] = value,
                        None => {
                            record.fields.insert(header.clone(), value);
                        }
                    }
                }
                record
            })
            .collect();

        Ok(Self { headers, records })
    }

    /// Build from a raw grid whose first row is the header
    pub fn from_grid(grid: &[Vec<String>]) -> Result<Self, StoreError> {
        match grid.split_first() {
            Some((header_row, data_rows)) => Self::load(header_row, data_rows),
            None => Err(StoreError::EmptySource),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[MemberRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Owner of the active snapshot
pub struct RecordStore {
    gateway: Arc<dyn SyncGateway>,
    current: RwLock<Arc<Snapshot>>,
}

impl RecordStore {
    /// Create a store with an empty snapshot; call `reload` to populate it
    pub fn new(gateway: Arc<dyn SyncGateway>) -> Self {
        Self {
            gateway,
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Fetch the source and atomically replace the active snapshot
    ///
    /// On failure the previous snapshot stays active. No retry is attempted.
    pub async fn reload(&self) -> Result<Arc<Snapshot>, StoreError> {
        let grid = self.gateway.fetch_rows().await.map_err(|e| {
            error!("Failed to fetch member sheet: {}", e);
            StoreError::from(e)
        })?;

        let snapshot = match Snapshot::from_grid(&grid) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                error!("No member data found in sheet");
                return Err(e);
            }
        };

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&snapshot);

        info!(
            records = snapshot.len(),
            columns = snapshot.headers().len(),
            "Loaded member records"
        );
        Ok(snapshot)
    }

    /// The active snapshot; callers keep the `Arc` for a consistent view
    pub fn all(&self) -> Arc<Snapshot> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*current)
    }
}
