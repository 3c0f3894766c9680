//! Test helpers for clubcard-registry integration tests
//!
//! `MemoryGateway` stands in for the hosted sheet and script endpoint:
//! - serves a grid held in memory
//! - records every dispatched patch
//! - optionally applies patches to the grid (remote write landed)
//! - can fail fetches or writes, or hold writes until released

#![allow(dead_code)]

use async_trait::async_trait;
use clubcard_registry::gateway::{GatewayError, RecordPatch, RemoteInsights, SyncGateway};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const HEADER: &[&str] = &[
    "Timestamp",
    "Name",
    "Location",
    "License Plate",
    "Car Color",
    "Model",
    "Mod1",
    "Mod2",
    "Mod3",
    "Mod4",
    "Mod5",
    "Mod6",
    "Mod7",
    "Mod8",
    "Mod9",
    "Mod10",
];

fn to_row(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Header plus five members
pub fn sample_grid() -> Vec<Vec<String>> {
    vec![
        to_row(HEADER),
        to_row(&["Apr 18, 25", "Aisyah", "Selangor", "WXY 1234", "black", "IS300", "Exhaust", "Coilovers"]),
        to_row(&["Jan 5, 24", "Ben", "Johor", "JQA 88", "sonic titanium", "RX350"]),
        to_row(&["Sep 1, 26", "Chong", "Selangor", "BKT 7", "red", "NX200t", "Wrap", "Tint", "Rims"]),
        to_row(&["", "Devi", "", "PJ 3", "", ""]),
        to_row(&["Mar 3, 22", "Eng", "Penang", "PKA 1010", "white", "ES250", "", "", "", "Intake"]),
    ]
}

#[derive(Default)]
pub struct MemoryGateway {
    grid: Mutex<Vec<Vec<String>>>,
    patches: Mutex<Vec<RecordPatch>>,
    insights: Mutex<Option<RemoteInsights>>,
    apply_writes: AtomicBool,
    fail_writes: AtomicBool,
    fail_fetches: AtomicBool,
    fetches: AtomicUsize,
    writes_started: AtomicUsize,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryGateway {
    /// Gateway over `grid` whose writes land remotely
    pub fn new(grid: Vec<Vec<String>>) -> Arc<Self> {
        let gateway = Self {
            grid: Mutex::new(grid),
            ..Self::default()
        };
        gateway.apply_writes.store(true, Ordering::SeqCst);
        Arc::new(gateway)
    }

    pub fn sample() -> Arc<Self> {
        Self::new(sample_grid())
    }

    /// Dispatches succeed but never reach the sheet
    pub fn drop_writes(&self) {
        self.apply_writes.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_insights(&self, insights: RemoteInsights) {
        *self.insights.lock().unwrap() = Some(insights);
    }

    /// Hold every write until `release_writes` is called
    pub fn hold_writes(&self) {
        *self.write_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_writes(&self) {
        if let Some(gate) = self.write_gate.lock().unwrap().as_ref() {
            gate.add_permits(64);
        }
    }

    pub fn patches(&self) -> Vec<RecordPatch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes_started(&self) -> usize {
        self.writes_started.load(Ordering::SeqCst)
    }

    /// Write a patch into the grid the way the script endpoint would
    fn land(&self, patch: &RecordPatch) {
        let mut grid = self.grid.lock().unwrap();
        let header = grid[0].clone();
        let Some(row) = grid.get_mut(patch.row - 1) else {
            return;
        };

        for (column, name) in header.iter().enumerate() {
            let value = match name.as_str() {
                "Timestamp" => patch.timestamp.clone(),
                "Name" => patch.name.clone(),
                "Location" => patch.location.clone(),
                "License Plate" => patch.plate.clone(),
                "Car Color" => patch.color.clone(),
                "Model" => patch.model.clone(),
                other => match other.strip_prefix("Mod").and_then(|n| n.parse::<usize>().ok()) {
                    Some(n) if (1..=10).contains(&n) => patch.modifications[n - 1].clone(),
                    _ => continue,
                },
            };
            if row.len() <= column {
                row.resize(column + 1, String::new());
            }
            row[column] = value;
        }
    }
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("sheet unreachable".to_string()));
        }
        Ok(self.grid.lock().unwrap().clone())
    }

    async fn write(&self, patch: &RecordPatch) -> Result<(), GatewayError> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);

        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection reset".to_string()));
        }

        self.patches.lock().unwrap().push(patch.clone());
        if self.apply_writes.load(Ordering::SeqCst) {
            self.land(patch);
        }
        Ok(())
    }

    async fn fetch_insights(&self) -> Result<Option<RemoteInsights>, GatewayError> {
        Ok(self.insights.lock().unwrap().clone())
    }
}
