//! Sample persistence
//!
//! Append-only SQLite table with one row per evaluator tick, written by a
//! dedicated thread so the fan-out never waits on disk.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use vigil_core::SafetyStatus;

use crate::error::{PersistenceResult, SinkError};
use crate::event::{GatewayEvent, SensorReport};
use crate::sink::{Delivery, EventSink};

/// One persisted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub button: bool,
    pub abnormal_movement: bool,
    pub sound_alert: bool,
    pub person_present: bool,
    pub status: SafetyStatus,
}

impl From<&SensorReport> for SampleRecord {
    fn from(report: &SensorReport) -> Self {
        Self {
            timestamp: report.timestamp.clone(),
            temperature: report.temperature,
            humidity: report.humidity,
            button: report.button != 0,
            abnormal_movement: report.abnormal_movement != 0,
            sound_alert: report.sound_alert != 0,
            person_present: report.person_present != 0,
            status: report.status,
        }
    }
}

impl SampleRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(7)?;
        let status = status
            .parse::<SafetyStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
        Ok(Self {
            timestamp: row.get(0)?,
            temperature: row.get(1)?,
            humidity: row.get(2)?,
            button: row.get::<_, i64>(3)? != 0,
            abnormal_movement: row.get::<_, i64>(4)? != 0,
            sound_alert: row.get::<_, i64>(5)? != 0,
            person_present: row.get::<_, i64>(6)? != 0,
            status,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT ts, temperature, humidity, button, abnormal_movement, \
     sound_alert, person_present, status FROM samples";

/// SQLite-backed sample table.
#[derive(Debug)]
pub struct SampleStore {
    db: Connection,
}

impl SampleStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> PersistenceResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> PersistenceResult<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS samples (
                ts TEXT NOT NULL,
                temperature REAL,
                humidity REAL,
                button INTEGER NOT NULL,
                abnormal_movement INTEGER NOT NULL,
                sound_alert INTEGER NOT NULL,
                person_present INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { db })
    }

    /// Append one sample.
    pub fn append(&self, record: &SampleRecord) -> PersistenceResult<()> {
        self.db.execute(
            "INSERT INTO samples (ts, temperature, humidity, button, abnormal_movement, \
             sound_alert, person_present, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.timestamp,
                record.temperature,
                record.humidity,
                record.button as i64,
                record.abnormal_movement as i64,
                record.sound_alert as i64,
                record.person_present as i64,
                record.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Most recently appended sample.
    pub fn latest(&self) -> PersistenceResult<Option<SampleRecord>> {
        Ok(self.history(1)?.into_iter().next())
    }

    /// Up to `limit` samples, newest first.
    pub fn history(&self, limit: usize) -> PersistenceResult<Vec<SampleRecord>> {
        let mut stmt = self
            .db
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY rowid DESC LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit as i64], SampleRecord::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Number of stored samples.
    pub fn count(&self) -> PersistenceResult<u64> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Event sink that persists `sensor_data` events.
pub struct PersistenceSink {
    tx: Mutex<Option<SyncSender<SampleRecord>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceSink {
    /// Move `store` onto a writer thread fed by a queue of `capacity` samples.
    pub fn spawn(store: SampleStore, capacity: usize) -> PersistenceResult<Self> {
        let (tx, rx) = mpsc::sync_channel::<SampleRecord>(capacity);
        let writer = thread::Builder::new()
            .name("vigil-persist".into())
            .spawn(move || {
                for record in rx {
                    if let Err(e) = store.append(&record) {
                        error!(error = %e, ts = %record.timestamp, "failed to persist sample");
                    }
                }
                debug!("persistence writer stopped");
            })?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Stop accepting samples and wait until the queue is written out.
    pub fn close(&self) {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer {
            if writer.join().is_err() {
                error!("persistence writer panicked");
            } else {
                info!("persistence writer flushed");
            }
        }
    }
}

impl EventSink for PersistenceSink {
    fn name(&self) -> &str {
        "persistence"
    }

    fn deliver(&self, event: &GatewayEvent) -> Result<Delivery, SinkError> {
        let GatewayEvent::SensorData(report) = event else {
            return Ok(Delivery::Skipped);
        };
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(SinkError::Closed);
        };
        match tx.try_send(SampleRecord::from(report)) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(TrySendError::Full(_)) => {
                warn!("persistence queue full; sample dropped");
                Ok(Delivery::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Closed),
        }
    }
}
