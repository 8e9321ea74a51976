//! The recording collection and its persistence.
//!
//! Recordings live in memory in insertion order and are persisted as one
//! JSON blob under a fixed key: every mutation rewrites the whole
//! collection. Export and import speak the same portable JSON schema, with
//! import doing structural validation so a hand-edited or foreign file can
//! never half-apply.

/// Key-value persistence backends.
pub mod blob;

pub use blob::{BlobStore, FileStore, MemoryStore};

use std::fmt;

use serde_json::Value;

use crate::keyboard::{tuning, PitchClass};
use crate::session::{fresh_id, NoteEvent, Recording};

/// Storage key holding the serialized collection.
pub const STORAGE_KEY: &str = "piano-recordings";

/// Fallback stem for export file names whose sanitized name comes up empty.
const DEFAULT_EXPORT_STEM: &str = "piano-recording";

/// Insertion-ordered collection of recordings with unique ids.
pub struct RecordingStore<S: BlobStore> {
    recordings: Vec<Recording>,
    blobs: S,
}

impl<S: BlobStore> RecordingStore<S> {
    pub fn new(blobs: S) -> Self {
        Self {
            recordings: Vec::new(),
            blobs,
        }
    }

    /// Read the persisted collection. A missing blob is an empty collection;
    /// an unreadable one resets to empty and reports the failure so the
    /// caller can log it. Never fatal.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        self.recordings.clear();

        let Some(raw) = self.blobs.get(STORAGE_KEY) else {
            return Ok(0);
        };

        match serde_json::from_str::<Vec<Recording>>(&raw) {
            Ok(recordings) => {
                self.recordings = recordings;
                Ok(self.recordings.len())
            }
            Err(err) => Err(StoreError::Corrupt(err.to_string())),
        }
    }

    pub fn add(&mut self, recording: Recording) {
        self.recordings.push(recording);
        self.persist();
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.recordings.len();
        self.recordings.retain(|r| r.id != id);
        let removed = self.recordings.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Recording> {
        self.recordings.iter().find(|r| r.id == id)
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn has_recordings(&self) -> bool {
        !self.recordings.is_empty()
    }

    pub fn blobs(&self) -> &S {
        &self.blobs
    }

    /// Parse and validate a recording from foreign JSON, then keep it.
    ///
    /// The imported id is never trusted (a fresh one is minted so an
    /// import can't collide with an existing recording), and the display
    /// name is marked. Note entries missing a usable note, octave or
    /// timestamp are dropped; an import where nothing survives fails.
    /// Nothing is applied on failure.
    pub fn import_one(&mut self, json: &str) -> Result<Recording, ImportError> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| ImportError::Json(err.to_string()))?;
        let object = value
            .as_object()
            .ok_or(ImportError::Shape("expected a recording object"))?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ImportError::Shape("missing name"))?;
        let entries = object
            .get("notes")
            .and_then(Value::as_array)
            .ok_or(ImportError::Shape("notes must be an array"))?;
        let duration = object
            .get("duration")
            .and_then(Value::as_f64)
            .ok_or(ImportError::Shape("duration must be a number"))?;
        let created_at = object
            .get("createdAt")
            .and_then(Value::as_f64)
            .ok_or(ImportError::Shape("createdAt must be a number"))?;

        let mut notes = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let Some(note) = entry
                .get("note")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<PitchClass>().ok())
            else {
                continue;
            };
            let Some(octave) = entry.get("octave").and_then(Value::as_f64) else {
                continue;
            };
            let Some(timestamp) = entry.get("timestamp").and_then(Value::as_f64) else {
                continue;
            };
            let octave = octave as i32;

            let frequency = entry
                .get("frequency")
                .and_then(Value::as_f64)
                .map(|f| f as f32)
                .unwrap_or_else(|| tuning::pitch_frequency(note, octave));

            notes.push(NoteEvent {
                note,
                octave,
                frequency,
                timestamp: timestamp.max(0.0) as u64,
            });
        }

        if notes.is_empty() {
            return Err(ImportError::NoValidNotes);
        }

        let recording = Recording {
            id: fresh_id("imported"),
            name: format!("{name} (Imported)"),
            notes,
            duration: duration.max(0.0) as u64,
            created_at: created_at.max(0.0) as u64,
        };

        self.recordings.push(recording.clone());
        self.persist();
        Ok(recording)
    }

    fn persist(&mut self) {
        match serde_json::to_string_pretty(&self.recordings) {
            Ok(json) => self.blobs.set(STORAGE_KEY, &json),
            Err(err) => log::warn!("cannot serialize recordings: {err}"),
        }
    }
}

/// Canonical pretty-printed JSON for one recording.
pub fn export_one(recording: &Recording) -> String {
    serde_json::to_string_pretty(recording).unwrap_or_else(|err| {
        // Serialization failure falls back to an empty object.
        log::warn!("cannot serialize recording {}: {err}", recording.id);
        String::from("{}")
    })
}

/// Download-style file name: sanitized recording name plus the civil date.
///
/// Sanitization keeps `[A-Za-z0-9 -]` and trims; an empty result falls back
/// to a fixed stem.
pub fn export_file_name(recording: &Recording, now_unix_ms: u64) -> String {
    let sanitized: String = recording
        .name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect();
    let stem = sanitized.trim();
    let stem = if stem.is_empty() { DEFAULT_EXPORT_STEM } else { stem };
    format!("{stem}-{}.json", iso_date(now_unix_ms))
}

/// Unix milliseconds to YYYY-MM-DD (days-to-civil conversion, Hinnant's
/// algorithm).
fn iso_date(unix_ms: u64) -> String {
    let days = (unix_ms / 86_400_000) as i64 + 719_468;
    let era = days.div_euclid(146_097);
    let doe = days.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    format!("{year:04}-{month:02}-{day:02}")
}

/// The persisted collection could not be read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Corrupt(detail) => {
                write!(f, "stored recordings were unreadable: {detail}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Why an import was rejected. Nothing is applied when these are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// Not parseable as JSON at all.
    Json(String),
    /// Parsed, but not shaped like a recording.
    Shape(&'static str),
    /// Structurally a recording, but no entry had a usable
    /// note/octave/timestamp.
    NoValidNotes,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Json(detail) => write!(f, "invalid JSON: {detail}"),
            ImportError::Shape(what) => write!(f, "not a recording: {what}"),
            ImportError::NoValidNotes => write!(f, "no valid notes found in recording"),
        }
    }
}

impl std::error::Error for ImportError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(name: &str) -> Recording {
        Recording {
            id: fresh_id("recording"),
            name: name.to_string(),
            notes: vec![
                NoteEvent {
                    note: PitchClass::A,
                    octave: 4,
                    frequency: 440.0,
                    timestamp: 0,
                },
                NoteEvent {
                    note: PitchClass::Cs,
                    octave: 5,
                    frequency: 554.37,
                    timestamp: 210,
                },
            ],
            duration: 500,
            created_at: 1_700_000_000_000,
        }
    }

    fn store() -> RecordingStore<MemoryStore> {
        RecordingStore::new(MemoryStore::new())
    }

    #[test]
    fn add_persists_the_whole_collection() {
        let mut store = store();
        store.add(recording("First"));
        store.add(recording("Second"));

        let blob = store.blobs().get(STORAGE_KEY).unwrap();
        let parsed: Vec<Recording> = serde_json::from_str(&blob).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "First");
    }

    #[test]
    fn load_round_trips_through_the_blob() {
        let mut first = store();
        first.add(recording("Keeper"));
        let blob = first.blobs().get(STORAGE_KEY).unwrap();

        let mut blobs = MemoryStore::new();
        blobs.set(STORAGE_KEY, &blob);
        let mut second = RecordingStore::new(blobs);

        assert_eq!(second.load().unwrap(), 1);
        assert_eq!(second.recordings()[0].name, "Keeper");
    }

    #[test]
    fn corrupt_blob_resets_to_empty() {
        let mut blobs = MemoryStore::new();
        blobs.set(STORAGE_KEY, "not json at all {");
        let mut store = RecordingStore::new(blobs);

        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_blob_is_an_empty_collection() {
        let mut store = store();
        assert_eq!(store.load().unwrap(), 0);
        assert!(!store.has_recordings());
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut store = store();
        let rec = recording("Doomed");
        let id = rec.id.clone();
        store.add(rec);

        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn export_import_round_trips() {
        let mut store = store();
        let original = recording("Etude");
        let json = export_one(&original);

        let imported = store.import_one(&json).unwrap();
        assert_eq!(imported.notes, original.notes);
        assert_eq!(imported.duration, original.duration);
        assert_eq!(imported.created_at, original.created_at);
        assert_ne!(imported.id, original.id);
        assert_eq!(imported.name, "Etude (Imported)");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn import_rejects_a_bare_name() {
        let mut store = store();
        let err = store.import_one(r#"{"name":"x"}"#).unwrap_err();
        assert!(matches!(err, ImportError::Shape(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn import_rejects_non_json() {
        let mut store = store();
        assert!(matches!(
            store.import_one("certainly not json"),
            Err(ImportError::Json(_))
        ));
    }

    #[test]
    fn import_rejects_non_numeric_duration() {
        let mut store = store();
        let err = store
            .import_one(r#"{"name":"x","notes":[],"duration":"long","createdAt":0}"#)
            .unwrap_err();
        assert_eq!(err, ImportError::Shape("duration must be a number"));
    }

    #[test]
    fn import_filters_unusable_notes() {
        let mut store = store();
        let json = r#"{
            "name": "Sparse",
            "notes": [
                {"note": "A", "octave": 4, "timestamp": 0},
                {"note": "??", "octave": 4, "timestamp": 10},
                {"note": "B", "octave": "four", "timestamp": 20},
                {"note": "C", "octave": 5}
            ],
            "duration": 100,
            "createdAt": 5
        }"#;

        let imported = store.import_one(json).unwrap();
        assert_eq!(imported.notes.len(), 1);
        assert_eq!(imported.notes[0].note, PitchClass::A);
    }

    #[test]
    fn import_with_no_usable_notes_fails() {
        let mut store = store();
        let json = r#"{"name":"Empty","notes":[{"note":"??"}],"duration":1,"createdAt":1}"#;
        assert_eq!(store.import_one(json), Err(ImportError::NoValidNotes));
        assert!(store.is_empty());
    }

    #[test]
    fn import_derives_missing_frequencies() {
        let mut store = store();
        let json = r#"{
            "name": "No freqs",
            "notes": [{"note": "A", "octave": 4, "timestamp": 0}],
            "duration": 100,
            "createdAt": 5
        }"#;

        let imported = store.import_one(json).unwrap();
        assert_eq!(imported.notes[0].frequency, 440.0);
    }

    #[test]
    fn import_tolerates_extra_fields() {
        let mut store = store();
        let json = r#"{
            "name": "Extra",
            "notes": [{"note": "A", "octave": 4, "timestamp": 0, "velocity": 99}],
            "duration": 100,
            "createdAt": 5,
            "appVersion": "2.1"
        }"#;
        assert!(store.import_one(json).is_ok());
    }

    #[test]
    fn export_file_names_are_sanitized() {
        let mut rec = recording("My <Best> Take!");
        // 2023-11-14 22:13:20 UTC
        let now = 1_700_000_000_000;
        assert_eq!(export_file_name(&rec, now), "My Best Take-2023-11-14.json");

        rec.name = "???!!!".into();
        assert_eq!(export_file_name(&rec, now), "piano-recording-2023-11-14.json");
    }

    #[test]
    fn civil_dates_come_out_right() {
        assert_eq!(iso_date(0), "1970-01-01");
        assert_eq!(iso_date(86_400_000), "1970-01-02");
        // Leap day.
        assert_eq!(iso_date(1_582_934_400_000), "2020-02-29");
    }
}
