use std::collections::HashSet;

use tracing::{info, warn};

use crate::errors::RegistryError;
use crate::models::{HasId, ParticipantDraft, ParticipantRecord};

/// Ordered participant list owned by the session.
#[derive(Debug, Default, Clone)]
pub struct ParticipantRegistry {
    records: Vec<ParticipantRecord>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[ParticipantRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ParticipantRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, record: ParticipantRecord) -> Result<(), RegistryError> {
        record.validate()?;
        if self.contains(&record.id) {
            return Err(RegistryError::DuplicateId(record.id));
        }
        info!("Added participant {} ({})", record.name, record.id);
        self.records.push(record);
        Ok(())
    }

    /// Validates a manual entry and stores it under a timestamp id.
    pub fn add_draft(
        &mut self,
        draft: ParticipantDraft,
    ) -> Result<&ParticipantRecord, RegistryError> {
        draft.validate()?;
        let id = self.next_manual_id(chrono::Utc::now().timestamp_millis());
        let record = draft.into_record(id)?;
        self.add(record)?;
        Ok(&self.records[self.records.len() - 1])
    }

    /// Appends imported records in order. Records whose id is already present,
    /// or with a blank name or time, are skipped. Returns how many were added.
    pub fn extend(&mut self, records: impl IntoIterator<Item = ParticipantRecord>) -> usize {
        let mut seen: HashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
        let mut added = 0usize;
        for record in records {
            if let Err(err) = record.validate() {
                warn!("Skipping participant {}: {}", record.id, err);
                continue;
            }
            if !seen.insert(record.id.clone()) {
                warn!("Skipping participant {} with duplicate id {}", record.name, record.id);
                continue;
            }
            self.records.push(record);
            added += 1;
        }
        info!("Bulk added {} participants, total {}", added, self.records.len());
        added
    }

    pub fn remove(&mut self, id: &str) -> Option<ParticipantRecord> {
        let index = self.records.iter().position(|record| record.id() == id)?;
        let removed = self.records.remove(index);
        info!("Removed participant {} ({})", removed.name, removed.id);
        Some(removed)
    }

    /// Swaps in an edited record with the same id, keeping its position.
    pub fn replace(
        &mut self,
        record: ParticipantRecord,
    ) -> Result<ParticipantRecord, RegistryError> {
        record.validate()?;
        let slot = self
            .records
            .iter_mut()
            .find(|existing| existing.id == record.id)
            .ok_or_else(|| RegistryError::NotFound(record.id.clone()))?;
        Ok(std::mem::replace(slot, record))
    }

    pub fn clear(&mut self) {
        info!("Cleared {} participants", self.records.len());
        self.records.clear();
    }

    /// Records whose id is in `ids`, in registry order.
    pub fn select<'a>(&'a self, ids: &HashSet<String>) -> Vec<&'a ParticipantRecord> {
        self.records
            .iter()
            .filter(|record| ids.contains(&record.id))
            .collect()
    }

    fn next_manual_id(&self, timestamp: i64) -> String {
        let base = timestamp.to_string();
        if !self.contains(&base) {
            return base;
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !self.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
