//! In-memory `AnchorStore`.

use std::sync::Mutex;

use safereport_contracts::{
    anchor::{AnchorRecord, AnchorStatus},
    error::{EvidenceError, EvidenceResult},
    ids::AnchorId,
};
use safereport_core::traits::AnchorStore;

fn poisoned() -> EvidenceError {
    EvidenceError::StoreFailed {
        reason: "anchor store lock poisoned".to_string(),
    }
}

#[derive(Default)]
pub struct InMemoryAnchorStore {
    anchors: Mutex<Vec<AnchorRecord>>,
}

impl InMemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnchorStore for InMemoryAnchorStore {
    fn insert(&self, anchor: AnchorRecord) -> EvidenceResult<()> {
        let mut anchors = self.anchors.lock().map_err(|_| poisoned())?;
        if anchors.iter().any(|a| a.id == anchor.id) {
            return Err(EvidenceError::StoreFailed {
                reason: format!("anchor {} already exists", anchor.id),
            });
        }
        anchors.push(anchor);
        Ok(())
    }

    fn get(&self, anchor_id: &AnchorId) -> EvidenceResult<Option<AnchorRecord>> {
        let anchors = self.anchors.lock().map_err(|_| poisoned())?;
        Ok(anchors.iter().find(|a| a.id == *anchor_id).cloned())
    }

    fn all(&self) -> EvidenceResult<Vec<AnchorRecord>> {
        Ok(self.anchors.lock().map_err(|_| poisoned())?.clone())
    }

    fn replace_if_status(
        &self,
        anchor: AnchorRecord,
        expected: AnchorStatus,
    ) -> EvidenceResult<bool> {
        let mut anchors = self.anchors.lock().map_err(|_| poisoned())?;
        match anchors.iter_mut().find(|a| a.id == anchor.id) {
            Some(current) if current.status == expected => {
                *current = anchor;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(EvidenceError::NotFound {
                what: format!("anchor {}", anchor.id),
            }),
        }
    }
}
