//! New-spot creation modal.
//!
//! Holds the draft while the modal is open. Submitting requires a name and a
//! speed; nothing else is validated. A rejected submit leaves both the modal
//! and the store untouched so the host can show an alert.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::spot::{SpotDraft, WifiSpot};
use crate::store::SpotStore;
use crate::{FinderError, LatLng, Result};

/// Modal state for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalView {
    pub open: bool,
    pub draft: SpotDraft,
}

#[derive(Debug, Clone, Default)]
pub struct CreationModal {
    open: bool,
    draft: SpotDraft,
}

impl CreationModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn draft(&self) -> &SpotDraft {
        &self.draft
    }

    /// Open with the draft as it is ("Add New Spot" button).
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Open with the draft placed at a map position (double-click).
    pub fn open_at(&mut self, position: LatLng) {
        self.draft.lat = position.lat;
        self.draft.lng = position.lng;
        self.open = true;
    }

    pub fn set_name(&mut self, name: &str) {
        self.draft.name = name.to_string();
    }

    /// Raw speed entry, without unit.
    pub fn set_speed(&mut self, speed: &str) {
        self.draft.speed = speed.to_string();
    }

    pub fn set_free(&mut self, is_free: bool) {
        self.draft.is_free = is_free;
    }

    /// Check the required fields.
    pub fn validate(&self) -> Result<()> {
        if self.draft.name.trim().is_empty() {
            return Err(FinderError::InvalidSpot {
                field: "name".to_string(),
                message: "Please fill in all required fields".to_string(),
            });
        }
        if self.draft.speed.trim().is_empty() {
            return Err(FinderError::InvalidSpot {
                field: "speed".to_string(),
                message: "Please fill in all required fields".to_string(),
            });
        }
        Ok(())
    }

    /// Append the draft to the store, then close and reset.
    pub fn submit(&mut self, store: &mut SpotStore, speed_unit: &str) -> Result<WifiSpot> {
        self.validate()?;
        let draft = std::mem::take(&mut self.draft);
        let spot = store.create(draft, speed_unit);
        self.open = false;
        debug!("[CreationModal] Submitted spot {}", spot.id);
        Ok(spot)
    }

    /// Close without touching the store. The draft is kept for next time.
    pub fn cancel(&mut self) {
        self.open = false;
    }

    pub fn view(&self) -> ModalView {
        ModalView {
            open: self.open,
            draft: self.draft.clone(),
        }
    }
}
