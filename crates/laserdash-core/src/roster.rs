use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::authority::Role;
use crate::error::Rejection;
use crate::participant::{Participant, ParticipantId, name_hash};
use crate::timer::Timer;

/// Default number of roster seats.
pub const DEFAULT_ROSTER_CAPACITY: usize = 4;
/// How long a full resync pass holds the sync-in-progress flag (seconds).
pub const DEFAULT_SYNC_HOLD: f32 = 1.0;

/// One occupied roster seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub participant: ParticipantId,
    pub name_hash: u32,
    pub display_name: String,
}

/// A one-shot roster change announced by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterNotice {
    Add {
        participant: ParticipantId,
        display_name: String,
        slot: usize,
    },
    Remove {
        participant: ParticipantId,
    },
    /// Empty the roster. Opens every full resync so observers drop seats
    /// whose leave notice they never received.
    Reset,
}

/// Fixed-capacity slot table plus an identity -> slot index.
///
/// A participant occupies at most one slot. New occupants take the lowest
/// free index and are never moved while they stay.
#[derive(Debug, Clone)]
pub struct RosterTable {
    slots: Vec<Option<RosterSlot>>,
    index: HashMap<ParticipantId, usize>,
}

impl Default for RosterTable {
    fn default() -> Self {
        Self::new(DEFAULT_ROSTER_CAPACITY)
    }
}

impl RosterTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            index: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn slot_of(&self, id: ParticipantId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn slot(&self, index: usize) -> Option<&RosterSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Occupied slots in slot order.
    pub fn occupants(&self) -> impl Iterator<Item = (usize, &RosterSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.occupants().map(|(_, s)| s.participant).collect()
    }

    /// Seat `id` in the lowest free slot. Returns `Ok(None)` when already
    /// seated (no-op) and `Ok(Some(slot))` for a fresh seat.
    pub fn add(
        &mut self,
        id: ParticipantId,
        display_name: &str,
    ) -> Result<Option<usize>, Rejection> {
        if self.contains(id) {
            return Ok(None);
        }
        let free = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Rejection::RosterFull)?;
        self.seat(free, id, display_name);
        Ok(Some(free))
    }

    /// Seat `id` at a specific slot if it is free, otherwise fall back to the
    /// lowest free slot. Used by observers mirroring the authority's layout.
    pub fn add_at(
        &mut self,
        preferred: usize,
        id: ParticipantId,
        display_name: &str,
    ) -> Result<Option<usize>, Rejection> {
        if self.contains(id) {
            return Ok(None);
        }
        if matches!(self.slots.get(preferred), Some(None)) {
            self.seat(preferred, id, display_name);
            return Ok(Some(preferred));
        }
        self.add(id, display_name)
    }

    fn seat(&mut self, slot: usize, id: ParticipantId, display_name: &str) {
        self.slots[slot] = Some(RosterSlot {
            participant: id,
            name_hash: name_hash(display_name),
            display_name: display_name.to_string(),
        });
        self.index.insert(id, slot);
    }

    /// Release the slot held by `id`. Absent identities are a no-op.
    pub fn remove(&mut self, id: ParticipantId) -> Option<usize> {
        let slot = self.index.remove(&id)?;
        self.slots[slot] = None;
        Some(slot)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.index.clear();
    }

    /// Apply an authority notice to an observer's view. Idempotent.
    ///
    /// The authority's slot wins: an add naming a different slot than the
    /// one held moves the participant there, evicting whoever sits in it.
    pub fn apply_notice(&mut self, notice: &RosterNotice) {
        match notice {
            RosterNotice::Add {
                participant,
                display_name,
                slot,
            } => {
                let slot = *slot;
                if slot < self.capacity() && self.slot_of(*participant) != Some(slot) {
                    self.remove(*participant);
                    if let Some(evicted) = self.slot(slot).map(|s| s.participant) {
                        tracing::debug!(participant = evicted, slot, "evicted by roster add");
                        self.remove(evicted);
                    }
                }
                if let Err(e) = self.add_at(slot, *participant, display_name) {
                    tracing::warn!(participant, error = %e, "dropping roster add");
                }
            },
            RosterNotice::Remove { participant } => {
                self.remove(*participant);
            },
            RosterNotice::Reset => self.clear(),
        }
    }
}

/// Authority-side roster owner. Keeps the slot table consistent with the
/// live connection list without trusting join/leave notices to arrive once
/// or in order.
#[derive(Debug, Clone)]
pub struct RosterSync {
    role: Role,
    table: RosterTable,
    sync_hold: f32,
    sync_flag: Timer,
    last_live_count: Option<usize>,
}

impl RosterSync {
    pub fn new(role: Role, capacity: usize, sync_hold: f32) -> Self {
        Self {
            role,
            table: RosterTable::new(capacity),
            sync_hold,
            sync_flag: Timer::expired(),
            last_live_count: None,
        }
    }

    pub fn table(&self) -> &RosterTable {
        &self.table
    }

    pub fn is_syncing(&self) -> bool {
        !self.sync_flag.is_expired()
    }

    /// Advance the sync-in-progress hold.
    pub fn tick(&mut self, dt: f32) {
        if self.sync_flag.tick(dt) {
            tracing::debug!("roster sync flag released");
        }
    }

    pub fn add(&mut self, participant: &Participant) -> Result<Vec<RosterNotice>, Rejection> {
        self.role.require("roster add")?;
        match self.table.add(participant.id, &participant.display_name)? {
            Some(slot) => {
                tracing::debug!(participant = participant.id, slot, "roster add");
                Ok(vec![RosterNotice::Add {
                    participant: participant.id,
                    display_name: participant.display_name.clone(),
                    slot,
                }])
            },
            None => Ok(Vec::new()),
        }
    }

    pub fn remove(&mut self, id: ParticipantId) -> Result<Vec<RosterNotice>, Rejection> {
        self.role.require("roster remove")?;
        Ok(match self.table.remove(id) {
            Some(slot) => {
                tracing::debug!(participant = id, slot, "roster remove");
                vec![RosterNotice::Remove { participant: id }]
            },
            None => Vec::new(),
        })
    }

    /// Rebuild the roster from the live connection list. The pass is
    /// announced as a `Reset` followed by one `Add` per seated identity, so
    /// an observer that applies it ends up with this exact layout. Requests
    /// arriving while a pass is held collapse into the one already done.
    pub fn request_full_resync(
        &mut self,
        live: &[Participant],
    ) -> Result<Vec<RosterNotice>, Rejection> {
        self.role.require("full resync")?;
        if self.is_syncing() {
            tracing::debug!("resync already in progress, skipping");
            return Ok(Vec::new());
        }
        self.sync_flag = Timer::new(self.sync_hold);

        self.release_stale(live);
        let previous: HashMap<ParticipantId, usize> = self
            .table
            .occupants()
            .map(|(slot, s)| (s.participant, slot))
            .collect();
        self.table.clear();

        // Survivors keep their seats; newcomers fill the gaps in live order.
        for p in live {
            if let Some(&slot) = previous.get(&p.id) {
                let _ = self.table.add_at(slot, p.id, &p.display_name);
            }
        }
        for p in live {
            if !previous.contains_key(&p.id)
                && let Err(e) = self.table.add(p.id, &p.display_name)
            {
                tracing::warn!(participant = p.id, error = %e, "live participant left unseated");
            }
        }

        let mut notices = vec![RosterNotice::Reset];
        notices.extend(self.table.occupants().map(|(slot, s)| RosterNotice::Add {
            participant: s.participant,
            display_name: s.display_name.clone(),
            slot,
        }));
        self.last_live_count = Some(live.len());
        tracing::info!(seated = self.table.len(), "roster resynced");
        Ok(notices)
    }

    /// Release every slot whose occupant is no longer live, synthesizing the
    /// leave notice locally.
    pub fn correct_drift(&mut self, live: &[Participant]) -> Result<Vec<RosterNotice>, Rejection> {
        self.role.require("drift correction")?;
        Ok(self.release_stale(live))
    }

    /// Compare the live count against the last one observed. Growth triggers
    /// a full resync; shrinkage triggers drift correction.
    pub fn observe_live(&mut self, live: &[Participant]) -> Result<Vec<RosterNotice>, Rejection> {
        self.role.require("live count check")?;
        let count = live.len();
        let previous = self.last_live_count.replace(count);
        match previous {
            Some(prev) if count > prev => {
                tracing::debug!(prev, count, "live count grew");
                self.request_full_resync(live)
            },
            Some(prev) if count < prev => {
                tracing::debug!(prev, count, "live count shrank");
                self.correct_drift(live)
            },
            Some(_) => Ok(Vec::new()),
            None => self.request_full_resync(live),
        }
    }

    fn release_stale(&mut self, live: &[Participant]) -> Vec<RosterNotice> {
        let stale: Vec<ParticipantId> = self
            .table
            .ids()
            .into_iter()
            .filter(|id| !live.iter().any(|p| p.id == *id))
            .collect();
        stale
            .into_iter()
            .filter_map(|id| {
                self.table.remove(id)?;
                tracing::warn!(participant = id, "roster desync healed, synthesizing leave");
                Some(RosterNotice::Remove { participant: id })
            })
            .collect()
    }
}
