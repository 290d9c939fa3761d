//! Ordonnanceur coopératif des émissions SSDP.

use std::time::Instant;

use tracing::{debug, trace, warn};

use super::{Progress, Schedule, ScheduleContext};

/// Identifiant stable d'une émission dans l'arène.
///
/// La génération invalide les identifiants dont l'emplacement a été réutilisé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<Schedule>,
}

/// Arène d'émissions, parcourue dans l'ordre d'insertion.
#[derive(Debug)]
pub struct Scheduler {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<ScheduleId>,
    active: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            active: true,
        }
    }

    /// Ajoute une émission. Une émission inactive est refusée.
    pub fn add(&mut self, schedule: Schedule) -> Option<ScheduleId> {
        if !schedule.active {
            warn!("Schedule {} is not active: ignored", schedule.name());
            return None;
        }
        trace!("Adding schedule {} for {}", schedule.name(), schedule.address);
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(schedule);
                ScheduleId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(schedule),
                });
                ScheduleId {
                    index,
                    generation: 0,
                }
            }
        };
        self.order.push(id);
        Some(id)
    }

    pub fn get(&self, id: ScheduleId) -> Option<&Schedule> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn get_mut(&mut self, id: ScheduleId) -> Option<&mut Schedule> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn remove(&mut self, id: ScheduleId) -> Option<Schedule> {
        let entry = self.release(id)?;
        self.order.retain(|other| *other != id);
        Some(entry)
    }

    /// Retire toutes les émissions.
    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.order) {
            self.release(id);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Émissions dans l'ordre d'insertion.
    pub fn iter(&self) -> impl Iterator<Item = (ScheduleId, &Schedule)> {
        self.order
            .iter()
            .filter_map(|id| self.get(*id).map(|entry| (*id, entry)))
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Exécute les émissions échues et retourne le nombre d'exécutions.
    ///
    /// Une émission échue est exécutée puis, si elle a une période et que
    /// `now + période` ne dépasse pas sa fin, reprogrammée à cette date ;
    /// sinon elle est retirée. Un échec d'envoi est journalisé et suit la
    /// même règle, sans nouvel essai immédiat.
    pub fn tick(&mut self, now: Instant, ctx: &mut ScheduleContext<'_>) -> usize {
        if !self.active {
            warn!("Scheduler is inactive");
            return 0;
        }

        let mut processed = 0;
        let mut kept = Vec::with_capacity(self.order.len());
        for id in std::mem::take(&mut self.order) {
            let Some(entry) = self.get_mut(id) else {
                continue;
            };

            if !entry.active {
                debug!("Removing inactive schedule {}", entry.name());
                self.release(id);
                continue;
            }
            if entry.end_time.is_some_and(|end| now > end) {
                debug!("Removing expired schedule {}", entry.name());
                self.release(id);
                continue;
            }
            if !entry.is_due(now) {
                kept.push(id);
                continue;
            }

            processed += 1;
            let outcome = entry.process(ctx);
            let keep = match outcome {
                Ok(Progress::Continue(delay)) => {
                    entry.due_time = now + delay;
                    true
                }
                Ok(Progress::Done) => Self::reschedule(entry, now),
                Err(e) => {
                    warn!("❌ {} to {} failed: {}", entry.name(), entry.address, e);
                    Self::reschedule(entry, now)
                }
            };
            if keep {
                kept.push(id);
            } else {
                self.release(id);
            }
        }
        self.order = kept;
        processed
    }

    fn reschedule(entry: &mut Schedule, now: Instant) -> bool {
        match entry.repeat_interval {
            Some(interval) if entry.can_repeat(now) => {
                entry.due_time = now + interval;
                true
            }
            _ => false,
        }
    }

    /// Libère un emplacement sans toucher à l'ordre de parcours.
    fn release(&mut self, id: ScheduleId) -> Option<Schedule> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(entry)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
