use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CourseIdx};
use crate::error::ScheduleError;
use crate::students::StudentStore;

pub const REQUIRED_WEIGHT: f64 = 1000.0;
pub const BACKUP_PENALTY: f64 = 0.5;

/// How a course that is both required and preferred is weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredOverlap {
    /// Only the required weight counts.
    #[default]
    Precedence,
    /// Required weight plus the preference weight.
    Sum,
}

/// How a course spanning several periods is enrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiSlotPolicy {
    /// One enrollment unit across the course's periods: a required course sums its
    /// period variables to exactly 1.
    #[default]
    AnySlot,
    /// The course is taken as a block: all period variables move together.
    AllSlots,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeightConfig {
    pub required_weight: f64,
    pub backup_penalty: f64,
    pub overlap: RequiredOverlap,
    pub multi_slot: MultiSlotPolicy,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            required_weight: REQUIRED_WEIGHT,
            backup_penalty: BACKUP_PENALTY,
            overlap: RequiredOverlap::default(),
            multi_slot: MultiSlotPolicy::default(),
        }
    }
}

impl WeightConfig {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !self.required_weight.is_finite() || self.required_weight <= 0.0 {
            return Err(ScheduleError::config(format!(
                "required weight must be positive, got {}",
                self.required_weight
            )));
        }
        if !self.backup_penalty.is_finite() || self.backup_penalty < 0.0 {
            return Err(ScheduleError::config(format!(
                "backup penalty must be non-negative, got {}",
                self.backup_penalty
            )));
        }
        Ok(())
    }
}

/// Preference tier of a course for one student, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Required,
    Primary,
    Backup,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightEntry {
    pub course: CourseIdx,
    pub tier: Tier,
    pub weight: f64,
}

/// Soft weight of a preference given the course's grade weight.
pub fn preference_weight(grade_weight: f64, tier: Tier, backup_penalty: f64) -> f64 {
    match tier {
        Tier::Backup => (grade_weight - backup_penalty).max(0.0),
        _ => grade_weight,
    }
}

/// Weights for every course each student references, aligned with
/// [`StudentStore::referenced_courses`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    rows: Vec<Vec<WeightEntry>>,
}

impl WeightTable {
    pub fn compute(
        catalog: &Catalog,
        store: &StudentStore,
        config: &WeightConfig,
    ) -> Result<Self, ScheduleError> {
        let rows: Vec<Vec<WeightEntry>> = store
            .students()
            .iter()
            .map(|profile| {
                profile
                    .referenced
                    .iter()
                    .map(|&course| {
                        let grade_weight = catalog.grade_weight(course, profile.grade());
                        let preference = if profile.is_primary(course) {
                            Some((Tier::Primary, grade_weight))
                        } else if profile.is_backup(course) {
                            Some((
                                Tier::Backup,
                                preference_weight(grade_weight, Tier::Backup, config.backup_penalty),
                            ))
                        } else {
                            None
                        };

                        if profile.is_required(course) {
                            let extra = match (config.overlap, preference) {
                                (RequiredOverlap::Sum, Some((_, w))) => w,
                                _ => 0.0,
                            };
                            WeightEntry {
                                course,
                                tier: Tier::Required,
                                weight: config.required_weight + extra,
                            }
                        } else {
                            // referenced courses are required or preferred
                            let (tier, weight) = preference.unwrap_or((Tier::Backup, 0.0));
                            WeightEntry {
                                course,
                                tier,
                                weight,
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        let table = Self { rows };
        table.check_dominance(catalog, store, config)?;
        info!(
            "Computed {} weights for {} students",
            table.rows.iter().map(Vec::len).sum::<usize>(),
            table.rows.len()
        );
        Ok(table)
    }

    /// A required course must outweigh any single preference, whose weight is
    /// repeated on every period it can fill.
    fn check_dominance(
        &self,
        catalog: &Catalog,
        store: &StudentStore,
        config: &WeightConfig,
    ) -> Result<(), ScheduleError> {
        for (profile, row) in store.students().iter().zip(&self.rows) {
            let mut soft_total = 0.0;
            for entry in row.iter().filter(|e| e.tier != Tier::Required) {
                let contribution = entry.weight * catalog.course_slots(entry.course).len() as f64;
                if contribution >= config.required_weight {
                    return Err(ScheduleError::config(format!(
                        "course '{}' is worth {} to grade {} but the required weight is only {}",
                        catalog.course(entry.course).id,
                        contribution,
                        profile.grade(),
                        config.required_weight
                    )));
                }
                soft_total += contribution;
            }
            if soft_total >= config.required_weight {
                warn!(
                    "Required weight {} does not dominate the soft preferences of student {} (total {})",
                    config.required_weight,
                    profile.id(),
                    soft_total
                );
            }
        }
        Ok(())
    }

    /// Entries of one student, in referenced-course order.
    pub fn entries(&self, student: usize) -> &[WeightEntry] {
        &self.rows[student]
    }

    pub fn entry(&self, student: usize, course: CourseIdx) -> Option<&WeightEntry> {
        self.rows[student].iter().find(|e| e.course == course)
    }

    pub fn weight(&self, student: usize, course: CourseIdx) -> Option<f64> {
        self.entry(student, course).map(|e| e.weight)
    }

    pub fn tier(&self, student: usize, course: CourseIdx) -> Option<Tier> {
        self.entry(student, course).map(|e| e.tier)
    }
}
