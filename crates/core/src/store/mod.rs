//! Plan entity store - the local, in-memory mirror of one plan
//!
//! Every mutation is synchronous and either applies completely or returns a
//! [`Rejection`] without touching state. Two invariants always hold: the plan
//! keeps at least one date, and every date keeps at least one activity.

pub mod change;
pub mod snapshot;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use plansync_domain::{
    ActivityKey, ActivityRef, InsertDirection, Plan, PlanActivity, PlanDate, Rejection, VoteType,
};
use tracing::debug;

pub use change::PlanChange;
pub use snapshot::assemble_plan;

use crate::ordering::{day_beside, key_beside};

#[derive(Debug, Clone)]
pub struct PlanStore {
    plan: Plan,
}

impl PlanStore {
    pub fn new(plan: Plan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn plan_id(&self) -> &str {
        &self.plan.metadata.id
    }

    pub fn date(&self, day: NaiveDate) -> Option<&PlanDate> {
        self.plan.date(day)
    }

    pub fn activity(&self, at: ActivityRef) -> Option<&PlanActivity> {
        self.plan.date(at.date)?.activity(at.key)
    }

    pub fn contains_activity(&self, at: ActivityRef) -> bool {
        self.activity(at).is_some()
    }

    /// Swap in a freshly fetched plan.
    pub fn replace(&mut self, plan: Plan) {
        self.plan = plan;
    }

    /// Insert a new date next to `anchor`, holding one empty seed activity.
    ///
    /// # Errors
    /// [`Rejection::DateExists`] when the adjacent day is already planned,
    /// [`Rejection::UnknownDate`] when `anchor` is not part of the plan.
    pub fn insert_date(
        &mut self,
        anchor: NaiveDate,
        direction: InsertDirection,
        created_by: &str,
    ) -> Result<PlanDate, Rejection> {
        let days: Vec<NaiveDate> = self.plan.days().collect();
        let target = day_beside(&days, anchor, direction)?;
        let date = PlanDate::seeded(target, created_by);
        self.place_date(date.clone());
        Ok(date)
    }

    /// Insert a date announced by a peer. Duplicate deliveries are no-ops.
    pub fn insert_date_at(&mut self, day: NaiveDate, created_by: &str) -> Option<PlanChange> {
        if self.plan.position_of(day).is_some() {
            debug!(%day, "Date already present, ignoring insert");
            return None;
        }
        self.place_date(PlanDate::seeded(day, created_by));
        Some(PlanChange::DateInserted { date: day })
    }

    /// # Errors
    /// [`Rejection::AtLeastOneDate`] for the last remaining date,
    /// [`Rejection::UnknownDate`] when `day` is not planned.
    pub fn remove_date(&mut self, day: NaiveDate) -> Result<PlanChange, Rejection> {
        let idx = self.plan.position_of(day).ok_or(Rejection::UnknownDate)?;
        if self.plan.dates.len() <= 1 {
            return Err(Rejection::AtLeastOneDate);
        }
        self.plan.dates.remove(idx);
        Ok(PlanChange::DateRemoved { date: day })
    }

    /// Insert a new empty activity next to `anchor` within `date`.
    ///
    /// # Errors
    /// [`Rejection::UnknownDate`] / [`Rejection::UnknownActivity`] for a
    /// missing target, [`Rejection::KeySpaceExhausted`] when no key fits.
    pub fn insert_activity(
        &mut self,
        date: NaiveDate,
        anchor: ActivityKey,
        direction: InsertDirection,
        created_by: &str,
    ) -> Result<PlanActivity, Rejection> {
        let plan_date = self.plan.date_mut(date).ok_or(Rejection::UnknownDate)?;
        let keys: Vec<ActivityKey> = plan_date.keys().collect();
        let key = key_beside(&keys, anchor, direction)?;
        let activity = PlanActivity::new(key, created_by);
        place_activity(plan_date, activity.clone());
        Ok(activity)
    }

    /// Insert an activity announced by a peer. `Ok(None)` for a duplicate.
    ///
    /// # Errors
    /// [`Rejection::UnknownDate`] when the parent date is not planned.
    pub fn insert_activity_at(
        &mut self,
        at: ActivityRef,
        created_by: &str,
    ) -> Result<Option<PlanChange>, Rejection> {
        let plan_date = self.plan.date_mut(at.date).ok_or(Rejection::UnknownDate)?;
        if plan_date.position_of(at.key).is_some() {
            debug!(%at, "Activity already present, ignoring insert");
            return Ok(None);
        }
        place_activity(plan_date, PlanActivity::new(at.key, created_by));
        Ok(Some(PlanChange::ActivityInserted { at }))
    }

    /// # Errors
    /// [`Rejection::AtLeastOneActivity`] for the last activity of a date,
    /// [`Rejection::UnknownDate`] / [`Rejection::UnknownActivity`] otherwise.
    pub fn remove_activity(&mut self, at: ActivityRef) -> Result<PlanChange, Rejection> {
        let plan_date = self.plan.date_mut(at.date).ok_or(Rejection::UnknownDate)?;
        let idx = plan_date.position_of(at.key).ok_or(Rejection::UnknownActivity)?;
        if plan_date.activities.len() <= 1 {
            return Err(Rejection::AtLeastOneActivity);
        }
        plan_date.activities.remove(idx);
        Ok(PlanChange::ActivityRemoved { at })
    }

    /// Replace an activity's text in place. Its position never changes.
    ///
    /// # Errors
    /// [`Rejection::UnknownDate`] / [`Rejection::UnknownActivity`].
    pub fn set_activity_text(
        &mut self,
        at: ActivityRef,
        text: &str,
        is_final: bool,
    ) -> Result<PlanChange, Rejection> {
        let activity = self.activity_mut(at)?;
        activity.activity_text = Some(text.to_string());
        Ok(PlanChange::ActivityTextChanged { at, is_final })
    }

    /// Apply a vote click with toggle semantics; returns the voter's
    /// resulting vote.
    ///
    /// # Errors
    /// [`Rejection::UnknownDate`] / [`Rejection::UnknownActivity`].
    pub fn set_vote(
        &mut self,
        at: ActivityRef,
        voter: &str,
        vote: VoteType,
    ) -> Result<VoteType, Rejection> {
        Ok(self.activity_mut(at)?.apply_vote(voter, vote))
    }

    /// Overwrite both voter sets (last writer wins).
    ///
    /// # Errors
    /// [`Rejection::UnknownDate`] / [`Rejection::UnknownActivity`].
    pub fn replace_votes(
        &mut self,
        at: ActivityRef,
        up_voters: BTreeSet<String>,
        down_voters: BTreeSet<String>,
    ) -> Result<PlanChange, Rejection> {
        self.activity_mut(at)?.replace_votes(up_voters, down_voters);
        Ok(PlanChange::VotesChanged { at })
    }

    fn activity_mut(&mut self, at: ActivityRef) -> Result<&mut PlanActivity, Rejection> {
        self.plan
            .date_mut(at.date)
            .ok_or(Rejection::UnknownDate)?
            .activity_mut(at.key)
            .ok_or(Rejection::UnknownActivity)
    }

    fn place_date(&mut self, date: PlanDate) {
        let idx = self.plan.dates.partition_point(|existing| existing.id < date.id);
        self.plan.dates.insert(idx, date);
    }
}

fn place_activity(plan_date: &mut PlanDate, activity: PlanActivity) {
    let idx = plan_date.activities.partition_point(|existing| existing.id < activity.id);
    plan_date.activities.insert(idx, activity);
}
