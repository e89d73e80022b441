//! Plan mirror types
//!
//! A [`Plan`] owns an ordered sequence of [`PlanDate`]s, each of which owns an
//! ordered sequence of [`PlanActivity`]s. Both sequences are kept sorted by
//! their identity key; the entity store in `plansync-core` is the only writer.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use super::key::ActivityKey;
use super::VoteType;
use crate::constants::SEED_ACTIVITY_KEY;

/// Plan identity and naming, issued by the persisted store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    /// Invite code
    #[serde(alias = "planId")]
    pub id: String,
    #[serde(rename = "planName", alias = "name")]
    pub name: String,
    pub created_by: String,
}

/// Address of one activity: its owning day plus its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRef {
    pub date: NaiveDate,
    pub key: ActivityKey,
}

impl ActivityRef {
    pub const fn new(date: NaiveDate, key: ActivityKey) -> Self {
        Self { date, key }
    }
}

impl std::fmt::Display for ActivityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.date, self.key)
    }
}

/// One free-text item with up/down votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanActivity {
    pub id: ActivityKey,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_text: Option<String>,
    #[serde(default)]
    pub up_voters: BTreeSet<String>,
    #[serde(default)]
    pub down_voters: BTreeSet<String>,
}

impl PlanActivity {
    pub fn new(id: ActivityKey, created_by: impl Into<String>) -> Self {
        Self {
            id,
            created_by: created_by.into(),
            activity_text: None,
            up_voters: BTreeSet::new(),
            down_voters: BTreeSet::new(),
        }
    }

    /// The empty activity every new date starts with.
    pub fn seed(created_by: impl Into<String>) -> Self {
        Self::new(ActivityKey::new(SEED_ACTIVITY_KEY), created_by)
    }

    pub fn text(&self) -> &str {
        self.activity_text.as_deref().unwrap_or("")
    }

    /// Current vote of `user` on this activity.
    pub fn vote_of(&self, user: &str) -> VoteType {
        if self.up_voters.contains(user) {
            VoteType::Up
        } else if self.down_voters.contains(user) {
            VoteType::Down
        } else {
            VoteType::None
        }
    }

    /// Apply a vote click with toggle semantics and return the resulting vote.
    ///
    /// Clicking the vote the user already holds clears it; clicking the other
    /// one moves the user across. `VoteType::None` clears both.
    pub fn apply_vote(&mut self, voter: &str, vote: VoteType) -> VoteType {
        let current = self.vote_of(voter);
        self.up_voters.remove(voter);
        self.down_voters.remove(voter);

        let next = if vote == current { VoteType::None } else { vote };
        match next {
            VoteType::Up => {
                self.up_voters.insert(voter.to_string());
            }
            VoteType::Down => {
                self.down_voters.insert(voter.to_string());
            }
            VoteType::None => {}
        }
        next
    }

    /// Overwrite both voter sets wholesale (last writer wins).
    ///
    /// A voter listed in both sets keeps only the up vote.
    pub fn replace_votes(&mut self, up_voters: BTreeSet<String>, mut down_voters: BTreeSet<String>) {
        down_voters.retain(|voter| !up_voters.contains(voter));
        self.up_voters = up_voters;
        self.down_voters = down_voters;
    }
}

/// One calendar day of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PlanDate {
    pub id: NaiveDate,
    pub created_by: String,
    pub activities: Vec<PlanActivity>,
}

impl PlanDate {
    /// A new date holding the seed activity.
    pub fn seeded(id: NaiveDate, created_by: impl Into<String>) -> Self {
        let created_by = created_by.into();
        Self { id, activities: vec![PlanActivity::seed(created_by.clone())], created_by }
    }

    pub fn position_of(&self, key: ActivityKey) -> Option<usize> {
        self.activities.binary_search_by(|activity| activity.id.cmp(&key)).ok()
    }

    pub fn activity(&self, key: ActivityKey) -> Option<&PlanActivity> {
        self.position_of(key).map(|idx| &self.activities[idx])
    }

    pub fn activity_mut(&mut self, key: ActivityKey) -> Option<&mut PlanActivity> {
        self.position_of(key).map(move |idx| &mut self.activities[idx])
    }

    pub fn keys(&self) -> impl Iterator<Item = ActivityKey> + '_ {
        self.activities.iter().map(|activity| activity.id)
    }
}

/// The shared calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub metadata: PlanMetadata,
    pub dates: Vec<PlanDate>,
}

impl Plan {
    /// Build a plan whose dates each hold the seed activity.
    ///
    /// Days are sorted and de-duplicated.
    pub fn seeded(metadata: PlanMetadata, days: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut days: Vec<NaiveDate> = days.into_iter().collect();
        days.sort_unstable();
        days.dedup();
        let created_by = metadata.created_by.clone();
        let dates = days.into_iter().map(|day| PlanDate::seeded(day, created_by.clone())).collect();
        Self { metadata, dates }
    }

    pub fn position_of(&self, day: NaiveDate) -> Option<usize> {
        self.dates.binary_search_by(|date| date.id.cmp(&day)).ok()
    }

    pub fn date(&self, day: NaiveDate) -> Option<&PlanDate> {
        self.position_of(day).map(|idx| &self.dates[idx])
    }

    pub fn date_mut(&mut self, day: NaiveDate) -> Option<&mut PlanDate> {
        self.position_of(day).map(move |idx| &mut self.dates[idx])
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().map(|date| date.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn metadata() -> PlanMetadata {
        PlanMetadata { id: "invite-1".into(), name: "Lisbon".into(), created_by: "alice".into() }
    }

    #[test]
    fn seeded_plan_sorts_and_dedups_days() {
        let plan =
            Plan::seeded(metadata(), vec![day("2025-01-03"), day("2025-01-01"), day("2025-01-03")]);
        let days: Vec<_> = plan.days().collect();
        assert_eq!(days, vec![day("2025-01-01"), day("2025-01-03")]);
        assert!(plan.dates.iter().all(|d| d.activities.len() == 1));
        assert_eq!(plan.dates[0].activities[0].id, ActivityKey::new(0.0));
        assert_eq!(plan.dates[0].created_by, "alice");
    }

    #[test]
    fn vote_toggle_clears_on_second_click() {
        let mut activity = PlanActivity::seed("alice");
        assert_eq!(activity.apply_vote("bob", VoteType::Up), VoteType::Up);
        assert!(activity.up_voters.contains("bob"));
        assert_eq!(activity.apply_vote("bob", VoteType::Up), VoteType::None);
        assert!(!activity.up_voters.contains("bob"));
        assert!(!activity.down_voters.contains("bob"));
    }

    #[test]
    fn switching_vote_moves_voter_between_sets() {
        let mut activity = PlanActivity::seed("alice");
        activity.apply_vote("bob", VoteType::Down);
        assert_eq!(activity.apply_vote("bob", VoteType::Up), VoteType::Up);
        assert!(activity.up_voters.contains("bob"));
        assert!(!activity.down_voters.contains("bob"));
        assert_eq!(activity.apply_vote("bob", VoteType::None), VoteType::None);
        assert_eq!(activity.vote_of("bob"), VoteType::None);
    }

    #[test]
    fn replace_votes_never_leaves_voter_in_both_sets() {
        let mut activity = PlanActivity::seed("alice");
        let up: BTreeSet<String> = ["bob".to_string()].into_iter().collect();
        let down: BTreeSet<String> = ["bob".to_string(), "carol".to_string()].into_iter().collect();
        activity.replace_votes(up, down);
        assert_eq!(activity.vote_of("bob"), VoteType::Up);
        assert_eq!(activity.vote_of("carol"), VoteType::Down);
    }

    #[test]
    fn activity_ref_displays_day_and_key() {
        let at = ActivityRef::new(day("2025-01-05"), ActivityKey::new(1500.0));
        assert_eq!(at.to_string(), "2025-01-05#1500");
    }

    #[test]
    fn plan_date_serializes_iso_day_and_camel_case() {
        let date = PlanDate::seeded(day("2025-01-05"), "alice");
        let json = serde_json::to_value(&date).unwrap();
        assert_eq!(json["id"], "2025-01-05");
        assert_eq!(json["createdBy"], "alice");
        assert_eq!(json["activities"][0]["upVoters"], serde_json::json!([]));
    }

    #[test]
    fn metadata_accepts_store_field_names() {
        let parsed: PlanMetadata = serde_json::from_str(
            r#"{"planId":"abc","planName":"Trip","createdBy":"alice"}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, "abc");
        assert_eq!(parsed.name, "Trip");
    }
}
