//! Edit-lock coordinator
//!
//! Advisory, per-activity editing state. Focusing a field takes a local lock
//! that peers see as "`<user>` is typing…"; a peer's lock makes the field
//! read-only here until that peer publishes a final update.
//!
//! Only non-idle activities are tracked; an absent entry is [`LockState::Idle`].

use std::collections::HashMap;

use chrono::NaiveDate;
use plansync_domain::{ActivityRef, Rejection};
use serde::{Deserialize, Serialize};

/// Editing state of one activity's text field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Idle,
    LocalEditing,
    RemoteEditing { by: String },
}

impl LockState {
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the local user may type into the field.
    pub const fn is_editable(&self) -> bool {
        !matches!(self, Self::RemoteEditing { .. })
    }
}

/// What a blur hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurOutcome {
    /// Text to publish with `isFinal = true`.
    pub final_text: String,
    /// State the field lands in; `RemoteEditing` when a peer's lock arrived
    /// while we were typing and is still current.
    pub next_state: LockState,
}

/// Effect of an inbound text update on the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpdate {
    /// Whether the message text may overwrite the visible value.
    pub apply_text: bool,
    /// New state when the update released a remote lock.
    pub new_state: Option<LockState>,
}

#[derive(Debug, Clone)]
struct LockEntry {
    state: LockState,
    draft: String,
    deferred_lock: Option<String>,
}

#[derive(Debug, Default)]
pub struct EditLockCoordinator {
    entries: HashMap<ActivityRef, LockEntry>,
}

impl EditLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, at: ActivityRef) -> LockState {
        self.entries.get(&at).map_or(LockState::Idle, |entry| entry.state.clone())
    }

    pub fn is_local_editing(&self, at: ActivityRef) -> bool {
        matches!(self.entries.get(&at), Some(LockEntry { state: LockState::LocalEditing, .. }))
    }

    /// `"<user> is typing…"` while a peer holds the lock.
    pub fn typing_indicator(&self, at: ActivityRef) -> Option<String> {
        match self.entries.get(&at).map(|entry| &entry.state) {
            Some(LockState::RemoteEditing { by }) => Some(format!("{by} is typing…")),
            _ => None,
        }
    }

    /// Local focus. Returns `true` when the lock is newly taken and must be
    /// broadcast.
    ///
    /// # Errors
    /// [`Rejection::LockedByOther`] while a peer is editing the field.
    pub fn focus(&mut self, at: ActivityRef, current_text: &str) -> Result<bool, Rejection> {
        match self.entries.get(&at).map(|entry| &entry.state) {
            Some(LockState::RemoteEditing { .. }) => Err(Rejection::LockedByOther),
            Some(LockState::LocalEditing) => Ok(false),
            Some(LockState::Idle) | None => {
                self.entries.insert(
                    at,
                    LockEntry {
                        state: LockState::LocalEditing,
                        draft: current_text.to_string(),
                        deferred_lock: None,
                    },
                );
                Ok(true)
            }
        }
    }

    /// Local keystroke. Returns `true` when the change appended a trailing
    /// space, which calls for an intermediate non-final sync.
    ///
    /// # Errors
    /// [`Rejection::LockedByOther`] while a peer is editing the field.
    pub fn edit(&mut self, at: ActivityRef, text: &str) -> Result<bool, Rejection> {
        let Some(entry) = self.entries.get_mut(&at) else {
            return Ok(false);
        };
        match entry.state {
            LockState::RemoteEditing { .. } => Err(Rejection::LockedByOther),
            LockState::Idle => Ok(false),
            LockState::LocalEditing => {
                let appended_space = text.ends_with(' ') && text.len() > entry.draft.len();
                entry.draft.clear();
                entry.draft.push_str(text);
                Ok(appended_space)
            }
        }
    }

    /// Local blur. `None` unless the field was being edited locally.
    pub fn blur(&mut self, at: ActivityRef) -> Option<BlurOutcome> {
        if !self.is_local_editing(at) {
            return None;
        }
        let entry = self.entries.remove(&at)?;
        let next_state = match entry.deferred_lock {
            Some(by) => {
                let state = LockState::RemoteEditing { by };
                self.entries.insert(
                    at,
                    LockEntry { state: state.clone(), draft: String::new(), deferred_lock: None },
                );
                state
            }
            None => LockState::Idle,
        };
        Some(BlurOutcome { final_text: entry.draft, next_state })
    }

    /// A peer's lock notice. Returns the new state when it changed.
    ///
    /// Local editing wins: the notice is remembered and only takes effect on
    /// blur.
    pub fn remote_lock(&mut self, at: ActivityRef, by: &str) -> Option<LockState> {
        if let Some(entry) = self.entries.get_mut(&at) {
            match &entry.state {
                LockState::LocalEditing => {
                    entry.deferred_lock = Some(by.to_string());
                    return None;
                }
                LockState::RemoteEditing { by: holder } if holder == by => return None,
                _ => {}
            }
        }
        let state = LockState::RemoteEditing { by: by.to_string() };
        self.entries.insert(
            at,
            LockEntry { state: state.clone(), draft: String::new(), deferred_lock: None },
        );
        Some(state)
    }

    /// A peer's text update.
    pub fn remote_update(&mut self, at: ActivityRef, by: &str, is_final: bool) -> RemoteUpdate {
        let Some(entry) = self.entries.get_mut(&at) else {
            return RemoteUpdate { apply_text: true, new_state: None };
        };
        match entry.state {
            LockState::LocalEditing => {
                if is_final && entry.deferred_lock.as_deref() == Some(by) {
                    entry.deferred_lock = None;
                }
                RemoteUpdate { apply_text: false, new_state: None }
            }
            LockState::RemoteEditing { .. } if is_final => {
                self.entries.remove(&at);
                RemoteUpdate { apply_text: true, new_state: Some(LockState::Idle) }
            }
            _ => RemoteUpdate { apply_text: true, new_state: None },
        }
    }

    /// Current local drafts, used to keep typed text across a resync.
    pub fn local_drafts(&self) -> impl Iterator<Item = (ActivityRef, &str)> + '_ {
        self.entries.iter().filter_map(|(at, entry)| match entry.state {
            LockState::LocalEditing => Some((*at, entry.draft.as_str())),
            _ => None,
        })
    }

    pub fn forget(&mut self, at: ActivityRef) -> bool {
        self.entries.remove(&at).is_some()
    }

    pub fn forget_date(&mut self, date: NaiveDate) {
        self.entries.retain(|at, _| at.date != date);
    }

    /// Drop every entry whose activity no longer exists.
    pub fn retain_existing(&mut self, mut exists: impl FnMut(ActivityRef) -> bool) {
        self.entries.retain(|at, _| exists(*at));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use plansync_domain::ActivityKey;

    use super::*;

    fn at() -> ActivityRef {
        ActivityRef::new(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(), ActivityKey::new(1000.0))
    }

    #[test]
    fn focus_then_blur_returns_final_text() {
        let mut locks = EditLockCoordinator::new();
        assert_eq!(locks.focus(at(), "Mu"), Ok(true));
        assert_eq!(locks.focus(at(), "Mu"), Ok(false));
        assert_eq!(locks.state(at()), LockState::LocalEditing);
        assert_eq!(locks.edit(at(), "Museum"), Ok(false));

        let outcome = locks.blur(at()).unwrap();
        assert_eq!(outcome.final_text, "Museum");
        assert_eq!(outcome.next_state, LockState::Idle);
        assert!(locks.is_empty());
        assert!(locks.blur(at()).is_none());
    }

    #[test]
    fn appended_trailing_space_requests_intermediate_sync() {
        let mut locks = EditLockCoordinator::new();
        locks.focus(at(), "").unwrap();
        assert_eq!(locks.edit(at(), "Visit"), Ok(false));
        assert_eq!(locks.edit(at(), "Visit "), Ok(true));
        assert_eq!(locks.edit(at(), "Visit t"), Ok(false));
        // Deleting back to a trailing space is not an append.
        assert_eq!(locks.edit(at(), "Visit "), Ok(false));
    }

    #[test]
    fn remote_lock_disables_field_until_final_update() {
        let mut locks = EditLockCoordinator::new();
        assert_eq!(
            locks.remote_lock(at(), "alice"),
            Some(LockState::RemoteEditing { by: "alice".into() })
        );
        assert_eq!(locks.typing_indicator(at()).as_deref(), Some("alice is typing…"));
        assert!(!locks.state(at()).is_editable());
        assert_eq!(locks.focus(at(), ""), Err(Rejection::LockedByOther));

        let interim = locks.remote_update(at(), "alice", false);
        assert_eq!(interim, RemoteUpdate { apply_text: true, new_state: None });

        let last = locks.remote_update(at(), "alice", true);
        assert_eq!(last, RemoteUpdate { apply_text: true, new_state: Some(LockState::Idle) });
        assert!(locks.typing_indicator(at()).is_none());
        assert_eq!(locks.focus(at(), "Museum"), Ok(true));
    }

    #[test]
    fn local_editing_wins_and_defers_remote_lock() {
        let mut locks = EditLockCoordinator::new();
        locks.focus(at(), "").unwrap();
        assert_eq!(locks.remote_lock(at(), "bob"), None);
        assert_eq!(locks.state(at()), LockState::LocalEditing);

        let update = locks.remote_update(at(), "bob", false);
        assert!(!update.apply_text);

        let outcome = locks.blur(at()).unwrap();
        assert_eq!(outcome.next_state, LockState::RemoteEditing { by: "bob".into() });
        assert_eq!(locks.typing_indicator(at()).as_deref(), Some("bob is typing…"));
    }

    #[test]
    fn deferred_lock_is_dropped_once_its_owner_finalises() {
        let mut locks = EditLockCoordinator::new();
        locks.focus(at(), "").unwrap();
        locks.remote_lock(at(), "bob");
        locks.remote_update(at(), "bob", true);
        assert_eq!(locks.blur(at()).unwrap().next_state, LockState::Idle);
    }

    #[test]
    fn retain_existing_and_forget_date_prune_entries() {
        let mut locks = EditLockCoordinator::new();
        let other = ActivityRef::new(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), ActivityKey::new(0.0));
        locks.focus(at(), "").unwrap();
        locks.remote_lock(other, "carol");
        assert_eq!(locks.local_drafts().count(), 1);

        locks.retain_existing(|candidate| candidate != other);
        assert_eq!(locks.len(), 1);
        locks.forget_date(at().date);
        assert!(locks.is_empty());
    }
}
