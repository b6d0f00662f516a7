use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::updates::TypingUpdate;

/// Typing event kinds, in backend wire order: a user began typing, paused,
/// or stopped because the message was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingEvent {
    Begin,
    Pause,
    Finished,
}

impl TypingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Pause => "pause",
            Self::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "begin" => Some(Self::Begin),
            "pause" => Some(Self::Pause),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// One typing notification from the backend: the last event (and its time,
/// seconds since the epoch) per user in a conversation.
#[derive(Debug, Clone, Default)]
pub struct TypingIndicator {
    pub conversation_id: String,
    entries: HashMap<String, (TypingEvent, i64)>,
}

impl TypingIndicator {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entries: HashMap::new(),
        }
    }

    pub fn set_event(&mut self, user_id: impl Into<String>, event: TypingEvent, at: i64) {
        self.entries.insert(user_id.into(), (event, at));
    }

    /// Every user with any typing event recorded.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Users whose last event is `Begin`.
    pub fn typing_user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (event, _))| *event == TypingEvent::Begin)
            .map(|(user, _)| user.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn last_event(&self, user_id: &str) -> Option<TypingEvent> {
        self.entries.get(user_id).map(|(event, _)| *event)
    }

    pub fn last_event_at(&self, user_id: &str) -> Option<i64> {
        self.entries.get(user_id).map(|(_, at)| *at)
    }

    /// Copy of `self` with `newer`'s per-user entries applied; an entry is
    /// taken only when its timestamp is not older than the one it replaces.
    pub fn merged_with(&self, newer: &TypingIndicator) -> TypingIndicator {
        let mut merged = self.clone();
        for (user, (event, at)) in &newer.entries {
            match merged.entries.get(user) {
                Some((_, existing_at)) if at < existing_at => {}
                _ => {
                    merged.entries.insert(user.clone(), (*event, *at));
                }
            }
        }
        merged
    }
}

/// One armed expiry timer. The embedding schedules it (see
/// [`schedule_expiry`]) and feeds it back through
/// [`TypingIndicatorTracker::on_timer_fired`]; a token whose generation no
/// longer matches the user's entry is stale and ignored, which is what
/// makes re-arming on every new event a debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerToken {
    user_id: String,
    generation: u64,
    pub deadline: Instant,
}

struct TypingEntry {
    generation: u64,
    expires_at: Instant,
}

/// Per-conversation "who is typing" state with per-user fail-safe expiry.
///
/// Remote ends may never send an explicit stop for a quietly closed
/// connection, so every `Begin` arms a deadline; when it passes without a
/// newer event the user is treated as not typing. The local user is
/// excluded from the aggregate. Owned by a single logical thread, like
/// [`crate::ConversationStream`].
///
/// Emits [`TypingUpdate::Changed`] only when the aggregate value or the
/// typing-user set transitions, never on redundant events.
pub struct TypingIndicatorTracker {
    local_user_id: String,
    display_duration: Duration,
    update_tx: flume::Sender<TypingUpdate>,
    entries: HashMap<String, TypingEntry>,
    next_generation: u64,
    visible: bool,
    visible_users: Vec<String>,
}

impl TypingIndicatorTracker {
    pub fn new(
        local_user_id: impl Into<String>,
        display_duration: Duration,
        update_tx: flume::Sender<TypingUpdate>,
    ) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            display_duration,
            update_tx,
            entries: HashMap::new(),
            next_generation: 0,
            visible: false,
            visible_users: Vec::new(),
        }
    }

    pub fn display_duration(&self) -> Duration {
        self.display_duration
    }

    /// Aggregate "anyone else typing", as last emitted.
    pub fn is_anyone_typing(&self) -> bool {
        self.visible
    }

    pub fn typing_user_ids(&self) -> Vec<String> {
        self.visible_users.clone()
    }

    /// Applies one typing notification and returns the timers to arm, one
    /// per user whose entry was (re-)started.
    pub fn on_event(&mut self, indicator: &TypingIndicator) -> Vec<TimerToken> {
        self.on_event_at(indicator, Instant::now())
    }

    pub fn on_event_at(&mut self, indicator: &TypingIndicator, now: Instant) -> Vec<TimerToken> {
        let mut tokens = Vec::new();
        for user_id in indicator.user_ids() {
            if user_id == self.local_user_id {
                continue;
            }
            match indicator.last_event(&user_id) {
                Some(TypingEvent::Begin) => {
                    self.next_generation += 1;
                    let generation = self.next_generation;
                    let expires_at = now + self.display_duration;
                    self.entries.insert(
                        user_id.clone(),
                        TypingEntry {
                            generation,
                            expires_at,
                        },
                    );
                    tokens.push(TimerToken {
                        user_id,
                        generation,
                        deadline: expires_at,
                    });
                }
                Some(TypingEvent::Pause) | Some(TypingEvent::Finished) => {
                    self.entries.remove(&user_id);
                }
                None => {}
            }
        }
        self.sweep_expired(now);
        self.recompute_aggregate();
        tokens
    }

    /// Expires the entry an armed timer belongs to. Stale tokens (the user
    /// re-typed since, bumping the generation) are ignored.
    pub fn on_timer_fired(&mut self, token: &TimerToken) {
        let current = self
            .entries
            .get(&token.user_id)
            .map(|entry| entry.generation);
        if current == Some(token.generation) {
            self.entries.remove(&token.user_id);
            self.recompute_aggregate();
        }
    }

    fn sweep_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn recompute_aggregate(&mut self) {
        let mut users: Vec<String> = self.entries.keys().cloned().collect();
        users.sort();
        let typing = !users.is_empty();
        if typing == self.visible && users == self.visible_users {
            return;
        }
        self.visible = typing;
        self.visible_users = users.clone();
        let _ = self.update_tx.send(TypingUpdate::Changed {
            typing,
            user_ids: users,
        });
    }
}

/// Sleeps until the token's deadline on the current tokio runtime, then
/// hands the token to `tx`. The owner pumps that channel into
/// [`TypingIndicatorTracker::on_timer_fired`].
pub fn schedule_expiry(
    token: TimerToken,
    tx: flume::Sender<TimerToken>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep_until(token.deadline.into()).await;
        let _ = tx.send(token);
    })
}
