use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tendero_core::domain::conversation::ConversationEntry;
use tendero_core::flows::Phase;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

pub const DEFAULT_HISTORY_LIMIT: usize = 6;
const RECENT_MESSAGE_IDS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversationLimits {
    /// Entries kept after each completed turn (N).
    pub history_limit: usize,
    pub idle_ttl: Duration,
    pub max_users: usize,
}

impl Default for ConversationLimits {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            idle_ttl: Duration::from_secs(86_400),
            max_users: 10_000,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub history: Vec<ConversationEntry>,
    pub phase: Phase,
    recent_message_ids: VecDeque<String>,
}

impl ConversationState {
    /// Records a platform message id. Returns false when the id was already
    /// seen, i.e. the platform redelivered the message.
    pub fn remember_message(&mut self, message_id: &str) -> bool {
        if self.recent_message_ids.iter().any(|seen| seen == message_id) {
            return false;
        }
        if self.recent_message_ids.len() == RECENT_MESSAGE_IDS {
            self.recent_message_ids.pop_front();
        }
        self.recent_message_ids.push_back(message_id.to_owned());
        true
    }

    fn append_turn(
        &mut self,
        user: ConversationEntry,
        assistant: ConversationEntry,
        history_limit: usize,
    ) {
        self.history.push(user);
        self.history.push(assistant);
        if self.history.len() > history_limit {
            let overflow = self.history.len() - history_limit;
            self.history.drain(..overflow);
        }
    }
}

/// Exclusive access to one user's state for the duration of a turn.
pub struct ConversationSession {
    guard: OwnedMutexGuard<ConversationState>,
    history_limit: usize,
}

impl ConversationSession {
    pub fn phase(&self) -> Phase {
        self.guard.phase
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.guard.history
    }

    pub fn state(&self) -> &ConversationState {
        &self.guard
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.guard.phase = phase;
    }

    pub fn remember_message(&mut self, message_id: &str) -> bool {
        self.guard.remember_message(message_id)
    }

    /// Appends both entries, then keeps only the newest `history_limit`.
    pub fn append_turn(&mut self, user: ConversationEntry, assistant: ConversationEntry) {
        self.guard.append_turn(user, assistant, self.history_limit);
    }
}

struct Slot {
    state: Arc<Mutex<ConversationState>>,
    last_seen: Instant,
}

impl Slot {
    /// A running turn (or a waiter) holds a clone of the state handle. Busy
    /// slots are never evicted, otherwise the user's next message would get a
    /// fresh slot and run alongside the turn still in flight.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.state) > 1
    }
}

/// Keyed per-user conversation state.
///
/// Each user's state sits behind its own async mutex, so turns for one user
/// are serialized while different users proceed in parallel. Idle entries are
/// dropped by [`ConversationStore::sweep_idle_at`]; when `max_users` is
/// reached the least recently seen idle user is evicted to make room. Users
/// with a turn in flight are never evicted, so the store may briefly exceed
/// `max_users` when every slot is busy.
pub struct ConversationStore {
    limits: ConversationLimits,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ConversationLimits::default())
    }
}

impl ConversationStore {
    pub fn new(limits: ConversationLimits) -> Self {
        Self { limits, slots: Mutex::new(HashMap::new()) }
    }

    pub fn limits(&self) -> ConversationLimits {
        self.limits
    }

    /// Locks the user's state, creating a fresh one on first contact.
    pub async fn session(&self, user_id: &str) -> ConversationSession {
        let state = self.slot_for(user_id, Instant::now()).await;
        ConversationSession {
            guard: state.lock_owned().await,
            history_limit: self.limits.history_limit,
        }
    }

    /// Snapshot of the user's state; default state when the user is unknown.
    pub async fn get(&self, user_id: &str) -> ConversationState {
        let state = self.slot_for(user_id, Instant::now()).await;
        let state = state.lock().await;
        state.clone()
    }

    pub async fn append_turn(
        &self,
        user_id: &str,
        user: ConversationEntry,
        assistant: ConversationEntry,
    ) {
        self.session(user_id).await.append_turn(user, assistant);
    }

    pub async fn set_phase(&self, user_id: &str, phase: Phase) {
        self.session(user_id).await.set_phase(phase);
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    /// Drops users idle for longer than the configured TTL. Returns how many
    /// entries were removed.
    pub async fn sweep_idle_at(&self, now: Instant) -> usize {
        let idle_ttl = self.limits.idle_ttl;
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            slot.is_busy() || now.saturating_duration_since(slot.last_seen) <= idle_ttl
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            debug!(
                event_name = "conversation.sweep.evicted",
                evicted,
                remaining = slots.len(),
                "idle conversations evicted"
            );
        }
        evicted
    }

    async fn slot_for(&self, user_id: &str, now: Instant) -> Arc<Mutex<ConversationState>> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(user_id) {
            slot.last_seen = now;
            return Arc::clone(&slot.state);
        }

        if slots.len() >= self.limits.max_users {
            let oldest = slots
                .iter()
                .filter(|(_, slot)| !slot.is_busy())
                .min_by_key(|(_, slot)| slot.last_seen)
                .map(|(user, _)| user.clone());
            if let Some(oldest) = oldest {
                slots.remove(&oldest);
                debug!(
                    event_name = "conversation.capacity.evicted",
                    evicted_user = %oldest,
                    max_users = self.limits.max_users,
                    "least recently seen conversation evicted"
                );
            }
        }

        let state = Arc::new(Mutex::new(ConversationState::default()));
        slots.insert(user_id.to_owned(), Slot { state: Arc::clone(&state), last_seen: now });
        state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tendero_core::domain::conversation::ConversationEntry;
    use tendero_core::flows::Phase;

    use super::{ConversationLimits, ConversationState, ConversationStore};

    fn store(history_limit: usize, max_users: usize) -> ConversationStore {
        ConversationStore::new(ConversationLimits {
            history_limit,
            idle_ttl: Duration::from_secs(60),
            max_users,
        })
    }

    #[tokio::test]
    async fn unknown_user_gets_default_state() {
        let store = ConversationStore::default();
        let state = store.get("573001").await;

        assert!(state.history.is_empty());
        assert_eq!(state.phase, Phase::New);
    }

    #[tokio::test]
    async fn history_is_truncated_to_most_recent_entries() {
        let store = store(6, 10);
        for turn in 0..5 {
            store
                .append_turn(
                    "573001",
                    ConversationEntry::user(format!("pregunta {turn}")),
                    ConversationEntry::assistant(format!("respuesta {turn}")),
                )
                .await;
        }

        let history = store.get("573001").await.history;
        let contents = history.iter().map(|entry| entry.content.as_str()).collect::<Vec<_>>();

        assert_eq!(history.len(), 6);
        assert_eq!(
            contents,
            vec![
                "pregunta 2",
                "respuesta 2",
                "pregunta 3",
                "respuesta 3",
                "pregunta 4",
                "respuesta 4"
            ]
        );
    }

    #[tokio::test]
    async fn phase_updates_are_per_user() {
        let store = ConversationStore::default();
        store.set_phase("a", Phase::Menu).await;
        store.set_phase("b", Phase::AwaitingProductQuery).await;

        assert_eq!(store.get("a").await.phase, Phase::Menu);
        assert_eq!(store.get("b").await.phase, Phase::AwaitingProductQuery);
    }

    #[test]
    fn redelivered_message_ids_are_detected() {
        let mut state = ConversationState::default();
        assert!(state.remember_message("wamid.1"));
        assert!(!state.remember_message("wamid.1"));

        for index in 0..40 {
            state.remember_message(&format!("wamid.x{index}"));
        }
        assert!(state.remember_message("wamid.1"), "old ids fall out of the window");
    }

    #[tokio::test]
    async fn idle_users_are_swept() {
        let store = store(6, 10);
        store.set_phase("a", Phase::Menu).await;

        assert_eq!(store.sweep_idle_at(Instant::now()).await, 0);
        assert_eq!(store.sweep_idle_at(Instant::now() + Duration::from_secs(120)).await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_seen_user() {
        let store = store(6, 2);
        store.set_phase("first", Phase::Menu).await;
        store.set_phase("second", Phase::Menu).await;
        store.set_phase("first", Phase::AwaitingProductQuery).await;

        store.set_phase("third", Phase::Menu).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("first").await.phase, Phase::AwaitingProductQuery);
        assert_eq!(store.get("second").await.phase, Phase::New, "second was evicted");
    }

    #[tokio::test]
    async fn capacity_eviction_skips_user_with_turn_in_flight() {
        let store = Arc::new(store(6, 1));
        let mut held = store.session("a").await;

        store.set_phase("b", Phase::Menu).await;

        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let _session = store.session("a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished(), "a second session for the same user must wait");

        held.append_turn(ConversationEntry::user("hola"), ConversationEntry::assistant("¡Hola!"));
        drop(held);
        second.await.expect("task joins");

        assert_eq!(store.get("a").await.history.len(), 2);
    }

    #[tokio::test]
    async fn sweep_keeps_user_with_turn_in_flight() {
        let store = store(6, 10);
        let mut held = store.session("a").await;
        store.set_phase("b", Phase::Menu).await;

        let later = Instant::now() + Duration::from_secs(120);
        assert_eq!(store.sweep_idle_at(later).await, 1, "only the idle user is swept");

        held.set_phase(Phase::AwaitingProductQuery);
        drop(held);
        assert_eq!(store.get("a").await.phase, Phase::AwaitingProductQuery);
    }

    #[tokio::test]
    async fn sessions_for_the_same_user_are_serialized() {
        let store = Arc::new(ConversationStore::default());
        let mut first = store.session("573001").await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut session = store.session("573001").await;
                let seen = session.phase();
                session.set_phase(Phase::Menu);
                seen
            })
        };

        tokio::task::yield_now().await;
        first.set_phase(Phase::AwaitingProductQuery);
        drop(first);

        let seen_by_contender = contender.await.expect("task joins");
        assert_eq!(seen_by_contender, Phase::AwaitingProductQuery);
        assert_eq!(store.get("573001").await.phase, Phase::Menu);
    }
}
