// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message list for one conversation.

use haven_core::{ChatMessage, MessageId};

/// Ordered messages of one conversation, plus events held back while a
/// history load is in flight.
///
/// History replaces the list wholesale. Realtime events are appended at the
/// end without re-sorting. A message id never appears twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    items: Vec<ChatMessage>,
    loads_in_flight: usize,
    held: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn items(&self) -> &[ChatMessage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight > 0
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.items.iter().any(|m| &m.id == id)
    }

    pub(crate) fn begin_load(&mut self) {
        self.loads_in_flight += 1;
    }

    /// Replaces the list with `history`, then re-applies held events that the
    /// history does not already contain.
    pub(crate) fn finish_load(&mut self, history: Vec<ChatMessage>) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.items = history;
        self.apply_held();
    }

    /// Keeps the previous list; held events are still applied.
    pub(crate) fn abort_load(&mut self) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.apply_held();
    }

    fn apply_held(&mut self) {
        let held = if self.loads_in_flight == 0 {
            std::mem::take(&mut self.held)
        } else {
            // Another load will replace the list again and needs these too.
            self.held.clone()
        };
        for message in held {
            if !self.contains(&message.id) {
                self.items.push(message);
            }
        }
    }

    /// Appends a realtime event. Returns false for a duplicate id.
    ///
    /// While a history load is running the event is held and applied after
    /// the history lands.
    pub(crate) fn append(&mut self, message: ChatMessage) -> bool {
        if self.loads_in_flight > 0 {
            if self.held.iter().any(|m| m.id == message.id) {
                return false;
            }
            self.held.push(message);
            return true;
        }
        if self.contains(&message.id) {
            return false;
        }
        self.items.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn msg(id: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            id: MessageId(id.into()),
            sender: "a".into(),
            receiver: "b".into(),
            body: format!("body {id}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn ids(log: &MessageLog) -> Vec<&str> {
        log.items().iter().map(|m| m.id.0.as_str()).collect()
    }

    #[test]
    fn events_append_without_resorting() {
        let mut log = MessageLog::default();
        log.begin_load();
        log.finish_load(vec![msg("1", 1), msg("2", 2)]);
        assert!(log.append(msg("0", 0)));
        assert_eq!(ids(&log), ["1", "2", "0"]);
    }

    #[test]
    fn duplicate_ids_are_dropped() {
        let mut log = MessageLog::default();
        assert!(log.append(msg("1", 1)));
        assert!(!log.append(msg("1", 1)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn events_during_load_merge_after_history() {
        let mut log = MessageLog::default();
        log.begin_load();
        log.append(msg("3", 3));
        log.append(msg("2", 2));
        assert!(log.is_empty());

        // "2" made it into the history; "3" did not.
        log.finish_load(vec![msg("1", 1), msg("2", 2)]);
        assert_eq!(ids(&log), ["1", "2", "3"]);
        assert!(!log.is_loading());
    }

    #[test]
    fn failed_load_keeps_previous_list_and_flushes_events() {
        let mut log = MessageLog::default();
        log.begin_load();
        log.finish_load(vec![msg("1", 1)]);

        log.begin_load();
        log.append(msg("2", 2));
        log.abort_load();
        assert_eq!(ids(&log), ["1", "2"]);
    }

    #[test]
    fn overlapping_loads_both_see_held_events() {
        let mut log = MessageLog::default();
        log.begin_load();
        log.begin_load();
        log.append(msg("9", 9));

        log.finish_load(vec![msg("1", 1)]);
        assert_eq!(ids(&log), ["1", "9"]);
        log.finish_load(vec![msg("1", 1), msg("2", 2)]);
        assert_eq!(ids(&log), ["1", "2", "9"]);
    }
}
