//! Ordered progress-message history for one polling session

use dockhand_api::ProgressMessage;

/// Append-only message history with offset-based deduplication.
///
/// Two counters matter: the display history (which includes locally-produced
/// entries such as the synthetic `Connecting` message) and the number of
/// messages actually received from the backend. Only the latter drives the
/// next poll offset.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    messages: Vec<ProgressMessage>,
    fetched: usize,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset to request on the next poll: backend messages received so far.
    pub fn next_offset(&self) -> usize {
        self.fetched
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ProgressMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ProgressMessage> {
        self.messages.last()
    }

    /// Append a locally-produced entry (the synthetic `Connecting` message).
    /// Does not advance the poll offset.
    pub fn push_local(&mut self, message: ProgressMessage) {
        self.messages.push(message);
    }

    /// Merge a poll response that was requested at `offset`.
    ///
    /// `incoming` holds the backend's messages at positions `offset..`.
    /// Positions already held (a duplicate or stale response) are skipped;
    /// the rest is appended in order. Returns the number of messages
    /// actually appended.
    pub fn append_since(&mut self, offset: usize, incoming: Vec<ProgressMessage>) -> usize {
        let total = incoming.len();
        let skip = self.fetched.saturating_sub(offset);

        let mut appended = 0;
        for message in incoming.into_iter().skip(skip) {
            self.messages.push(message);
            appended += 1;
        }
        self.fetched = self.fetched.max(offset + total);
        appended
    }

    /// Whether the most recently appended message is terminal.
    pub fn is_finished(&self) -> bool {
        self.messages
            .last()
            .map(|message| message.is_terminal())
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.fetched = 0;
    }
}

/// One display group: a run of consecutive messages sharing a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGroup {
    pub stage: String,
    pub lines: Vec<String>,
}

/// Collapse consecutive equal stages into groups, collecting the non-empty
/// message lines of each run. Repeated stages separated by another stage
/// form separate groups.
pub fn group_stages(messages: &[ProgressMessage]) -> Vec<StageGroup> {
    let mut groups: Vec<StageGroup> = Vec::new();
    for message in messages {
        match groups.last_mut() {
            Some(group) if group.stage == message.stage => {
                if let Some(line) = &message.message {
                    group.lines.push(line.clone());
                }
            }
            _ => {
                let lines = message.message.iter().cloned().collect();
                groups.push(StageGroup {
                    stage: message.stage.clone(),
                    lines,
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_api::stages;

    #[test]
    fn test_synthetic_entries_do_not_advance_offset() {
        let mut history = MessageHistory::new();
        history.push_local(ProgressMessage::connecting());

        assert_eq!(history.len(), 1);
        assert_eq!(history.next_offset(), 0, "Connecting is not a backend message");

        let appended = history.append_since(0, vec![ProgressMessage::new("Starting")]);
        assert_eq!(appended, 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.next_offset(), 1);
    }

    #[test]
    fn test_duplicate_offsets_are_skipped() {
        let mut history = MessageHistory::new();
        let batch = vec![
            ProgressMessage::new("Starting"),
            ProgressMessage::with_message(stages::COMPOSE_UP, "Pulling..."),
        ];

        assert_eq!(history.append_since(0, batch.clone()), 2);
        // The same response delivered again appends nothing
        assert_eq!(history.append_since(0, batch), 0);
        assert_eq!(history.len(), 2);
        assert_eq!(history.next_offset(), 2);
    }

    #[test]
    fn test_overlapping_response_appends_only_the_tail() {
        let mut history = MessageHistory::new();
        history.append_since(0, vec![ProgressMessage::new("Starting")]);

        // A stale request at offset 0 raced a newer one; its response
        // overlaps what we already hold.
        let appended = history.append_since(
            0,
            vec![
                ProgressMessage::new("Starting"),
                ProgressMessage::new(stages::FINISHED),
            ],
        );
        assert_eq!(appended, 1);
        assert_eq!(history.next_offset(), 2);
        assert!(history.is_finished());
    }

    #[test]
    fn test_empty_response_is_normal() {
        let mut history = MessageHistory::new();
        history.append_since(0, vec![ProgressMessage::new("Starting")]);

        assert_eq!(history.append_since(1, Vec::new()), 0);
        assert_eq!(history.next_offset(), 1);
        assert!(!history.is_finished());
    }

    #[test]
    fn test_terminal_detection_is_case_insensitive() {
        let mut history = MessageHistory::new();
        assert!(!history.is_finished(), "empty history is not finished");

        history.append_since(0, vec![ProgressMessage::new("finished")]);
        assert!(history.is_finished());
    }

    #[test]
    fn test_clear_resets_offset() {
        let mut history = MessageHistory::new();
        history.push_local(ProgressMessage::connecting());
        history.append_since(0, vec![ProgressMessage::new("Starting")]);

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.next_offset(), 0);
    }

    #[test]
    fn test_group_stages_collapses_consecutive_runs() {
        let messages = vec![
            ProgressMessage::connecting(),
            ProgressMessage::new("Starting"),
            ProgressMessage::with_message(stages::COMPOSE_UP, "Pulling nginx"),
            ProgressMessage::with_message(stages::COMPOSE_UP, "Pulling redis"),
            ProgressMessage::new(stages::IMAGE_PRUNE),
            ProgressMessage::new(stages::FINISHED),
        ];

        let groups = group_stages(&messages);
        let labels: Vec<&str> = groups.iter().map(|g| g.stage.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Connecting",
                "Starting",
                stages::COMPOSE_UP,
                stages::IMAGE_PRUNE,
                "Finished",
            ]
        );
        assert_eq!(groups[2].lines, vec!["Pulling nginx", "Pulling redis"]);
        assert!(groups[1].lines.is_empty());
    }

    #[test]
    fn test_group_stages_keeps_separated_runs_apart() {
        let messages = vec![
            ProgressMessage::with_message("pull", "a"),
            ProgressMessage::new("verify"),
            ProgressMessage::with_message("pull", "b"),
        ];

        let groups = group_stages(&messages);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].lines, vec!["a"]);
        assert_eq!(groups[2].lines, vec!["b"]);
    }
}
