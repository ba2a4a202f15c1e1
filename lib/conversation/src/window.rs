//! History windows handed to the reasoning backend.
//!
//! Windows are suffixes of the transcript: entries are never reordered,
//! edited, or filtered, only the oldest ones are dropped.

use crate::transcript::TranscriptEntry;

/// Returns the suffix of `entries` that starts at the `max_turns`-th most
/// recent user entry.
///
/// Only user entries count toward the cap; system entries and tool results
/// between them ride along. `max_turns == 0` disables the cap.
#[must_use]
pub fn recent_turns(entries: &[TranscriptEntry], max_turns: usize) -> &[TranscriptEntry] {
    if max_turns == 0 {
        return entries;
    }

    let start = entries
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, entry)| entry.is_user())
        .nth(max_turns - 1)
        .map_or(0, |(position, _)| position);

    &entries[start..]
}

/// Returns the last `max_entries` entries.
#[must_use]
pub fn recent_entries(entries: &[TranscriptEntry], max_entries: usize) -> &[TranscriptEntry] {
    &entries[entries.len().saturating_sub(max_entries)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(turns: usize) -> Vec<TranscriptEntry> {
        let mut entries = vec![TranscriptEntry::System {
            content: "be brief".to_string(),
        }];
        for turn in 0..turns {
            entries.push(TranscriptEntry::user(format!("q{turn}")));
            entries.push(TranscriptEntry::tool_result("lookup", format!("r{turn}")));
            entries.push(TranscriptEntry::reply(format!("a{turn}")));
        }
        entries
    }

    #[test]
    fn short_history_is_untouched() {
        let entries = conversation(2);
        assert_eq!(recent_turns(&entries, 5), entries.as_slice());
    }

    #[test]
    fn keeps_last_turns_with_their_tool_results() {
        let entries = conversation(4);

        let window = recent_turns(&entries, 2);

        assert_eq!(window.len(), 6);
        assert_eq!(window[0], TranscriptEntry::user("q2"));
        assert_eq!(window[1], TranscriptEntry::tool_result("lookup", "r2"));
        assert_eq!(window.last(), entries.last());
    }

    #[test]
    fn zero_disables_the_cap() {
        let entries = conversation(3);
        assert_eq!(recent_turns(&entries, 0).len(), entries.len());
    }

    #[test]
    fn recent_entries_takes_a_tail() {
        let entries = conversation(4);

        assert_eq!(recent_entries(&entries, 10).len(), 10);
        assert_eq!(recent_entries(&entries, 10), &entries[3..]);
        assert_eq!(recent_entries(&entries, 100).len(), entries.len());
    }
}
