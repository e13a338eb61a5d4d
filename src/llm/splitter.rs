//! Thinking/answer stream splitter.
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`
//! before the user-visible answer. This splitter scans an incrementally
//! arriving token stream, routes delimited reasoning to a dedicated callback
//! and returns only the visible answer text to the caller. Delimiters can be
//! split across token boundaries, so unscanned text that could still turn
//! into a delimiter is held back between calls.
//!
//! One instance per generation call; state must never leak across queries.

use std::sync::Arc;

const OPEN_DELIM: &str = "<think>";
const CLOSE_DELIM: &str = "</think>";

/// Emit an advisory partial update once this much unreported reasoning text
/// has accumulated without a newline.
const PARTIAL_EMIT_THRESHOLD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Thinking,
}

/// Reasoning content surfaced while (or after) the model thinks.
///
/// Updates with `complete == false` are advisory progressive snapshots; the
/// authoritative content is the single `complete == true` emission per block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingUpdate {
    pub content: String,
    pub complete: bool,
}

pub type ThinkingFn = Arc<dyn Fn(ThinkingUpdate) + Send + Sync>;

pub struct ThinkingSplitter {
    mode: Mode,
    pending: String,
    thinking: String,
    answer: String,
    reported: usize,
    on_thinking: Option<ThinkingFn>,
}

impl ThinkingSplitter {
    pub fn new(on_thinking: Option<ThinkingFn>) -> Self {
        Self {
            mode: Mode::Normal,
            pending: String::new(),
            thinking: String::new(),
            answer: String::new(),
            reported: 0,
            on_thinking,
        }
    }

    /// Feed one incoming fragment. Returns the newly visible answer text
    /// (possibly empty). A single fragment may drive any number of state
    /// transitions.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let mut visible = String::new();

        loop {
            match self.mode {
                Mode::Normal => {
                    if let Some(at) = self.pending.find(OPEN_DELIM) {
                        visible.push_str(&self.pending[..at]);
                        self.pending.drain(..at + OPEN_DELIM.len());
                        self.mode = Mode::Thinking;
                    } else {
                        let hold = partial_suffix_len(&self.pending, OPEN_DELIM);
                        let cut = self.pending.len() - hold;
                        visible.push_str(&self.pending[..cut]);
                        self.pending.drain(..cut);
                        break;
                    }
                }
                Mode::Thinking => {
                    if let Some(at) = self.pending.find(CLOSE_DELIM) {
                        self.thinking.push_str(&self.pending[..at]);
                        self.pending.drain(..at + CLOSE_DELIM.len());
                        self.emit_complete_block();
                        self.mode = Mode::Normal;
                    } else {
                        let hold = partial_suffix_len(&self.pending, CLOSE_DELIM);
                        let cut = self.pending.len() - hold;
                        self.thinking.push_str(&self.pending[..cut]);
                        self.pending.drain(..cut);
                        self.maybe_emit_partial();
                        break;
                    }
                }
            }
        }

        self.answer.push_str(&visible);
        visible
    }

    /// Flush at end of stream. Held-back text that never became a delimiter
    /// is visible output; an unterminated thinking block is emitted as its
    /// final complete unit.
    pub fn finish(&mut self) -> String {
        let tail = std::mem::take(&mut self.pending);
        match self.mode {
            Mode::Normal => {
                self.answer.push_str(&tail);
                tail
            }
            Mode::Thinking => {
                self.thinking.push_str(&tail);
                self.emit_complete_block();
                self.mode = Mode::Normal;
                String::new()
            }
        }
    }

    /// The accumulated visible answer.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn is_thinking(&self) -> bool {
        self.mode == Mode::Thinking
    }

    fn emit_complete_block(&mut self) {
        let block = std::mem::take(&mut self.thinking);
        self.reported = 0;
        if let Some(cb) = &self.on_thinking {
            cb(ThinkingUpdate {
                content: block,
                complete: true,
            });
        }
    }

    fn maybe_emit_partial(&mut self) {
        let unreported = &self.thinking[self.reported..];
        if unreported.contains('\n') || unreported.len() >= PARTIAL_EMIT_THRESHOLD {
            self.reported = self.thinking.len();
            if let Some(cb) = &self.on_thinking {
                cb(ThinkingUpdate {
                    content: self.thinking.clone(),
                    complete: false,
                });
            }
        }
    }
}

/// Longest proper prefix of `delim` that `text` ends with. Both delimiters
/// are ASCII, so the returned length is always a char boundary in `text`.
fn partial_suffix_len(text: &str, delim: &str) -> usize {
    for len in (1..delim.len()).rev() {
        if text.ends_with(&delim[..len]) {
            return len;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collector() -> (Arc<Mutex<Vec<ThinkingUpdate>>>, ThinkingFn) {
        let seen: Arc<Mutex<Vec<ThinkingUpdate>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let callback: ThinkingFn = Arc::new(move |update| {
            sink.lock().unwrap().push(update);
        });
        (seen, callback)
    }

    fn complete_blocks(updates: &[ThinkingUpdate]) -> Vec<String> {
        updates
            .iter()
            .filter(|u| u.complete)
            .map(|u| u.content.clone())
            .collect()
    }

    #[test]
    fn splits_a_single_fragment() {
        let (seen, callback) = collector();
        let mut splitter = ThinkingSplitter::new(Some(callback));

        let mut visible = splitter.push("abc<think>def</think>ghi");
        visible.push_str(&splitter.finish());

        assert_eq!(visible, "abcghi");
        assert_eq!(splitter.answer(), "abcghi");
        assert_eq!(complete_blocks(&seen.lock().unwrap()), vec!["def"]);
    }

    #[test]
    fn split_boundaries_do_not_change_the_result() {
        let input = "abc<think>def</think>ghi";
        for i in 0..=input.len() {
            for j in i..=input.len() {
                let (seen, callback) = collector();
                let mut splitter = ThinkingSplitter::new(Some(callback));

                let mut visible = String::new();
                visible.push_str(&splitter.push(&input[..i]));
                visible.push_str(&splitter.push(&input[i..j]));
                visible.push_str(&splitter.push(&input[j..]));
                visible.push_str(&splitter.finish());

                assert_eq!(visible, "abcghi", "split at {i}/{j}");
                assert_eq!(
                    complete_blocks(&seen.lock().unwrap()),
                    vec!["def"],
                    "split at {i}/{j}"
                );
            }
        }
    }

    #[test]
    fn handles_multiple_blocks_in_one_fragment() {
        let (seen, callback) = collector();
        let mut splitter = ThinkingSplitter::new(Some(callback));

        let mut visible = splitter.push("a<think>x</think>b<think>y</think>c");
        visible.push_str(&splitter.finish());

        assert_eq!(visible, "abc");
        assert_eq!(complete_blocks(&seen.lock().unwrap()), vec!["x", "y"]);
    }

    #[test]
    fn text_that_looks_like_a_delimiter_is_flushed_at_finish() {
        let mut splitter = ThinkingSplitter::new(None);
        let mut visible = splitter.push("tag soup <thin");
        assert_eq!(visible, "tag soup ");
        visible.push_str(&splitter.finish());
        assert_eq!(visible, "tag soup <thin");
    }

    #[test]
    fn unterminated_block_is_emitted_at_finish() {
        let (seen, callback) = collector();
        let mut splitter = ThinkingSplitter::new(Some(callback));

        let visible = splitter.push("before<think>never closed");
        assert_eq!(visible, "before");
        assert_eq!(splitter.finish(), "");

        assert_eq!(
            complete_blocks(&seen.lock().unwrap()),
            vec!["never closed"]
        );
    }

    #[test]
    fn partial_updates_are_emitted_on_newlines() {
        let (seen, callback) = collector();
        let mut splitter = ThinkingSplitter::new(Some(callback));

        splitter.push("<think>step one\nstep two");
        let partials: Vec<ThinkingUpdate> = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.complete)
            .cloned()
            .collect();
        assert!(!partials.is_empty());
        assert!(partials[0].content.starts_with("step one"));

        splitter.push("</think>done");
        let blocks = complete_blocks(&seen.lock().unwrap());
        assert_eq!(blocks, vec!["step one\nstep two"]);
    }

    #[test]
    fn stream_with_no_thinking_passes_through() {
        let (seen, callback) = collector();
        let mut splitter = ThinkingSplitter::new(Some(callback));

        let mut visible = String::new();
        for token in ["Plain ", "answer ", "text."] {
            visible.push_str(&splitter.push(token));
        }
        visible.push_str(&splitter.finish());

        assert_eq!(visible, "Plain answer text.");
        assert!(seen.lock().unwrap().is_empty());
    }
}
