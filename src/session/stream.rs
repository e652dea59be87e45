use crate::engine::markup;
use crate::session::state::Outcome;

pub const CORRECT_MARKER: &str = "%%%";
pub const INCORRECT_MARKER: &str = "~~~";
pub const ORDERED_TEST_MARKER: &str = "$$$";
/// The server terminates every segment of a reply with this.
pub const SEGMENT_DELIMITER: &str = "\n\n\n";

/// What one chunk changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkUpdate {
    /// Set when this chunk carried the first terminal marker of the session.
    pub verdict: Option<Outcome>,
    pub display_changed: bool,
}

/// Incrementally assembles the patient's reply from a chunked stream.
///
/// Each chunk is scanned on its own for terminal markers, so a marker split
/// across two chunks goes unnoticed. Text is released to the display one
/// complete segment at a time; a trailing partial segment waits for the next
/// chunk.
#[derive(Clone, Debug, Default)]
pub struct StreamParser {
    pending: String,
    display: String,
    wide: bool,
    leading_checked: bool,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_introduction(introduction: &str) -> Self {
        let mut parser = Self::new();
        parser.append_segment(introduction);
        parser
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// The reply should render full width (lab reports, verdicts).
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    pub fn push_chunk(&mut self, chunk: &str, already_completed: bool) -> ChunkUpdate {
        let mut update = ChunkUpdate::default();

        let verdict = chunk_verdict(chunk);
        if verdict.is_some() {
            self.wide = true;
            if !already_completed {
                update.verdict = verdict;
            }
        }
        let text = chunk.replace(CORRECT_MARKER, "").replace(INCORRECT_MARKER, "");

        self.pending.push_str(&text);
        while let Some(idx) = self.pending.find(SEGMENT_DELIMITER) {
            let segment: String = self.pending.drain(..idx).collect();
            self.pending.drain(..SEGMENT_DELIMITER.len());
            self.append_segment(&segment);
            update.display_changed = true;
        }

        if update.display_changed {
            self.refresh_markup();
        }
        update
    }

    /// End of stream: release whatever partial segment is left and return the
    /// finished message text.
    pub fn finish(mut self) -> (String, bool) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.append_segment(&rest);
            self.refresh_markup();
        }
        (self.display, self.wide)
    }

    fn append_segment(&mut self, segment: &str) {
        self.display.push_str(segment);
        if !self.leading_checked && !self.display.is_empty() {
            if self.display.starts_with('\n') {
                self.display.remove(0);
            }
            self.leading_checked = true;
        }
    }

    fn refresh_markup(&mut self) {
        self.display = markup::embolden(&self.display);
        if self.display.contains(ORDERED_TEST_MARKER) {
            self.display = self.display.replace(ORDERED_TEST_MARKER, "");
            self.wide = true;
        }
    }
}

/// The verdict a chunk carries. The correct marker is checked first, so a
/// chunk holding both counts as solved.
fn chunk_verdict(chunk: &str) -> Option<Outcome> {
    if chunk.contains(CORRECT_MARKER) {
        Some(Outcome::Solved)
    } else if chunk.contains(INCORRECT_MARKER) {
        Some(Outcome::Failed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> String {
        let mut parser = StreamParser::new();
        for chunk in chunks {
            parser.push_chunk(chunk, false);
        }
        parser.finish().0
    }

    #[test]
    fn test_segments_release_on_delimiter() {
        let mut parser = StreamParser::new();
        let update = parser.push_chunk("I have had a cough", false);
        assert!(!update.display_changed);
        assert_eq!(parser.display(), "");
        let update = parser.push_chunk(" for weeks\n\n\nAnd night sweats", false);
        assert!(update.display_changed);
        assert_eq!(parser.display(), "I have had a cough for weeks");
        assert_eq!(parser.finish().0, "I have had a cough for weeksAnd night sweats");
    }

    #[test]
    fn test_chunking_does_not_change_final_text() {
        let whole = "\nMy **knees** ache\n\n\nMostly in the **morning**\n\n\n$$$ ESR: 80\n\n\n";
        let expected = feed(&[whole]);
        assert_eq!(
            expected,
            "My <strong>knees</strong> acheMostly in the <strong>morning</strong> ESR: 80"
        );

        let split_mid_delimiter = ["\nMy **kn", "ees** ache\n", "\n\nMostly in the **mor", "ning**\n\n", "\n$$", "$ ESR: 80\n\n\n"];
        assert_eq!(feed(&split_mid_delimiter), expected);

        let by_char: Vec<String> = whole.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = by_char.iter().map(String::as_str).collect();
        assert_eq!(feed(&refs), expected);
    }

    #[test]
    fn test_leading_newline_stripped_once() {
        assert_eq!(feed(&["\n\nHello\n\n\n"]), "\nHello");
        assert_eq!(feed(&["\n\n\n\nHello\n\n\n"]), "Hello");
        assert_eq!(feed(&["Hi\n\n\n\nthere\n\n\n"]), "Hi\nthere");
    }

    #[test]
    fn test_correct_marker_reports_solved_and_is_stripped() {
        let mut parser = StreamParser::new();
        let update = parser.push_chunk("%%% Great work\n\n\n", false);
        assert_eq!(update.verdict, Some(Outcome::Solved));
        assert!(parser.is_wide());
        assert_eq!(parser.display(), " Great work");
    }

    #[test]
    fn test_marker_ignored_once_completed() {
        let mut parser = StreamParser::new();
        let update = parser.push_chunk("~~~ Not quite\n\n\n", true);
        assert_eq!(update.verdict, None);
        assert_eq!(parser.display(), " Not quite");
    }

    #[test]
    fn test_correct_marker_wins_within_a_chunk() {
        let mut parser = StreamParser::new();
        let update = parser.push_chunk("~~~ wrong, then %%%", false);
        assert_eq!(update.verdict, Some(Outcome::Solved));

        let mut parser = StreamParser::new();
        let update = parser.push_chunk("%%% right, then ~~~", false);
        assert_eq!(update.verdict, Some(Outcome::Solved));
        let (text, _) = parser.finish();
        assert_eq!(text, " right, then ");
    }

    #[test]
    fn test_marker_split_across_chunks_is_not_detected() {
        let mut parser = StreamParser::new();
        assert_eq!(parser.push_chunk("%%", false).verdict, None);
        assert_eq!(parser.push_chunk("% yes", false).verdict, None);
    }

    #[test]
    fn test_ordered_test_marker_sets_wide_only() {
        let mut parser = StreamParser::new();
        let update = parser.push_chunk("$$$ Na 139, K 3.1\n\n\n", false);
        assert_eq!(update.verdict, None);
        assert!(parser.is_wide());
        assert_eq!(parser.display(), " Na 139, K 3.1");
    }

    #[test]
    fn test_introduction_seeds_display() {
        let mut parser = StreamParser::with_introduction("Hello doctor.");
        parser.push_chunk(" I feel faint\n\n\n", false);
        assert_eq!(parser.display(), "Hello doctor. I feel faint");
    }
}
