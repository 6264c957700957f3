//! Typewriter-style progressive reveal of rendered Markdown.
//!
//! A [`RevealSession`] owns one immutable text buffer and walks a cursor
//! across it in *reveal units*. Each unit is a single grapheme, except for
//! markup tokens that would render as broken fragments when split: inline code
//! spans, emphasis spans with a matching closer, links, autolinks, and fence
//! lines are always revealed whole. Every intermediate prefix handed to the
//! [`RevealSink`] is therefore something the Markdown renderer can display
//! without half-open markers.
//!
//! [`drive`] is the cooperative scheduler: it advances the session, sleeps for
//! the pace-derived delay, and re-arms itself until the text is exhausted or
//! the skip token fires.

use std::ops::Range;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;

const SENTENCE_TERMINALS: [char; 4] = ['.', '!', '?', '\n'];
const CLAUSE_SEPARATORS: [char; 3] = [',', ';', ':'];

/// Pacing for a reveal session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceConfig {
    pub chars_per_second: f64,
    pub pause_after_sentence: Duration,
    pub pause_after_clause: Duration,
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 240.0,
            pause_after_sentence: Duration::from_millis(120),
            pause_after_clause: Duration::from_millis(50),
        }
    }
}

impl PaceConfig {
    pub fn validate(&self) -> Result<(), RevealError> {
        if !self.chars_per_second.is_finite() || self.chars_per_second <= 0.0 {
            return Err(RevealError::Config(format!(
                "typing rate must be a positive number of characters per second (got {})",
                self.chars_per_second
            )));
        }
        Ok(())
    }

    fn char_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.chars_per_second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealState {
    #[default]
    Idle,
    Revealing,
    Skipped,
    Complete,
}

impl RevealState {
    pub fn is_finished(self) -> bool {
        matches!(self, RevealState::Skipped | RevealState::Complete)
    }
}

/// How a driven session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("renderer rejected update: {0}")]
pub struct RenderError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevealError {
    #[error("invalid reveal configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Receives the visible prefix after every step. Each call replaces what the
/// previous call displayed.
pub trait RevealSink {
    fn render(&mut self, visible: &str) -> Result<(), RenderError>;
}

impl<F> RevealSink for F
where
    F: FnMut(&str) -> Result<(), RenderError>,
{
    fn render(&mut self, visible: &str) -> Result<(), RenderError> {
        self(visible)
    }
}

#[derive(Debug, Clone)]
pub struct RevealSession {
    source: String,
    unit_ends: Vec<usize>,
    next_unit: usize,
    cursor: usize,
    rendered: usize,
    state: RevealState,
    pace: PaceConfig,
}

impl RevealSession {
    /// Validates the pace and prepares a session without revealing anything.
    pub fn prepare(text: impl Into<String>, pace: PaceConfig) -> Result<Self, RevealError> {
        pace.validate()?;
        let source = text.into();
        let unit_ends = reveal_units(&source)
            .into_iter()
            .map(|range| range.end)
            .collect();
        Ok(Self {
            source,
            unit_ends,
            next_unit: 0,
            cursor: 0,
            rendered: 0,
            state: RevealState::Idle,
            pace,
        })
    }

    pub fn start(text: impl Into<String>, pace: PaceConfig) -> Result<Self, RevealError> {
        let mut session = Self::prepare(text, pace)?;
        session.begin();
        Ok(session)
    }

    fn begin(&mut self) {
        if self.state != RevealState::Idle {
            return;
        }
        self.state = if self.source.is_empty() {
            RevealState::Complete
        } else {
            RevealState::Revealing
        };
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    /// Byte offset into the source; always on a char boundary.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The prefix the sink last accepted.
    pub fn revealed(&self) -> &str {
        &self.source[..self.rendered]
    }

    /// Emits the next reveal unit. Returns `false` once the whole text has
    /// been revealed, or when the session was already finished.
    pub fn advance<S: RevealSink + ?Sized>(&mut self, sink: &mut S) -> Result<bool, RevealError> {
        match self.state {
            RevealState::Skipped | RevealState::Complete => return Ok(false),
            RevealState::Idle => self.begin(),
            RevealState::Revealing => {}
        }
        if self.state == RevealState::Complete {
            return Ok(false);
        }

        let Some(&end) = self.unit_ends.get(self.next_unit) else {
            self.finish(RevealState::Complete);
            return Ok(false);
        };
        self.next_unit += 1;
        self.cursor = end;

        if let Err(err) = sink.render(&self.source[..end]) {
            self.finish(RevealState::Complete);
            return Err(err.into());
        }
        self.rendered = end;

        if self.cursor >= self.source.len() {
            self.state = RevealState::Complete;
            return Ok(false);
        }
        Ok(true)
    }

    /// Reveals the remaining text in one step. Calling it on a finished
    /// session does nothing.
    pub fn skip<S: RevealSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), RevealError> {
        if self.state.is_finished() {
            return Ok(());
        }
        self.finish(RevealState::Skipped);
        sink.render(&self.source)?;
        self.rendered = self.source.len();
        Ok(())
    }

    fn finish(&mut self, state: RevealState) {
        self.cursor = self.source.len();
        self.next_unit = self.unit_ends.len();
        self.state = state;
    }

    /// Delay before the next advance, keyed off the last emitted character.
    pub fn next_delay(&self) -> Duration {
        match self.source[..self.cursor].chars().next_back() {
            Some(ch) if SENTENCE_TERMINALS.contains(&ch) => self.pace.pause_after_sentence,
            Some(ch) if CLAUSE_SEPARATORS.contains(&ch) => self.pace.pause_after_clause,
            _ => self.pace.char_interval(),
        }
    }
}

/// Runs a session to completion, honouring `skip` at every resumption.
pub async fn drive<S: RevealSink + ?Sized>(
    session: &mut RevealSession,
    sink: &mut S,
    skip: &CancellationToken,
) -> Result<RevealOutcome, RevealError> {
    loop {
        if skip.is_cancelled() {
            session.skip(sink)?;
            return Ok(RevealOutcome::Skipped);
        }

        if !session.advance(sink)? {
            return Ok(match session.state() {
                RevealState::Skipped => RevealOutcome::Skipped,
                _ => RevealOutcome::Completed,
            });
        }

        let delay = session.next_delay();
        tokio::select! {
            biased;
            _ = skip.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Splits `text` into reveal units, in source order, covering it exactly.
pub fn reveal_units(text: &str) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut pos = 0;
    let mut open_fence: Option<(u8, usize)> = None;
    let mut line_start = true;

    while pos < text.len() {
        let end = if line_start {
            fence_line_end(text, pos, &mut open_fence)
        } else {
            None
        }
        .unwrap_or_else(|| {
            if open_fence.is_some() {
                grapheme_end(text, pos)
            } else {
                inline_unit_end(text, pos)
            }
        });

        line_start = text[pos..end].ends_with('\n');
        units.push(pos..end);
        pos = end;
    }

    units
}

fn grapheme_end(text: &str, pos: usize) -> usize {
    pos + text[pos..]
        .graphemes(true)
        .next()
        .map(str::len)
        .unwrap_or(text.len() - pos)
}

fn line_end(text: &str, pos: usize) -> usize {
    memchr::memchr(b'\n', &text.as_bytes()[pos..])
        .map(|idx| pos + idx + 1)
        .unwrap_or(text.len())
}

fn paragraph_end(text: &str, pos: usize) -> usize {
    text[pos..]
        .find("\n\n")
        .map(|idx| pos + idx)
        .unwrap_or(text.len())
}

/// `(marker byte, run length)` when `line` opens or closes a fenced block.
fn fence_marker(line: &str) -> Option<(u8, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line.as_bytes()[indent..];
    let marker = *rest.first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let run = rest.iter().take_while(|b| **b == marker).count();
    (run >= 3).then_some((marker, run))
}

fn fence_line_end(text: &str, pos: usize, open_fence: &mut Option<(u8, usize)>) -> Option<usize> {
    let end = line_end(text, pos);
    let line = &text[pos..end];
    let (marker, run) = fence_marker(line)?;

    match *open_fence {
        Some((open_marker, open_run)) => {
            let trailing = line.trim_start().trim_start_matches(marker as char);
            if marker == open_marker && run >= open_run && trailing.trim().is_empty() {
                *open_fence = None;
                Some(end)
            } else {
                None
            }
        }
        None => {
            *open_fence = Some((marker, run));
            Some(end)
        }
    }
}

fn run_length(bytes: &[u8], pos: usize, marker: u8) -> usize {
    bytes[pos..].iter().take_while(|b| **b == marker).count()
}

/// End offset of the first run of exactly `len` markers in `from..limit`.
fn find_closing_run(
    text: &str,
    from: usize,
    limit: usize,
    marker: u8,
    len: usize,
    tight: bool,
) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut idx = from;
    while idx < limit {
        if bytes[idx] != marker {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < limit && bytes[idx] == marker {
            idx += 1;
        }
        let preceded_by_space = text[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        if idx - start == len && !(tight && preceded_by_space) {
            return Some(idx);
        }
    }
    None
}

fn inline_unit_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let limit = paragraph_end(text, pos);

    match bytes[pos] {
        b'`' => {
            let run = run_length(bytes, pos, b'`');
            find_closing_run(text, pos + run, limit, b'`', run, false).unwrap_or(pos + run)
        }
        marker @ (b'*' | b'_' | b'~') => {
            let run = run_length(bytes, pos, marker);
            let opens = text[pos + run..]
                .chars()
                .next()
                .is_some_and(|ch| !ch.is_whitespace());
            if opens {
                find_closing_run(text, pos + run, limit, marker, run, true).unwrap_or(pos + run)
            } else {
                pos + run
            }
        }
        b'[' => link_end(text, pos + 1, limit).unwrap_or(pos + 1),
        b'!' if bytes.get(pos + 1) == Some(&b'[') => {
            link_end(text, pos + 2, limit).unwrap_or_else(|| grapheme_end(text, pos))
        }
        b'<' => autolink_end(text, pos).unwrap_or(pos + 1),
        b'\\' if pos + 1 < text.len() && bytes[pos + 1] != b'\n' => grapheme_end(text, pos + 1),
        _ => grapheme_end(text, pos),
    }
}

/// `label_start` points just past `[`; matches `label](target)`.
fn link_end(text: &str, label_start: usize, limit: usize) -> Option<usize> {
    let close = label_start + text[label_start..limit].find(']')?;
    if text.as_bytes().get(close + 1) != Some(&b'(') {
        return None;
    }
    let target_end = close + 2 + text[close + 2..limit].find(')')?;
    Some(target_end + 1)
}

fn autolink_end(text: &str, pos: usize) -> Option<usize> {
    let line_limit = line_end(text, pos);
    let close = pos + text[pos..line_limit].find('>')?;
    let inner = &text[pos + 1..close];
    let looks_like_link =
        !inner.is_empty() && !inner.contains(char::is_whitespace) && inner.contains([':', '@']);
    looks_like_link.then_some(close + 1)
}
