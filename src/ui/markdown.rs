//! Markdown to styled ratatui lines.
//!
//! Revealed text is re-rendered from scratch on every frame, so the renderer
//! has to cope with any prefix of a document: unterminated code fences and
//! unmatched emphasis markers simply render as what pulldown-cmark makes of
//! them.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::ui::theme::Theme;

const RULE_WIDTH: usize = 32;

pub fn render_markdown(content: &str, theme: &Theme) -> Vec<Line<'static>> {
    MarkdownRenderer::new(theme).render(content)
}

struct MarkdownRenderer<'a> {
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    list_stack: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    table_cells: usize,
}

impl<'a> MarkdownRenderer<'a> {
    fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            lines: Vec::new(),
            current_spans: Vec::new(),
            style_stack: vec![theme.text_style],
            list_stack: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            table_cells: 0,
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack
            .last()
            .copied()
            .unwrap_or(self.theme.text_style)
    }

    fn push_modified(&mut self, modifier: Modifier) {
        let style = self.current_style().add_modifier(modifier);
        self.style_stack.push(style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        self.current_spans.push(Span::styled(text.to_string(), style));
    }

    fn quote_prefix(&self) -> Option<Span<'static>> {
        (self.quote_depth > 0).then(|| {
            Span::styled("│ ".repeat(self.quote_depth), self.theme.md_blockquote_style())
        })
    }

    fn flush_current_spans(&mut self) {
        if self.current_spans.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.current_spans);
        if let Some(prefix) = self.quote_prefix() {
            spans.insert(0, prefix);
        }
        self.lines.push(Line::from(spans));
    }

    fn push_empty_line(&mut self) {
        self.flush_current_spans();
        let last_is_blank = self
            .lines
            .last()
            .is_none_or(|line| line.spans.iter().all(|span| span.content.trim().is_empty()));
        if !last_is_blank {
            self.lines.push(Line::default());
        }
    }

    fn push_code_text(&mut self, text: &str) {
        let style = self.theme.code_block_style;
        let mut pieces = text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            let last = pieces.peek().is_none();
            if last && piece.is_empty() {
                break;
            }
            self.current_spans
                .push(Span::styled(format!("  {piece}"), style));
            if !last {
                self.flush_current_spans();
            }
        }
    }

    fn start_item(&mut self) {
        self.flush_current_spans();
        let depth = self.list_stack.len().saturating_sub(1);
        let marker = match self.list_stack.last_mut() {
            Some(Some(next)) => {
                let marker = format!("{next}. ");
                *next += 1;
                marker
            }
            _ => "• ".to_string(),
        };
        if depth > 0 {
            self.push_text(&"  ".repeat(depth), self.theme.text_style);
        }
        self.push_text(&marker, self.theme.md_list_marker_style());
    }

    fn render(mut self, content: &str) -> Vec<Line<'static>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        for event in Parser::new_ext(content, options) {
            match event {
                Event::Start(tag) => self.start_tag(tag),
                Event::End(tag) => self.end_tag(tag),
                Event::Text(text) => {
                    if self.in_code_block {
                        self.push_code_text(&text);
                    } else {
                        self.push_text(&text, self.current_style());
                    }
                }
                Event::Code(code) => {
                    let style = self.theme.code_style;
                    self.push_text(&code, style);
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    self.push_text(&html, self.current_style());
                }
                Event::SoftBreak => self.push_text(" ", self.current_style()),
                Event::HardBreak => self.flush_current_spans(),
                Event::Rule => {
                    self.flush_current_spans();
                    self.push_text(&"─".repeat(RULE_WIDTH), self.theme.md_rule_style());
                    self.push_empty_line();
                }
                Event::TaskListMarker(done) => {
                    let marker = if done { "[x] " } else { "[ ] " };
                    self.push_text(marker, self.theme.md_list_marker_style());
                }
                _ => {}
            }
        }

        self.flush_current_spans();
        while self
            .lines
            .last()
            .is_some_and(|line| line.spans.is_empty())
        {
            self.lines.pop();
        }
        self.lines
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_current_spans();
                let style = self.theme.md_heading_style(level as u8);
                self.style_stack.push(style);
            }
            Tag::BlockQuote(_) => {
                self.flush_current_spans();
                self.quote_depth += 1;
                self.style_stack.push(self.theme.md_blockquote_style());
            }
            Tag::List(start) => {
                self.flush_current_spans();
                self.list_stack.push(start);
            }
            Tag::Item => self.start_item(),
            Tag::CodeBlock(kind) => {
                self.flush_current_spans();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.push_text(&format!("  {lang}"), self.theme.muted_style);
                        self.flush_current_spans();
                    }
                }
            }
            Tag::Emphasis => self.push_modified(Modifier::ITALIC),
            Tag::Strong => self.push_modified(Modifier::BOLD),
            Tag::Strikethrough => self.push_modified(Modifier::CROSSED_OUT),
            Tag::Link { .. } | Tag::Image { .. } => self.style_stack.push(self.theme.link_style),
            Tag::TableHead | Tag::TableRow => {
                self.flush_current_spans();
                self.table_cells = 0;
            }
            Tag::TableCell => {
                if self.table_cells > 0 {
                    self.push_text(" │ ", self.theme.muted_style);
                }
                self.table_cells += 1;
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.push_empty_line(),
            TagEnd::Heading(_) => {
                self.pop_style();
                self.push_empty_line();
            }
            TagEnd::BlockQuote(_) => {
                self.flush_current_spans();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
                self.push_empty_line();
            }
            TagEnd::List(_) => {
                self.flush_current_spans();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.push_empty_line();
                }
            }
            TagEnd::Item => self.flush_current_spans(),
            TagEnd::CodeBlock => {
                self.flush_current_spans();
                self.in_code_block = false;
                self.push_empty_line();
            }
            TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Link
            | TagEnd::Image => self.pop_style(),
            TagEnd::TableHead | TagEnd::TableRow => self.flush_current_spans(),
            TagEnd::Table => self.push_empty_line(),
            _ => {}
        }
    }
}
