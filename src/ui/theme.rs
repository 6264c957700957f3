use ratatui::style::{Color, Modifier, Style};

use crate::core::app::NoticeKind;

pub const HTB_GREEN: Color = Color::Rgb(0x9f, 0xef, 0x00);
pub const HTB_NAVY: Color = Color::Rgb(0x1a, 0x23, 0x32);
pub const HTB_TEXT: Color = Color::Rgb(0xa4, 0xb1, 0xcd);
pub const HTB_BLUE: Color = Color::Rgb(0x5c, 0xb2, 0xff);
pub const HTB_SLATE: Color = Color::Rgb(0x31, 0x3f, 0x55);
pub const HTB_RED: Color = Color::Rgb(0xff, 0x3e, 0x3e);
pub const HTB_AMBER: Color = Color::Rgb(0xff, 0xaf, 0x00);
const HTB_CODE_BG: Color = Color::Rgb(0x0f, 0x14, 0x1e);

#[derive(Debug, Clone)]
pub struct Theme {
    // Overall background color to paint the full frame
    pub background_color: Color,
    pub text_style: Style,
    pub muted_style: Style,
    pub accent_style: Style,

    // Chrome
    pub title_style: Style,
    pub border_style: Style,
    pub focus_border_style: Style,
    pub header_row_style: Style,
    pub selected_row_style: Style,
    pub disabled_style: Style,
    pub status_bar_style: Style,

    // Markdown
    pub code_style: Style,
    pub code_block_style: Style,
    pub link_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::htb()
    }
}

impl Theme {
    pub fn htb() -> Self {
        let base = Style::default().fg(HTB_TEXT).bg(HTB_NAVY);
        Theme {
            background_color: HTB_NAVY,
            text_style: base,
            muted_style: base.fg(HTB_SLATE),
            accent_style: base.fg(HTB_GREEN).add_modifier(Modifier::BOLD),

            title_style: Style::default()
                .fg(HTB_GREEN)
                .bg(HTB_SLATE)
                .add_modifier(Modifier::BOLD),
            border_style: base.fg(HTB_SLATE),
            focus_border_style: base.fg(HTB_GREEN),
            header_row_style: base.fg(HTB_GREEN).add_modifier(Modifier::BOLD),
            selected_row_style: Style::default().fg(HTB_NAVY).bg(HTB_GREEN),
            disabled_style: base.fg(HTB_SLATE).add_modifier(Modifier::DIM),
            status_bar_style: Style::default().fg(HTB_TEXT).bg(HTB_SLATE),

            code_style: Style::default().fg(HTB_BLUE).bg(HTB_SLATE),
            code_block_style: Style::default().fg(HTB_TEXT).bg(HTB_CODE_BG),
            link_style: base.fg(HTB_BLUE).add_modifier(Modifier::UNDERLINED),
        }
    }

    pub fn md_heading_style(&self, level: u8) -> Style {
        match level {
            1 => self.text_style.fg(HTB_GREEN).add_modifier(Modifier::BOLD),
            2 => self
                .text_style
                .fg(HTB_GREEN)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            _ => self.text_style.fg(HTB_BLUE).add_modifier(Modifier::BOLD),
        }
    }

    pub fn md_list_marker_style(&self) -> Style {
        self.text_style.fg(HTB_GREEN)
    }

    pub fn md_blockquote_style(&self) -> Style {
        self.text_style.fg(HTB_BLUE).add_modifier(Modifier::ITALIC)
    }

    pub fn md_rule_style(&self) -> Style {
        self.muted_style
    }

    pub fn notice_style(&self, kind: NoticeKind) -> Style {
        let color = match kind {
            NoticeKind::Info => HTB_GREEN,
            NoticeKind::Warning => HTB_AMBER,
            NoticeKind::Error => HTB_RED,
        };
        self.status_bar_style.fg(color).add_modifier(Modifier::BOLD)
    }
}
