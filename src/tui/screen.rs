//! crossterm-backed retained widget tree.
//!
//! Every [`WidgetId`] owns a slot at a fixed position. Setters only mark a
//! slot dirty when its value actually changes, and [`Screen::draw`] queues
//! just the dirty slots, so steady telemetry does not repaint the terminal.
//! A full repaint happens on the first draw and after [`Screen::invalidate`].

#![allow(missing_docs)]

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::tui::widgets::{WidgetId, WidgetToolkit, bar};

const MARGIN: u16 = 2;
/// Column where the status block values start, after the row captions.
const VALUE_COL: u16 = MARGIN + 8;

// ──────────────────── layout ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    col: u16,
    row: u16,
    color: Color,
}

/// Row captions of the status block, drawn on full repaints.
const CAPTIONS: [(u16, &str); 4] = [(2, "Status"), (3, "Total"), (4, "Layer"), (5, "GCODE")];

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Text(String),
    Bar { progress: f64, total: Option<f64> },
}

#[derive(Debug, Clone)]
struct Slot {
    content: Content,
    dirty: bool,
    /// Visible width of the last drawn content, so shorter text can blank it.
    drawn: usize,
}

impl Slot {
    fn new(id: WidgetId) -> Self {
        let content = if id.is_bar() {
            Content::Bar {
                progress: 0.0,
                total: None,
            }
        } else if id == WidgetId::Sequence {
            Content::Text("waiting".to_string())
        } else {
            Content::Text(String::new())
        };
        Self {
            content,
            dirty: true,
            drawn: 0,
        }
    }

    fn update(&mut self, content: Content) {
        if self.content != content {
            self.content = content;
            self.dirty = true;
        }
    }
}

/// Retained dashboard screen.
pub struct Screen {
    slots: Vec<Slot>,
    title: String,
    clock: String,
    header_dirty: bool,
    full_redraw: bool,
    bar_width: u16,
    cols: u16,
    rows: u16,
}

impl Screen {
    #[must_use]
    pub fn new(title: impl Into<String>, bar_width: u16, size: (u16, u16)) -> Self {
        Self {
            slots: WidgetId::ALL.into_iter().map(Slot::new).collect(),
            title: title.into(),
            clock: String::new(),
            header_dirty: true,
            full_redraw: true,
            bar_width,
            cols: size.0,
            rows: size.1,
        }
    }

    /// Force a full repaint on the next draw.
    pub fn invalidate(&mut self) {
        self.full_redraw = true;
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.invalidate();
    }

    pub fn set_clock(&mut self, clock: &str) {
        if self.clock != clock {
            self.clock = clock.to_string();
            self.header_dirty = true;
        }
    }

    #[must_use]
    pub fn text(&self, id: WidgetId) -> Option<&str> {
        match &self.slot(id).content {
            Content::Text(text) => Some(text),
            Content::Bar { .. } => None,
        }
    }

    #[must_use]
    pub fn progress(&self, id: WidgetId) -> Option<(f64, Option<f64>)> {
        match self.slot(id).content {
            Content::Bar { progress, total } => Some((progress, total)),
            Content::Text(_) => None,
        }
    }

    #[must_use]
    pub fn is_dirty(&self, id: WidgetId) -> bool {
        self.full_redraw || self.slot(id).dirty
    }

    fn slot(&self, id: WidgetId) -> &Slot {
        &self.slots[id as usize]
    }

    fn gauge_width(&self) -> u16 {
        (self.bar_width / 2).max(5)
    }

    fn placement(&self, id: WidgetId) -> Placement {
        let bar_end = VALUE_COL + self.bar_width + 3;
        let gauge_end = MARGIN + self.gauge_width() + 2;
        let fan_col = gauge_end + 6;
        let (col, row, color) = match id {
            WidgetId::Status => (VALUE_COL, 2, Color::White),
            WidgetId::Sequence => (bar_end + 8, 2, Color::DarkGrey),
            WidgetId::Progress => (VALUE_COL, 3, Color::Green),
            WidgetId::Remaining => (bar_end + 6, 3, Color::White),
            WidgetId::Layers => (VALUE_COL, 4, Color::DarkGreen),
            WidgetId::LayerText => (bar_end + 1, 4, Color::White),
            WidgetId::Gcode => (VALUE_COL, 5, Color::White),
            WidgetId::NozzleBar => (MARGIN, 7, Color::Red),
            WidgetId::Nozzle => (MARGIN, 8, Color::Red),
            WidgetId::HotbedBar => (MARGIN, 10, Color::DarkYellow),
            WidgetId::Hotbed => (MARGIN, 11, Color::DarkYellow),
            WidgetId::HeatbreakBar => (fan_col, 7, Color::Cyan),
            WidgetId::Heatbreak => (fan_col, 8, Color::Cyan),
            WidgetId::CoolingBar => (fan_col, 10, Color::Cyan),
            WidgetId::Cooling => (fan_col, 11, Color::Cyan),
            WidgetId::Wifi => (MARGIN, 13, Color::White),
            WidgetId::Lights => (fan_col, 13, Color::White),
            WidgetId::Connection => (MARGIN, 15, Color::Yellow),
        };
        Placement { col, row, color }
    }

    /// Columns available to `id` before the next widget on its row (one
    /// blank column kept) or the right edge of the terminal.
    fn max_width(&self, id: WidgetId) -> usize {
        let place = self.placement(id);
        let next = WidgetId::ALL
            .into_iter()
            .map(|other| self.placement(other))
            .filter(|other| other.row == place.row && other.col > place.col)
            .map(|other| other.col.saturating_sub(1))
            .min()
            .unwrap_or(self.cols);
        usize::from(next.min(self.cols).saturating_sub(place.col))
    }

    fn bar_width_for(&self, id: WidgetId) -> usize {
        match id {
            WidgetId::Progress | WidgetId::Layers => usize::from(self.bar_width),
            _ => usize::from(self.gauge_width()),
        }
    }

    fn render_content(&self, id: WidgetId) -> String {
        match &self.slot(id).content {
            Content::Text(text) => text.clone(),
            Content::Bar { progress, total } => {
                let mut rendered = bar(*progress, *total, self.bar_width_for(id));
                if id == WidgetId::Progress {
                    rendered.push_str(&format!(" {progress:>3.0}%"));
                }
                rendered
            }
        }
    }

    // ──────────────────── drawing ────────────────────

    /// Queue every pending change to `out` and flush. Returns the number of
    /// widgets repainted.
    pub fn draw<W: Write>(&mut self, out: &mut W) -> io::Result<usize> {
        if self.full_redraw {
            queue!(out, Clear(ClearType::All))?;
            self.draw_frame(out)?;
            for slot in &mut self.slots {
                slot.dirty = true;
                slot.drawn = 0;
            }
            self.header_dirty = true;
            self.full_redraw = false;
        }

        if self.header_dirty {
            self.draw_header(out)?;
            self.header_dirty = false;
        }

        let mut painted = 0;
        for id in WidgetId::ALL {
            if !self.slots[id as usize].dirty {
                continue;
            }
            let place = self.placement(id);
            if place.row >= self.rows.saturating_sub(1) {
                self.slots[id as usize].dirty = false;
                continue;
            }
            let limit = self.max_width(id);
            let mut content = self.render_content(id);
            if content.chars().count() > limit {
                content = content.chars().take(limit).collect();
            }
            let width = content.chars().count();
            let pad = self.slots[id as usize].drawn.saturating_sub(width);
            queue!(
                out,
                MoveTo(place.col, place.row),
                SetForegroundColor(place.color),
                Print(&content),
                Print(" ".repeat(pad)),
                SetAttribute(Attribute::Reset),
            )?;
            let slot = &mut self.slots[id as usize];
            slot.drawn = width;
            slot.dirty = false;
            painted += 1;
        }

        if painted > 0 {
            out.flush()?;
        }
        Ok(painted)
    }

    fn draw_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let left = format!(" ☰ Bambu Progress ({}) ", self.title);
        let right = format!(" {} ", self.clock);
        let fill = usize::from(self.cols)
            .saturating_sub(left.chars().count() + right.chars().count());
        queue!(
            out,
            MoveTo(0, 0),
            SetForegroundColor(Color::Cyan),
            SetAttribute(Attribute::Bold),
            Print(format!("{left}{}{right}", "─".repeat(fill))),
            SetAttribute(Attribute::Reset),
        )?;
        out.flush()
    }

    fn draw_frame<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (row, caption) in CAPTIONS {
            queue!(
                out,
                MoveTo(MARGIN, row),
                SetForegroundColor(Color::White),
                SetAttribute(Attribute::Bold),
                Print(caption),
                SetAttribute(Attribute::Reset),
            )?;
        }
        if self.rows > 1 {
            let footer = " q/Esc quit ";
            let fill = usize::from(self.cols).saturating_sub(footer.len() + 2);
            queue!(
                out,
                MoveTo(0, self.rows - 1),
                SetForegroundColor(Color::DarkGrey),
                Print(format!("──{footer}{}", "─".repeat(fill))),
                SetAttribute(Attribute::Reset),
            )?;
        }
        Ok(())
    }
}

impl WidgetToolkit for Screen {
    fn set_text(&mut self, id: WidgetId, text: &str) {
        self.slots[id as usize].update(Content::Text(text.to_string()));
    }

    fn set_progress(&mut self, id: WidgetId, progress: f64, total: Option<f64>) {
        self.slots[id as usize].update(Content::Bar { progress, total });
    }
}

// ──────────────────── tests ────────────────────
