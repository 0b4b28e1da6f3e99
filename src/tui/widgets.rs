//! Named widgets, the toolkit boundary, and shared bar glyphs.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

/// Every widget on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WidgetId {
    Status,
    Sequence,
    Progress,
    Remaining,
    Layers,
    LayerText,
    Gcode,
    NozzleBar,
    Nozzle,
    HotbedBar,
    Hotbed,
    HeatbreakBar,
    Heatbreak,
    CoolingBar,
    Cooling,
    Wifi,
    Lights,
    Connection,
}

impl WidgetId {
    pub const ALL: [Self; 18] = [
        Self::Status,
        Self::Sequence,
        Self::Progress,
        Self::Remaining,
        Self::Layers,
        Self::LayerText,
        Self::Gcode,
        Self::NozzleBar,
        Self::Nozzle,
        Self::HotbedBar,
        Self::Hotbed,
        Self::HeatbreakBar,
        Self::Heatbreak,
        Self::CoolingBar,
        Self::Cooling,
        Self::Wifi,
        Self::Lights,
        Self::Connection,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Sequence => "sequence",
            Self::Progress => "progress",
            Self::Remaining => "remaining",
            Self::Layers => "layers",
            Self::LayerText => "layertext",
            Self::Gcode => "gcode",
            Self::NozzleBar => "nozzle_bar",
            Self::Nozzle => "nozzle",
            Self::HotbedBar => "hotbed_bar",
            Self::Hotbed => "hotbed",
            Self::HeatbreakBar => "heatbreak_bar",
            Self::Heatbreak => "heatbreak",
            Self::CoolingBar => "cooling_bar",
            Self::Cooling => "cooling",
            Self::Wifi => "wifi",
            Self::Lights => "lights",
            Self::Connection => "connection",
        }
    }

    /// Bars take `set_progress`; everything else is a text label.
    #[must_use]
    pub const fn is_bar(self) -> bool {
        matches!(
            self,
            Self::Progress
                | Self::Layers
                | Self::NozzleBar
                | Self::HotbedBar
                | Self::HeatbreakBar
                | Self::CoolingBar
        )
    }
}

/// Retained widget tree the renderer writes into.
///
/// Calls are synchronous and must come from the thread that owns the display.
pub trait WidgetToolkit {
    fn set_text(&mut self, id: WidgetId, text: &str);
    /// `total: None` leaves the bar without a denominator.
    fn set_progress(&mut self, id: WidgetId, progress: f64, total: Option<f64>);
}

/// Render a horizontal bar: `[████████░░░░░░░░]`.
///
/// With no known total the bar stays empty.
#[must_use]
pub fn bar(progress: f64, total: Option<f64>, width: usize) -> String {
    let fraction = match total {
        Some(total) if total > 0.0 => (progress / total).clamp(0.0, 1.0),
        _ => 0.0,
    };
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(width.saturating_sub(filled))
    )
}
