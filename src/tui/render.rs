//! Routes a [`PresentationState`] onto the widget tree, one call per field.

#![allow(missing_docs)]

use crate::tui::presentation::{BarValue, PresentationState};
use crate::tui::widgets::{WidgetId, WidgetToolkit};

/// Write every presentation field to its widget. Idempotent.
pub fn render<W: WidgetToolkit + ?Sized>(p: &PresentationState, widgets: &mut W) {
    let bar = |widgets: &mut W, id: WidgetId, v: BarValue| widgets.set_progress(id, v.value, v.total);

    widgets.set_text(WidgetId::Status, &p.status);
    bar(widgets, WidgetId::Progress, p.progress);
    widgets.set_text(WidgetId::Remaining, &p.remaining);
    bar(widgets, WidgetId::Layers, p.layers);
    widgets.set_text(WidgetId::LayerText, &p.layer_text);
    widgets.set_text(WidgetId::Gcode, &p.gcode);

    bar(widgets, WidgetId::NozzleBar, p.nozzle_bar);
    widgets.set_text(WidgetId::Nozzle, &p.nozzle);
    bar(widgets, WidgetId::HotbedBar, p.hotbed_bar);
    widgets.set_text(WidgetId::Hotbed, &p.hotbed);

    bar(widgets, WidgetId::HeatbreakBar, p.heatbreak_bar);
    widgets.set_text(WidgetId::Heatbreak, &p.heatbreak);
    bar(widgets, WidgetId::CoolingBar, p.cooling_bar);
    widgets.set_text(WidgetId::Cooling, &p.cooling);

    widgets.set_text(WidgetId::Wifi, &p.wifi);
    widgets.set_text(WidgetId::Lights, &p.lights);
}
