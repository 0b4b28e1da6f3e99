//! Display-ready values derived from an initialized snapshot.
//!
//! Pure: the same snapshot and settings always produce the same state.
//! Missing optional fields degrade to zero or empty text.

#![allow(missing_docs)]

use crate::core::config::DashboardConfig;
use crate::telemetry::snapshot::StatusSnapshot;

/// Bar value with an optional scale. `total: None` means the scale is unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarValue {
    pub value: f64,
    pub total: Option<f64>,
}

impl BarValue {
    #[must_use]
    pub const fn new(value: f64, total: Option<f64>) -> Self {
        Self { value, total }
    }
}

/// Everything the renderer writes, one field per widget.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationState {
    pub status: String,
    pub progress: BarValue,
    pub remaining: String,
    pub layers: BarValue,
    pub layer_text: String,
    pub gcode: String,
    pub nozzle_bar: BarValue,
    pub nozzle: String,
    pub hotbed_bar: BarValue,
    pub hotbed: String,
    pub heatbreak_bar: BarValue,
    pub heatbreak: String,
    pub cooling_bar: BarValue,
    pub cooling: String,
    pub wifi: String,
    pub lights: String,
}

/// Build the presentation for `snapshot`; `None` while it is uninitialized.
#[must_use]
pub fn build(snapshot: &StatusSnapshot, settings: &DashboardConfig) -> Option<PresentationState> {
    let state = snapshot.job_state()?;
    let job_type = snapshot.job_type.as_deref().unwrap_or_default();
    let task = snapshot.task_name();
    let line = snapshot.current_line_number.unwrap_or(0);

    let current_layer = snapshot.current_layer.unwrap_or(0);
    let total_layers = snapshot.total_layers.unwrap_or(0);

    let nozzle = snapshot.nozzle_temp.unwrap_or(0.0);
    let nozzle_target = snapshot.nozzle_target_temp.unwrap_or(0.0);
    let bed = snapshot.bed_temp.unwrap_or(0.0);
    let bed_target = snapshot.bed_target_temp.unwrap_or(0.0);
    let heatbreak = snapshot.nozzle_fan_speed.unwrap_or(0);
    let cooling = snapshot.cooling_fan_speed.unwrap_or(0);

    let temp_scale = Some(settings.temperature_scale);
    let fan_scale = Some(f64::from(settings.fan_scale));

    Some(PresentationState {
        status: format!("{state} ({job_type})  {task}"),
        progress: BarValue::new(
            f64::from(snapshot.progress_percent.unwrap_or(0)),
            Some(100.0),
        ),
        remaining: remaining_label(snapshot.remaining_minutes.unwrap_or(0)),
        layers: BarValue::new(
            f64::from(current_layer),
            (total_layers > 0).then(|| f64::from(total_layers)),
        ),
        layer_text: layer_text(current_layer, total_layers, line),
        gcode: gcode_label(
            snapshot.job_file_name.as_deref().unwrap_or_default(),
            task,
            line,
        ),
        nozzle_bar: BarValue::new(nozzle, temp_scale),
        nozzle: format!("Nozzle     {nozzle:5.1} / {nozzle_target:5.1} °C"),
        hotbed_bar: BarValue::new(bed, temp_scale),
        hotbed: format!("Hotbed     {bed:5.1} / {bed_target:5.1} °C"),
        heatbreak_bar: BarValue::new(f64::from(heatbreak), fan_scale),
        heatbreak: format!("Nozzle Fan   {heatbreak:2}"),
        cooling_bar: BarValue::new(f64::from(cooling), fan_scale),
        cooling: format!("Cooling Fan  {cooling:2}"),
        wifi: snapshot
            .wifi_signal
            .as_deref()
            .filter(|w| !w.is_empty())
            .map_or_else(|| "WiFi --".to_string(), |w| format!("WiFi {w}")),
        lights: lights_label(snapshot),
    })
}

/// `"H:MMh"` from one hour up, `"MM min"` below, empty at zero.
#[must_use]
pub fn format_remaining(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        format!("{hours}:{mins:02}h")
    } else if mins > 0 {
        format!("{mins:02} min")
    } else {
        String::new()
    }
}

/// Widget text for the remaining time, empty near completion.
#[must_use]
pub fn remaining_label(minutes: u32) -> String {
    let hm = format_remaining(minutes);
    if hm.is_empty() {
        hm
    } else {
        format!("({hm} remaining)")
    }
}

#[must_use]
pub fn layer_text(current: u32, total: u32, line: u64) -> String {
    if total > 0 {
        format!("{current} / {total}, line {line}")
    } else {
        format!("{current}, line {line}")
    }
}

/// File name, the task name when the file is not simply `{task}.gcode.3mf`,
/// and the current G-code line.
#[must_use]
pub fn gcode_label(file: &str, task: &str, line: u64) -> String {
    let mut label = file.to_string();
    if !task.is_empty() && file != format!("{task}.gcode.3mf") {
        if label.is_empty() {
            label.push_str(task);
        } else {
            label.push_str(&format!(" ({task})"));
        }
    }
    label.push_str(&format!(", line {line}"));
    label
}

fn lights_label(snapshot: &StatusSnapshot) -> String {
    if snapshot.lights.is_empty() {
        return "Lights --".to_string();
    }
    snapshot
        .lights
        .iter()
        .map(|light| format!("{} {}", light.node, light.mode))
        .collect::<Vec<_>>()
        .join(", ")
}
