//! The one ruler pipeline every instrument is drawn with.
//!
//! An instrument is a horizontally scrolling ruler of width `W` with a fixed center marker.
//! For the current value `c` the ruler shows every multiple of the marker distance within
//! `c ± range/2`, each placed at `center + round(delta / range * W * 0.75)`.

use super::{
    canvas::{HudCanvas, label_height},
    instrument::{InstrumentDefinition, InstrumentKind, WrapPolicy},
    vec2d::Vec2D,
};
use crate::flight_control::TelemetrySnapshot;
use itertools::Itertools;
use num::ToPrimitive;
use strum::IntoEnumIterator;

/// Share of the ruler width that the full value range spans.
const RULER_SPAN: f64 = 0.75;
const MINOR_TICK: u32 = 4;
const MAJOR_TICK: u32 = 8;
const LABEL_GAP: i32 = 2;
/// Vertical space one instrument row occupies in the default layout.
pub(crate) const ROW_HEIGHT: u32 = label_height() + MAJOR_TICK + 12;

/// Where one ruler goes on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InstrumentPlacement {
    /// Top-left corner of the instrument row.
    pub(crate) origin: Vec2D<i32>,
    /// Ruler width `W` in pixels.
    pub(crate) width: u32,
}

impl InstrumentPlacement {
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) fn center_x(&self) -> i32 { self.origin.x() + (self.width / 2) as i32 }
}

/// A tick that survived range clipping, ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RulerTick {
    /// Marker value before label normalization.
    pub(crate) value: f64,
    pub(crate) x: i32,
    pub(crate) label: Option<String>,
}

/// Signed distance from `current` to the marker `value` under `policy`.
pub(crate) fn placement_delta(policy: WrapPolicy, value: f64, current: f64) -> f64 {
    match policy {
        WrapPolicy::Linear => value - current,
        WrapPolicy::Circular360 => (value - current + 540.0).rem_euclid(360.0) - 180.0,
    }
}

/// Value printed on a labeled tick. Circular values are folded into `[0, 360)`.
pub(crate) fn label_value(policy: WrapPolicy, value: f64) -> f64 {
    match policy {
        WrapPolicy::Linear => value,
        WrapPolicy::Circular360 => value.rem_euclid(360.0),
    }
}

/// Pixel offset of a tick from the ruler center.
pub(crate) fn tick_offset(delta: f64, value_range: f64, width: u32) -> Option<i32> {
    (delta / value_range * f64::from(width) * RULER_SPAN).round().to_i32()
}

/// Computes the visible ticks of `definition` around `current`.
///
/// Returns an empty ruler for values that are not finite.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn ruler_ticks(
    definition: &InstrumentDefinition,
    current: f64,
    placement: InstrumentPlacement,
) -> Vec<RulerTick> {
    let half_range = definition.value_range / 2.0;
    let step = definition.marker_distance;
    let (Some(first), Some(last)) = (
        ((current - half_range) / step).floor().to_i64(),
        ((current + half_range) / step).ceil().to_i64(),
    ) else {
        return Vec::new();
    };
    let every_n = i64::from(definition.labeled_every_n_markers.max(1));
    let center = placement.center_x();

    (first..=last)
        .filter_map(|index| {
            let value = index as f64 * step;
            let delta = placement_delta(definition.wrap_policy, value, current);
            if delta.abs() > half_range {
                return None;
            }
            let x = center + tick_offset(delta, definition.value_range, placement.width)?;
            let label = (index.rem_euclid(every_n) == 0).then(|| {
                (definition.label_formatter)(label_value(definition.wrap_policy, value))
            });
            Some(RulerTick { value, x, label })
        })
        .collect_vec()
}

/// Draws one instrument for `snapshot` onto `canvas`.
///
/// Labels sit on top, ticks hang below them and the center marker points up at the ticks.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn render_instrument<C: HudCanvas + ?Sized>(
    canvas: &mut C,
    snapshot: &TelemetrySnapshot,
    definition: &InstrumentDefinition,
    placement: InstrumentPlacement,
) {
    let current = (definition.value_extractor)(snapshot);
    let label_top = placement.origin.y();
    let tick_top = label_top + label_height() as i32 + LABEL_GAP;

    for tick in ruler_ticks(definition, current, placement) {
        match &tick.label {
            Some(text) => {
                canvas.draw_tick(tick.x, tick_top, MAJOR_TICK);
                canvas.draw_label(tick.x, label_top, text);
            }
            None => {
                let minor_top = tick_top + (MAJOR_TICK - MINOR_TICK) as i32;
                canvas.draw_tick(tick.x, minor_top, MINOR_TICK);
            }
        }
    }
    canvas.draw_center_marker(placement.center_x(), tick_top + MAJOR_TICK as i32 + LABEL_GAP);
}

/// Positions of all instruments on a surface.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HudLayout {
    size: Vec2D<u32>,
    rows: Vec<(InstrumentKind, InstrumentPlacement)>,
}

impl HudLayout {
    const TOP_MARGIN: u32 = 6;

    /// Stacks the instruments top-down, each ruler half as wide as the surface and centered.
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    pub(crate) fn for_size(size: Vec2D<u32>) -> Self {
        let width = size.x() / 2;
        let left = (size.x() / 4) as i32;
        let rows = InstrumentKind::iter()
            .enumerate()
            .map(|(row, kind)| {
                let top = Self::TOP_MARGIN + ROW_HEIGHT * row as u32;
                (kind, InstrumentPlacement { origin: Vec2D::new(left, top as i32), width })
            })
            .collect();
        Self { size, rows }
    }

    pub(crate) fn size(&self) -> Vec2D<u32> { self.size }

    pub(crate) fn placement(&self, kind: InstrumentKind) -> Option<InstrumentPlacement> {
        self.rows.iter().find(|(k, _)| *k == kind).map(|(_, p)| *p)
    }

    /// Draws every instrument of the layout.
    pub(crate) fn render<C: HudCanvas + ?Sized>(
        &self,
        canvas: &mut C,
        snapshot: &TelemetrySnapshot,
    ) {
        for (kind, placement) in &self.rows {
            render_instrument(canvas, snapshot, &kind.definition(), *placement);
        }
    }
}
