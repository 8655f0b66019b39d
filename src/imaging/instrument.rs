use crate::flight_control::TelemetrySnapshot;
use std::collections::HashMap;
use std::sync::LazyLock;
use strum_macros::{Display, EnumIter};

/// How a marker value relates to the current value when placing it on the ruler.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum WrapPolicy {
    /// Plain signed difference.
    Linear,
    /// Shortest signed angular distance on a 360° circle.
    Circular360,
}

/// The ruler gauges drawn over the video.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Display, EnumIter)]
pub enum InstrumentKind {
    Heading,
    Pitch,
    Roll,
    Altitude,
    Battery,
}

/// Constants parameterizing the shared ruler pipeline for one gauge.
#[derive(Clone, Copy)]
pub struct InstrumentDefinition {
    /// Reads the displayed scalar out of a snapshot.
    pub value_extractor: fn(&TelemetrySnapshot) -> f64,
    /// Full value span visible across the ruler.
    pub value_range: f64,
    /// Value distance between two neighbouring ticks.
    pub marker_distance: f64,
    /// Every n-th tick (by value index) carries a label.
    pub labeled_every_n_markers: u32,
    pub label_formatter: fn(f64) -> String,
    pub wrap_policy: WrapPolicy,
}

impl std::fmt::Debug for InstrumentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentDefinition")
            .field("value_range", &self.value_range)
            .field("marker_distance", &self.marker_distance)
            .field("labeled_every_n_markers", &self.labeled_every_n_markers)
            .field("wrap_policy", &self.wrap_policy)
            .finish_non_exhaustive()
    }
}

impl InstrumentKind {
    pub fn definition(self) -> InstrumentDefinition { INSTRUMENT_LOOKUP[&self] }
}

fn format_whole(value: f64) -> String { format!("{value:.0}") }

fn format_meters(value: f64) -> String { format!("{value:.0}m") }

fn format_percent(value: f64) -> String { format!("{value:.0}%") }

static INSTRUMENT_LOOKUP: LazyLock<HashMap<InstrumentKind, InstrumentDefinition>> =
    LazyLock::new(|| {
        let mut lookup = HashMap::new();
        let definitions = vec![
            (InstrumentKind::Heading, InstrumentDefinition {
                value_extractor: |s| f64::from(s.psi()),
                value_range: 90.0,
                marker_distance: 5.0,
                labeled_every_n_markers: 2,
                label_formatter: format_whole,
                wrap_policy: WrapPolicy::Circular360,
            }),
            (InstrumentKind::Pitch, InstrumentDefinition {
                value_extractor: |s| f64::from(s.theta()),
                value_range: 60.0,
                marker_distance: 5.0,
                labeled_every_n_markers: 2,
                label_formatter: format_whole,
                wrap_policy: WrapPolicy::Linear,
            }),
            (InstrumentKind::Roll, InstrumentDefinition {
                value_extractor: |s| f64::from(s.phi()),
                value_range: 60.0,
                marker_distance: 5.0,
                labeled_every_n_markers: 2,
                label_formatter: format_whole,
                wrap_policy: WrapPolicy::Linear,
            }),
            (InstrumentKind::Altitude, InstrumentDefinition {
                value_extractor: |s| f64::from(s.altitude()),
                value_range: 10.0,
                marker_distance: 0.5,
                labeled_every_n_markers: 2,
                label_formatter: format_meters,
                wrap_policy: WrapPolicy::Linear,
            }),
            (InstrumentKind::Battery, InstrumentDefinition {
                value_extractor: |s| f64::from(s.battery_percent()),
                value_range: 50.0,
                marker_distance: 5.0,
                labeled_every_n_markers: 2,
                label_formatter: format_percent,
                wrap_policy: WrapPolicy::Linear,
            }),
        ];

        for (kind, definition) in definitions {
            lookup.insert(kind, definition);
        }
        lookup
    });
