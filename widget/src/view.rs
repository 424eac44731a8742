use std::fmt;

use chrono::{DateTime, Utc};
use geokit_location::{Position, UNSUPPORTED_MESSAGE};
use geokit_permission::PermissionState;

use crate::services::Availability;
use crate::state::WidgetState;

/// What the widget is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No location service exists on this host.
    Unsupported,
    /// Nothing in flight.
    Idle,
    /// A one-shot request is in flight.
    Loading,
    /// A tracking session is active.
    Watching,
}

impl Status {
    const fn label(self) -> &'static str {
        match self {
            Self::Unsupported => "Unsupported",
            Self::Idle => "Idle",
            Self::Loading => "Getting location...",
            Self::Watching => "Tracking",
        }
    }
}

/// A labelled value in the coordinate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Field name.
    pub label: &'static str,
    /// Formatted value.
    pub value: String,
}

/// The user actions a view offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// One-shot request.
    GetLocation,
    /// Begin tracking.
    StartTracking,
    /// End tracking.
    StopTracking,
    /// Copy coordinates.
    Copy,
    /// Open in map viewer.
    OpenMap,
}

/// An action affordance and whether it can currently be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Which operation the action triggers.
    pub kind: ActionKind,
    /// Button text.
    pub label: &'static str,
    /// Whether the action is enabled.
    pub enabled: bool,
}

/// A rendering of the widget state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    /// Current activity.
    pub status: Status,
    /// Last reported location permission.
    pub permission: PermissionState,
    /// Coordinate table, empty until a reading arrives.
    pub rows: Vec<Row>,
    /// UTC time of the displayed reading.
    pub updated_at: Option<String>,
    /// Error banner.
    pub error: Option<String>,
    /// Available actions, in display order.
    pub actions: Vec<Action>,
}

impl WidgetView {
    pub(crate) fn render(state: &WidgetState, availability: &Availability) -> Self {
        let supported = availability.location;
        let status = if !supported {
            Status::Unsupported
        } else if state.loading {
            Status::Loading
        } else if state.watching {
            Status::Watching
        } else {
            Status::Idle
        };

        let error = if supported {
            state.error.clone()
        } else {
            Some(UNSUPPORTED_MESSAGE.to_string())
        };

        let has_position = state.position.is_some();
        let tracking_action = if state.watching {
            Action {
                kind: ActionKind::StopTracking,
                label: "Stop tracking",
                enabled: true,
            }
        } else {
            Action {
                kind: ActionKind::StartTracking,
                label: "Start tracking",
                enabled: supported,
            }
        };
        let actions = vec![
            Action {
                kind: ActionKind::GetLocation,
                label: if state.loading {
                    "Getting location..."
                } else {
                    "Get location"
                },
                enabled: supported && !state.loading,
            },
            tracking_action,
            Action {
                kind: ActionKind::Copy,
                label: "Copy coordinates",
                enabled: has_position && availability.clipboard,
            },
            Action {
                kind: ActionKind::OpenMap,
                label: "Open in map",
                enabled: has_position && availability.launcher,
            },
        ];

        Self {
            status,
            permission: state.permission,
            rows: state.position.as_ref().map(rows).unwrap_or_default(),
            updated_at: state.position.as_ref().and_then(|p| format_timestamp(p.timestamp)),
            error,
            actions,
        }
    }

    /// The action of `kind`, if the view offers it.
    #[must_use]
    pub fn action(&self, kind: ActionKind) -> Option<&Action> {
        self.actions.iter().find(|action| action.kind == kind)
    }

    /// The value shown for `label`, if present.
    #[must_use]
    pub fn value(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.value.as_str())
    }
}

fn rows(position: &Position) -> Vec<Row> {
    let mut rows = vec![
        Row {
            label: "Latitude",
            value: position.latitude.to_string(),
        },
        Row {
            label: "Longitude",
            value: position.longitude.to_string(),
        },
        Row {
            label: "Accuracy",
            value: format!("±{} m", position.accuracy),
        },
    ];
    let optional = [
        ("Altitude", position.altitude, " m"),
        ("Altitude accuracy", position.altitude_accuracy, " m"),
        ("Heading", position.heading, "°"),
        ("Speed", position.speed, " m/s"),
    ];
    rows.extend(optional.into_iter().filter_map(|(label, value, unit)| {
        value.map(|value| Row {
            label,
            value: format!("{value}{unit}"),
        })
    }));
    rows
}

fn format_timestamp(timestamp: u64) -> Option<String> {
    let millis = i64::try_from(timestamp).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

impl fmt::Display for WidgetView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Location  [{}]  permission: {}", self.status.label(), self.permission)?;
        if let Some(error) = &self.error {
            writeln!(f, "  ! {error}")?;
        }
        let width = self.rows.iter().map(|row| row.label.len()).max().unwrap_or(0);
        for row in &self.rows {
            writeln!(f, "  {:<width$}  {}", row.label, row.value)?;
        }
        if let Some(updated_at) = &self.updated_at {
            writeln!(f, "  updated {updated_at}")?;
        }
        let actions: Vec<String> = self
            .actions
            .iter()
            .map(|action| {
                if action.enabled {
                    format!("[{}]", action.label)
                } else {
                    format!("({})", action.label)
                }
            })
            .collect();
        write!(f, "  {}", actions.join(" "))
    }
}
