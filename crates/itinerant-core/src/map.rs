//! Flattening a session's planned days into something a map widget can draw.

use serde::Serialize;

use crate::coords::{self, Coordinates};
use crate::model::{Activity, Session};

/// Used when nothing on the plan has been located yet.
pub const DEFAULT_CENTER: Coordinates = Coordinates::new(48.8566, 2.3522);

pub const DAY_COLORS: [&str; 7] = [
    "#e74c3c", "#3498db", "#2ecc71", "#9b59b6", "#f39c12", "#1abc9c", "#e91e63",
];

const DESCRIPTION_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// 1-based position across the whole trip.
    pub order: usize,
    pub name: String,
    pub description: String,
    pub day: u32,
    pub time_of_day: TimeOfDay,
    pub lat: f64,
    pub lng: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub day: u32,
    pub color: &'static str,
    pub points: Vec<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub day: u32,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinates,
    pub markers: Vec<Marker>,
    pub routes: Vec<Route>,
    pub legend: Vec<LegendEntry>,
}

pub fn day_color(day: u32) -> &'static str {
    let idx = (day.max(1) as usize - 1) % DAY_COLORS.len();
    DAY_COLORS[idx]
}

/// Build the map for every expanded day of `session`, in day order.
pub fn build(session: &Session) -> MapView {
    let mut markers = Vec::new();
    for day in session.expanded_days.values() {
        let slots = [
            (TimeOfDay::Morning, &day.morning),
            (TimeOfDay::Afternoon, &day.afternoon),
            (TimeOfDay::Evening, &day.evening),
        ];
        for (time_of_day, activities) in slots {
            for activity in activities {
                if let Some(marker) = marker(activity, day.day_number, time_of_day, markers.len() + 1) {
                    markers.push(marker);
                }
            }
        }
    }

    let routes = routes(&markers);

    let mut legend: Vec<LegendEntry> = Vec::new();
    for m in &markers {
        if legend.last().is_none_or(|entry| entry.day != m.day) {
            legend.push(LegendEntry { day: m.day, color: m.color });
        }
    }

    let center = if markers.is_empty() {
        DEFAULT_CENTER
    } else {
        let points: Vec<Coordinates> = markers
            .iter()
            .map(|m| Coordinates::new(m.lat, m.lng))
            .collect();
        coords::centroid(&points)
    };

    MapView {
        center,
        markers,
        routes,
        legend,
    }
}

fn marker(activity: &Activity, day: u32, time_of_day: TimeOfDay, order: usize) -> Option<Marker> {
    let location = activity.coordinates.filter(Coordinates::is_finite)?;
    Some(Marker {
        order,
        name: activity.name.clone(),
        description: truncate(&activity.description),
        day,
        time_of_day,
        lat: location.lat,
        lng: location.lng,
        color: day_color(day),
    })
}

/// One polyline per day; each day after the first starts from the last
/// point of the day before so the path stays connected.
fn routes(markers: &[Marker]) -> Vec<Route> {
    if markers.len() < 2 {
        return Vec::new();
    }
    let mut routes: Vec<Route> = Vec::new();
    for m in markers {
        let point = Coordinates::new(m.lat, m.lng);
        match routes.last_mut() {
            Some(route) if route.day == m.day => {
                route.points.push(point);
                continue;
            }
            _ => {}
        }
        let mut points: Vec<Coordinates> = routes
            .last()
            .and_then(|route| route.points.last().copied())
            .into_iter()
            .collect();
        points.push(point);
        routes.push(Route {
            day: m.day,
            color: m.color,
            points,
        });
    }
    routes
}

fn truncate(description: &str) -> String {
    if description.chars().count() <= DESCRIPTION_LIMIT {
        return description.to_owned();
    }
    let mut cut: String = description.chars().take(DESCRIPTION_LIMIT).collect();
    cut.push_str("...");
    cut
}
