//! Activity-first flow: suggest, select and group activities, lay out the
//! days, then find restaurants around them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use super::{Operation, StageOutcome, Workflow, check, require_destination, unexpected};
use crate::coords::{self, Coordinates};
use crate::error::WorkflowError;
use crate::model::{
    Activity, ExpandedDay, GroupedDay, RestaurantSuggestion, Session, SuggestedActivity,
};
use crate::services::{PlaceQuery, PlaceResult};
use crate::session::{SessionPatch, SessionStore};
use crate::stage::{DayGroup, Stage, StagePayload, StageRequest};

/// Restaurant hits kept per search.
const RESTAURANTS_PER_SEARCH: usize = 5;

/// Move one activity to another grouped day before the layout is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityMove {
    pub activity_id: String,
    pub to_day: u32,
}

impl<S: SessionStore> Workflow<S> {
    pub async fn suggest_activities(&self, id: &str) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::SuggestActivities, session.workflow_state)?;
        let destination = require_destination(&session)?;

        let (reply, activities) = match self.call(&session, StageRequest::SuggestActivities {}).await? {
            StagePayload::SuggestActivities { reply, activities } => (reply, activities),
            other => return Err(unexpected(Stage::SuggestActivities, &other)),
        };
        if activities.is_empty() {
            return Err(WorkflowError::Upstream("no activities were suggested".into()));
        }
        let activities = self
            .enricher
            .enrich(assign_ids(activities), &destination, None)
            .await;
        info!(session_id = %id, count = activities.len(), "activities suggested");

        let patch = SessionPatch::new()
            .state(next)
            .suggested_activities(activities)
            .selected_activity_ids(BTreeSet::new())
            .grouped_days(Vec::new())
            .expanded_days(BTreeMap::new())
            .restaurant_suggestions(Vec::new())
            .selected_restaurant_ids(BTreeSet::new())
            .final_plan(None);
        self.commit(id, patch, None, reply).await
    }

    pub async fn group_days(
        &self,
        id: &str,
        selected_ids: Vec<String>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::GroupDays, session.workflow_state)?;

        let selected = select_activities(&session.suggested_activities, &selected_ids)?;
        let request = StageRequest::GroupDays { activities: selected.clone() };
        let (reply, proposals) = match self.call(&session, request).await? {
            StagePayload::GroupDays { reply, days } => (reply, days),
            other => return Err(unexpected(Stage::GroupDays, &other)),
        };

        let day_count = session
            .trip_info
            .duration
            .filter(|d| *d > 0)
            .map(|d| d as usize)
            .unwrap_or_else(|| proposals.len().max(1));
        let grouped = build_groups(&session, selected, &proposals, day_count);
        info!(session_id = %id, days = grouped.len(), "activities grouped into days");

        let ids = grouped
            .iter()
            .flat_map(|d| d.activities.iter().map(|a| a.id.clone()))
            .collect();
        let patch = SessionPatch::new()
            .state(next)
            .selected_activity_ids(ids)
            .grouped_days(grouped)
            .expanded_days(BTreeMap::new())
            .restaurant_suggestions(Vec::new())
            .selected_restaurant_ids(BTreeSet::new())
            .final_plan(None);
        self.commit(id, patch, None, reply).await
    }

    /// Apply the traveller's moves, then lay every grouped day out as a
    /// timed itinerary.
    pub async fn confirm_day_grouping(
        &self,
        id: &str,
        moves: Vec<ActivityMove>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::ConfirmDayGrouping, session.workflow_state)?;
        let destination = require_destination(&session)?;

        let mut grouped = session.grouped_days.clone();
        for mv in &moves {
            apply_move(&mut grouped, mv)?;
        }

        let request = StageRequest::DayItinerary { grouped_days: grouped.clone() };
        let (reply, days) = match self.call(&session, request).await? {
            StagePayload::DayItinerary { reply, days } => (reply, days),
            other => return Err(unexpected(Stage::DayItinerary, &other)),
        };

        let mut proposed: HashMap<u32, ExpandedDay> = HashMap::new();
        for day in days {
            proposed.entry(day.day_number).or_insert(day);
        }

        let mut expanded = BTreeMap::new();
        for group in &grouped {
            let mut day = match proposed.remove(&group.day_number) {
                Some(day) => day,
                None => {
                    debug!(day = group.day_number, "no layout proposed, using best time of day");
                    fallback_itinerary(group)
                }
            };
            day.day_number = group.day_number;
            day.date = group.date.or(day.date);
            if day.theme.trim().is_empty() {
                day.theme = group.theme.clone();
            }
            carry_known_locations(&mut day, &group.activities);
            let day = self.enrich_day(day, &destination).await;
            expanded.insert(day.day_number, day);
        }
        info!(session_id = %id, days = expanded.len(), moves = moves.len(), "day grouping confirmed");

        let patch = SessionPatch::new()
            .state(next)
            .grouped_days(grouped)
            .expanded_days(expanded)
            .restaurant_suggestions(Vec::new())
            .selected_restaurant_ids(BTreeSet::new());
        self.commit(id, patch, None, reply).await
    }

    /// Search restaurants around each day's activities.
    pub async fn meal_preferences(
        &self,
        id: &str,
        preferences: Option<String>,
    ) -> Result<StageOutcome, WorkflowError> {
        let session = self.load(id).await?;
        let next = check(Operation::MealPreferences, session.workflow_state)?;
        let destination = require_destination(&session)?;
        let preferences = preferences.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty());

        let request = StageRequest::MealPreferences { preferences: preferences.clone() };
        let (reply, queries) = match self.call(&session, request).await? {
            StagePayload::MealPreferences { reply, queries } => (reply, queries),
            other => return Err(unexpected(Stage::MealPreferences, &other)),
        };
        let queries = normalize_queries(queries);

        let radius = self.config.restaurant_radius_m;
        let mut fallback_center: Option<Option<Coordinates>> = None;
        let mut seen_place_ids = HashSet::new();
        let mut restaurants = Vec::new();

        for group in &session.grouped_days {
            let points = day_points(&session, group);
            let center = if points.is_empty() {
                if fallback_center.is_none() {
                    fallback_center = Some(self.enricher.geocode(&destination).await);
                }
                fallback_center.flatten()
            } else {
                Some(coords::centroid(&points))
            };

            for query in &queries {
                let mut search =
                    PlaceQuery::text(format!("{query} in {destination}")).category("restaurant");
                if let Some(center) = center {
                    search = search.near(center, radius);
                }
                let hits = self.enricher.search_places(&search).await;
                for hit in hits.into_iter().take(RESTAURANTS_PER_SEARCH) {
                    if let Some(place_id) = &hit.place_id {
                        if !seen_place_ids.insert(place_id.clone()) {
                            continue;
                        }
                    }
                    let rest_id = format!("rest-{}", restaurants.len() + 1);
                    restaurants.push(restaurant(rest_id, query, hit));
                }
            }
        }
        info!(
            session_id = %id,
            queries = queries.len(),
            restaurants = restaurants.len(),
            "restaurant suggestions gathered"
        );

        let patch = SessionPatch::new()
            .state(next)
            .restaurant_suggestions(restaurants)
            .selected_restaurant_ids(BTreeSet::new());
        self.commit(id, patch, preferences.as_deref(), reply).await
    }
}

/// Spread the chosen restaurants over the grouped days in input order.
pub(super) fn place_restaurants(
    session: &Session,
    selected_ids: Vec<String>,
) -> Result<(Vec<GroupedDay>, BTreeSet<String>), WorkflowError> {
    let by_id: HashMap<&str, &RestaurantSuggestion> = session
        .restaurant_suggestions
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();

    let mut chosen = Vec::new();
    let mut seen = BTreeSet::new();
    for rid in selected_ids {
        let Some(restaurant) = by_id.get(rid.as_str()) else {
            return Err(WorkflowError::validation(format!("unknown restaurant id '{rid}'")));
        };
        if seen.insert(rid) {
            chosen.push((*restaurant).clone());
        }
    }

    let mut grouped = session.grouped_days.clone();
    let buckets = coords::distribute(chosen, grouped.len());
    for (day, bucket) in grouped.iter_mut().zip(buckets) {
        day.restaurants = bucket;
    }
    Ok((grouped, seen))
}

/// Give every activity a unique id, keeping the ones it came with where
/// possible.
fn assign_ids(mut activities: Vec<SuggestedActivity>) -> Vec<SuggestedActivity> {
    let provided: HashSet<String> = activities
        .iter()
        .map(|a| a.id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .collect();
    let mut taken = HashSet::new();
    let mut counter = 0usize;
    for activity in &mut activities {
        let id = activity.id.trim().to_owned();
        if !id.is_empty() && taken.insert(id.clone()) {
            activity.id = id;
            continue;
        }
        let fresh = loop {
            counter += 1;
            let candidate = format!("act-{counter}");
            if !provided.contains(&candidate) && !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(fresh.clone());
        activity.id = fresh;
    }
    activities
}

/// Resolve the requested ids against the suggestions, in request order and
/// without repeats.
fn select_activities(
    suggested: &[SuggestedActivity],
    ids: &[String],
) -> Result<Vec<SuggestedActivity>, WorkflowError> {
    if ids.is_empty() {
        return Err(WorkflowError::validation("select at least one activity"));
    }
    let by_id: HashMap<&str, &SuggestedActivity> =
        suggested.iter().map(|a| (a.id.as_str(), a)).collect();

    let unknown: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !unknown.is_empty() {
        return Err(WorkflowError::validation(format!(
            "unknown activity ids: {}",
            unknown.join(", ")
        )));
    }

    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| by_id.get(id.as_str()).map(|a| (*a).clone()))
        .collect())
}

/// Exactly `day_count` grouped days. Proposed assignments win where valid;
/// whatever is left over is spread with the bucket rule.
fn build_groups(
    session: &Session,
    selected: Vec<SuggestedActivity>,
    proposals: &[DayGroup],
    day_count: usize,
) -> Vec<GroupedDay> {
    let mut themes: Vec<Option<String>> = vec![None; day_count];
    let mut buckets: Vec<Vec<SuggestedActivity>> = vec![Vec::new(); day_count];
    let mut pool: Vec<Option<SuggestedActivity>> = selected.into_iter().map(Some).collect();
    let index: HashMap<String, usize> = pool
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.as_ref().map(|a| (a.id.clone(), i)))
        .collect();

    for proposal in proposals {
        let Some(slot) = proposal
            .day_number
            .checked_sub(1)
            .map(|d| d as usize)
            .filter(|d| *d < day_count)
        else {
            debug!(day = proposal.day_number, "dropping proposal for a day outside the trip");
            continue;
        };
        if themes[slot].is_none() && !proposal.theme.trim().is_empty() {
            themes[slot] = Some(proposal.theme.trim().to_owned());
        }
        for aid in &proposal.activity_ids {
            // Unknown ids find nothing; repeats find an already emptied slot.
            if let Some(activity) = index.get(aid).and_then(|i| pool[*i].take()) {
                buckets[slot].push(activity);
            }
        }
    }

    let leftovers: Vec<SuggestedActivity> = pool.into_iter().flatten().collect();
    if !leftovers.is_empty() {
        debug!(count = leftovers.len(), "distributing unassigned activities");
    }
    for (bucket, extra) in buckets.iter_mut().zip(coords::distribute(leftovers, day_count)) {
        bucket.extend(extra);
    }

    buckets
        .into_iter()
        .zip(themes)
        .zip(1u32..)
        .map(|((activities, theme), n)| GroupedDay {
            day_number: n,
            date: session.trip_info.date_of_day(n),
            theme: theme.unwrap_or_else(|| format!("Day {n}")),
            activities,
            restaurants: Vec::new(),
        })
        .collect()
}

fn apply_move(grouped: &mut [GroupedDay], mv: &ActivityMove) -> Result<(), WorkflowError> {
    let target = grouped
        .iter()
        .position(|d| d.day_number == mv.to_day)
        .ok_or_else(|| WorkflowError::validation(format!("day {} is not part of the trip", mv.to_day)))?;
    let (source, pos) = grouped
        .iter()
        .enumerate()
        .find_map(|(i, d)| {
            d.activities
                .iter()
                .position(|a| a.id == mv.activity_id)
                .map(|p| (i, p))
        })
        .ok_or_else(|| {
            WorkflowError::validation(format!("activity '{}' is not in any day", mv.activity_id))
        })?;
    if source != target {
        let activity = grouped[source].activities.remove(pos);
        grouped[target].activities.push(activity);
    }
    Ok(())
}

/// A plain layout built from each activity's preferred time of day.
fn fallback_itinerary(group: &GroupedDay) -> ExpandedDay {
    let mut day = ExpandedDay {
        day_number: group.day_number,
        date: group.date,
        theme: group.theme.clone(),
        ..ExpandedDay::default()
    };
    for activity in &group.activities {
        let when = activity
            .best_time_of_day
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let slot = if when.contains("morning") {
            &mut day.morning
        } else if when.contains("evening") || when.contains("night") {
            &mut day.evening
        } else {
            &mut day.afternoon
        };
        slot.push(activity.to_activity());
    }
    day
}

/// Copy coordinates already resolved on the grouped activities onto the
/// generated layout, matched by name.
fn carry_known_locations(day: &mut ExpandedDay, known: &[SuggestedActivity]) {
    for place in day.places_mut() {
        if coords::is_resolved(place.coordinates.as_ref()) {
            continue;
        }
        let name = place.name.trim().to_lowercase();
        if let Some(source) = known.iter().find(|a| {
            coords::is_resolved(a.coordinates.as_ref()) && a.name.trim().to_lowercase() == name
        }) {
            copy_location(place, source);
        }
    }
}

fn copy_location(place: &mut Activity, source: &SuggestedActivity) {
    place.coordinates = source.coordinates;
    if place.rating.is_none() {
        place.rating = source.rating;
    }
    if place.place_id.is_none() {
        place.place_id = source.place_id.clone();
    }
}

/// Every resolved point of a grouped day, from its activities and its
/// laid-out itinerary.
fn day_points(session: &Session, group: &GroupedDay) -> Vec<Coordinates> {
    let from_group = group
        .activities
        .iter()
        .filter_map(|a| a.coordinates);
    let from_layout = session
        .expanded_days
        .get(&group.day_number)
        .into_iter()
        .flat_map(|d| d.places().filter_map(|p| p.coordinates));
    from_group
        .chain(from_layout)
        .filter(Coordinates::is_finite)
        .collect()
}

fn normalize_queries(queries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let cleaned: Vec<String> = queries
        .into_iter()
        .map(|q| q.trim().to_owned())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect();
    if cleaned.is_empty() {
        vec!["restaurant".to_owned()]
    } else {
        cleaned
    }
}

fn restaurant(id: String, query: &str, hit: PlaceResult) -> RestaurantSuggestion {
    RestaurantSuggestion {
        id,
        name: hit.name,
        cuisine: query.to_owned(),
        rating: hit.rating,
        price_range: hit.price_level.map(|level| "$".repeat(usize::from(level.max(1)))),
        coordinates: Some(hit.location),
        place_id: hit.place_id,
        vicinity: hit.vicinity,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn suggested(id: &str) -> SuggestedActivity {
        SuggestedActivity {
            id: id.into(),
            name: format!("Activity {id}"),
            ..Default::default()
        }
    }

    fn ids(day: &GroupedDay) -> Vec<&str> {
        day.activities.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn missing_and_duplicate_ids_are_replaced() {
        let out = assign_ids(vec![suggested(""), suggested("act-1"), suggested("act-1"), suggested("x")]);
        let got: Vec<&str> = out.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(got, vec!["act-2", "act-1", "act-3", "x"]);
    }

    #[test]
    fn selection_rejects_unknown_ids() {
        let suggestions = vec![suggested("a"), suggested("b")];
        let err = select_activities(&suggestions, &["a".into(), "zzz".into()]).unwrap_err();
        assert!(err.to_string().contains("zzz"));
        assert!(select_activities(&suggestions, &[]).is_err());
    }

    #[test]
    fn selection_keeps_request_order_without_repeats() {
        let suggestions = vec![suggested("a"), suggested("b")];
        let out = select_activities(&suggestions, &["b".into(), "a".into(), "b".into()]).unwrap();
        let got: Vec<&str> = out.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(got, vec!["b", "a"]);
    }

    #[test]
    fn grouping_honours_proposals_then_distributes_leftovers() {
        let session = Session::new("s", Utc::now());
        let selected: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(suggested).collect();
        let proposals = vec![
            DayGroup { day_number: 2, theme: "Museums".into(), activity_ids: vec!["b".into(), "ghost".into()] },
            DayGroup { day_number: 1, theme: "Old town".into(), activity_ids: vec!["a".into(), "b".into()] },
            DayGroup { day_number: 9, theme: "Nope".into(), activity_ids: vec!["c".into()] },
        ];

        let days = build_groups(&session, selected, &proposals, 2);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].theme, "Old town");
        assert_eq!(days[1].theme, "Museums");
        // c, d, e are left over: ceil(3 / 2) = 2 go to day 1, one to day 2.
        assert_eq!(ids(&days[0]), vec!["a", "c", "d"]);
        assert_eq!(ids(&days[1]), vec!["b", "e"]);
    }

    #[test]
    fn grouping_fills_unthemed_days() {
        let session = Session::new("s", Utc::now());
        let days = build_groups(&session, vec![suggested("a")], &[], 3);
        assert_eq!(days.len(), 3);
        assert_eq!(days[2].theme, "Day 3");
        assert_eq!(ids(&days[0]), vec!["a"]);
    }

    #[test]
    fn moves_are_validated() {
        let mut grouped = vec![
            GroupedDay { day_number: 1, date: None, theme: "A".into(), activities: vec![suggested("a")], restaurants: vec![] },
            GroupedDay { day_number: 2, date: None, theme: "B".into(), activities: vec![], restaurants: vec![] },
        ];
        apply_move(&mut grouped, &ActivityMove { activity_id: "a".into(), to_day: 2 }).unwrap();
        assert!(grouped[0].activities.is_empty());
        assert_eq!(ids(&grouped[1]), vec!["a"]);

        assert!(apply_move(&mut grouped, &ActivityMove { activity_id: "a".into(), to_day: 5 }).is_err());
        assert!(apply_move(&mut grouped, &ActivityMove { activity_id: "zzz".into(), to_day: 1 }).is_err());
    }

    #[test]
    fn fallback_layout_uses_best_time_of_day() {
        let mut evening = suggested("e");
        evening.best_time_of_day = Some("Evening".into());
        let mut morning = suggested("m");
        morning.best_time_of_day = Some("early morning".into());
        let group = GroupedDay {
            day_number: 1,
            date: None,
            theme: "Mixed".into(),
            activities: vec![evening, morning, suggested("x")],
            restaurants: vec![],
        };
        let day = fallback_itinerary(&group);
        assert_eq!(day.morning.len(), 1);
        assert_eq!(day.afternoon.len(), 1);
        assert_eq!(day.evening.len(), 1);
    }

    #[test]
    fn empty_queries_fall_back_to_restaurant() {
        assert_eq!(normalize_queries(vec![" ".into()]), vec!["restaurant".to_string()]);
        assert_eq!(
            normalize_queries(vec!["Pizza".into(), "pizza".into(), "sushi".into()]),
            vec!["Pizza".to_string(), "sushi".to_string()]
        );
    }
}
