use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing_test::traced_test;

use super::*;
use crate::conversation::Role;
use crate::coords::Coordinates;
use crate::model::{
    Activity, ActivityLevel, DaySuggestions, GroupedDay, SkeletonDay, SuggestedActivity,
    TripInfoPatch,
};
use crate::services::{GenerationError, PlacesLookup};
use crate::session::MemorySessionStore;
use crate::stage::DayGroup;
use crate::testing::{FakePlaces, ScriptedGenerator, place};

struct Harness {
    store: Arc<MemorySessionStore>,
    generator: Arc<ScriptedGenerator>,
    workflow: Workflow<MemorySessionStore>,
}

fn harness(enricher: Enricher) -> Harness {
    let store = Arc::new(MemorySessionStore::default());
    let generator = Arc::new(ScriptedGenerator::new());
    let workflow = Workflow::new(store.clone(), generator.clone(), enricher);
    Harness {
        store,
        generator,
        workflow,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn trip(destination: &str, start: NaiveDate, end: NaiveDate) -> TripInfoPatch {
    TripInfoPatch {
        destination: Some(destination.into()),
        start_date: Some(start),
        end_date: Some(end),
        ..Default::default()
    }
}

fn skeleton_day(n: u32, theme: &str) -> SkeletonDay {
    SkeletonDay {
        day_number: n,
        date: None,
        theme: theme.into(),
        highlights: Vec::new(),
    }
}

fn named(name: &str) -> Activity {
    Activity {
        name: name.into(),
        ..Default::default()
    }
}

fn suggested(name: &str, when: &str) -> SuggestedActivity {
    SuggestedActivity {
        name: name.into(),
        best_time_of_day: Some(when.into()),
        ..Default::default()
    }
}

fn day_options(prefix: &str) -> DaySuggestions {
    DaySuggestions {
        breakfast: vec![named(&format!("{prefix} bakery"))],
        lunch: vec![named(&format!("{prefix} trattoria")), named(&format!("{prefix} deli"))],
        dinner: vec![named(&format!("{prefix} osteria"))],
        morning: vec![named(&format!("{prefix} museum"))],
        afternoon: vec![named(&format!("{prefix} park"))],
        evening: vec![named(&format!("{prefix} concert"))],
        notes: String::new(),
    }
}

async fn seeded(h: &Harness, patch: SessionPatch) -> String {
    let session = h.workflow.start_session().await.unwrap();
    h.store.update(&session.session_id, patch).await.unwrap();
    session.session_id
}

#[tokio::test]
async fn new_session_starts_with_a_welcome() {
    let h = harness(Enricher::disabled());
    let session = h.workflow.start_session().await.unwrap();
    assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
    assert_eq!(session.conversation_history.len(), 1);
    assert_eq!(
        session.conversation_history.last().map(|m| m.role),
        Some(Role::Assistant)
    );
}

#[tokio::test]
async fn rome_dates_produce_a_three_day_skeleton() {
    let h = harness(Enricher::disabled());
    let id = h.workflow.start_session().await.unwrap().session_id;

    h.generator.push(StagePayload::InfoGathering {
        reply: "Rome in spring, lovely.".into(),
        trip_info: trip("Rome", date(2024, 5, 1), date(2024, 5, 3)),
    });
    let outcome = h
        .workflow
        .chat(&id, "We are going to Rome from May 1 to May 3, 2024")
        .await
        .unwrap();
    assert_eq!(outcome.session.trip_info.destination(), Some("Rome"));
    assert_eq!(outcome.session.trip_info.duration, Some(3));
    assert_eq!(outcome.session.workflow_state, WorkflowState::InfoGathering);

    h.generator.push(StagePayload::Skeleton {
        reply: "Here is a first sketch.".into(),
        days: vec![
            skeleton_day(1, "Ancient Rome"),
            skeleton_day(2, "Vatican"),
            skeleton_day(3, "Trastevere"),
            skeleton_day(4, "Day trip"),
        ],
    });
    let outcome = h.workflow.generate_skeleton(&id).await.unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::Skeleton);
    assert_eq!(session.skeleton.len(), 3);
    assert_eq!(session.skeleton[0].date, Some(date(2024, 5, 1)));
    assert_eq!(session.skeleton[2].date, Some(date(2024, 5, 3)));
    assert_eq!(session.current_expand_day, Some(1));
    // welcome, user turn, two replies
    assert_eq!(session.conversation_history.len(), 4);

    let context = &h.generator.calls_for(Stage::Skeleton)[0];
    assert_eq!(context.trip_info.duration, Some(3));
    assert!(context.history.len() <= h.workflow.config().history_window);
}

#[tokio::test]
#[traced_test]
async fn destination_change_resets_from_expand_day() {
    let h = harness(Enricher::disabled());
    let mut rome = trip("Rome", date(2024, 5, 1), date(2024, 5, 3));
    rome.activity_level = Some(ActivityLevel::Active);
    rome.travelers = Some(3);
    let id = seeded(
        &h,
        SessionPatch::new()
            .merge_trip_info(rome)
            .state(WorkflowState::ExpandDay)
            .skeleton(vec![skeleton_day(1, "Ancient Rome")])
            .current_expand_day(Some(1)),
    )
    .await;

    h.generator.push(StagePayload::InfoGathering {
        reply: "Paris it is.".into(),
        trip_info: TripInfoPatch::default(),
    });
    let outcome = h
        .workflow
        .chat(&id, "Actually, I want to go to Paris")
        .await
        .unwrap();

    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
    assert_eq!(session.trip_info.destination(), Some("Paris"));
    assert_eq!(session.trip_info.activity_level, ActivityLevel::Active);
    assert_eq!(session.trip_info.travelers, 3);
    assert!(session.skeleton.is_empty());
    assert!(session.expanded_days.is_empty());
    assert_eq!(session.current_expand_day, None);

    // the generator already saw the new destination
    let context = &h.generator.calls_for(Stage::InfoGathering)[0];
    assert_eq!(context.trip_info.destination(), Some("Paris"));
    assert!(logs_contain("destination changed"));
}

#[tokio::test]
async fn review_edit_naming_a_place_keeps_the_plan() {
    let h = harness(Enricher::disabled());
    let planned = BTreeMap::from([
        (1, ExpandedDay { day_number: 1, theme: "Ancient Rome".into(), ..Default::default() }),
        (2, ExpandedDay { day_number: 2, theme: "Vatican".into(), ..Default::default() }),
    ]);
    let id = seeded(
        &h,
        SessionPatch::new()
            .merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 2)))
            .state(WorkflowState::Review)
            .skeleton(vec![skeleton_day(1, "Ancient Rome"), skeleton_day(2, "Vatican")])
            .expanded_days(planned),
    )
    .await;

    h.generator.push(StagePayload::ReviewChat {
        reply: "Swapped in the gallery.".into(),
        modifications: vec![ExpandedDay {
            day_number: 2,
            afternoon: vec![named("Borghese Gallery")],
            ..Default::default()
        }],
    });
    let outcome = h
        .workflow
        .chat(&id, "On day 2, let's visit the Borghese Gallery instead")
        .await
        .unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::Review);
    assert_eq!(session.trip_info.destination(), Some("Rome"));
    assert_eq!(session.skeleton.len(), 2);
    assert_eq!(session.expanded_days.len(), 2);
    assert_eq!(session.expanded_days[&2].afternoon[0].name, "Borghese Gallery");
    assert!(h.generator.calls_for(Stage::InfoGathering).is_empty());

    // saying "destination" outright still starts over
    h.generator.push(StagePayload::InfoGathering {
        reply: "Florence, then.".into(),
        trip_info: TripInfoPatch::default(),
    });
    let outcome = h
        .workflow
        .chat(&id, "Please change the destination to Florence")
        .await
        .unwrap();
    assert_eq!(outcome.session.workflow_state, WorkflowState::InfoGathering);
    assert_eq!(outcome.session.trip_info.destination(), Some("Florence"));
    assert!(outcome.session.skeleton.is_empty());
}

#[tokio::test]
async fn same_destination_is_ordinary_chat() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Paris", date(2024, 6, 1), date(2024, 6, 2))),
    )
    .await;

    h.generator.push(StagePayload::InfoGathering {
        reply: "Noted.".into(),
        trip_info: TripInfoPatch {
            travelers: Some(2),
            ..Default::default()
        },
    });
    let outcome = h
        .workflow
        .chat(&id, "new destination: paris")
        .await
        .unwrap();
    assert_eq!(outcome.session.trip_info.destination(), Some("Paris"));
    assert_eq!(outcome.session.trip_info.travelers, 2);
    assert_eq!(outcome.session.trip_info.duration, Some(2));
}

#[tokio::test]
async fn out_of_order_operation_leaves_session_untouched() {
    let h = harness(Enricher::disabled());
    let id = h.workflow.start_session().await.unwrap().session_id;

    let err = h.workflow.finalize(&id).await.unwrap_err();
    assert_eq!(err.current_state(), Some(WorkflowState::InfoGathering));
    assert!(matches!(err, WorkflowError::State { .. }));

    let err = h.workflow.confirm_day(&id, 1, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }));

    let session = h.workflow.session(&id).await.unwrap();
    assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
    assert_eq!(session.conversation_history.len(), 1);
    assert!(h.generator.calls().is_empty());
}

#[tokio::test]
#[traced_test]
async fn upstream_failure_leaves_session_unchanged() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 3))),
    )
    .await;
    h.generator.push_failure(
        Stage::Skeleton,
        GenerationError::Status {
            status: 429,
            message: "rate limited".into(),
        },
    );

    let err = h.workflow.generate_skeleton(&id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Upstream(_)));

    let session = h.workflow.session(&id).await.unwrap();
    assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
    assert!(session.skeleton.is_empty());
    assert_eq!(session.conversation_history.len(), 1);
    assert!(logs_contain("generation failed"));
}

#[tokio::test]
async fn payload_for_another_stage_is_an_upstream_error() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 3))),
    )
    .await;
    h.generator.push_for(
        Stage::Skeleton,
        StagePayload::InfoGathering {
            reply: "Where to?".into(),
            trip_info: TripInfoPatch::default(),
        },
    );

    let err = h.workflow.generate_skeleton(&id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Upstream(_)));
    let session = h.workflow.session(&id).await.unwrap();
    assert_eq!(session.workflow_state, WorkflowState::InfoGathering);
    assert!(session.skeleton.is_empty());
    assert_eq!(session.conversation_history.len(), 1);
}

#[tokio::test]
async fn confirming_a_grouping_outside_group_days_changes_nothing() {
    let h = harness(Enricher::disabled());
    let mut colosseum = suggested("Colosseum", "morning");
    colosseum.id = "act-1".into();
    let grouped = vec![GroupedDay {
        day_number: 1,
        date: None,
        theme: "Ancient Rome".into(),
        activities: vec![colosseum],
        restaurants: Vec::new(),
    }];
    let id = seeded(
        &h,
        SessionPatch::new()
            .merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 1)))
            .state(WorkflowState::DayItinerary)
            .grouped_days(grouped),
    )
    .await;
    let before = serde_json::to_vec(&h.workflow.session(&id).await.unwrap().grouped_days).unwrap();

    let err = h
        .workflow
        .confirm_day_grouping(
            &id,
            vec![ActivityMove {
                activity_id: "act-1".into(),
                to_day: 1,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::State { .. }));
    assert_eq!(err.current_state(), Some(WorkflowState::DayItinerary));

    let session = h.workflow.session(&id).await.unwrap();
    assert_eq!(session.workflow_state, WorkflowState::DayItinerary);
    assert_eq!(serde_json::to_vec(&session.grouped_days).unwrap(), before);
    assert!(h.generator.calls().is_empty());
}

#[tokio::test]
async fn short_skeleton_is_an_upstream_error() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 3))),
    )
    .await;
    h.generator.push(StagePayload::Skeleton {
        reply: String::new(),
        days: vec![skeleton_day(1, "Only one")],
    });
    let err = h.workflow.generate_skeleton(&id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Upstream(_)));
    assert!(h.workflow.session(&id).await.unwrap().skeleton.is_empty());
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness(Enricher::disabled());
    let err = h.workflow.chat("missing", "hello").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
    let err = h.workflow.chat("missing", "   ").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn day_theme_flow_reaches_a_final_plan() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 2))),
    )
    .await;

    h.generator.push(StagePayload::Skeleton {
        reply: "Two days.".into(),
        days: vec![skeleton_day(1, "Ancient Rome"), skeleton_day(2, "Vatican")],
    });
    h.workflow.generate_skeleton(&id).await.unwrap();

    h.generator.push(StagePayload::ExpandDay {
        reply: "Options for day 1.".into(),
        suggestions: day_options("D1"),
    });
    let outcome = h.workflow.expand_day(&id, None).await.unwrap();
    assert_eq!(outcome.session.workflow_state, WorkflowState::ExpandDay);
    assert_eq!(
        outcome.session.current_suggestions.as_ref().map(|s| s.day_number),
        Some(1)
    );

    // review needs every day planned
    let err = h.workflow.start_review(&id, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    let picks = DaySelections {
        lunch: Some("D1 deli".into()),
        ..Default::default()
    };
    let outcome = h.workflow.confirm_day(&id, 1, Some(picks)).await.unwrap();
    let session = outcome.session;
    assert_eq!(session.current_expand_day, Some(2));
    assert!(session.current_suggestions.is_none());
    let day1 = &session.expanded_days[&1];
    assert_eq!(day1.lunch.as_ref().map(|m| m.name.as_str()), Some("D1 deli"));
    assert_eq!(day1.breakfast.as_ref().map(|m| m.name.as_str()), Some("D1 bakery"));
    assert_eq!(day1.theme, "Ancient Rome");
    assert!(outcome.reply.contains("day 2"));

    h.generator.push(StagePayload::ExpandDay {
        reply: "Options for day 2.".into(),
        suggestions: day_options("D2"),
    });
    h.workflow.expand_day(&id, None).await.unwrap();
    let outcome = h.workflow.confirm_day(&id, 2, None).await.unwrap();
    assert_eq!(outcome.session.current_expand_day, None);
    assert_eq!(outcome.session.expanded_days.len(), 2);

    h.generator.push(StagePayload::ModifyDay {
        reply: "Slower afternoon.".into(),
        day: ExpandedDay {
            day_number: 7,
            afternoon: vec![named("Borghese gardens")],
            ..Default::default()
        },
    });
    let outcome = h
        .workflow
        .modify_day(&id, 2, "a slower afternoon please")
        .await
        .unwrap();
    let day2 = &outcome.session.expanded_days[&2];
    assert_eq!(day2.afternoon[0].name, "Borghese gardens");
    assert_eq!(day2.theme, "Vatican");
    assert_eq!(outcome.session.workflow_state, WorkflowState::ExpandDay);

    h.generator.push(StagePayload::StartReview {
        reply: "Take a look.".into(),
    });
    let outcome = h.workflow.start_review(&id, None).await.unwrap();
    assert_eq!(outcome.session.workflow_state, WorkflowState::Review);

    h.generator.push(StagePayload::Finalize {
        reply: "Done!".into(),
        title: String::new(),
        summary: "Two days in Rome.".into(),
        tips: vec!["Book the Vatican early".into()],
    });
    let outcome = h.workflow.finalize(&id).await.unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::Finalize);
    let plan = session.final_plan.unwrap();
    assert_eq!(plan.title, "Rome itinerary");
    assert_eq!(plan.days.len(), 2);
    assert_eq!(plan.tips.len(), 1);
}

#[tokio::test]
async fn confirming_a_day_without_staged_options_is_rejected() {
    let h = harness(Enricher::disabled());
    let id = seeded(
        &h,
        SessionPatch::new()
            .merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 1)))
            .state(WorkflowState::ExpandDay)
            .skeleton(vec![skeleton_day(1, "Everything")]),
    )
    .await;
    let err = h.workflow.confirm_day(&id, 1, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn activity_first_flow_reaches_a_final_plan() {
    let places = Arc::new(FakePlaces::new());
    places.respond_to_all(vec![place("Somewhere in Rome", 41.9, 12.5).with_place_id("p-1")]);
    let lookup: Arc<dyn PlacesLookup> = places.clone();
    let h = harness(Enricher::new(Some(lookup), None));
    let id = seeded(
        &h,
        SessionPatch::new().merge_trip_info(trip("Rome", date(2024, 5, 1), date(2024, 5, 2))),
    )
    .await;

    h.generator.push(StagePayload::SuggestActivities {
        reply: "A few ideas.".into(),
        activities: vec![
            suggested("Colosseum", "morning"),
            suggested("Vatican Museums", "afternoon"),
            suggested("Trastevere walk", "evening"),
        ],
    });
    let outcome = h.workflow.suggest_activities(&id).await.unwrap();
    let ids: Vec<&str> = outcome
        .session
        .suggested_activities
        .iter()
        .map(|a| a.id.as_str())
        .collect();
    assert_eq!(ids, ["act-1", "act-2", "act-3"]);
    assert!(
        outcome
            .session
            .suggested_activities
            .iter()
            .all(|a| a.coordinates.is_some())
    );

    h.generator.push(StagePayload::GroupDays {
        reply: "Grouped by area.".into(),
        days: vec![
            DayGroup {
                day_number: 1,
                theme: "Ancient Rome".into(),
                activity_ids: vec!["act-1".into()],
            },
            DayGroup {
                day_number: 2,
                theme: String::new(),
                activity_ids: vec!["act-2".into()],
            },
        ],
    });
    let outcome = h
        .workflow
        .group_days(&id, vec!["act-1".into(), "act-2".into(), "act-3".into()])
        .await
        .unwrap();
    let grouped = &outcome.session.grouped_days;
    assert_eq!(outcome.session.workflow_state, WorkflowState::GroupDays);
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].theme, "Ancient Rome");
    assert_eq!(grouped[1].theme, "Day 2");
    // the unassigned activity lands on the first day
    assert_eq!(grouped[0].activities.len(), 2);

    let err = h
        .workflow
        .confirm_day_grouping(
            &id,
            vec![ActivityMove {
                activity_id: "act-3".into(),
                to_day: 5,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    h.generator.push(StagePayload::DayItinerary {
        reply: "Laid out.".into(),
        days: Vec::new(),
    });
    let outcome = h
        .workflow
        .confirm_day_grouping(
            &id,
            vec![ActivityMove {
                activity_id: "act-3".into(),
                to_day: 2,
            }],
        )
        .await
        .unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::DayItinerary);
    assert_eq!(session.expanded_days[&1].morning[0].name, "Colosseum");
    assert_eq!(session.expanded_days[&2].afternoon[0].name, "Vatican Museums");
    assert_eq!(session.expanded_days[&2].evening[0].name, "Trastevere walk");

    h.generator.push(StagePayload::MealPreferences {
        reply: "Trattorias it is.".into(),
        queries: vec!["trattoria".into(), "Trattoria".into(), " ".into()],
    });
    let outcome = h
        .workflow
        .meal_preferences(&id, Some("local trattorias".into()))
        .await
        .unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::MealPreferences);
    // both days hit the same place; it is offered once
    assert_eq!(session.restaurant_suggestions.len(), 1);
    assert_eq!(session.restaurant_suggestions[0].id, "rest-1");
    assert_eq!(session.restaurant_suggestions[0].cuisine, "trattoria");
    let searches: Vec<_> = places
        .calls()
        .into_iter()
        .filter(|q| q.category.as_deref() == Some("restaurant"))
        .collect();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[0].text, "trattoria in Rome");
    assert_eq!(searches[0].center, Some(Coordinates::new(41.9, 12.5)));
    assert_eq!(
        session.conversation_history.last().map(|m| m.role),
        Some(Role::Assistant)
    );

    let err = h
        .workflow
        .start_review(&id, Some(vec!["rest-9".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    h.generator.push(StagePayload::StartReview {
        reply: "Review time.".into(),
    });
    let outcome = h
        .workflow
        .start_review(&id, Some(vec!["rest-1".into()]))
        .await
        .unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::Review);
    assert_eq!(session.grouped_days[0].restaurants.len(), 1);
    assert!(session.grouped_days[1].restaurants.is_empty());
    assert!(session.selected_restaurant_ids.contains("rest-1"));

    h.generator.push(StagePayload::ReviewChat {
        reply: "Day 2 is lighter now.".into(),
        modifications: vec![
            ExpandedDay {
                day_number: 2,
                afternoon: vec![named("Vatican Museums")],
                ..Default::default()
            },
            ExpandedDay {
                day_number: 9,
                ..Default::default()
            },
        ],
    });
    let outcome = h
        .workflow
        .chat(&id, "Drop the evening walk on day 2")
        .await
        .unwrap();
    let session = outcome.session;
    assert_eq!(session.workflow_state, WorkflowState::Review);
    assert_eq!(session.expanded_days.len(), 2);
    assert!(session.expanded_days[&2].evening.is_empty());
    assert_eq!(session.expanded_days[&2].theme, "Day 2");

    h.generator.push(StagePayload::Finalize {
        reply: "Enjoy Rome!".into(),
        title: "Rome in two days".into(),
        summary: String::new(),
        tips: Vec::new(),
    });
    let outcome = h.workflow.finalize(&id).await.unwrap();
    let plan = outcome.session.final_plan.unwrap();
    assert_eq!(plan.title, "Rome in two days");
    assert_eq!(plan.grouped_days.len(), 2);

    let view = h.workflow.map_view(&id).await.unwrap();
    assert_eq!(view.markers.len(), 2);
    assert_eq!(view.legend.len(), 2);
}
