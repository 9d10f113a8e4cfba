//! The transition table. Every stage operation checks its precondition here
//! and nowhere else.

use crate::error::WorkflowError;
use crate::model::WorkflowState;

use WorkflowState::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter, strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    Chat,
    GenerateSkeleton,
    ExpandDay,
    ConfirmDay,
    ModifyDay,
    SuggestActivities,
    GroupDays,
    ConfirmDayGrouping,
    MealPreferences,
    StartReview,
    Finalize,
    ResetDestination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// State is left as it was.
    Stay,
    To(WorkflowState),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub from: &'static [WorkflowState],
    pub target: Target,
}

const EVERY_STATE: &[WorkflowState] = &[
    InfoGathering,
    Skeleton,
    ExpandDay,
    SuggestActivities,
    GroupDays,
    DayItinerary,
    MealPreferences,
    Review,
    Finalize,
];

impl Operation {
    pub fn rule(self) -> Rule {
        let (from, target): (&'static [WorkflowState], Target) = match self {
            Operation::Chat => (&[InfoGathering, Review], Target::Stay),
            Operation::GenerateSkeleton => (&[InfoGathering, Skeleton], Target::To(Skeleton)),
            Operation::ExpandDay => (&[Skeleton, ExpandDay], Target::To(ExpandDay)),
            Operation::ConfirmDay => (&[ExpandDay], Target::To(ExpandDay)),
            Operation::ModifyDay => (&[ExpandDay, DayItinerary, Review], Target::Stay),
            Operation::SuggestActivities => (
                &[InfoGathering, SuggestActivities],
                Target::To(SuggestActivities),
            ),
            Operation::GroupDays => (&[SuggestActivities, GroupDays], Target::To(GroupDays)),
            Operation::ConfirmDayGrouping => (&[GroupDays], Target::To(DayItinerary)),
            Operation::MealPreferences => (
                &[DayItinerary, MealPreferences],
                Target::To(MealPreferences),
            ),
            Operation::StartReview => (&[ExpandDay, MealPreferences], Target::To(Review)),
            Operation::Finalize => (&[Review], Target::To(Finalize)),
            Operation::ResetDestination => (EVERY_STATE, Target::To(InfoGathering)),
        };
        Rule { from, target }
    }
}

/// Check `op` against `current`, returning the state to move to.
pub fn check(op: Operation, current: WorkflowState) -> Result<WorkflowState, WorkflowError> {
    let rule = op.rule();
    if !rule.from.contains(&current) {
        return Err(WorkflowError::State {
            operation: op.to_string(),
            current,
            allowed: rule.from.to_vec(),
        });
    }
    Ok(match rule.target {
        Target::Stay => current,
        Target::To(next) => next,
    })
}
