mod support;

use chorehub::error::Error;
use chorehub::events::EventKind;
use chorehub::household::ActionResult;
use chorehub::lifecycle::{ActionRequest, TaskAction, MAX_SNOOZE_MINUTES};
use chorehub::model::TaskState;
use chorehub::recurrence::RepeatKind;
use chrono::Duration;
use serde_json::json;

use support::{memory_household, member_id, new_task, t0, task};

fn action(body: serde_json::Value) -> TaskAction {
    let request: ActionRequest = serde_json::from_value(body).expect("valid action body");
    request.action
}

fn updated(result: ActionResult) -> (chorehub::model::Task, Option<chorehub::model::Task>) {
    match result {
        ActionResult::Updated { task, spawned } => (task, spawned),
        other => panic!("expected update, got {other:?}"),
    }
}

#[test]
fn owners_default_to_creator_and_unknown_owners_are_dropped() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");

    let solo = household
        .create_task_at(&new_task("Water plants", &mom, &[]), t0())
        .unwrap();
    assert_eq!(solo.owners, vec![mom.clone()]);
    assert_eq!(solo.state, TaskState::Assigned);

    let shared = household
        .create_task_at(&new_task("Dishes", &mom, &[&dad, "ghost", &dad]), t0())
        .unwrap();
    assert_eq!(shared.owners, vec![dad]);

    // Newest first
    let snapshot = household.snapshot();
    assert_eq!(snapshot.tasks[0].id, shared.id);
    assert_eq!(snapshot.tasks[1].id, solo.id);
}

#[test]
fn creator_must_be_a_member() {
    let household = memory_household(&["Mom"]);
    let err = household
        .create_task_at(&new_task("Dishes", "nobody", &[]), t0())
        .unwrap_err();
    assert!(matches!(err, Error::MemberNotFound(_)));
    assert!(household.snapshot().tasks.is_empty());
}

#[test]
fn accepting_twice_has_no_effect() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let created = household
        .create_task_at(&new_task("Vacuum", &mom, &[&dad]), t0())
        .unwrap();

    let (accepted, spawned) = updated(
        household
            .apply_action_at(&created.id, &dad, &TaskAction::Accept, t0())
            .unwrap(),
    );
    assert_eq!(accepted.state, TaskState::Accepted);
    assert!(spawned.is_none());

    let err = household
        .apply_action_at(&created.id, &dad, &TaskAction::Accept, t0())
        .unwrap_err();
    assert!(matches!(err, Error::NoEffect { .. }));
    assert_eq!(err.status_code(), 409);
}

#[test]
fn only_owners_may_accept() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let created = household
        .create_task_at(&new_task("Vacuum", &mom, &[&dad]), t0())
        .unwrap();

    let err = household
        .apply_action_at(&created.id, &mom, &TaskAction::Accept, t0())
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }));
    assert_eq!(task(&household, &created.id), created);
}

#[test]
fn confirmation_flow_needs_the_creator() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let mut request = new_task("Clean garage", &mom, &[&dad]);
    request.require_confirm = true;
    let created = household.create_task_at(&request, t0()).unwrap();

    household
        .apply_action_at(&created.id, &dad, &TaskAction::Accept, t0())
        .unwrap();
    household
        .apply_action_at(&created.id, &dad, &TaskAction::Start, t0())
        .unwrap();
    let (done, _) = updated(
        household
            .apply_action_at(&created.id, &dad, &TaskAction::Complete, t0())
            .unwrap(),
    );
    assert_eq!(done.state, TaskState::PendingConfirm);

    let err = household
        .apply_action_at(&created.id, &dad, &TaskAction::Confirm, t0())
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }));

    let (confirmed, _) = updated(
        household
            .apply_action_at(&created.id, &mom, &TaskAction::Confirm, t0())
            .unwrap(),
    );
    assert_eq!(confirmed.state, TaskState::Completed);
}

#[test]
fn completing_a_weekly_task_spawns_the_next_occurrence() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let due = t0() + Duration::days(1);

    let mut request = new_task("Take out bins", &mom, &[&dad]);
    request.due_at = Some(due.to_rfc3339());
    request.repeat = Some(json!("weekly"));
    let created = household.create_task_at(&request, t0()).unwrap();
    assert_eq!(created.repeat.kind, RepeatKind::Weekly);
    assert_eq!(created.occurrence, 1);
    assert!(created.series_id.is_some());

    household
        .apply_action_at(
            &created.id,
            &dad,
            &action(json!({ "actorId": dad, "action": "subtask_add", "content": "Recycling" })),
            t0(),
        )
        .unwrap();
    let subtask_id = task(&household, &created.id).subtasks[0].id.clone();
    household
        .apply_action_at(
            &created.id,
            &dad,
            &action(json!({ "actorId": dad, "action": "subtask_toggle", "subtaskId": subtask_id })),
            t0(),
        )
        .unwrap();

    household
        .apply_action_at(&created.id, &dad, &TaskAction::Accept, t0())
        .unwrap();
    let (done, spawned) = updated(
        household
            .apply_action_at(&created.id, &dad, &TaskAction::Complete, t0())
            .unwrap(),
    );
    assert_eq!(done.state, TaskState::Completed);

    let next = spawned.expect("next occurrence");
    assert_eq!(next.due_at, Some(due + Duration::days(7)));
    assert_eq!(next.series_id, created.series_id);
    assert_eq!(next.occurrence, 2);
    assert_eq!(next.state, TaskState::Assigned);
    assert_eq!(next.owners, vec![dad.clone()]);
    assert_eq!(next.subtasks.len(), 1);
    assert_eq!(next.subtasks[0].content, "Recycling");
    assert!(!next.subtasks[0].done);

    let snapshot = household.snapshot();
    assert_eq!(snapshot.tasks.len(), 2);
    assert_eq!(snapshot.tasks[0].id, next.id);
}

#[test]
fn recurring_task_needs_a_due_date() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");

    let mut request = new_task("Laundry", &mom, &[]);
    request.repeat = Some(json!("daily"));
    let err = household.create_task_at(&request, t0()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let plain = household
        .create_task_at(&new_task("Laundry", &mom, &[]), t0())
        .unwrap();
    let err = household
        .apply_action_at(
            &plain.id,
            &mom,
            &action(json!({ "actorId": mom, "action": "update", "repeat": "daily" })),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(task(&household, &plain.id).repeat.kind, RepeatKind::None);
}

#[test]
fn moving_the_due_date_resets_reminders() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");
    let mut request = new_task("Pay rent", &mom, &[]);
    request.due_at = Some((t0() + Duration::hours(1)).to_rfc3339());
    let created = household.create_task_at(&request, t0()).unwrap();

    {
        let mut guard = household.store().lock();
        let stored = guard.task_mut(&created.id).unwrap();
        stored.reminders.remind_24h_sent = true;
        stored.reminders.remind_2h_sent = true;
    }

    let later = t0() + Duration::days(3);
    let (moved, _) = updated(
        household
            .apply_action_at(
                &created.id,
                &mom,
                &action(json!({ "actorId": mom, "action": "update", "dueAt": later.to_rfc3339() })),
                t0(),
            )
            .unwrap(),
    );
    assert_eq!(moved.due_at, Some(later));
    assert!(!moved.reminders.remind_24h_sent);
    assert!(!moved.reminders.remind_2h_sent);
}

#[test]
fn deleted_tasks_only_restore_or_purge() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let created = household
        .create_task_at(&new_task("Mow lawn", &mom, &[&dad]), t0())
        .unwrap();

    let deleted = household.delete_task_at(&created.id, &dad, t0()).unwrap();
    assert!(deleted.is_deleted());
    // Deleting again changes nothing
    let again = household
        .delete_task_at(&created.id, &dad, t0() + Duration::hours(1))
        .unwrap();
    assert_eq!(again.deleted_at, deleted.deleted_at);

    let err = household
        .apply_action_at(&created.id, &dad, &TaskAction::Accept, t0())
        .unwrap_err();
    assert!(matches!(err, Error::TaskDeleted(_)));

    let (restored, _) = updated(
        household
            .apply_action_at(&created.id, &mom, &TaskAction::Restore, t0())
            .unwrap(),
    );
    assert!(!restored.is_deleted());
    assert_eq!(restored.state, TaskState::Assigned);
}

#[test]
fn purge_removes_only_deleted_tasks() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");
    let created = household
        .create_task_at(&new_task("Old chore", &mom, &[]), t0())
        .unwrap();

    let err = household
        .apply_action_at(&created.id, &mom, &TaskAction::Purge, t0())
        .unwrap_err();
    assert!(matches!(err, Error::NoEffect { .. }));

    household.delete_task_at(&created.id, &mom, t0()).unwrap();
    let result = household
        .apply_action_at(&created.id, &mom, &TaskAction::Purge, t0())
        .unwrap();
    assert_eq!(
        result,
        ActionResult::Purged {
            task_id: created.id.clone()
        }
    );
    assert!(household.snapshot().tasks.is_empty());

    let err = household
        .apply_action_at(&created.id, &mom, &TaskAction::Restore, t0())
        .unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}

#[test]
fn strangers_cannot_delete() {
    let household = memory_household(&["Mom", "Dad", "Gran"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let gran = member_id(&household, "Gran");
    let created = household
        .create_task_at(&new_task("Fold laundry", &mom, &[&dad]), t0())
        .unwrap();

    let err = household.delete_task_at(&created.id, &gran, t0()).unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert!(!task(&household, &created.id).is_deleted());
}

#[test]
fn snooze_is_clamped_to_the_minimum() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");
    let created = household
        .create_task_at(&new_task("Call plumber", &mom, &[]), t0())
        .unwrap();

    let (snoozed, _) = updated(
        household
            .apply_action_at(
                &created.id,
                &mom,
                &action(json!({ "actorId": mom, "action": "snooze", "minutes": 1 })),
                t0(),
            )
            .unwrap(),
    );
    assert_eq!(snoozed.reminders.snooze_until, Some(t0() + Duration::minutes(5)));

    let (snoozed, _) = updated(
        household
            .apply_action_at(
                &created.id,
                &mom,
                &action(json!({ "actorId": mom, "action": "snooze" })),
                t0(),
            )
            .unwrap(),
    );
    assert_eq!(snoozed.reminders.snooze_until, Some(t0() + Duration::minutes(60)));
}

#[test]
fn huge_snooze_is_capped_at_a_year() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");
    let created = household
        .create_task_at(&new_task("Renew passport", &mom, &[]), t0())
        .unwrap();

    for minutes in [json!(1_000_000_000_000_i64), json!(1e300), json!(i64::MAX)] {
        let (snoozed, _) = updated(
            household
                .apply_action_at(
                    &created.id,
                    &mom,
                    &action(json!({ "actorId": mom, "action": "snooze", "minutes": minutes })),
                    t0(),
                )
                .unwrap(),
        );
        assert_eq!(
            snoozed.reminders.snooze_until,
            Some(t0() + Duration::minutes(MAX_SNOOZE_MINUTES))
        );
    }
}

#[test]
fn unknown_subtask_is_not_found() {
    let household = memory_household(&["Mom"]);
    let mom = member_id(&household, "Mom");
    let created = household
        .create_task_at(&new_task("Shopping", &mom, &[]), t0())
        .unwrap();

    let err = household
        .apply_action_at(
            &created.id,
            &mom,
            &action(json!({ "actorId": mom, "action": "subtask_delete", "subtaskId": "nope" })),
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::SubtaskNotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn comments_push_mentions_to_named_members() {
    let household = memory_household(&["Mom", "Dad"]);
    let mom = member_id(&household, "Mom");
    let dad = member_id(&household, "Dad");
    let created = household
        .create_task_at(&new_task("Paint fence", &mom, &[&dad]), t0())
        .unwrap();

    let mut dad_feed = household.subscribe(&dad);
    let mut mom_feed = household.subscribe(&mom);

    household
        .apply_action_at(
            &created.id,
            &mom,
            &action(json!({ "actorId": mom, "action": "comment", "content": "@Dad bring the brushes" })),
            t0(),
        )
        .unwrap();

    let kinds = |feed: &mut chorehub::hub::Subscription| {
        let mut kinds = Vec::new();
        while let Ok(event) = feed.receiver.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    };

    assert_eq!(
        kinds(&mut dad_feed),
        vec![EventKind::StateUpdate, EventKind::StateUpdate, EventKind::Mention]
    );
    // The author is not notified about their own comment
    assert_eq!(
        kinds(&mut mom_feed),
        vec![EventKind::StateUpdate, EventKind::StateUpdate]
    );

    let stored = task(&household, &created.id);
    assert_eq!(stored.comments.len(), 1);
    assert_eq!(stored.comments[0].mentions, vec![dad]);
}
