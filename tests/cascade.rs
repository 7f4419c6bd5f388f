mod common;

use chrono::Utc;
use common::*;
use fastgear::query::{col, UpdateOptions};
use fastgear::{
    row, soft_delete_cascade_from_parent, soft_delete_cascade_from_parent_async, ErrorKind,
    MemorySession, Session, Value,
};

#[test]
fn scenario_marks_parent_then_children() {
    let graph = graph();
    let mut session = scenario();
    let before = Utc::now();

    let result =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    assert_eq!(result.affected, 3);
    assert_eq!(result.generated_maps, vec!["parent", "child"]);
    assert_eq!(result.raw.len(), 3);
    for (table, id) in [("parent", 1), ("child", 10), ("child", 11)] {
        let marked = marker(&session, table, id).expect("row marked");
        assert!(marked >= before);
    }
}

#[test]
fn every_row_gets_the_same_timestamp() {
    let graph = graph();
    let mut session = three_levels();
    soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    let root = marker(&session, "parent", 1).unwrap();
    for (table, id) in [("child", 10), ("child", 11), ("grandchild", 100), ("grandchild", 101)] {
        assert_eq!(marker(&session, table, id), Some(root));
    }
}

#[test]
fn re_deleting_fails_without_touching_markers() {
    let graph = graph();
    let mut session = scenario();
    let first =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();
    let stamped = marker(&session, "child", 10);

    let err = soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "Could not find any entity of type \"Parent\" that matches with the search filter"
    );
    assert_eq!(first.affected, 3);
    assert_eq!(marker(&session, "child", 10), stamped);
}

#[test]
fn cascade_reaches_every_level() {
    let graph = graph();
    let mut session = three_levels();

    let result =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    assert_eq!(result.affected, 5);
    assert_eq!(result.generated_maps, vec!["parent", "child", "grandchild"]);
    for id in [100, 101] {
        assert!(marker(&session, "grandchild", id).is_some());
    }
}

#[test]
fn diamond_updates_shared_descendant_once() {
    let graph = graph();
    let mut session = scenario();
    session
        .seed(&SIBLING, [row! { "id" => 20i64, "parent_id" => 1i64 }])
        .unwrap();
    session
        .seed(
            &GRANDCHILD,
            [row! { "id" => 100i64, "child_id" => 10i64, "sibling_id" => 20i64 }],
        )
        .unwrap();

    let result =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    let grandchild_entries = result
        .generated_maps
        .iter()
        .filter(|t| t.as_str() == "grandchild")
        .count();
    assert_eq!(grandchild_entries, 1);
    // parent + 2 children + 1 sibling + 1 grandchild
    assert_eq!(result.affected, 5);
    let grandchild_updates = session
        .executed()
        .iter()
        .filter(|sql| sql.starts_with("UPDATE \"grandchild\""))
        .count();
    assert_eq!(grandchild_updates, 1);
}

#[test]
fn already_deleted_child_prunes_its_subtree() {
    let graph = graph();
    let mut session = three_levels();
    let earlier = Utc::now() - chrono::Duration::days(1);
    Session::update(
        &mut session,
        &fastgear::query::UpdateStatement::new(&CHILD)
            .set("deleted_at", earlier)
            .filter(col("id").eq(11i64)),
    )
    .unwrap();
    Session::commit(&mut session).unwrap();

    let result =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    // parent, child 10, grandchild 100
    assert_eq!(result.affected, 3);
    assert_eq!(marker(&session, "child", 11), Some(earlier));
    assert!(marker(&session, "grandchild", 101).is_none());
    assert!(marker(&session, "grandchild", 100).is_some());
}

#[test]
fn tables_without_marker_stop_the_walk() {
    let graph = graph();
    let mut session = scenario();
    session
        .seed(&AUDIT, [row! { "id" => 1i64, "parent_id" => 1i64 }])
        .unwrap();
    session
        .seed(&AUDIT_NOTE, [row! { "id" => 1i64, "audit_id" => 1i64 }])
        .unwrap();

    let result =
        soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "deleted_at").unwrap();

    assert!(!result.generated_maps.iter().any(|t| t.starts_with("audit")));
    assert!(marker(&session, "audit_note", 1).is_none());
}

#[test]
fn composite_keys_are_rejected_before_any_write() {
    let graph = graph();
    let mut session = MemorySession::new();
    session
        .seed(&MEMBERSHIP, [row! { "group_id" => 1i64, "user_id" => 2i64 }])
        .unwrap();
    let written = session.rows_written();

    let err = soft_delete_cascade_from_parent(
        &mut session,
        &graph,
        "membership",
        UpdateOptions::new().filter(col("group_id").eq(1i64)),
        "deleted_at",
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(session.rows_written(), written);
    assert_eq!(session.rows("membership")[0].value("deleted_at"), &Value::Null);
}

#[test]
fn options_criteria_and_custom_marker() {
    let graph = graph();
    let mut session = MemorySession::new();
    session
        .seed(
            &TAG,
            [
                row! { "id" => 1i64, "label" => "keep" },
                row! { "id" => 2i64, "label" => "drop" },
                row! { "id" => 3i64, "label" => "drop" },
            ],
        )
        .unwrap();

    let result = soft_delete_cascade_from_parent(
        &mut session,
        &graph,
        "tag",
        UpdateOptions::new().filter(col("label").eq("drop")),
        "removed_at",
    )
    .unwrap();

    assert_eq!(result.affected, 2);
    assert_eq!(result.generated_maps, vec!["tag"]);
    assert_eq!(
        session.find_row("tag", "id", 1i64).unwrap().value("removed_at"),
        &Value::Null
    );
}

#[test]
fn unknown_marker_is_a_configuration_error() {
    let graph = graph();
    let mut session = scenario();
    let err = soft_delete_cascade_from_parent(&mut session, &graph, "parent", "1", "removed_at")
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn async_cascade_matches_sync() {
    let graph = graph();
    let mut session = three_levels();

    let result =
        soft_delete_cascade_from_parent_async(&mut session, &graph, "parent", "1", "deleted_at")
            .await
            .unwrap();

    assert_eq!(result.affected, 5);
    assert_eq!(result.generated_maps[0], "parent");
}
