mod common;

use common::*;
use fastgear::query::{col, FindOptions, OptionsMap, OrderBy, UpdateOptions};
use fastgear::{
    payload, row, ErrorKind, MemorySession, Pagination, Payload, Session, StatementConstructor,
    Value,
};

fn seeded() -> MemorySession {
    let mut session = scenario();
    session
        .seed(
            &PARENT,
            [
                row! { "id" => 2i64, "name" => "second" },
                row! { "id" => 3i64, "name" => "third" },
            ],
        )
        .unwrap();
    session
}

#[test]
fn create_from_entity_and_payload() {
    let repo = parents();
    let mut session = MemorySession::new();

    let explicit = repo
        .create(
            &mut session,
            Parent {
                id: 7,
                name: "seven".into(),
                ..Parent::default()
            },
        )
        .unwrap();
    assert_eq!(explicit.id, 7);

    let generated = repo
        .create(&mut session, payload! { "name" => "generated" })
        .unwrap();
    assert_eq!(generated.id, 8);
    assert_eq!(generated.name, "generated");
    assert_eq!(session.flushes(), 2);
}

#[test]
fn create_all_inserts_in_one_statement() {
    let repo = children();
    let mut session = scenario();
    let before = session.executed().len();

    let created = repo
        .create_all(
            &mut session,
            [
                payload! { "parent_id" => 1i64, "name" => "x" },
                payload! { "parent_id" => 1i64, "name" => "y" },
            ],
        )
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].id, 12);
    let inserts = session.executed()[before..]
        .iter()
        .filter(|sql| sql.starts_with("INSERT"))
        .count();
    assert_eq!(inserts, 1);
    assert!(repo.create_all(&mut session, Vec::<Payload>::new()).unwrap().is_empty());
}

#[test]
fn find_one_variants() {
    let repo = parents();
    let mut session = seeded();

    assert_eq!(repo.find_one(&mut session, "2").unwrap().unwrap().name, "second");
    assert!(repo.find_one(&mut session, "99").unwrap().is_none());

    let err = repo.find_one_or_fail(&mut session, "99").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.http_status(), 404);

    let err = repo
        .find_one_or_fail(&mut session, FindOptions::new().filter(col("id").gt(1i64)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Multiplicity);
    assert!(err.to_string().ends_with("matched more than one row"), "{err}");

    let err = repo.find_one(&mut session, "not-a-number").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[test]
fn find_with_options_and_map() {
    let repo = parents();
    let mut session = seeded();

    let found = repo
        .find(
            &mut session,
            FindOptions::new()
                .order_by(OrderBy::desc("id"))
                .skip(1)
                .take(1),
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 2);

    let map = OptionsMap::new()
        .with("where", col("name").eq("third"))
        .with("take", 5u64);
    assert_eq!(repo.find(&mut session, map).unwrap()[0].id, 3);

    let bad = OptionsMap::new().with("bad_key", 1u64);
    let err = repo.find(&mut session, bad).unwrap_err();
    assert!(err.to_string().contains("bad_key"), "{err}");
    assert!(err.is_configuration());
}

#[test]
fn find_hides_soft_deleted_rows_unless_asked() {
    let repo = parents();
    let mut session = seeded();
    repo.soft_delete(&mut session, "3").unwrap();

    assert_eq!(repo.count(&mut session, FindOptions::new()).unwrap(), 2);
    let all = repo
        .find(&mut session, FindOptions::new().with_deleted())
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn find_eager_loads_relations() {
    let repo = parents();
    let mut session = seeded();

    let parent = repo
        .find_one_or_fail(&mut session, FindOptions::new().filter(col("id").eq(1i64)).relation("children"))
        .unwrap();
    let mut names: Vec<_> = parent.children.iter().map(|c| c.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);

    let narrowed = repo
        .find(
            &mut session,
            FindOptions::new()
                .filter(col("id").eq(1i64))
                .select(["name"])
                .relation("children"),
        )
        .unwrap();
    assert_eq!(narrowed[0].name, "root");
    assert_eq!(narrowed[0].children.len(), 2);

    let err = repo
        .find(&mut session, FindOptions::new().relation("nope"))
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn raw_statements_are_executed_as_given() {
    let repo = parents();
    let mut session = seeded();
    let statement = StatementConstructor::new(&PARENT)
        .build_select_statement(FindOptions::new().filter(col("id").lt(3i64)))
        .unwrap();
    assert_eq!(repo.find(&mut session, statement.clone()).unwrap().len(), 2);
    assert_eq!(repo.count(&mut session, statement).unwrap(), 2);
}

#[test]
fn find_and_count_ignores_paging_for_the_total() {
    let repo = parents();
    let mut session = seeded();

    let (items, total) = repo
        .find_and_count(&mut session, FindOptions::new().take(2))
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(total, 3);
}

#[test]
fn paginate_builds_a_page() {
    let repo = parents();
    let mut session = seeded();

    let page = repo
        .paginate(
            &mut session,
            Pagination::new(2, 2).sort("id", fastgear::query::Order::Asc),
        )
        .unwrap();
    assert_eq!(page.page, 2);
    assert_eq!(page.pages, 2);
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, 3);
}

#[test]
fn update_skips_unchanged_rows() {
    let repo = parents();
    let mut session = seeded();
    let written = session.rows_written();

    let same = repo
        .update(&mut session, "2", payload! { "name" => "second" })
        .unwrap();
    assert_eq!(same.affected, 0);
    assert!(same.raw.is_empty());
    assert_eq!(session.rows_written(), written);

    let changed = repo
        .update(&mut session, "2", payload! { "name" => "renamed" })
        .unwrap();
    assert_eq!(changed.affected, 1);
    assert_eq!(changed.raw[0].name, "renamed");
    assert_eq!(
        session.find_row("parent", "id", 2i64).unwrap().value("name"),
        &Value::from("renamed")
    );
}

#[test]
fn update_edge_cases() {
    let repo = parents();
    let mut session = seeded();
    let executed = session.executed().len();

    let empty = repo
        .update(&mut session, "2", Payload::new().unset("name"))
        .unwrap();
    assert_eq!(empty.affected, 0);
    assert_eq!(session.executed().len(), executed);

    let err = repo
        .update(&mut session, "99", payload! { "name" => "x" })
        .unwrap_err();
    assert!(err.is_not_found());

    let many = repo
        .update(
            &mut session,
            UpdateOptions::new().filter(col("id").gte(2i64)),
            payload! { "name" => "bulk" },
        )
        .unwrap();
    assert_eq!(many.affected, 2);
}

#[test]
fn update_leaves_soft_deleted_rows_alone() {
    let repo = parents();
    let mut session = seeded();
    repo.soft_delete(&mut session, "3").unwrap();
    assert!(repo.find_one(&mut session, "3").unwrap().is_none());

    let err = repo
        .update(&mut session, "3", payload! { "name" => "ghost" })
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        session.find_row("parent", "id", 3i64).unwrap().value("name"),
        &Value::from("third")
    );

    let bulk = repo
        .update(
            &mut session,
            UpdateOptions::new().filter(col("id").gte(2i64)),
            payload! { "name" => "bulk" },
        )
        .unwrap();
    assert_eq!(bulk.affected, 1);
}

#[test]
fn delete_by_criteria_and_statement() {
    let repo = parents();
    let mut session = seeded();

    let deleted = repo.delete(&mut session, "3").unwrap();
    assert_eq!(deleted.affected, 1);
    assert_eq!(deleted.raw[0].value("id"), &Value::Int(3));
    assert!(session.find_row("parent", "id", 3i64).is_none());

    assert!(repo.delete(&mut session, "3").unwrap_err().is_not_found());

    let statement = StatementConstructor::new(&CHILD)
        .build_delete_statement(fastgear::DeleteOptions::new().filter(col("parent_id").eq(1i64)), None)
        .unwrap();
    let raw = repo.delete(&mut session, statement).unwrap();
    assert_eq!(raw.affected, 2);
    assert!(session.rows("child").is_empty());
}

#[test]
fn soft_delete_commits_outside_a_transaction() {
    let repo = parents();
    let mut session = three_levels();
    let commits = session.commits();

    let result = repo.soft_delete(&mut session, "1").unwrap();
    assert_eq!(result.affected, 5);
    assert_eq!(result.generated_maps[0], "parent");
    assert_eq!(session.commits(), commits + 1);
    assert!(!Session::in_nested_transaction(&session));
    assert!(session
        .executed()
        .iter()
        .any(|sql| sql.starts_with("RELEASE SAVEPOINT")));
}

#[test]
fn soft_delete_flushes_inside_an_outer_savepoint() {
    let repo = parents();
    let mut session = scenario();
    Session::begin_nested(&mut session).unwrap();
    let commits = session.commits();

    repo.soft_delete(&mut session, "1").unwrap();
    assert_eq!(session.commits(), commits);
    assert!(Session::in_nested_transaction(&session));
}

#[test]
fn soft_delete_rolls_back_on_failure() {
    let repo = parents();
    let mut session = three_levels();
    session.fail_writes_on("grandchild");

    let err = repo.soft_delete(&mut session, "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(marker(&session, "parent", 1).is_none());
    assert!(marker(&session, "child", 10).is_none());
    assert!(session
        .executed()
        .iter()
        .any(|sql| sql.starts_with("ROLLBACK TO SAVEPOINT")));
    assert!(!Session::in_nested_transaction(&session));
}

#[test]
fn soft_delete_missing_root_is_not_found() {
    let repo = parents();
    let mut session = scenario();
    assert!(repo.soft_delete(&mut session, "42").unwrap_err().is_not_found());
}

#[test]
fn soft_delete_rejects_composite_keys() {
    let repo: fastgear::SyncRepository<Membership> = fastgear::SyncRepository::new(
        graph(),
        fastgear::config::RepositoryConfig::default(),
    )
    .unwrap();
    let mut session = MemorySession::new();
    session
        .seed(&MEMBERSHIP, [row! { "group_id" => 1i64, "user_id" => 1i64 }])
        .unwrap();
    let written = session.rows_written();

    let err = repo
        .soft_delete(&mut session, UpdateOptions::new().filter(col("group_id").eq(1i64)))
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(session.rows_written(), written);
}

#[test]
fn soft_delete_with_configured_marker() {
    let config = fastgear::config::RepositoryConfig {
        soft_delete_column: "removed_at".into(),
    };
    let repo: fastgear::SyncRepository<Parent> =
        fastgear::SyncRepository::new(graph(), config).unwrap();
    let mut session = scenario();

    let err = repo.soft_delete(&mut session, "1").unwrap_err();
    assert!(err.is_configuration());

    let result = repo
        .soft_delete_with_marker(&mut session, "1", "deleted_at")
        .unwrap();
    assert_eq!(result.affected, 3);
}

#[test]
fn refresh_rereads_soft_deleted_rows() {
    let repo = parents();
    let mut session = seeded();
    let second = repo.find_one_or_fail(&mut session, "2").unwrap();
    assert!(second.deleted_at.is_none());

    repo.soft_delete(&mut session, "2").unwrap();
    let refreshed = repo.refresh(&mut session, &second).unwrap();
    assert!(refreshed.deleted_at.is_some());
}

#[test]
fn repository_requires_its_table_in_the_graph() {
    let graph = std::sync::Arc::new(fastgear::schema::SchemaGraph::new([TAG.clone()]).unwrap());
    let err = fastgear::SyncRepository::<Parent>::new(graph, Default::default()).unwrap_err();
    assert!(err.is_configuration());
}
