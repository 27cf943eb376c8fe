use crate::{
    query::{Plan, Predicate, TrashMode},
    test_fixtures::{attrs, test_db},
    value::Value,
};
use std::sync::Arc;

fn seed_orders(fixture: &crate::test_fixtures::TestDb, n: i64) {
    let order = fixture.db.model("Order").unwrap();
    for i in 1..=n {
        order
            .create(attrs(&[
                ("total", Value::Int(i * 10)),
                ("status", Value::from(if i % 2 == 0 { "paid" } else { "pending" })),
            ]))
            .unwrap();
    }
}

// ---- scope engine ------------------------------------------------------

#[test]
fn default_plan_injects_qualified_soft_delete_predicate() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();

    let plan = order.query().compile();
    assert!(
        plan.predicates
            .contains(&Predicate::Null("orders.deleted_at".to_string())),
        "default scope must exclude trashed rows, table-qualified"
    );

    let with = order.with_trashed().compile();
    assert!(with.predicates.is_empty());

    let only = order.only_trashed().compile();
    assert!(
        only.predicates
            .contains(&Predicate::NotNull("orders.deleted_at".to_string()))
    );
}

#[test]
fn scope_applies_to_count_not_just_results() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 3);

    let mut o = order.find(1i64).unwrap().unwrap();
    o.delete(&fixture.db).unwrap();

    // aggregate goes through the same scoped plan
    assert_eq!(order.count().unwrap(), 2);
    assert_eq!(order.with_trashed().count().unwrap(), 3);
    assert_eq!(order.only_trashed().count().unwrap(), 1);
}

#[test]
fn unscoped_types_compile_without_predicates() {
    let fixture = test_db();
    let tag = fixture.db.model("Tag").unwrap();

    assert!(tag.query().compile().predicates.is_empty());
    assert_eq!(tag.query().compile().table, "tags");
}

// ---- local scopes ------------------------------------------------------

#[test]
fn named_local_scopes_compose_by_chaining() {
    let fixture = test_db();
    fixture
        .db
        .register(
            crate::model::EntityTypeBuilder::new("Invoice", "invoices")
                .fillable(&["status", "total"])
                .scope(
                    "paid",
                    Arc::new(|plan, _args| {
                        plan.predicates
                            .push(Predicate::Eq("status".to_string(), "paid".into()));
                    }),
                )
                .scope(
                    "at_least",
                    Arc::new(|plan, args| {
                        let min = args.first().cloned().unwrap_or(Value::Int(0));
                        plan.predicates.push(Predicate::Eq("total".to_string(), min));
                    }),
                ),
        )
        .unwrap();

    let invoice = fixture.db.model("Invoice").unwrap();
    invoice
        .create(attrs(&[
            ("status", Value::from("paid")),
            ("total", Value::Int(50)),
        ]))
        .unwrap();
    invoice
        .create(attrs(&[
            ("status", Value::from("pending")),
            ("total", Value::Int(50)),
        ]))
        .unwrap();

    let rows = invoice
        .query()
        .scope("paid", &[])
        .unwrap()
        .scope("at_least", &[Value::Int(50)])
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(rows.len(), 1);

    assert!(invoice.query().scope("missing", &[]).is_err());
}

// ---- builder refinement -------------------------------------------------

#[test]
fn order_limit_offset_window() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 5);

    let rows = order
        .query()
        .order_by_desc("total")
        .limit(2)
        .offset(1)
        .get()
        .unwrap();

    let totals: Vec<Value> = rows.iter().map(|r| r.get("total").unwrap()).collect();
    assert_eq!(totals, vec![Value::Int(40), Value::Int(30)]);
}

#[test]
fn where_in_and_null_predicates() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 3);

    let rows = order
        .query()
        .where_in("total", vec![Value::Int(10), Value::Int(30)])
        .get()
        .unwrap();
    assert_eq!(rows.len(), 2);

    let none = order.query().where_not_null("missing_column").get().unwrap();
    assert!(none.is_empty());
}

// ---- find & pagination -------------------------------------------------

#[test]
fn find_casts_the_key_through_the_pipeline() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 1);

    // text key coerces through the Integer cast on `id`
    let found = order.find("1").unwrap();
    assert!(found.is_some());
}

#[test]
fn find_or_fail_carries_the_key_and_entity_name() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 1);

    let found = order.find_or_fail(1i64).unwrap();
    assert_eq!(found.get_key().unwrap(), Value::Int(1));

    let err = order.find_or_fail(42i64).unwrap_err();
    match err {
        crate::error::Error::NotFound { entity, key } => {
            assert_eq!(entity, "Order");
            assert_eq!(key, Value::Int(42));
        }
        other => panic!("expected NotFound, got {other}"),
    }
}

#[test]
fn paginate_reports_window_bookkeeping() {
    let fixture = test_db();
    let order = fixture.db.model("Order").unwrap();
    seed_orders(&fixture, 7);

    let page = order.paginate(3, 2).unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.per_page, 3);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.from, Some(4));
    assert_eq!(page.to, Some(6));

    let past_end = order.paginate(3, 9).unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.from, None);
    assert_eq!(past_end.last_page, 3);
}

// ---- memory backend ----------------------------------------------------

#[test]
fn memory_connection_joins_and_qualified_columns() {
    use crate::query::Connection as _;

    let fixture = test_db();
    let conn = &fixture.conn;

    conn.insert("posts", attrs(&[("id", Value::Int(1))]).into_iter().collect())
        .unwrap();
    conn.insert(
        "post_tag",
        attrs(&[("post_id", Value::Int(1)), ("tag_id", Value::Int(7))])
            .into_iter()
            .collect(),
    )
    .unwrap();
    conn.insert("tags", attrs(&[("id", Value::Int(7))]).into_iter().collect())
        .unwrap();

    let mut plan = Plan::for_table("tags");
    plan.joins.push(crate::query::Join {
        table: "post_tag".to_string(),
        left: "tags.id".to_string(),
        right: "post_tag.tag_id".to_string(),
    });
    plan.predicates
        .push(Predicate::Eq("post_tag.post_id".to_string(), Value::Int(1)));

    let rows = conn.select(&plan).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Int(7)));
}

#[test]
fn memory_connection_generates_sequential_ids() {
    use crate::query::Connection as _;

    let fixture = test_db();
    let conn = &fixture.conn;

    let first = conn
        .insert_returning_id("things", crate::query::Row::new(), "id")
        .unwrap();
    let second = conn
        .insert_returning_id("things", crate::query::Row::new(), "id")
        .unwrap();

    assert_eq!(first, Value::Int(1));
    assert_eq!(second, Value::Int(2));
}

#[test]
fn memory_connection_transaction_runs_the_callback() {
    use crate::query::Connection as _;

    let fixture = test_db();
    let conn = &fixture.conn;

    conn.transaction(&mut |tx| {
        tx.insert("things", crate::query::Row::new())?;
        tx.insert("things", crate::query::Row::new())
    })
    .unwrap();

    assert_eq!(conn.rows("things").len(), 2);
}

#[test]
fn trash_mode_default_is_scoped() {
    assert_eq!(TrashMode::default(), TrashMode::Default);
}
