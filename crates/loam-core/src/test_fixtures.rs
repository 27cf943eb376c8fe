//! Shared fixtures: an in-memory session plus a small registered domain
//! (orders, users, posts, comments, tags, profiles) exercised across the
//! module test suites.

use crate::{
    db::Db,
    events::HookDispatcher,
    model::EntityTypeBuilder,
    query::MemoryConnection,
    relation::RelationDef,
    value::{CastKind, Value},
};
use std::sync::Arc;

pub(crate) struct TestDb {
    pub conn: Arc<MemoryConnection>,
    pub events: Arc<HookDispatcher>,
    pub db: Db,
}

pub(crate) fn test_db() -> TestDb {
    let conn = Arc::new(MemoryConnection::new());
    let events = Arc::new(HookDispatcher::new());
    let db = Db::new(conn.clone(), events.clone());

    db.register(
        EntityTypeBuilder::new("Order", "orders")
            .fillable(&["total", "status"])
            .cast("id", CastKind::Integer)
            .cast("total", CastKind::Integer)
            .cast("deleted_at", CastKind::DateTime)
            .soft_deletes(),
    )
    .expect("Order registers");

    db.register(
        EntityTypeBuilder::new("User", "users")
            .fillable(&["name", "email"])
            .hidden(&["email"])
            .relation(
                "posts",
                RelationDef::HasMany {
                    related: "Post",
                    foreign_key: "user_id",
                    local_key: "id",
                },
            )
            .relation(
                "profile",
                RelationDef::HasOne {
                    related: "Profile",
                    foreign_key: "user_id",
                    local_key: "id",
                },
            )
            .relation(
                "comments",
                RelationDef::HasManyThrough {
                    related: "Comment",
                    through: "Post",
                    first_key: "user_id",
                    second_key: "post_id",
                    local_key: "id",
                    through_key: "id",
                },
            ),
    )
    .expect("User registers");

    db.register(
        EntityTypeBuilder::new("Post", "posts")
            .fillable(&["title", "user_id"])
            .relation(
                "author",
                RelationDef::BelongsTo {
                    related: "User",
                    foreign_key: "user_id",
                    owner_key: "id",
                },
            )
            .relation(
                "comments",
                RelationDef::HasMany {
                    related: "Comment",
                    foreign_key: "post_id",
                    local_key: "id",
                },
            )
            .relation(
                "tags",
                RelationDef::BelongsToMany {
                    related: "Tag",
                    pivot_table: "post_tag",
                    foreign_pivot_key: "post_id",
                    related_pivot_key: "tag_id",
                    parent_key: "id",
                    related_key: "id",
                },
            ),
    )
    .expect("Post registers");

    db.register(EntityTypeBuilder::new("Comment", "comments").fillable(&["body", "post_id"]))
        .expect("Comment registers");

    db.register(EntityTypeBuilder::new("Tag", "tags").fillable(&["name"]))
        .expect("Tag registers");

    db.register(EntityTypeBuilder::new("Profile", "profiles").fillable(&["bio", "user_id"]))
        .expect("Profile registers");

    TestDb { conn, events, db }
}

pub(crate) fn attrs(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub(crate) fn ids(ns: &[i64]) -> Vec<Value> {
    ns.iter().copied().map(Value::Int).collect()
}
