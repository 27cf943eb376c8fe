use crate::{
    record::{Record, Related},
    test_fixtures::{TestDb, attrs, ids, test_db},
    value::Value,
};

fn seed_user(fixture: &TestDb, name: &str) -> Record {
    fixture
        .db
        .model("User")
        .unwrap()
        .create(attrs(&[("name", Value::from(name))]))
        .unwrap()
}

fn seed_post(fixture: &TestDb, user: &Record, title: &str) -> Record {
    fixture
        .db
        .model("Post")
        .unwrap()
        .create(attrs(&[
            ("title", Value::from(title)),
            ("user_id", user.stored_key()),
        ]))
        .unwrap()
}

fn seed_tag(fixture: &TestDb, name: &str) -> Record {
    fixture
        .db
        .model("Tag")
        .unwrap()
        .create(attrs(&[("name", Value::from(name))]))
        .unwrap()
}

fn pivot_pairs(fixture: &TestDb) -> Vec<(Value, Value)> {
    fixture
        .conn
        .rows("post_tag")
        .into_iter()
        .map(|row| {
            (
                row.get("post_id").cloned().unwrap_or(Value::Null),
                row.get("tag_id").cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

// ---- has one / has many ------------------------------------------------

#[test]
fn has_one_constrains_on_foreign_key() {
    let fixture = test_db();
    let user = seed_user(&fixture, "ada");
    let other = seed_user(&fixture, "sam");

    let profile = fixture.db.model("Profile").unwrap();
    profile
        .create(attrs(&[
            ("bio", Value::from("first")),
            ("user_id", user.stored_key()),
        ]))
        .unwrap();
    profile
        .create(attrs(&[
            ("bio", Value::from("second")),
            ("user_id", other.stored_key()),
        ]))
        .unwrap();

    let found = user.has_one(&fixture.db, "profile").unwrap().get().unwrap();
    assert_eq!(found.unwrap().get("bio").unwrap(), Value::from("first"));
}

#[test]
fn has_many_lists_only_owned_rows() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let sam = seed_user(&fixture, "sam");
    seed_post(&fixture, &ada, "one");
    seed_post(&fixture, &ada, "two");
    seed_post(&fixture, &sam, "other");

    let posts = ada.has_many(&fixture.db, "posts").unwrap().get().unwrap();
    assert_eq!(posts.len(), 2);
}

#[test]
fn has_many_create_prefills_the_foreign_key() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");

    let post = ada
        .has_many(&fixture.db, "posts")
        .unwrap()
        .create(attrs(&[("title", Value::from("hello"))]))
        .unwrap();

    assert!(post.exists());
    assert_eq!(post.get_raw("user_id"), Some(&ada.stored_key()));
}

// ---- belongs to --------------------------------------------------------

#[test]
fn belongs_to_resolves_the_owner() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");

    let author = post
        .belongs_to(&fixture.db, "author")
        .unwrap()
        .get()
        .unwrap()
        .unwrap();
    assert_eq!(author.get_key().unwrap(), ada.get_key().unwrap());
}

#[test]
fn belongs_to_with_null_foreign_key_resolves_none() {
    let fixture = test_db();
    let post = fixture
        .db
        .model("Post")
        .unwrap()
        .create(attrs(&[("title", Value::from("orphan"))]))
        .unwrap();

    let author = post.belongs_to(&fixture.db, "author").unwrap().get().unwrap();
    assert!(author.is_none());
}

#[test]
fn associate_and_dissociate_mutate_memory_only() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let mut post = seed_post(&fixture, &ada, "hello");
    let sam = seed_user(&fixture, "sam");

    post.associate("author", &sam).unwrap();
    assert_eq!(post.get_raw("user_id"), Some(&sam.stored_key()));
    assert!(post.is_dirty(Some(&["user_id"])));

    // nothing persisted yet
    let stored = fixture
        .db
        .model("Post")
        .unwrap()
        .find(post.get_key().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(stored.get_raw("user_id"), Some(&ada.stored_key()));

    post.dissociate("author").unwrap();
    assert_eq!(post.get_raw("user_id"), Some(&Value::Null));
}

// ---- belongs to many: pivot mutation -----------------------------------

#[test]
fn attach_inserts_pivot_rows_with_extra_columns() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    seed_tag(&fixture, "rust");

    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();
    let extra: crate::query::Row = attrs(&[("note", Value::from("primary"))])
        .into_iter()
        .collect();
    tags.attach(&ids(&[1]), Some(&extra)).unwrap();

    let rows = fixture.conn.rows("post_tag");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("note"), Some(&Value::from("primary")));
    assert_eq!(rows[0].get("tag_id"), Some(&Value::Int(1)));
}

#[test]
fn detach_is_idempotent() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");

    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();
    tags.attach(&ids(&[1, 2]), None).unwrap();

    assert_eq!(tags.detach(Some(&ids(&[1]))).unwrap(), 1);
    // absent id: no-op
    assert_eq!(tags.detach(Some(&ids(&[1]))).unwrap(), 0);
    // detach all
    assert_eq!(tags.detach(None).unwrap(), 1);
    assert!(fixture.conn.rows("post_tag").is_empty());
}

#[test]
fn detach_only_touches_the_owner() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post_a = seed_post(&fixture, &ada, "a");
    let post_b = seed_post(&fixture, &ada, "b");

    post_a
        .belongs_to_many(&fixture.db, "tags")
        .unwrap()
        .attach(&ids(&[1]), None)
        .unwrap();
    post_b
        .belongs_to_many(&fixture.db, "tags")
        .unwrap()
        .attach(&ids(&[1]), None)
        .unwrap();

    post_a
        .belongs_to_many(&fixture.db, "tags")
        .unwrap()
        .detach(None)
        .unwrap();

    assert_eq!(
        pivot_pairs(&fixture),
        vec![(post_b.stored_key(), Value::Int(1))]
    );
}

#[test]
fn sync_reconciles_to_the_requested_set() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();

    let first = tags.sync(&ids(&[1, 2]), true).unwrap();
    assert_eq!(first.attached, ids(&[1, 2]));
    assert!(first.detached.is_empty());

    let second = tags.sync(&ids(&[2, 3]), true).unwrap();
    assert_eq!(second.attached, ids(&[3]));
    assert_eq!(second.detached, ids(&[1]));

    // verify by pivot-row existence, not count
    let mut pairs = pivot_pairs(&fixture);
    pairs.sort_by(|a, b| a.1.compare(&b.1));
    assert_eq!(
        pairs,
        vec![
            (post.stored_key(), Value::Int(2)),
            (post.stored_key(), Value::Int(3)),
        ]
    );
}

#[test]
fn repeated_sync_reports_no_changes_and_writes_nothing() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();

    tags.sync(&ids(&[1, 2, 3]), true).unwrap();
    let before = fixture.conn.rows("post_tag");

    let repeat = tags.sync(&ids(&[1, 2, 3]), true).unwrap();
    assert!(repeat.attached.is_empty());
    assert!(repeat.detached.is_empty());
    assert_eq!(fixture.conn.rows("post_tag"), before);
}

#[test]
fn sync_without_detaching_keeps_extra_ids() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();

    tags.attach(&ids(&[9]), None).unwrap();
    let changes = tags.sync(&ids(&[1]), false).unwrap();

    assert_eq!(changes.attached, ids(&[1]));
    assert!(changes.detached.is_empty());
    assert_eq!(fixture.conn.rows("post_tag").len(), 2);
}

#[test]
fn toggle_flips_membership_per_id() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    let tags = post.belongs_to_many(&fixture.db, "tags").unwrap();

    tags.attach(&ids(&[1, 2]), None).unwrap();

    let changes = tags.toggle(&ids(&[2, 3])).unwrap();
    assert_eq!(changes.attached, ids(&[3]));
    assert_eq!(changes.detached, ids(&[2]));

    let mut pairs = pivot_pairs(&fixture);
    pairs.sort_by(|a, b| a.1.compare(&b.1));
    assert_eq!(
        pairs,
        vec![
            (post.stored_key(), Value::Int(1)),
            (post.stored_key(), Value::Int(3)),
        ]
    );
}

// ---- belongs to many: reads --------------------------------------------

#[test]
fn belongs_to_many_reads_join_through_the_pivot() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let post = seed_post(&fixture, &ada, "hello");
    let rust = seed_tag(&fixture, "rust");
    seed_tag(&fixture, "orm");

    post.belongs_to_many(&fixture.db, "tags")
        .unwrap()
        .attach(&[rust.stored_key()], None)
        .unwrap();

    let related = post
        .belongs_to_many(&fixture.db, "tags")
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].get("name").unwrap(), Value::from("rust"));
    assert!(related[0].exists(), "related rows hydrate as persisted");
}

// ---- has many through --------------------------------------------------

#[test]
fn has_many_through_spans_the_intermediate_table() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    let sam = seed_user(&fixture, "sam");
    let post_a = seed_post(&fixture, &ada, "a");
    let post_b = seed_post(&fixture, &ada, "b");
    let post_s = seed_post(&fixture, &sam, "s");

    let comment = fixture.db.model("Comment").unwrap();
    for (post, body) in [(&post_a, "c1"), (&post_a, "c2"), (&post_b, "c3"), (&post_s, "cx")] {
        comment
            .create(attrs(&[
                ("body", Value::from(body)),
                ("post_id", post.stored_key()),
            ]))
            .unwrap();
    }

    let found = ada
        .has_many_through(&fixture.db, "comments")
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(found.len(), 3);
    assert!(
        found
            .iter()
            .all(|c| c.get("body").unwrap() != Value::from("cx"))
    );
}

// ---- cache & kind checks -----------------------------------------------

#[test]
fn load_caches_for_the_record_lifetime() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");
    seed_post(&fixture, &ada, "one");

    let mut ada = fixture
        .db
        .model("User")
        .unwrap()
        .find(ada.get_key().unwrap())
        .unwrap()
        .unwrap();

    match ada.load(&fixture.db, "posts").unwrap() {
        Related::Many(posts) => assert_eq!(posts.len(), 1),
        Related::One(_) => panic!("has_many resolves to a collection"),
    }

    // later inserts are not observed through the cache
    seed_post(&fixture, &ada, "two");
    match ada.load(&fixture.db, "posts").unwrap() {
        Related::Many(posts) => assert_eq!(posts.len(), 1),
        Related::One(_) => panic!("has_many resolves to a collection"),
    }

    // until explicitly unloaded
    ada.unload_relation("posts");
    match ada.load(&fixture.db, "posts").unwrap() {
        Related::Many(posts) => assert_eq!(posts.len(), 2),
        Related::One(_) => panic!("has_many resolves to a collection"),
    }
}

#[test]
fn unknown_and_mismatched_relations_error() {
    let fixture = test_db();
    let ada = seed_user(&fixture, "ada");

    assert!(ada.has_many(&fixture.db, "nope").is_err());
    // `profile` is has_one, not has_many
    assert!(ada.has_many(&fixture.db, "profile").is_err());
    assert!(ada.has_one(&fixture.db, "profile").is_ok());
}
