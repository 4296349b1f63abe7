//! Integration tests for unique constraint enforcement on save.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use uniqguard_core::catalog::{
    ConditionDecl, EntityDef, FieldDef, FieldType, ScalarType, SchemaBundle, UniqueDecl,
};
use uniqguard_core::config::{DatabaseSettings, EvaluationPolicy, Settings};
use uniqguard_core::error::{Error, EvaluationError};
use uniqguard_core::guard::UniqueGuard;
use uniqguard_core::storage::{Database, Row, RowId, StorageConfig};

struct TestContext {
    db: Arc<Database>,
    guard: Arc<UniqueGuard>,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with(Settings::new(), |c| c)
    }

    fn with(settings: Settings, config: impl FnOnce(StorageConfig) -> StorageConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let guard = Arc::new(UniqueGuard::new(Arc::new(library_schema()), settings));
        let db = Database::open("default", config(StorageConfig::new(dir.path())))
            .unwrap()
            .with_hook(guard.clone());

        Self {
            db: Arc::new(db),
            guard,
            _dir: dir,
        }
    }

    /// Save a row in its own transaction and commit it.
    fn insert(&self, entity: &str, mut row: Row) -> Result<RowId, Error> {
        let mut txn = self.db.begin();
        let id = txn.save(entity, &mut row)?;
        txn.commit()?;
        Ok(id)
    }
}

fn library_schema() -> SchemaBundle {
    let author = EntityDef::new("library", "Author")
        .with_field(FieldDef::new("email", FieldType::scalar(ScalarType::String)))
        .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::String)))
        .with_field(FieldDef::new("is_active", FieldType::scalar(ScalarType::Bool)))
        .with_unique(
            UniqueDecl::new("unique_active_author_email", ["email"])
                .with_condition(ConditionDecl::lookup("is_active", true)),
        );

    let book = EntityDef::new("library", "Book")
        .with_field(FieldDef::new("title", FieldType::scalar(ScalarType::String)))
        .with_field(FieldDef::new("author", FieldType::scalar(ScalarType::String)))
        .with_field(FieldDef::optional_scalar("isbn", ScalarType::String))
        .unique_together(["title", "author"])
        .unique_together(["isbn"]);

    let session = EntityDef::new("sessions", "Session")
        .with_field(FieldDef::new("token", FieldType::scalar(ScalarType::String)))
        .unique_together(["token"]);

    SchemaBundle::new()
        .with_entity(author)
        .with_entity(book)
        .with_entity(session)
}

fn author(email: &str, active: bool) -> Row {
    Row::new()
        .with("email", email)
        .with("name", "Ann")
        .with("is_active", active)
}

fn book(title: &str, author: &str) -> Row {
    Row::new()
        .with("title", title)
        .with("author", author)
        .with("isbn", Option::<String>::None)
}

#[test]
fn test_conditional_unique_author_email() {
    let ctx = TestContext::new();

    ctx.insert("Author", author("a@x.com", true)).unwrap();

    let err = ctx.insert("Author", author("a@x.com", true)).unwrap_err();
    let violation = err.as_violation().expect("constraint violation");
    assert_eq!(violation.constraint, "unique_active_author_email");
    assert_eq!(violation.entity, "Author");
    assert_eq!(
        err.to_string(),
        "unique constraint 'unique_active_author_email' violated: Author with (email)=('a@x.com') already exists"
    );

    // Inactive rows are outside the condition.
    ctx.insert("Author", author("a@x.com", false)).unwrap();
    ctx.insert("Author", author("a@x.com", false)).unwrap();

    assert_eq!(ctx.db.engine().count("Author"), 3);
}

#[test]
fn test_distinct_keys_both_succeed() {
    let ctx = TestContext::new();

    ctx.insert("Author", author("a@x.com", true)).unwrap();
    ctx.insert("Author", author("b@x.com", true)).unwrap();
    assert_eq!(ctx.db.engine().count("Author"), 2);
}

#[test]
fn test_unique_together() {
    let ctx = TestContext::new();

    ctx.insert("Book", book("Dune", "Herbert")).unwrap();
    ctx.insert("Book", book("Dune", "Someone Else")).unwrap();
    ctx.insert("Book", book("Children of Dune", "Herbert")).unwrap();

    let err = ctx.insert("Book", book("Dune", "Herbert")).unwrap_err();
    let violation = err.as_violation().unwrap();
    assert_eq!(violation.constraint, "book_title_author_unique");
    assert_eq!(violation.fields, vec!["title".to_string(), "author".to_string()]);
}

#[test]
fn test_null_keys_never_collide() {
    let ctx = TestContext::new();

    // Both books have a null isbn.
    ctx.insert("Book", book("A", "x")).unwrap();
    ctx.insert("Book", book("B", "y")).unwrap();

    ctx.insert("Book", book("C", "z").with("isbn", "978-0")).unwrap();
    let err = ctx
        .insert("Book", book("D", "w").with("isbn", "978-0"))
        .unwrap_err();
    assert_eq!(err.as_violation().unwrap().constraint, "book_isbn_unique");
}

#[test]
fn test_update_does_not_conflict_with_itself() {
    let ctx = TestContext::new();
    let id = ctx.insert("Author", author("a@x.com", true)).unwrap();

    let mut txn = ctx.db.begin();
    let mut row = txn.get("Author", &id).unwrap().unwrap();
    row.set("name", "Ann Smith");
    assert_eq!(txn.save("Author", &mut row).unwrap(), id);
    txn.commit().unwrap();

    assert_eq!(ctx.db.engine().count("Author"), 1);
}

#[test]
fn test_update_into_conflict() {
    let ctx = TestContext::new();
    ctx.insert("Author", author("a@x.com", true)).unwrap();
    let id = ctx.insert("Author", author("a@x.com", false)).unwrap();

    // Activating the second row brings it into scope.
    let mut txn = ctx.db.begin();
    let mut row = txn.get("Author", &id).unwrap().unwrap();
    row.set("is_active", true);
    assert!(txn.save("Author", &mut row).unwrap_err().as_violation().is_some());
}

#[test]
fn test_same_transaction_duplicates() {
    let ctx = TestContext::new();

    let mut txn = ctx.db.begin();
    txn.save("Author", &mut author("a@x.com", true)).unwrap();
    let err = txn.save("Author", &mut author("a@x.com", true)).unwrap_err();
    assert!(err.as_violation().is_some());

    txn.commit().unwrap();
    assert_eq!(ctx.db.engine().count("Author"), 1);
}

#[test]
fn test_delete_frees_key() {
    let ctx = TestContext::new();
    let id = ctx.insert("Author", author("a@x.com", true)).unwrap();

    let mut txn = ctx.db.begin();
    txn.delete("Author", &id).unwrap();
    txn.save("Author", &mut author("a@x.com", true)).unwrap();
    txn.commit().unwrap();

    assert_eq!(ctx.db.engine().count("Author"), 1);
}

#[test]
fn test_excluded_app_is_not_enforced() {
    let settings = Settings::new()
        .with_database("default", DatabaseSettings::default().exclude_app("sessions"));
    let ctx = TestContext::with(settings, |c| c);

    ctx.insert("Session", Row::new().with("token", "t")).unwrap();
    ctx.insert("Session", Row::new().with("token", "t")).unwrap();

    assert_eq!(ctx.db.engine().count("Session"), 2);
    assert!(!ctx.guard.registry().is_cached("Session"));
}

#[test]
fn test_descriptors_cached_once() {
    let ctx = TestContext::new();
    assert!(!ctx.guard.registry().is_cached("Author"));

    ctx.insert("Author", author("a@x.com", true)).unwrap();
    let first = ctx.guard.registry().snapshot();
    ctx.insert("Author", author("b@x.com", true)).unwrap();
    let second = ctx.guard.registry().snapshot();

    assert_eq!(first.len(), 1);
    assert!(Arc::ptr_eq(&first[0].1, &second[0].1));
}

#[test]
fn test_bulk_insert_bypasses_validation() {
    let ctx = TestContext::new();
    ctx.insert("Author", author("a@x.com", true)).unwrap();

    let mut txn = ctx.db.begin();
    let ids = txn.bulk_insert("Author", [author("a@x.com", true), author("a@x.com", true)]);
    txn.commit().unwrap();

    assert_eq!(ids.len(), 2);
    assert_eq!(ctx.db.engine().count("Author"), 3);
}

#[test]
fn test_evaluation_error_policy() {
    // The row lacks the condition field.
    let incomplete = || Row::new().with("email", "a@x.com").with("name", "Ann");

    let lenient = TestContext::new();
    lenient.insert("Author", incomplete()).unwrap();
    lenient.insert("Author", incomplete()).unwrap();

    let strict = TestContext::with(
        Settings::new().with_evaluation_policy(EvaluationPolicy::Fail),
        |c| c,
    );
    let err = strict.insert("Author", incomplete()).unwrap_err();
    assert!(matches!(
        err,
        Error::Evaluation(EvaluationError::UnknownField(ref f)) if f == "is_active"
    ));
}

#[test]
fn test_schema_from_json() {
    let schema = SchemaBundle::from_json(
        r#"{
            "entities": [{
                "name": "Member",
                "app": "club",
                "fields": [
                    {"name": "handle", "type": {"scalar": "string"}},
                    {"name": "age", "type": {"scalar": "int32"}},
                    {"name": "status", "type": {"scalar": "string"}}
                ],
                "unique_constraints": [{
                    "name": "adult_handle",
                    "fields": ["handle"],
                    "condition": {"expression": "age >= 18 AND status <> 'banned'"}
                }]
            }]
        }"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let guard = Arc::new(UniqueGuard::new(Arc::new(schema), Settings::new()));
    assert_eq!(guard.register_all().unwrap(), 1);
    let db = Database::open("default", StorageConfig::new(dir.path()))
        .unwrap()
        .with_hook(guard);

    let member = |age: i64, status: &str| {
        Row::new()
            .with("handle", "neo")
            .with("age", age)
            .with("status", status)
    };
    let insert = |row: Row| {
        let mut row = row;
        let mut txn = db.begin();
        txn.save("Member", &mut row)?;
        txn.commit()
    };

    insert(member(30, "ok")).unwrap();
    insert(member(12, "ok")).unwrap();
    insert(member(40, "banned")).unwrap();
    assert!(insert(member(25, "ok")).unwrap_err().as_violation().is_some());
}

#[test]
fn test_concurrent_inserts_with_protection() {
    let ctx = TestContext::new();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Arc::clone(&ctx.db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut txn = db.begin();
                let mut row = author("a@x.com", true);
                barrier.wait();
                let result = txn.save("Author", &mut row);
                if result.is_ok() {
                    // Hold the lock long enough for the other writer to queue up.
                    thread::sleep(Duration::from_millis(100));
                    txn.commit()?;
                }
                result.map(|_| ())
            })
        })
        .collect();

    let results: Vec<Result<(), Error>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(
        failure.as_violation().unwrap().constraint,
        "unique_active_author_email"
    );
    assert_eq!(ctx.db.engine().count("Author"), 1);
}

#[test]
fn test_concurrent_inserts_without_protection() {
    let settings = Settings::new().with_database(
        "default",
        DatabaseSettings::default().with_race_condition_protection(false),
    );
    let ctx = TestContext::with(settings, |c| c);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Arc::clone(&ctx.db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut txn = db.begin();
                let result = txn.save("Author", &mut author("a@x.com", true));
                // Both checks run before either write is committed.
                barrier.wait();
                result?;
                txn.commit()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // The documented risk: a duplicate slipped through.
    assert_eq!(ctx.db.engine().count("Author"), 2);
}

#[test]
fn test_degraded_protection_is_best_effort() {
    let ctx = TestContext::with(Settings::new(), StorageConfig::without_row_locks);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Arc::clone(&ctx.db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut txn = db.begin();
                let result = txn.save("Author", &mut author("a@x.com", true));
                barrier.wait();
                result?;
                txn.commit()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(ctx.db.locks().held_count(), 0);
    assert_eq!(ctx.db.engine().count("Author"), 2);

    // Sequential writes are still checked.
    assert!(ctx
        .insert("Author", author("a@x.com", true))
        .unwrap_err()
        .as_violation()
        .is_some());
}

#[test]
fn test_lock_timeout_propagates() {
    let ctx = TestContext::with(Settings::new(), |c| {
        c.with_lock_timeout(Duration::from_millis(50))
    });

    let mut first = ctx.db.begin();
    first.save("Author", &mut author("a@x.com", true)).unwrap();

    let mut second = ctx.db.begin();
    let err = second
        .save("Author", &mut author("a@x.com", true))
        .unwrap_err();
    assert!(matches!(err, Error::LockTimeout { .. }));

    // Other keys are not blocked.
    second.save("Author", &mut author("b@x.com", true)).unwrap();

    drop(first);
    second.save("Author", &mut author("a@x.com", true)).unwrap();
    second.commit().unwrap();
    assert_eq!(ctx.db.engine().count("Author"), 2);
}
