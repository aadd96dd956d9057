//! PostgreSQL store integration tests.
//!
//! Run only with `RUN_DB_TESTS=1` and a `DATABASE_URL` pointing at a
//! database with the workspace migrations applied. Otherwise each test
//! prints a skip notice and passes.

use chrono::Duration;
use serde_json::json;

use rolo_db::{
    ContactFields, ContactRepository, Database, GeneratedText, PendingReviewRepository,
    QueryFilter, RawFilter, ReviewPayload, SortSpec,
};

async fn test_db() -> Option<Database> {
    let _ = dotenvy::dotenv();
    if std::env::var("RUN_DB_TESTS").ok().as_deref() != Some("1") {
        eprintln!("skipping: set RUN_DB_TESTS=1 to run PostgreSQL tests");
        return None;
    }
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL is not set");
        return None;
    };
    Some(Database::connect(&url).await.expect("Failed to connect"))
}

fn owner() -> String {
    format!("test_owner_{}", uuid::Uuid::new_v4())
}

#[tokio::test]
async fn test_contact_crud_is_owner_scoped() {
    let Some(db) = test_db().await else { return };
    let (a, b) = (owner(), owner());

    let mut fields = ContactFields::named("Sarah Chen");
    fields.company = Some("Stripe".into());
    let created = db.contacts.create(&a, fields).await.unwrap();
    assert_eq!(created.owner_id, a);

    assert!(db.contacts.get(&b, created.id).await.unwrap().is_none());
    assert!(db
        .contacts
        .update(&b, created.id, ContactFields::named("X"), None)
        .await
        .unwrap()
        .is_none());
    assert!(!db.contacts.delete(&b, created.id).await.unwrap());

    let updated = db
        .contacts
        .update(
            &a,
            created.id,
            ContactFields::named("Sarah Chen"),
            Some("Edited: cleared company".into()),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.last_change.as_deref(), Some("Edited: cleared company"));

    assert!(db
        .contacts
        .set_generated(
            &a,
            created.id,
            GeneratedText {
                ai_summary: Some("Climbs rocks on weekends.".into()),
                last_change: None,
            },
        )
        .await
        .unwrap());

    assert!(db.contacts.delete(&a, created.id).await.unwrap());
    assert!(db.contacts.get(&a, created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_query_keeps_owner_scope() {
    let Some(db) = test_db().await else { return };
    let (a, b) = (owner(), owner());
    for (who, name) in [(&a, "Ana"), (&a, "Ben"), (&b, "Cy")] {
        let mut fields = ContactFields::named(name);
        fields.company = Some("Acme".into());
        db.contacts.create(who, fields).await.unwrap();
    }

    let filter = QueryFilter::from_raw(&RawFilter {
        field: "company".into(),
        op: "ilike".into(),
        value: Some(json!("acme")),
    })
    .unwrap();
    let rows = db
        .contacts
        .query(&a, &[filter], SortSpec::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.owner_id == a));
}

#[tokio::test]
async fn test_pending_review_round_trip() {
    let Some(db) = test_db().await else { return };
    let a = owner();
    let payload = ReviewPayload {
        extracted: ContactFields::named("Sarah Chen"),
        tidied_transcript: "Met Sarah Chen".into(),
        candidates: vec![],
    };
    let review = db
        .reviews
        .create(&a, "met sarah chen", payload.clone(), Duration::days(7))
        .await
        .unwrap();
    assert_eq!(review.expires_at - review.created_at, Duration::days(7));

    let fetched = db.reviews.get(&a, review.id).await.unwrap().unwrap();
    assert_eq!(fetched.payload, payload);
    assert!(db.reviews.get(&owner(), review.id).await.unwrap().is_none());
    assert!(db.reviews.delete(&a, review.id).await.unwrap());
}
