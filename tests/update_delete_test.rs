mod helpers;

use helpers::{insert_memory, test_db};
use mnemo::memory::query::{run, MemoryQuery};
use mnemo::memory::store;
use mnemo::memory::types::MemoryPatch;
use mnemo::Error;

fn text_query(uid: &str, text: &str) -> MemoryQuery {
    MemoryQuery {
        uid: uid.into(),
        namespace: None,
        tags: Vec::new(),
        text: Some(text.into()),
        limit: 10,
        offset: 0,
        owner_user_id: None,
    }
}

#[test]
fn patched_text_is_searchable_old_text_is_not() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "u", "u", "draft proposal for caching layer", &[]);

    let patch = MemoryPatch {
        text: Some("final decision on the storage engine".into()),
        ..Default::default()
    };
    store::update(&mut conn, id, patch, None).unwrap();

    assert!(run(&conn, &text_query("u", "caching")).unwrap().is_empty());
    let hits = run(&conn, &text_query("u", "storage engine")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
}

#[test]
fn patched_tags_update_overlap_filter() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "u", "u", "quarterly numbers", &["draft"]);

    let patch = MemoryPatch {
        tags: Some(vec!["final".into(), "finance".into()]),
        ..Default::default()
    };
    store::update(&mut conn, id, patch, None).unwrap();

    let mut by_old_tag = text_query("u", "quarterly");
    by_old_tag.text = None;
    by_old_tag.tags = vec!["draft".into()];
    assert!(run(&conn, &by_old_tag).unwrap().is_empty());

    let mut by_new_tag = by_old_tag.clone();
    by_new_tag.tags = vec!["finance".into()];
    let hits = run(&conn, &by_new_tag).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].tags, vec!["final", "finance"]);
}

#[test]
fn namespace_patch_moves_the_record() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "u", "inbox", "triage me", &[]);

    let patch = MemoryPatch {
        namespace: Some("archive".into()),
        ..Default::default()
    };
    store::update(&mut conn, id, patch, None).unwrap();

    let mut in_inbox = text_query("u", "triage");
    in_inbox.namespace = Some("inbox".into());
    assert!(run(&conn, &in_inbox).unwrap().is_empty());

    let mut in_archive = in_inbox.clone();
    in_archive.namespace = Some("archive".into());
    assert_eq!(run(&conn, &in_archive).unwrap().len(), 1);
}

#[test]
fn deleted_memory_disappears_from_queries() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "u", "u", "short lived note", &["tmp"]);

    assert!(store::delete(&mut conn, id, None).unwrap());

    assert!(run(&conn, &text_query("u", "short lived")).unwrap().is_empty());
    let mut by_tag = text_query("u", "x");
    by_tag.text = None;
    by_tag.tags = vec!["tmp".into()];
    assert!(run(&conn, &by_tag).unwrap().is_empty());
    assert!(matches!(
        store::get_by_id(&conn, id, None),
        Err(Error::NotFound)
    ));
}

#[test]
fn unknown_patch_field_is_rejected_at_the_boundary() {
    let parsed = serde_json::from_str::<MemoryPatch>(r#"{"text": "ok", "priority": 3}"#);
    assert!(parsed.is_err());
}
