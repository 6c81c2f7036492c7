//! Behaviour every backend must share, run against each of them.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use super::{
    Backend, DiskStore, FileStore, MemoryStore, NewNode, NewUser, Node, NodeUpdate, SearchFilter,
    SqliteStore, UserStore,
};
use crate::CloudboxError;

const MB: usize = 1024 * 1024;

async fn setup_memory() -> (Option<TempDir>, MemoryStore) {
    (None, MemoryStore::new())
}

async fn setup_disk() -> (Option<TempDir>, DiskStore) {
    let dir = TempDir::new().unwrap();
    let store = DiskStore::open(dir.path()).await.unwrap();
    (Some(dir), store)
}

async fn setup_sqlite() -> (Option<TempDir>, SqliteStore) {
    (None, SqliteStore::open_in_memory().await.unwrap())
}

fn names(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

async fn folder_tree_and_totals<S: Backend>(store: &S) {
    let docs = store.create(NewNode::folder("Docs")).await.unwrap();
    let a = store
        .create(
            NewNode::file("a.txt", vec![b'a'; 10])
                .with_parent(docs.id)
                .with_path("/Docs/a.txt"),
        )
        .await
        .unwrap();
    store
        .create(NewNode::file("b.txt", vec![b'b'; 20]))
        .await
        .unwrap();

    assert_eq!(names(&store.list(None).await.unwrap()), vec!["Docs", "b.txt"]);
    assert_eq!(names(&store.list(Some(docs.id)).await.unwrap()), vec!["a.txt"]);
    assert_eq!(store.total_size().await.unwrap(), 30);

    store.delete(docs.id).await.unwrap();

    assert_eq!(store.total_size().await.unwrap(), 20);
    assert_eq!(names(&store.list(None).await.unwrap()), vec!["b.txt"]);
    assert!(matches!(
        store.get(a.id).await,
        Err(CloudboxError::NotFound(_))
    ));
}

async fn content_round_trip<S: Backend>(store: &S) {
    let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

    let created = store
        .create(NewNode::file("photo.png", payload.clone()))
        .await
        .unwrap();
    let loaded = store.get(created.id).await.unwrap();

    assert_eq!(loaded.content, payload);
    assert_eq!(loaded.size, 1000);
    assert_eq!(loaded.mime_type, "image/png");
    assert_eq!(loaded.path, "/photo.png");
}

async fn empty_file_round_trip<S: Backend>(store: &S) {
    let created = store
        .create(NewNode::file("empty.txt", Vec::new()).with_mime_type("text/plain"))
        .await
        .unwrap();

    let loaded = store.get(created.id).await.unwrap();

    assert_eq!(loaded.size, 0);
    assert!(loaded.content.is_empty());
    assert!(!loaded.is_folder);
}

async fn nested_delete_cascades<S: Backend>(store: &S) {
    let docs = store.create(NewNode::folder("Docs")).await.unwrap();
    let sub = store
        .create(NewNode::folder("Sub").with_parent(docs.id))
        .await
        .unwrap();
    let deep = store
        .create(NewNode::file("deep.txt", vec![1; 5]).with_parent(sub.id))
        .await
        .unwrap();
    let shallow = store
        .create(NewNode::file("shallow.txt", vec![1; 7]).with_parent(docs.id))
        .await
        .unwrap();
    let other = store
        .create(NewNode::file("other.txt", vec![1; 3]))
        .await
        .unwrap();

    store.delete(docs.id).await.unwrap();

    for id in [docs.id, sub.id, deep.id, shallow.id] {
        assert!(matches!(store.get(id).await, Err(CloudboxError::NotFound(_))));
    }
    assert_eq!(store.get(other.id).await.unwrap().size, 3);
    assert_eq!(store.total_size().await.unwrap(), 3);
    assert!(store.list(Some(sub.id)).await.unwrap().is_empty());
}

async fn delete_unknown_id_succeeds<S: Backend>(store: &S) {
    store.delete(4242).await.unwrap();
    assert_eq!(store.total_size().await.unwrap(), 0);
}

async fn missing_ids_are_not_found<S: Backend>(store: &S) {
    assert!(matches!(store.get(77).await, Err(CloudboxError::NotFound(_))));
    assert!(matches!(
        store.update(77, NodeUpdate::new().name("x")).await,
        Err(CloudboxError::NotFound(_))
    ));
}

async fn rename_preserves_identity<S: Backend>(store: &S) {
    let original = store
        .create(NewNode::file("draft.txt", b"text body".to_vec()).with_owner(9))
        .await
        .unwrap();

    let renamed = store
        .update(original.id, NodeUpdate::new().name("final.txt").path("/final.txt"))
        .await
        .unwrap();

    assert_eq!(renamed.id, original.id);
    assert_eq!(renamed.created_at, original.created_at);
    assert_eq!(renamed.size, original.size);
    assert_eq!(renamed.owner_id, Some(9));
    assert_eq!(renamed.content, b"text body");
    assert_eq!(renamed.name, "final.txt");
    assert_eq!(names(&store.list(None).await.unwrap()), vec!["final.txt"]);
}

async fn content_replace_rederives_size<S: Backend>(store: &S) {
    let file = store
        .create(NewNode::file("log.txt", vec![0; 10]))
        .await
        .unwrap();

    let updated = store
        .update(file.id, NodeUpdate::new().content(vec![9; 100]))
        .await
        .unwrap();

    assert_eq!(updated.size, 100);
    assert_eq!(store.get(file.id).await.unwrap().content, vec![9; 100]);
    assert_eq!(store.total_size().await.unwrap(), 100);
}

async fn search_by_size_range<S: Backend>(store: &S) {
    for (name, size) in [
        ("small.bin", MB / 2),
        ("two.bin", 2 * MB),
        ("five.bin", 5 * MB),
        ("huge.bin", 12 * MB),
    ] {
        store
            .create(NewNode::file(name, vec![0u8; size]))
            .await
            .unwrap();
    }

    let filter = SearchFilter::new()
        .min_size(MB as u64)
        .max_size(10 * MB as u64);
    let found = store.search(&filter).await.unwrap();

    assert_eq!(names(&found), vec!["two.bin", "five.bin"]);
    assert!(found.iter().all(|n| n.content.is_empty()));

    // Bounds past the largest storable size
    let beyond = store
        .search(&SearchFilter::new().min_size(u64::MAX))
        .await
        .unwrap();
    assert!(beyond.is_empty());
    let unbounded = store
        .search(&SearchFilter::new().max_size(u64::MAX))
        .await
        .unwrap();
    assert_eq!(unbounded.len(), 4);
}

async fn search_predicates<S: Backend>(store: &S) {
    let docs = store.create(NewNode::folder("Reports")).await.unwrap();
    store
        .create(
            NewNode::file("Quarterly Report.pdf", vec![0; 40])
                .with_parent(docs.id)
                .with_mime_type("application/pdf"),
        )
        .await
        .unwrap();
    store
        .create(NewNode::file("report-chart.png", vec![0; 4]).with_mime_type("image/png"))
        .await
        .unwrap();
    store
        .create(NewNode::file("notes.txt", vec![0; 2]).with_mime_type("text/plain"))
        .await
        .unwrap();

    let by_name = store.search(&SearchFilter::new().name("REPORT")).await.unwrap();
    assert_eq!(
        names(&by_name),
        vec!["Quarterly Report.pdf", "report-chart.png"]
    );

    let images = store
        .search(&SearchFilter::new().mime_prefix("image/"))
        .await
        .unwrap();
    assert_eq!(names(&images), vec!["report-chart.png"]);

    let combined = store
        .search(&SearchFilter::new().name("report").mime_prefix("application/"))
        .await
        .unwrap();
    assert_eq!(names(&combined), vec!["Quarterly Report.pdf"]);

    // Folders never match, not even an empty filter.
    let all = store.search(&SearchFilter::new()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|n| !n.is_folder));

    let now = Utc::now();
    let window = SearchFilter::new()
        .start_date(now - Duration::hours(1))
        .end_date(now + Duration::hours(1));
    assert_eq!(store.search(&window).await.unwrap().len(), 3);
    let future = SearchFilter::new().start_date(now + Duration::hours(1));
    assert!(store.search(&future).await.unwrap().is_empty());
    let past = SearchFilter::new().end_date(now - Duration::hours(1));
    assert!(store.search(&past).await.unwrap().is_empty());
}

async fn list_unknown_parent_is_empty<S: Backend>(store: &S) {
    store.create(NewNode::folder("Docs")).await.unwrap();
    assert!(store.list(Some(999)).await.unwrap().is_empty());
}

async fn list_and_search_are_metadata_only<S: Backend>(store: &S) {
    let file = store
        .create(NewNode::file("a.txt", b"payload".to_vec()))
        .await
        .unwrap();

    let listed = store.list(None).await.unwrap();
    assert_eq!(listed[0].size, 7);
    assert!(listed[0].content.is_empty());

    let meta = store.metadata(file.id).await.unwrap();
    assert_eq!(meta.size, 7);
    assert_eq!(meta.name, "a.txt");
    assert!(meta.content.is_empty());
    assert!(matches!(
        store.metadata(file.id + 100).await,
        Err(CloudboxError::NotFound(_))
    ));

    assert_eq!(store.get(file.id).await.unwrap().content, b"payload");
}

async fn parent_must_be_existing_folder<S: Backend>(store: &S) {
    let file = store
        .create(NewNode::file("a.txt", vec![1]))
        .await
        .unwrap();
    let folder = store.create(NewNode::folder("Docs")).await.unwrap();

    let under_file = store
        .create(NewNode::file("b.txt", vec![1]).with_parent(file.id))
        .await;
    assert!(matches!(under_file, Err(CloudboxError::Validation(_))));

    let under_missing = store
        .create(NewNode::file("c.txt", vec![1]).with_parent(999))
        .await;
    assert!(matches!(under_missing, Err(CloudboxError::Validation(_))));

    let move_under_file = store
        .update(folder.id, NodeUpdate::new().parent_id(Some(file.id)))
        .await;
    assert!(matches!(move_under_file, Err(CloudboxError::Validation(_))));

    assert_eq!(store.total_size().await.unwrap(), 1);
}

async fn moves_cannot_create_cycles<S: Backend>(store: &S) {
    let outer = store.create(NewNode::folder("outer")).await.unwrap();
    let inner = store
        .create(NewNode::folder("inner").with_parent(outer.id))
        .await
        .unwrap();

    let into_child = store
        .update(outer.id, NodeUpdate::new().parent_id(Some(inner.id)))
        .await;
    assert!(matches!(into_child, Err(CloudboxError::Validation(_))));

    let into_self = store
        .update(outer.id, NodeUpdate::new().parent_id(Some(outer.id)))
        .await;
    assert!(matches!(into_self, Err(CloudboxError::Validation(_))));

    let moved = store
        .update(inner.id, NodeUpdate::new().parent_id(None))
        .await
        .unwrap();
    assert_eq!(moved.parent_id, None);
    assert_eq!(names(&store.list(None).await.unwrap()), vec!["outer", "inner"]);
}

async fn folders_reject_content<S: Backend>(store: &S) {
    let folder = store.create(NewNode::folder("Docs")).await.unwrap();

    let update = store
        .update(folder.id, NodeUpdate::new().content(vec![1, 2, 3]))
        .await;
    assert!(matches!(update, Err(CloudboxError::Validation(_))));

    let mut with_content = NewNode::folder("Bad");
    with_content.content = vec![1];
    assert!(matches!(
        store.create(with_content).await,
        Err(CloudboxError::Validation(_))
    ));

    let loaded = store.get(folder.id).await.unwrap();
    assert_eq!(loaded.size, 0);
    assert_eq!(loaded.mime_type, "folder");
}

async fn ids_are_unique_and_increasing<S: Backend>(store: &S) {
    let a = store.create(NewNode::folder("a")).await.unwrap();
    let b = store.create(NewNode::folder("a")).await.unwrap();
    assert!(b.id > a.id);
}

async fn accounts<S: Backend>(store: &S) {
    let alice = store
        .create_user(NewUser::new("Alice", "$argon2id$fake"))
        .await
        .unwrap();

    let dup = store.create_user(NewUser::new("alice", "other")).await;
    assert!(matches!(dup, Err(CloudboxError::Conflict(_))));

    let found = store.get_user_by_username("ALICE").await.unwrap().unwrap();
    assert_eq!(found.id, alice.id);
    assert_eq!(found.password, "$argon2id$fake");
    assert_eq!(store.get_user(alice.id).await.unwrap().unwrap().username, "Alice");
    assert!(store.get_user(alice.id + 100).await.unwrap().is_none());
    assert!(store.get_user_by_username("bob").await.unwrap().is_none());
}

macro_rules! conformance {
    ($backend:ident, $setup:ident, [$($check:ident),* $(,)?]) => {
        mod $backend {
            $(
                #[tokio::test]
                async fn $check() {
                    let (_guard, store) = super::$setup().await;
                    super::$check(&store).await;
                }
            )*
        }
    };
}

macro_rules! conformance_all {
    ($($backend:ident => $setup:ident),* $(,)?) => {
        $(
            conformance!($backend, $setup, [
                folder_tree_and_totals,
                content_round_trip,
                empty_file_round_trip,
                nested_delete_cascades,
                delete_unknown_id_succeeds,
                missing_ids_are_not_found,
                rename_preserves_identity,
                content_replace_rederives_size,
                search_by_size_range,
                search_predicates,
                list_unknown_parent_is_empty,
                list_and_search_are_metadata_only,
                parent_must_be_existing_folder,
                moves_cannot_create_cycles,
                folders_reject_content,
                ids_are_unique_and_increasing,
                accounts,
            ]);
        )*
    };
}

conformance_all! {
    memory => setup_memory,
    disk => setup_disk,
    sqlite => setup_sqlite,
}
