use mu_core::{
    Clock, DirectoryError, ErrorKind, Item, ItemDirectory, ItemKey, ItemPatch,
    MemorySiteRepository, MergePolicy, NewItem, NewSite, SiteRepository, SitePatch,
    SqliteSiteRepository,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn stepping_clock(start: i64) -> Clock {
    let tick = Arc::new(AtomicI64::new(start));
    Arc::new(move || tick.fetch_add(1, Ordering::SeqCst))
}

fn memory_directory() -> ItemDirectory<MemorySiteRepository> {
    directory_with(MemorySiteRepository::new())
}

fn sqlite_directory() -> ItemDirectory<SqliteSiteRepository> {
    directory_with(SqliteSiteRepository::open_in_memory().unwrap())
}

fn directory_with<R: SiteRepository>(repo: R) -> ItemDirectory<R> {
    let directory =
        ItemDirectory::new(repo, MergePolicy::PresentOverwrites).with_clock(stepping_clock(1_000));
    directory.create_site(NewSite::new("mu")).unwrap();
    directory
}

fn bio() -> NewItem {
    NewItem::new("about", "Bio", "old")
}

fn bio_key() -> ItemKey {
    ItemKey::new("about", "Bio")
}

fn assert_conflict_keeps_existing<R: SiteRepository>(directory: ItemDirectory<R>) {
    directory.add_item("mu", bio()).unwrap();

    let err = directory
        .add_item("mu", NewItem::new("about", "Bio", "x"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let items = directory.list_items("mu").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "old");
}

#[test]
fn add_conflict_leaves_existing_item_unchanged_memory() {
    assert_conflict_keeps_existing(memory_directory());
}

#[test]
fn add_conflict_leaves_existing_item_unchanged_sqlite() {
    assert_conflict_keeps_existing(sqlite_directory());
}

fn assert_added_keys_are_unique<R: SiteRepository>(directory: ItemDirectory<R>) {
    let attempts = [
        NewItem::new("about", "Bio", "a"),
        NewItem::new("about", "Contact", "b"),
        NewItem::new("post", "Bio", "c"),
        NewItem::new("about", "Bio", "d"),
        NewItem::new("post", "Bio", "e"),
    ];
    let accepted = attempts
        .into_iter()
        .filter_map(|item| directory.add_item("mu", item).ok())
        .collect::<Vec<_>>();
    assert_eq!(accepted.len(), 3);

    let items = directory.list_items("mu").unwrap();
    for (index, left) in items.iter().enumerate() {
        for right in &items[index + 1..] {
            assert_ne!(left.key(), right.key());
        }
    }
}

#[test]
fn successful_adds_never_share_a_key_memory() {
    assert_added_keys_are_unique(memory_directory());
}

#[test]
fn successful_adds_never_share_a_key_sqlite() {
    assert_added_keys_are_unique(sqlite_directory());
}

#[test]
fn find_is_stable_without_mutation() {
    let directory = sqlite_directory();
    directory.add_item("mu", bio()).unwrap();

    let first = directory.find_item("mu", &bio_key()).unwrap();
    let second = directory.find_item("mu", &bio_key()).unwrap();
    assert_eq!(first, second);
}

fn assert_merge_preserves_untouched<R: SiteRepository>(directory: ItemDirectory<R>) {
    let created = directory.add_item("mu", bio()).unwrap();
    assert_eq!(created.updated_at, None);

    let updated = directory
        .update_item("mu", &bio_key(), &ItemPatch::content("new"))
        .unwrap();
    assert_eq!(updated.kind, "about");
    assert_eq!(updated.title, "Bio");
    assert_eq!(updated.content, "new");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at.unwrap() > created.created_at);

    let stored = directory.find_item("mu", &bio_key()).unwrap();
    assert_eq!(stored, updated);
}

#[test]
fn update_merges_content_and_keeps_identity_memory() {
    assert_merge_preserves_untouched(memory_directory());
}

#[test]
fn update_merges_content_and_keeps_identity_sqlite() {
    assert_merge_preserves_untouched(sqlite_directory());
}

fn duplicate(reference: &str, content: &str) -> Item {
    Item {
        reference: reference.to_string(),
        kind: "about".to_string(),
        title: "A".to_string(),
        content: content.to_string(),
        created_at: 1,
        updated_at: None,
    }
}

fn assert_delete_removes_one<R: SiteRepository>(directory: ItemDirectory<R>) {
    // Legacy rows written straight to storage, bypassing the key check.
    directory
        .repository()
        .insert_item(&duplicate("mu", "first"))
        .unwrap();
    directory
        .repository()
        .insert_item(&duplicate("mu", "second"))
        .unwrap();
    let key = ItemKey::new("about", "A");

    directory.delete_item("mu", &key).unwrap();
    let remaining = directory.list_items("mu").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "second");

    directory.delete_item("mu", &key).unwrap();
    assert!(directory.list_items("mu").unwrap().is_empty());

    let err = directory.delete_item("mu", &key).unwrap_err();
    assert!(matches!(err, DirectoryError::ItemNotFound { .. }));
}

#[test]
fn delete_removes_exactly_one_duplicate_memory() {
    assert_delete_removes_one(memory_directory());
}

#[test]
fn delete_removes_exactly_one_duplicate_sqlite() {
    assert_delete_removes_one(sqlite_directory());
}

fn assert_unknown_site_is_not_found<R: SiteRepository>(directory: ItemDirectory<R>) {
    let missing = "doesnotexist";
    let errors = [
        directory.get_site(missing).map(|_| ()).unwrap_err(),
        directory.list_items(missing).map(|_| ()).unwrap_err(),
        directory
            .find_item(missing, &bio_key())
            .map(|_| ())
            .unwrap_err(),
        directory.add_item(missing, bio()).map(|_| ()).unwrap_err(),
        directory
            .update_item(missing, &bio_key(), &ItemPatch::content("x"))
            .map(|_| ())
            .unwrap_err(),
        directory.delete_item(missing, &bio_key()).unwrap_err(),
        directory
            .update_site(missing, &SitePatch::default())
            .map(|_| ())
            .unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, DirectoryError::SiteNotFound(ref reference) if reference == missing));
    }

    let sites = directory.list_sites().unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].reference, "mu");
    assert!(directory.repository().list_items(missing).unwrap().is_empty());
}

#[test]
fn unknown_site_fails_without_state_change_memory() {
    assert_unknown_site_is_not_found(memory_directory());
}

#[test]
fn unknown_site_fails_without_state_change_sqlite() {
    assert_unknown_site_is_not_found(sqlite_directory());
}

#[test]
fn unknown_item_is_not_found() {
    let directory = memory_directory();
    directory.add_item("mu", bio()).unwrap();

    let err = directory
        .update_item("mu", &ItemKey::new("about", "Other"), &ItemPatch::content("x"))
        .unwrap_err();
    assert!(matches!(err, DirectoryError::ItemNotFound { .. }));
    assert_eq!(directory.find_item("mu", &bio_key()).unwrap().content, "old");
}

fn assert_end_to_end<R: SiteRepository>(directory: ItemDirectory<R>) {
    assert!(directory.list_items("mu").unwrap().is_empty());

    directory
        .add_item("mu", NewItem::new("about", "About Me", "bio"))
        .unwrap();
    assert_eq!(directory.list_items("mu").unwrap().len(), 1);

    let key = ItemKey::new("about", "About Me");
    let updated = directory
        .update_item("mu", &key, &ItemPatch::content("new bio"))
        .unwrap();
    assert_eq!(updated.content, "new bio");

    directory.delete_item("mu", &key).unwrap();
    assert!(directory.list_items("mu").unwrap().is_empty());
}

#[test]
fn add_update_delete_lifecycle_memory() {
    assert_end_to_end(memory_directory());
}

#[test]
fn add_update_delete_lifecycle_sqlite() {
    assert_end_to_end(sqlite_directory());
}

#[test]
fn items_keep_insertion_order() {
    let directory = sqlite_directory();
    for title in ["Zeta", "Alpha", "Mid"] {
        directory
            .add_item("mu", NewItem::new("post", title, ""))
            .unwrap();
    }

    let titles = directory
        .list_items("mu")
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, ["Zeta", "Alpha", "Mid"]);
}

#[test]
fn add_stamps_reference_and_created_at() {
    let directory = memory_directory();
    let item = directory.add_item("mu", bio()).unwrap();
    assert_eq!(item.reference, "mu");
    assert!(item.created_at >= 1_000);
}

#[test]
fn renaming_onto_existing_key_is_rejected() {
    let directory = memory_directory();
    directory.add_item("mu", bio()).unwrap();
    directory
        .add_item("mu", NewItem::new("about", "Contact", "mail"))
        .unwrap();

    let patch = ItemPatch {
        title: Some("Bio".to_string()),
        content: Some("overwritten".to_string()),
        ..ItemPatch::default()
    };
    let err = directory
        .update_item("mu", &ItemKey::new("about", "Contact"), &patch)
        .unwrap_err();
    assert!(matches!(err, DirectoryError::ItemConflict { ref key, .. } if *key == bio_key()));

    let items = directory.list_items("mu").unwrap();
    assert_eq!(items[0].content, "old");
    assert_eq!(items[1].title, "Contact");
    assert_eq!(items[1].content, "mail");
}

#[test]
fn renaming_to_free_key_moves_the_item() {
    let directory = sqlite_directory();
    directory.add_item("mu", bio()).unwrap();

    let patch = ItemPatch {
        kind: Some("profile".to_string()),
        ..ItemPatch::default()
    };
    let renamed = directory.update_item("mu", &bio_key(), &patch).unwrap();
    assert_eq!(renamed.kind, "profile");

    assert!(directory.find_item("mu", &bio_key()).is_err());
    let found = directory
        .find_item("mu", &ItemKey::new("profile", "Bio"))
        .unwrap();
    assert_eq!(found.content, "old");
}

#[test]
fn truthy_policy_keeps_fields_on_empty_patch_values() {
    let directory = ItemDirectory::new(MemorySiteRepository::new(), MergePolicy::Truthy);
    directory.create_site(NewSite::new("mu")).unwrap();
    directory.add_item("mu", bio()).unwrap();

    let patch = ItemPatch {
        title: Some(String::new()),
        content: Some(String::new()),
        ..ItemPatch::default()
    };
    let updated = directory.update_item("mu", &bio_key(), &patch).unwrap();
    assert_eq!(updated.title, "Bio");
    assert_eq!(updated.content, "old");
    assert!(updated.updated_at.is_some());
}

#[test]
fn present_policy_clears_content() {
    let directory = memory_directory();
    directory.add_item("mu", bio()).unwrap();

    let updated = directory
        .update_item("mu", &bio_key(), &ItemPatch::content(""))
        .unwrap();
    assert_eq!(updated.content, "");
}

fn assert_blank_keys_are_rejected<R: SiteRepository>(directory: ItemDirectory<R>) {
    for (kind, title) in [("", ""), ("about", ""), ("", "Bio"), ("about", "  "), ("\t", "Bio")] {
        let err = directory
            .add_item("mu", NewItem::new(kind, title, "x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert!(directory.list_items("mu").unwrap().is_empty());
}

#[test]
fn blank_key_fields_are_rejected_on_add_memory() {
    assert_blank_keys_are_rejected(memory_directory());
}

#[test]
fn blank_key_fields_are_rejected_on_add_sqlite() {
    assert_blank_keys_are_rejected(sqlite_directory());
}

fn assert_blank_patch_keeps_key<R: SiteRepository>(directory: ItemDirectory<R>) {
    directory.add_item("mu", bio()).unwrap();

    let patch = ItemPatch {
        kind: Some(" ".to_string()),
        title: Some(String::new()),
        content: Some("new".to_string()),
    };
    let updated = directory.update_item("mu", &bio_key(), &patch).unwrap();
    assert_eq!(updated.key(), bio_key());
    assert_eq!(updated.content, "new");

    let found = directory.find_item("mu", &bio_key()).unwrap();
    assert_eq!(found.content, "new");
    directory.delete_item("mu", &bio_key()).unwrap();
    assert!(directory.list_items("mu").unwrap().is_empty());
}

#[test]
fn blank_key_fields_in_update_keep_identity_memory() {
    assert_blank_patch_keeps_key(memory_directory());
}

#[test]
fn blank_key_fields_in_update_keep_identity_sqlite() {
    assert_blank_patch_keeps_key(sqlite_directory());
}

fn assert_site_update<R: SiteRepository>(directory: ItemDirectory<R>) {
    let before = directory.get_site("mu").unwrap();
    assert_eq!(before.updated_at, None);

    let patch: SitePatch = serde_json::from_str(
        r#"{"reference":"renamed","url":"https://mu.example","admin":"josh","security":true}"#,
    )
    .unwrap();
    let updated = directory.update_site("mu", &patch).unwrap();
    assert_eq!(updated.reference, "mu");
    assert_eq!(updated.url, "https://mu.example");
    assert_eq!(updated.admin, "josh");
    assert!(updated.security);
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.updated_at.unwrap() > before.created_at);

    assert_eq!(directory.get_site("mu").unwrap(), updated);
    assert!(directory.get_site("renamed").is_err());
}

#[test]
fn site_update_merges_and_ignores_reference_memory() {
    assert_site_update(memory_directory());
}

#[test]
fn site_update_merges_and_ignores_reference_sqlite() {
    assert_site_update(sqlite_directory());
}

#[test]
fn empty_site_patch_still_refreshes_updated_at() {
    let directory = memory_directory();
    let updated = directory.update_site("mu", &SitePatch::default()).unwrap();
    assert!(updated.updated_at.is_some());
}

#[test]
fn site_index_lists_urls_and_refs() {
    let directory = sqlite_directory();
    let mut second = NewSite::new("warlord");
    second.url = "https://warlord.example".to_string();
    directory.create_site(second).unwrap();

    let index = directory.site_index().unwrap();
    assert!(index.message.starts_with("This is Mu's api"));
    assert_eq!(index.refs, ["mu", "warlord"]);
    assert_eq!(index.urls, ["", "https://warlord.example"]);
}

#[test]
fn concurrent_adds_of_same_key_admit_one() {
    let directory = sqlite_directory();

    let successes = std::thread::scope(|scope| {
        let handles = (0..8)
            .map(|n| {
                let directory = &directory;
                scope.spawn(move || {
                    directory
                        .add_item("mu", NewItem::new("about", "Bio", format!("writer {n}")))
                        .is_ok()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(successes, 1);
    assert_eq!(directory.list_items("mu").unwrap().len(), 1);
}

#[test]
fn sites_mutate_independently_across_threads() {
    let directory = memory_directory();
    for reference in ["a", "b", "c"] {
        directory.create_site(NewSite::new(reference)).unwrap();
    }

    std::thread::scope(|scope| {
        for reference in ["a", "b", "c"] {
            let directory = &directory;
            scope.spawn(move || {
                for n in 0..20 {
                    directory
                        .add_item(reference, NewItem::new("post", format!("p{n}"), ""))
                        .unwrap();
                }
            });
        }
    });

    for reference in ["a", "b", "c"] {
        assert_eq!(directory.list_items(reference).unwrap().len(), 20);
    }
}
