/*!
 * Navigation against an in-memory store
 *
 * Walks a bucket the way a user would: bucket list, folders, the parent
 * link, and the large-folder policy with incremental "load more" pages.
 */

use s3nav::core::navigator::{drive, LargeFolderChoice, NavigationConfig, Navigator, Step};
use s3nav::core::{Entry, EntryKind, Location};
use s3nav::protocol::s3::{MemoryStore, S3Error, StoreOp};
use tokio_util::sync::CancellationToken;

fn small_config() -> NavigationConfig {
    NavigationConfig {
        large_folder_threshold: 10,
        folders_only_page_size: 5,
        first_items_page_size: 10,
        page_size: 4,
    }
}

async fn run(nav: &mut Navigator, store: &MemoryStore, step: Step) -> Step {
    match step {
        Step::Run(request) => drive(nav, store, request, &CancellationToken::new()).await,
        other => other,
    }
}

fn index_of(nav: &Navigator, name: &str) -> usize {
    nav.entries()
        .iter()
        .position(|e| e.display_name() == name)
        .unwrap_or_else(|| panic!("{} not listed", name))
}

async fn select_named(nav: &mut Navigator, store: &MemoryStore, name: &str) -> Step {
    let step = nav.select(index_of(nav, name)).unwrap();
    run(nav, store, step).await
}

#[tokio::test]
async fn test_walk_down_and_back_up() {
    let store = MemoryStore::new();
    store.add_object("assets", "README", b"");
    store.add_object("assets", "img/a.png", b"");
    store.add_object("assets", "img/b/c.png", b"");
    store.add_object("logs", "2024/01.log", b"");

    let mut nav = Navigator::new(small_config());
    let connect = nav.connect().unwrap();
    assert_eq!(run(&mut nav, &store, Step::Run(connect)).await, Step::Done);
    assert_eq!(
        nav.entries(),
        &[Entry::bucket("assets"), Entry::bucket("logs")]
    );

    select_named(&mut nav, &store, "assets").await;
    assert_eq!(nav.location(), &Location::bucket("assets"));
    assert_eq!(
        nav.entries(),
        &[
            Entry::parent_link(),
            Entry::folder("img/", "img/"),
            Entry::file("README", "README"),
        ]
    );

    select_named(&mut nav, &store, "img/").await;
    assert_eq!(nav.location(), &Location::new("assets", "img/"));
    assert_eq!(
        nav.entries(),
        &[
            Entry::parent_link(),
            Entry::folder("b/", "img/b/"),
            Entry::file("a.png", "img/a.png"),
        ]
    );

    // Up twice lands on the bucket list
    select_named(&mut nav, &store, "..").await;
    assert_eq!(nav.location(), &Location::bucket("assets"));
    select_named(&mut nav, &store, "..").await;
    assert!(nav.location().is_root());
    assert_eq!(nav.entries().len(), 2);
}

#[tokio::test]
async fn test_empty_segments_are_browsable() {
    let store = MemoryStore::new();
    store.add_object("b", "/abs.txt", b"");
    store.add_object("b", "a//b.txt", b"");

    let mut nav = Navigator::new(small_config());
    let request = nav.open(Location::bucket("b")).unwrap();
    run(&mut nav, &store, Step::Run(request)).await;
    assert_eq!(
        nav.entries(),
        &[
            Entry::parent_link(),
            Entry::folder("/", "/"),
            Entry::folder("a/", "a/"),
        ]
    );

    select_named(&mut nav, &store, "/").await;
    assert_eq!(nav.location().prefix(), "/");
    assert_eq!(
        nav.entries(),
        &[Entry::parent_link(), Entry::file("abs.txt", "/abs.txt")]
    );

    select_named(&mut nav, &store, "..").await;
    assert_eq!(nav.location(), &Location::bucket("b"));

    select_named(&mut nav, &store, "a/").await;
    assert_eq!(
        nav.entries(),
        &[Entry::parent_link(), Entry::folder("/", "a//")]
    );

    select_named(&mut nav, &store, "/").await;
    assert_eq!(nav.location().prefix(), "a//");
    assert_eq!(
        nav.entries(),
        &[Entry::parent_link(), Entry::file("b.txt", "a//b.txt")]
    );

    match select_named(&mut nav, &store, "b.txt").await {
        Step::File(info) => assert_eq!(info.key, "a//b.txt"),
        other => panic!("expected file info, got {:?}", other),
    }

    select_named(&mut nav, &store, "..").await;
    assert_eq!(nav.location().prefix(), "a/");
}

#[tokio::test]
async fn test_file_selection_reports_full_key() {
    let store = MemoryStore::new();
    store.add_object("assets", "img/a.png", b"");

    let mut nav = Navigator::new(small_config());
    let request = nav.open(Location::new("assets", "img")).unwrap();
    run(&mut nav, &store, Step::Run(request)).await;

    match select_named(&mut nav, &store, "a.png").await {
        Step::File(info) => {
            assert_eq!(info.bucket, "assets");
            assert_eq!(info.key, "img/a.png");
        }
        other => panic!("expected file info, got {:?}", other),
    }
    // Picking a file does not move
    assert_eq!(nav.location(), &Location::new("assets", "img/"));
}

#[tokio::test]
async fn test_first_items_then_load_more_until_exhausted() {
    let store = MemoryStore::new();
    store.add_object("big", "dir/x", b"");
    for i in 0..25 {
        store.add_object("big", format!("f{:02}", i), b"");
    }

    let mut nav = Navigator::new(small_config());
    let connect = nav.connect().unwrap();
    run(&mut nav, &store, Step::Run(connect)).await;

    let prompt = match select_named(&mut nav, &store, "big").await {
        Step::Prompt(prompt) => prompt,
        other => panic!("expected prompt, got {:?}", other),
    };
    assert_eq!(prompt.estimate, 26);
    assert!(nav.location().is_root());

    let request = nav.choose(LargeFolderChoice::FirstItems).unwrap();
    run(&mut nav, &store, Step::Run(request)).await;
    assert_eq!(nav.location(), &Location::bucket("big"));
    assert_eq!(nav.entries().len(), 12);
    assert_eq!(
        nav.entries().last(),
        Some(&Entry::LoadMore {
            remaining_estimate: 16
        })
    );

    while nav
        .entries()
        .last()
        .is_some_and(|e| e.kind() == EntryKind::LoadMore)
    {
        let step = nav.select(nav.entries().len() - 1).unwrap();
        assert_eq!(run(&mut nav, &store, step).await, Step::Done);
    }

    let real: Vec<&Entry> = nav.entries().iter().filter(|e| !e.is_synthetic()).collect();
    assert_eq!(real.len(), 26);
    assert_eq!(real[0], &Entry::folder("dir/", "dir/"));
    let mut names: Vec<String> = real.iter().map(|e| e.display_name()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 26);
}

#[tokio::test]
async fn test_folders_only_shows_no_files() {
    let store = MemoryStore::new();
    for i in 0..3 {
        store.add_object("big", format!("a{}/x", i), b"");
    }
    for i in 0..20 {
        store.add_object("big", format!("file{:02}", i), b"");
    }

    let mut nav = Navigator::new(small_config());
    let request = nav.open(Location::bucket("big")).unwrap();
    assert!(matches!(
        run(&mut nav, &store, Step::Run(request)).await,
        Step::Prompt(_)
    ));

    let request = nav.choose(LargeFolderChoice::FoldersOnly).unwrap();
    run(&mut nav, &store, Step::Run(request)).await;
    assert_eq!(
        nav.entries(),
        &[
            Entry::parent_link(),
            Entry::folder("a0/", "a0/"),
            Entry::folder("a1/", "a1/"),
            Entry::folder("a2/", "a2/"),
        ]
    );
}

#[tokio::test]
async fn test_threshold_boundary_with_default_config() {
    let store = MemoryStore::new();
    for i in 0..1000 {
        store.add_object("exact", format!("k{:04}", i), b"");
        store.add_object("over", format!("k{:04}", i), b"");
    }
    store.add_object("over", "k1000", b"");

    let mut nav = Navigator::new(NavigationConfig::default());
    let request = nav.open(Location::bucket("exact")).unwrap();
    assert_eq!(run(&mut nav, &store, Step::Run(request)).await, Step::Done);
    assert_eq!(nav.entries().len(), 1001);

    let request = nav.open(Location::bucket("over")).unwrap();
    match run(&mut nav, &store, Step::Run(request)).await {
        Step::Prompt(prompt) => assert_eq!(prompt.estimate, 1000),
        other => panic!("expected prompt, got {:?}", other),
    }
}

#[tokio::test]
async fn test_threshold_above_estimate_page_is_capped() {
    let store = MemoryStore::new();
    for i in 0..1000 {
        store.add_object("exact", format!("k{:04}", i), b"");
        store.add_object("over", format!("k{:04}", i), b"");
    }
    store.add_object("over", "k1000", b"");

    let config = NavigationConfig {
        large_folder_threshold: 5000,
        ..Default::default()
    };
    let mut nav = Navigator::new(config);

    let request = nav.open(Location::bucket("exact")).unwrap();
    assert_eq!(run(&mut nav, &store, Step::Run(request)).await, Step::Done);
    assert_eq!(nav.entries().len(), 1001);

    // 1001 keys cannot be told apart from 5000 with a single estimate page
    let request = nav.open(Location::bucket("over")).unwrap();
    match run(&mut nav, &store, Step::Run(request)).await {
        Step::Prompt(prompt) => assert_eq!(prompt.estimate, 1000),
        other => panic!("expected prompt, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_listing_walks_every_page() {
    let store = MemoryStore::new();
    for i in 0..9 {
        store.add_object("b", format!("k{}", i), b"");
    }

    let mut nav = Navigator::new(small_config());
    let request = nav.open(Location::bucket("b")).unwrap();
    run(&mut nav, &store, Step::Run(request)).await;

    assert_eq!(nav.entries().len(), 10);
    // One estimate, then pages of 4, 4 and 1
    let listings = store.recorded_listings();
    assert_eq!(listings.len(), 4);
    assert!(listings[1].continuation_token.is_none());
    assert!(listings[2..].iter().all(|l| l.continuation_token.is_some()));
}

#[tokio::test]
async fn test_lost_connection_then_reconnect() {
    let store = MemoryStore::new();
    store.add_object("b", "k", b"");

    let mut nav = Navigator::new(small_config());
    let connect = nav.connect().unwrap();
    run(&mut nav, &store, Step::Run(connect)).await;

    store.fail_next(
        StoreOp::ListObjects,
        S3Error::Connection("connection reset".to_string()),
    );
    let step = select_named(&mut nav, &store, "b").await;
    assert!(matches!(step, Step::Failed(S3Error::Connection(_))));
    assert!(!nav.is_connected());
    assert!(nav.location().is_root());
    assert!(nav.select(0).is_err());

    let connect = nav.connect().unwrap();
    run(&mut nav, &store, Step::Run(connect)).await;
    assert!(nav.is_connected());
    select_named(&mut nav, &store, "b").await;
    assert_eq!(nav.entries(), &[Entry::parent_link(), Entry::file("k", "k")]);
}
