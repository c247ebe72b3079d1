use engine::noop::NoopEngine;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{Store, VIDEO_TAGS_FILE, VOCABULARY_FILE};
use tempfile::tempdir;
use vidshelf_core::config::AppConfig;
use vidshelf_core::library::{DispatchError, Intent, Library, Outcome};
use vidshelf_core::player::PlayerError;
use vidshelf_core::tags::TagError;

fn movies(root: &Path) -> PathBuf {
    let dir = root.join("movies");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.mp4"), b"").unwrap();
    fs::write(dir.join("b.mkv"), b"").unwrap();
    fs::write(dir.join("notes.txt"), b"").unwrap();
    fs::canonicalize(dir).unwrap()
}

fn load<'s>(store: &'s Store) -> Library<'s> {
    Library::load(store, &AppConfig::default(), Box::new(NoopEngine)).unwrap()
}

fn set(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

#[test]
fn tagging_is_written_through() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let a = dir.join("a.mp4");

    let mut lib = load(&store);
    lib.dispatch(Intent::AddTag {
        video: a.clone(),
        tag: "Comedy".into(),
    })
    .unwrap();

    let raw = fs::read_to_string(store.file(VIDEO_TAGS_FILE)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let key = a.to_string_lossy().into_owned();
    assert_eq!(value, serde_json::json!({ key: {"tags": ["Comedy"]} }));
    let vocab = fs::read_to_string(store.file(VOCABULARY_FILE)).unwrap();
    assert!(vocab.contains("Comedy"));
}

#[test]
fn rename_and_delete_cascade_to_every_video() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let videos = vec![dir.join("a.mp4"), dir.join("b.mkv")];

    let mut lib = load(&store);
    lib.dispatch(Intent::BatchAddTags {
        videos: videos.clone(),
        tags: vec!["Comedy".into()],
    })
    .unwrap();

    let renamed = lib
        .dispatch(Intent::RenameGlobalTag {
            old: "Comedy".into(),
            new: "Funny".into(),
        })
        .unwrap();
    assert_eq!(renamed, Outcome::Retagged(2));
    assert_eq!(lib.tags().vocabulary(), &set(&["Funny"]));
    for v in &videos {
        assert_eq!(lib.tags().tags_for(v), vec!["Funny"]);
    }

    let err = lib
        .dispatch(Intent::DeleteGlobalTag {
            tag: "Funny".into(),
            confirmed: false,
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::Unconfirmed(_)));
    assert!(lib.tags().vocabulary().contains("Funny"));

    lib.dispatch(Intent::DeleteGlobalTag {
        tag: "Funny".into(),
        confirmed: true,
    })
    .unwrap();
    assert!(lib.tags().vocabulary().is_empty());
    assert!(lib.tags().tags_in_selection(&videos).is_empty());

    drop(lib);
    let reloaded = load(&store);
    assert!(reloaded.tags().vocabulary().is_empty());
    assert!(reloaded.tags().tags_for(&videos[0]).is_empty());
}

#[test]
fn duplicate_global_tag_surfaces_as_error() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);
    lib.dispatch(Intent::AddGlobalTag("x".into())).unwrap();
    let err = lib.dispatch(Intent::AddGlobalTag("x".into())).unwrap_err();
    assert!(matches!(err, DispatchError::Tag(TagError::Duplicate(_))));
}

#[test]
fn folder_view_filter_and_navigation() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);

    assert_eq!(
        lib.dispatch(Intent::AddFolder(dir.clone())).unwrap(),
        Outcome::FolderAdded(dir.clone())
    );
    lib.dispatch(Intent::OpenFolder(dir.clone())).unwrap();
    assert_eq!(
        lib.browser().videos(),
        &[dir.join("a.mp4"), dir.join("b.mkv")]
    );

    lib.dispatch(Intent::AddTag {
        video: dir.join("b.mkv"),
        tag: "Drama".into(),
    })
    .unwrap();
    lib.dispatch(Intent::ToggleFilterTag {
        tag: "Drama".into(),
        on: true,
    })
    .unwrap();
    assert_eq!(lib.browser().videos(), &[dir.join("b.mkv")]);

    // The filtered view follows tag removals.
    lib.dispatch(Intent::RemoveTag {
        video: dir.join("b.mkv"),
        tag: "Drama".into(),
    })
    .unwrap();
    assert!(lib.browser().videos().is_empty());

    lib.dispatch(Intent::GoBack).unwrap();
    assert!(lib.browser().is_folder_view());
    assert!(lib.browser().filter().is_empty());
}

#[test]
fn opening_unregistered_folder_fails() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);
    assert!(matches!(
        lib.dispatch(Intent::OpenFolder(dir)),
        Err(DispatchError::Folder(_))
    ));
}

#[test]
fn player_intents_need_a_video() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);
    assert!(matches!(
        lib.dispatch(Intent::TogglePlayPause),
        Err(DispatchError::Player(PlayerError::NothingLoaded))
    ));
    assert!(matches!(
        lib.dispatch(Intent::NextVideo),
        Err(DispatchError::Player(PlayerError::NothingLoaded))
    ));
    assert_eq!(lib.dispatch(Intent::VolumeDown).unwrap(), Outcome::Volume(90));
}

#[test]
fn next_video_walks_the_open_folder() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);
    lib.dispatch(Intent::AddFolder(dir.clone())).unwrap();
    lib.dispatch(Intent::OpenFolder(dir.clone())).unwrap();

    lib.dispatch(Intent::OpenVideo(dir.join("a.mp4"))).unwrap();
    assert_eq!(
        lib.dispatch(Intent::NextVideo).unwrap(),
        Outcome::Opened(dir.join("b.mkv"))
    );
    assert!(matches!(
        lib.dispatch(Intent::NextVideo),
        Err(DispatchError::NoAdjacentVideo)
    ));
    assert_eq!(
        lib.dispatch(Intent::PreviousVideo).unwrap(),
        Outcome::Opened(dir.join("a.mp4"))
    );
}

#[test]
fn recorded_state_is_restored_after_restart() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path().join("save"));
    let video = Path::new("/movies/a.mp4");
    {
        let mut lib = load(&store);
        lib.record_state(video, 45000, 80, 1.5, false);
        assert!(lib.shutdown());
    }
    let lib = load(&store);
    let state = lib.playback().get_state(video);
    assert_eq!(
        (state.time_ms, state.volume, state.speed, state.playing),
        (45000, 80, 1.5, false)
    );
}

#[test]
fn malformed_record_is_dropped_on_load() {
    let temp = tempdir().unwrap();
    let store = Store::new(temp.path().join("save"));
    fs::write(
        store.file(VIDEO_TAGS_FILE),
        r#"{"/v/good.mp4": {"tags": ["ok"]}, "/v/bad.mp4": {"tags": "oops"}}"#,
    )
    .unwrap();
    let lib = load(&store);
    assert_eq!(lib.tags().tags_for(Path::new("/v/good.mp4")), vec!["ok"]);
    assert!(lib.tags().tags_for(Path::new("/v/bad.mp4")).is_empty());
    assert!(lib.tags().vocabulary().contains("ok"));
}

#[test]
fn dotted_video_paths_reach_the_filtered_view() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    fs::create_dir_all(dir.join("sub")).unwrap();
    let store = Store::new(temp.path().join("save"));
    let mut lib = load(&store);
    lib.dispatch(Intent::AddFolder(dir.clone())).unwrap();
    lib.dispatch(Intent::OpenFolder(dir.clone())).unwrap();

    let dotted = dir.join(".").join("sub").join("..").join("a.mp4");
    lib.dispatch(Intent::AddTag {
        video: dotted.clone(),
        tag: "Travel".into(),
    })
    .unwrap();
    lib.dispatch(Intent::ToggleFilterTag {
        tag: "Travel".into(),
        on: true,
    })
    .unwrap();

    let keys: Vec<&String> = lib.tags().records().keys().collect();
    assert_eq!(keys, vec![&dir.join("a.mp4").to_string_lossy().into_owned()]);
    assert_eq!(lib.browser().videos(), &[dir.join("a.mp4")]);

    lib.dispatch(Intent::BatchRemoveTags {
        videos: vec![dotted],
        tags: vec!["Travel".into()],
    })
    .unwrap();
    assert!(lib.browser().videos().is_empty());
}

#[test]
fn rename_survives_reload() {
    let temp = tempdir().unwrap();
    let dir = movies(temp.path());
    let store = Store::new(temp.path().join("save"));
    let a = dir.join("a.mp4");
    let b = dir.join("b.mkv");
    {
        let mut lib = load(&store);
        lib.dispatch(Intent::BatchAddTags {
            videos: vec![a.clone(), b.clone()],
            tags: vec!["Comedy".into()],
        })
        .unwrap();
        lib.dispatch(Intent::AddTag {
            video: b.clone(),
            tag: "Drama".into(),
        })
        .unwrap();
        lib.dispatch(Intent::RenameGlobalTag {
            old: "Comedy".into(),
            new: "Funny".into(),
        })
        .unwrap();
    }

    assert_eq!(store.load_vocabulary(), set(&["Drama", "Funny"]));
    let records = store.load_video_records();
    assert_eq!(records[&a.to_string_lossy().into_owned()].tags, set(&["Funny"]));
    assert_eq!(
        records[&b.to_string_lossy().into_owned()].tags,
        set(&["Drama", "Funny"])
    );

    let reloaded = load(&store);
    assert_eq!(reloaded.tags().vocabulary(), &set(&["Drama", "Funny"]));
    assert!(!reloaded.tags().vocabulary().contains("Comedy"));
    assert_eq!(reloaded.tags().tags_for(&a), vec!["Funny"]);
    assert_eq!(reloaded.tags().tags_for(&b), vec!["Drama", "Funny"]);
    assert!(reloaded.tags().is_durable());
}
