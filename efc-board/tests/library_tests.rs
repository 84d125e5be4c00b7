//! Integration tests for the phrase library and composer

use efc_board::composer::{Composer, ComposerSettings};
use efc_board::images::ImageMaterializer;
use efc_board::library::{LibraryDeps, LibraryStatus, PhraseLibrary};
use efc_board::remote::{MemoryRemote, RemoteSync};
use efc_board::search;
use efc_board::speech::LogSpeech;
use efc_board::storage::{MemoryStore, PHRASES_KEY};
use efc_common::defaults::DefaultPhrases;
use efc_common::events::{EventBus, LibraryEvent, LoadSource};
use efc_common::{Phrase, PhraseKind, Pictogram};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn picto(word: &str) -> Pictogram {
    Pictogram::new(word, format!("https://img.example/{}.png", word))
}

fn entry(id: &str, text: &str, kind: PhraseKind, usage: u64) -> Phrase {
    let mut phrase = Phrase::new(id, text, vec![picto(text)], kind);
    phrase.usage_count = usage;
    phrase
}

fn seed() -> Vec<Phrase> {
    vec![
        entry("quiero", "Quiero", PhraseKind::Word, 0),
        entry("agua", "agua", PhraseKind::Word, 0),
        entry("hola", "Hola", PhraseKind::Phrase, 0),
    ]
}

fn deps(storage: Arc<MemoryStore>, remote: Option<Arc<dyn RemoteSync>>) -> LibraryDeps {
    LibraryDeps {
        storage,
        materializer: Arc::new(ImageMaterializer::offline()),
        defaults: DefaultPhrases::Inline(seed()),
        events: EventBus::new(256),
        remote,
        remote_timeout: Duration::from_millis(500),
    }
}

async fn ready_library() -> (PhraseLibrary, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let library = PhraseLibrary::new(deps(storage.clone(), None));
    library.initialize().await;
    (library, storage)
}

fn composer_for(library: &PhraseLibrary) -> Composer {
    Composer::new(
        library.clone(),
        Arc::new(LogSpeech::new()),
        ComposerSettings::default(),
    )
}

#[tokio::test]
async fn test_added_ids_are_unique() {
    let (library, _) = ready_library().await;

    let mut ids = HashSet::new();
    for n in 0..100 {
        let phrase = library
            .add(&format!("frase {}", n), vec![], PhraseKind::Phrase)
            .await
            .unwrap();
        assert!(ids.insert(phrase.id));
    }

    let all: HashSet<String> = library.snapshot().await.into_iter().map(|p| p.id).collect();
    assert_eq!(all.len(), 103);
}

#[tokio::test]
async fn test_added_phrase_is_returned_with_default_usage() {
    let (library, _) = ready_library().await;

    let phrase = library
        .add("Tengo hambre", vec![picto("hambre")], PhraseKind::Phrase)
        .await
        .unwrap();
    assert_eq!(phrase.usage_count, 0);
    assert_eq!(library.get(&phrase.id).await, Some(phrase));
}

#[tokio::test]
async fn test_composition_append_and_replace() {
    let (library, _) = ready_library().await;
    let composer = composer_for(&library);

    let utterance = composer.select("quiero").await.unwrap().unwrap();
    assert_eq!(utterance.text, "Quiero");

    let utterance = composer.select("agua").await.unwrap().unwrap();
    assert_eq!(utterance.text, "Quiero agua");
    assert_eq!(utterance.pictograms, vec![picto("Quiero"), picto("agua")]);

    let utterance = composer.select("hola").await.unwrap().unwrap();
    assert_eq!(utterance.text, "Hola");
    assert_eq!(utterance.pictograms, vec![picto("Hola")]);
}

#[tokio::test]
async fn test_usage_increments_exactly_once_per_selection() {
    let (library, _) = ready_library().await;
    let composer = composer_for(&library);

    for expected in 1..=3u64 {
        composer.select("hola").await.unwrap();
        assert_eq!(library.get("hola").await.unwrap().usage_count, expected);
    }

    let top = search::most_used(&library.snapshot().await, 12);
    assert_eq!(top[0].id, "hola");
}

#[tokio::test]
async fn test_pictogram_removal_keeps_text() {
    let (library, _) = ready_library().await;
    let composer = composer_for(&library);

    composer.select("quiero").await.unwrap();
    composer.select("agua").await.unwrap();
    composer.select("agua").await.unwrap();
    assert_eq!(composer.current().pictograms.len(), 3);

    let utterance = composer.remove_pictogram(1).unwrap();
    assert_eq!(utterance.pictograms.len(), 2);
    assert_eq!(utterance.text, "Quiero agua agua");
    assert!(composer.remove_pictogram(7).is_none());
}

#[tokio::test]
async fn test_submit_uses_exact_match_or_quick_adds() {
    let (library, _) = ready_library().await;
    let composer = composer_for(&library);

    let utterance = composer.submit("HOLA").await.unwrap().unwrap();
    assert_eq!(utterance.text, "Hola");
    assert_eq!(library.snapshot().await.len(), 3);
    assert_eq!(library.get("hola").await.unwrap().usage_count, 1);

    let utterance = composer.submit("Me duele la cabeza").await.unwrap().unwrap();
    assert_eq!(utterance.text, "Me duele la cabeza");
    assert!(utterance.pictograms.is_empty());

    let created = search::find_exact(&library.snapshot().await, "me duele la cabeza")
        .cloned()
        .unwrap();
    assert_eq!(created.kind, PhraseKind::Phrase);
    assert_eq!(created.usage_count, 1);

    assert_eq!(composer.submit("   ").await.unwrap(), None);
}

#[tokio::test]
async fn test_quick_added_word_chains() {
    let (library, _) = ready_library().await;
    let composer = composer_for(&library);

    composer.select("quiero").await.unwrap();
    let utterance = composer.quick_add("pan", PhraseKind::Word).await.unwrap();
    assert_eq!(utterance.text, "Quiero pan");
}

#[tokio::test]
async fn test_failed_writes_still_visible_in_memory() {
    let (library, storage) = ready_library().await;
    library.flush().await;
    storage.set_fail_writes(true);

    let phrase = library
        .add("Café con leche", vec![], PhraseKind::Phrase)
        .await
        .unwrap();
    library.increment_usage(&phrase.id).await.unwrap();
    library.flush().await;

    let phrases = library.snapshot().await;
    assert_eq!(search::search(&phrases, "cafe")[0].id, phrase.id);
    assert_eq!(search::most_used(&phrases, 12)[0].id, phrase.id);

    let raw = storage.raw(PHRASES_KEY).unwrap();
    assert!(!raw.contains("Café con leche"));
}

#[tokio::test]
async fn test_persisted_state_survives_restart() {
    let (library, storage) = ready_library().await;
    library.add("Adiós", vec![], PhraseKind::Phrase).await.unwrap();
    library.increment_usage("hola").await.unwrap();
    library.flush().await;

    let restarted = PhraseLibrary::new(deps(storage, None));
    assert_eq!(restarted.initialize().await, LoadSource::Local);
    let phrases = restarted.snapshot().await;
    assert_eq!(phrases.len(), 4);
    assert_eq!(restarted.get("hola").await.unwrap().usage_count, 1);
}

#[tokio::test]
async fn test_remote_snapshot_wins_and_local_only_records_survive() {
    let storage = Arc::new(MemoryStore::new());
    let local = vec![
        entry("a", "local a", PhraseKind::Phrase, 1),
        entry("b", "offline b", PhraseKind::Phrase, 0),
    ];
    storage.insert_raw(PHRASES_KEY, &serde_json::to_string(&local).unwrap());

    let remote = Arc::new(MemoryRemote::new());
    remote.replace_documents(
        "alice",
        vec![
            entry("a", "remote a", PhraseKind::Phrase, 9),
            entry("c", "remote c", PhraseKind::Word, 0),
        ],
    );

    let library = PhraseLibrary::new(deps(storage, Some(remote.clone())));
    assert_eq!(
        library.switch_identity(Some("alice".to_string())).await,
        LoadSource::Remote
    );

    let texts: Vec<String> = library.snapshot().await.into_iter().map(|p| p.text).collect();
    assert_eq!(texts, vec!["remote a", "offline b", "remote c"]);

    library.flush().await;
    let remote_ids: HashSet<String> = remote.documents("alice").into_iter().map(|p| p.id).collect();
    assert!(remote_ids.contains("b"));
}

#[tokio::test]
async fn test_unreachable_remote_degrades_to_local() {
    let storage = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.set_available(false);

    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let mut library_deps = deps(storage, Some(remote.clone()));
    library_deps.events = events;
    let library = PhraseLibrary::new(library_deps);

    let source = library.switch_identity(Some("alice".to_string())).await;
    assert_eq!(source, LoadSource::Defaults);
    assert_eq!(library.status().await, LibraryStatus::Ready);
    assert!(library.is_sync_degraded());

    let phrase = library.add("Sin red", vec![], PhraseKind::Phrase).await.unwrap();
    assert!(library.get(&phrase.id).await.is_some());

    let mut saw_degraded = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, LibraryEvent::SyncDegraded { .. }) {
            saw_degraded = true;
        }
    }
    assert!(saw_degraded);
}

#[tokio::test]
async fn test_remote_pushes_are_merged_live() {
    let storage = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.replace_documents("alice", seed());

    let library = PhraseLibrary::new(deps(storage, Some(remote.clone())));
    library.switch_identity(Some("alice".to_string())).await;
    library.flush().await;

    let mut pushed = remote.documents("alice");
    pushed.push(entry("nuevo", "Desde otro dispositivo", PhraseKind::Phrase, 0));
    remote.replace_documents("alice", pushed);

    let mut found = false;
    for _ in 0..50 {
        if library.get("nuevo").await.is_some() {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(found);
}

#[tokio::test]
async fn test_switching_identity_tears_down_subscription() {
    let storage = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.replace_documents("alice", seed());

    let library = PhraseLibrary::new(deps(storage, Some(remote.clone())));
    library.switch_identity(Some("alice".to_string())).await;
    assert_eq!(library.owner_id().await.as_deref(), Some("alice"));

    library.switch_identity(None).await;
    assert_eq!(library.owner_id().await, None);
    assert_eq!(library.strategy_name().await, "local-only");

    // Dead subscribers are pruned on the next change
    remote.replace_documents("alice", vec![]);
    assert_eq!(remote.subscriber_count("alice"), 0);
}

#[tokio::test]
async fn test_synced_mutations_reach_remote() {
    let storage = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    remote.replace_documents("alice", seed());

    let library = PhraseLibrary::new(deps(storage, Some(remote.clone())));
    library.switch_identity(Some("alice".to_string())).await;

    let added = library.add("Buenas noches", vec![], PhraseKind::Phrase).await.unwrap();
    library.delete("agua").await.unwrap();
    library.increment_usage("hola").await.unwrap();
    library.flush().await;

    let documents = remote.documents("alice");
    assert!(documents.iter().any(|p| p.id == added.id));
    assert!(!documents.iter().any(|p| p.id == "agua"));
    assert_eq!(
        documents.iter().find(|p| p.id == "hola").map(|p| p.usage_count),
        Some(1)
    );
}

#[tokio::test]
async fn test_import_merges_by_id() {
    let (library, _) = ready_library().await;

    let imported = vec![
        entry("hola", "Hola hola", PhraseKind::Phrase, 4),
        entry("nuevo", "Nuevo", PhraseKind::Word, 2),
    ];
    assert_eq!(library.import(imported).await, Ok(2));

    let phrases = library.snapshot().await;
    assert_eq!(phrases.len(), 4);
    assert_eq!(library.get("hola").await.unwrap().usage_count, 4);
    assert_eq!(library.get("hola").await.unwrap().text, "Hola hola");

    let exported = library.export_json().await.unwrap();
    let round: Vec<Phrase> = serde_json::from_str(&exported).unwrap();
    assert_eq!(round, phrases);
}

#[tokio::test]
async fn test_play_auto_clears_after_delay() {
    let (library, _) = ready_library().await;
    let speech = Arc::new(LogSpeech::new());
    let settings = ComposerSettings {
        auto_clear_delay: Duration::from_millis(20),
        ..ComposerSettings::default()
    };
    let composer = Composer::new(library.clone(), speech.clone(), settings);

    composer.select("hola").await.unwrap();
    assert!(composer.play().await.unwrap());
    assert_eq!(speech.spoken(), vec![("Hola".to_string(), "es-ES".to_string())]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(composer.current().is_empty());
}

#[tokio::test]
async fn test_auto_clear_skipped_when_utterance_changed() {
    let (library, _) = ready_library().await;
    let settings = ComposerSettings {
        auto_clear_delay: Duration::from_millis(50),
        ..ComposerSettings::default()
    };
    let composer = Composer::new(library.clone(), Arc::new(LogSpeech::new()), settings);

    composer.select("quiero").await.unwrap();
    composer.play().await.unwrap();
    composer.select("agua").await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(composer.current().text, "Quiero agua");
}

#[tokio::test]
async fn test_play_with_empty_utterance_is_noop() {
    let (library, _) = ready_library().await;
    let speech = Arc::new(LogSpeech::new());
    let composer = Composer::new(library, speech.clone(), ComposerSettings::default());

    assert!(!composer.play().await.unwrap());
    assert!(speech.spoken().is_empty());
}
