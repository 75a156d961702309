//! Registry lifecycle: rooms are created on first reference, shared
//! while alive, and pruned (with their pack extraction) once the game
//! loop exits.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sigame_auth::Authenticator;
use sigame_pack::{uid_hex, PackStore, PackUid};
use sigame_room::RoomRegistry;

const DESCRIPTOR: &str = r#"{
    "name": "Capitals",
    "author": "quizmaster",
    "date": "2024-03-01",
    "rounds": [
        { "id": 1, "name": "Round one", "themes": [
            { "id": 1, "name": "Europe", "quests": [
                { "id": 1, "price": 100, "scenes": [], "answers": [] }
            ]}
        ]}
    ]
}"#;

fn archive_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("pack.json", options).unwrap();
    writer.write_all(DESCRIPTOR.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn scratch(tag: &str) -> (PackStore, PackUid, PathBuf) {
    let root = std::env::temp_dir()
        .join(format!("sigame-registry-{}-{tag}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let store =
        PackStore::new(root.join("packs"), root.join("packs_temporary")).unwrap();
    let uid = store.save_archive(&archive_bytes()).unwrap();
    (store, uid, root)
}

#[tokio::test(start_paused = true)]
async fn test_open_is_idempotent_per_uid() {
    let (store, uid, root) = scratch("idempotent");
    let registry = RoomRegistry::new(store, Arc::new(Authenticator::new(b"s")));

    registry.open(&uid).await.unwrap();
    registry.open(&uid).await.unwrap();

    assert_eq!(registry.room_count().await, 1);
    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test(start_paused = true)]
async fn test_open_unknown_pack_fails() {
    let (store, _uid, root) = scratch("unknown");
    let registry = RoomRegistry::new(store, Arc::new(Authenticator::new(b"s")));

    assert!(registry.open(&[9; 32]).await.is_err());
    assert_eq!(registry.room_count().await, 0);
    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test(start_paused = true)]
async fn test_idle_room_is_pruned_and_extraction_removed() {
    let (store, uid, root) = scratch("prune");
    let registry = RoomRegistry::new(store, Arc::new(Authenticator::new(b"s")));

    registry.open(&uid).await.unwrap();
    let extracted = root.join("packs_temporary").join(uid_hex(&uid));
    assert!(extracted.is_dir(), "open must extract the pack");

    // Nobody starts a game: the room idles out (paused clock jumps the
    // 20-minute timer once everything is quiescent), the lease drops,
    // and the registry prunes the entry.
    let mut pruned = false;
    for _ in 0..100 {
        if registry.room_count().await == 0 {
            pruned = true;
            break;
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
    }

    assert!(pruned, "idle room was never pruned");
    assert!(
        !extracted.exists(),
        "last lease must remove the extracted pack"
    );
    let _ = std::fs::remove_dir_all(root);
}
