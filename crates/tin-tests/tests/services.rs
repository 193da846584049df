//! Service clients driven directly against the simulated console.

use tin_engine::ncm::{
    RESULT_CONTENT_ALREADY_EXISTS, RESULT_CONTENT_NOT_FOUND, RESULT_PLACEHOLDER_ALREADY_EXISTS,
    RESULT_PLACEHOLDER_NOT_FOUND,
};
use tin_engine::{ApplicationManager, ContentManager, TicketService};
use tin_ipc::{IpcError, ServiceManager};
use tin_sim::SimConsole;
use tin_sim::content_id;
use tin_tests::APP_ID;
use tin_wire::{
    ContentInstallType, ContentMetaKey, ContentMetaType, ContentStorageRecord, PlaceholderId,
    StorageId,
};

fn patch_record(version: u32) -> ContentStorageRecord {
    ContentStorageRecord {
        key: ContentMetaKey {
            title_id: APP_ID | 0x800,
            version,
            meta_type: ContentMetaType::Patch,
            install_type: ContentInstallType::Full,
        },
        storage_id: StorageId::SdCard,
    }
}

#[test]
fn placeholder_lifecycle() {
    let console = SimConsole::new();
    let ncm = ContentManager::open(&console).unwrap();
    let storage = ncm.open_content_storage(StorageId::SdCard).unwrap();
    let id = content_id(7);

    let placeholder = storage.generate_placeholder_id().unwrap();
    storage.create_placeholder(id, placeholder, 6).unwrap();
    let again = storage.create_placeholder(id, placeholder, 6).unwrap_err();
    assert_eq!(again.result_code(), Some(RESULT_PLACEHOLDER_ALREADY_EXISTS));

    storage.write_placeholder(placeholder, 0, b"abc").unwrap();
    storage.write_placeholder(placeholder, 3, b"def").unwrap();
    assert!(!storage.has(id).unwrap());
    storage.register(id, placeholder).unwrap();

    assert!(storage.has(id).unwrap());
    assert_eq!(console.content(StorageId::SdCard, id), Some(b"abcdef".to_vec()));
    assert_eq!(console.placeholder_count(StorageId::SdCard), 0);
    assert_eq!(
        storage.get_path(id).unwrap(),
        format!("sim:/5/{id}.nca")
    );

    storage.delete(id).unwrap();
    assert!(storage.delete(id).unwrap_err().is(RESULT_CONTENT_NOT_FOUND));
    assert!(storage.get_path(id).unwrap_err().is(RESULT_CONTENT_NOT_FOUND));
}

#[test]
fn registering_over_existing_content_fails() {
    let console = SimConsole::new();
    let storage = ContentManager::open(&console)
        .unwrap()
        .open_content_storage(StorageId::SdCard)
        .unwrap();
    let id = content_id(9);

    for _ in 0..2 {
        let placeholder = storage.generate_placeholder_id().unwrap();
        storage.create_placeholder(id, placeholder, 1).unwrap();
        storage.write_placeholder(placeholder, 0, b"x").unwrap();
        if let Err(e) = storage.register(id, placeholder) {
            assert!(e.is(RESULT_CONTENT_ALREADY_EXISTS));
            storage.delete_placeholder(placeholder).unwrap();
        }
    }
    assert_eq!(console.placeholder_count(StorageId::SdCard), 0);
}

#[test]
fn unknown_placeholder_is_reported() {
    let console = SimConsole::new();
    let storage = ContentManager::open(&console)
        .unwrap()
        .open_content_storage(StorageId::BuiltInUser)
        .unwrap();
    let err = storage
        .delete_placeholder(PlaceholderId::from_bytes([0xAB; 16]))
        .unwrap_err();
    assert!(err.is(RESULT_PLACEHOLDER_NOT_FOUND));
}

#[test]
fn meta_records_are_visible_only_after_commit() {
    let console = SimConsole::new();
    let db = ContentManager::open(&console)
        .unwrap()
        .open_content_meta_database(StorageId::SdCard)
        .unwrap();
    let key = patch_record(0x10000).key;

    db.set(&key, b"record").unwrap();
    assert!(console.committed_meta(StorageId::SdCard, &key).is_none());
    db.commit().unwrap();
    assert_eq!(
        console.committed_meta(StorageId::SdCard, &key),
        Some(b"record".to_vec())
    );
}

#[test]
fn existing_records_are_read_page_by_page() {
    let console = SimConsole::new();
    let seeded: Vec<_> = (1..=5).map(|v| patch_record(v << 16)).collect();
    console.seed_application_record(APP_ID, &seeded);
    let ns = ApplicationManager::open(&console).unwrap();

    let raw: Vec<_> = seeded.iter().map(ContentStorageRecord::to_bytes).collect();

    for capacity in [1, 2, 5, 8] {
        assert_eq!(ns.existing_records(APP_ID, capacity).unwrap(), raw);
    }
    assert!(ns.existing_records(APP_ID + 0x2000, 4).unwrap().is_empty());
}

#[test]
fn tickets_are_imported_verbatim() {
    let console = SimConsole::new();
    let es = TicketService::open(&console).unwrap();
    es.import(b"tik", b"cert").unwrap();
    assert_eq!(
        console.state().tickets,
        vec![(b"tik".to_vec(), b"cert".to_vec())]
    );
}

#[test]
fn unknown_service_is_unavailable() {
    let console = SimConsole::new();
    let err = console.get_service("pm:shell").err().unwrap();
    assert!(matches!(err, IpcError::ServiceUnavailable { ref name, .. } if name == "pm:shell"));
}
