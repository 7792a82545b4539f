use navi_core::store::adapter::{KNOWLEDGE_GRAPH_KEY, SESSIONS_KEY};
use navi_core::tree::traverse::{contains, node_count};
use navi_core::{
    ConversationResponse, ImportSnapshot, KnowledgeService, KnowledgeStore, KnowledgeTree,
    KvBackend, MemoryKvBackend, NewNode, NodePatch, NodeType, Settings, ROOT_NODE_ID,
};
use serde_json::{json, Map, Value};

fn open(backend: MemoryKvBackend) -> KnowledgeService<MemoryKvBackend> {
    KnowledgeService::open(KnowledgeStore::new(backend))
}

fn reopen(service: KnowledgeService<MemoryKvBackend>) -> KnowledgeService<MemoryKvBackend> {
    open(service.into_store().into_backend())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn edits_persist_and_reload() {
    let mut service = open(MemoryKvBackend::new());
    let added = service.add_child(ROOT_NODE_ID, NewNode::titled("T1").content("body"));
    assert!(added.persisted);
    let id = added.node_id.unwrap();

    let patch = NodePatch {
        content: Some("edited".to_string()),
        ..NodePatch::default()
    };
    let updated = service.update_node(&id, &patch);
    assert!(updated.changed && updated.persisted);

    let service = reopen(service);
    let node = service.find_node(&id).unwrap();
    assert_eq!(node.title, "T1");
    assert_eq!(node.content, "edited");
}

#[test]
fn missing_targets_report_no_change() {
    let mut service = open(MemoryKvBackend::new());
    assert!(service
        .add_child("ghost", NewNode::titled("x"))
        .node_id
        .is_none());
    let outcome = service.delete_node("ghost");
    assert!(!outcome.changed);
    assert!(!service.delete_node(ROOT_NODE_ID).changed);
    assert_eq!(service.tree(), &KnowledgeTree::default());
}

#[test]
fn earlier_snapshots_are_unaffected_by_mutation() {
    let mut service = open(MemoryKvBackend::new());
    let id = service
        .add_child(ROOT_NODE_ID, NewNode::titled("keep"))
        .node_id
        .unwrap();
    let snapshot = service.tree().clone();

    service.delete_node(&id);
    assert!(contains(&snapshot, &id));
    assert!(!contains(service.tree(), &id));
}

#[test]
fn capacity_loss_keeps_in_memory_tree_usable() {
    let mut service = open(MemoryKvBackend::with_capacity(300));
    let added = service.add_child(ROOT_NODE_ID, NewNode::titled("big").content("b".repeat(2_000)));
    assert!(!added.persisted);
    let id = added.node_id.unwrap();
    assert!(contains(service.tree(), &id));
    assert_eq!(service.search("big").len(), 1);

    let store = service.into_store();
    assert!(store.backend().get(KNOWLEDGE_GRAPH_KEY).unwrap().is_none());
}

#[test]
fn auto_save_off_defers_writes_until_flush() {
    let mut service = open(MemoryKvBackend::new());
    assert!(
        service
            .update_settings(&object(json!({"autoSave": false})))
            .unwrap()
            .changed
    );

    let added = service.add_child(ROOT_NODE_ID, NewNode::titled("later"));
    assert!(!added.persisted);
    assert!(service
        .store()
        .backend()
        .get(KNOWLEDGE_GRAPH_KEY)
        .unwrap()
        .is_none());

    assert!(service.flush());
    let service = reopen(service);
    assert!(!service.settings().auto_save);
    assert_eq!(node_count(service.tree()), 2);
}

#[test]
fn recorded_turns_append_under_root() {
    let mut service = open(MemoryKvBackend::new());
    let learning = service.record_learning(
        "What is borrowing?",
        &ConversationResponse::new("Borrowing lends access without moving ownership."),
    );
    let questioning = service.record_questioning(
        "Is the borrow checker too strict?",
        &ConversationResponse::new("Consider the aliasing guarantees it buys."),
    );
    assert!(service
        .record_learning("   ", &ConversationResponse::new("ignored"))
        .node_id
        .is_none());

    let root = service.tree().root();
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].id, learning.node_id.unwrap());
    assert_eq!(root.children[0].kind, NodeType::Learning);
    assert_eq!(root.children[1].id, questioning.node_id.unwrap());
    assert_eq!(root.children[1].title, "质疑: Is the borrow checker too...");
    assert!(root.children.iter().all(|node| node.timestamp.is_some()));
}

#[test]
fn sessions_merge_and_stale_ones_are_evicted() {
    let mut backend = MemoryKvBackend::new();
    backend
        .set(
            SESSIONS_KEY,
            &json!({"old": {"updatedAt": "2020-01-01T00:00:00.000Z"}}).to_string(),
        )
        .unwrap();
    let mut service = open(backend);

    service.save_session("fresh", object(json!({"messages": ["hi"]})));
    service.save_session("fresh", object(json!({"mode": "learning"})));
    let fresh = service.session("fresh").unwrap();
    assert_eq!(fresh.get("messages"), Some(&json!(["hi"])));
    assert_eq!(fresh.get("mode"), Some(&json!("learning")));
    assert!(fresh.get("updatedAt").is_some());

    assert_eq!(service.evict_stale_sessions(), 1);
    let service = reopen(service);
    assert_eq!(
        service.sessions().keys().collect::<Vec<_>>(),
        vec!["fresh"]
    );
}

#[test]
fn mistyped_settings_patch_is_rejected() {
    let mut service = open(MemoryKvBackend::new());
    assert!(service
        .update_settings(&object(json!({"autoSave": "yes"})))
        .is_err());
    assert!(service.settings().auto_save);

    let outcome = service
        .update_settings(&object(json!({"theme": "light", "fontSize": 14})))
        .unwrap();
    assert!(outcome.changed && outcome.persisted);
    let service = reopen(service);
    assert_eq!(service.settings().theme, "light");
    assert_eq!(service.settings().extra.get("fontSize"), Some(&json!(14)));
}

#[test]
fn import_adopts_values_and_clear_resets() {
    let mut source = open(MemoryKvBackend::new());
    source.add_child(ROOT_NODE_ID, NewNode::titled("shared"));
    let exported = source.export_all();

    let mut target = open(MemoryKvBackend::new());
    assert!(target.import(ImportSnapshot::from(exported)));
    assert_eq!(target.search("shared").len(), 1);

    assert!(target.clear_all());
    assert_eq!(target.tree(), &KnowledgeTree::default());
    assert!(target.sessions().is_empty());
    assert_eq!(target.settings(), &Settings::default());
    assert_eq!(target.estimate_usage().used_bytes, 0);
}

#[test]
fn huge_stale_threshold_is_rejected_and_eviction_stays_safe() {
    let mut service = open(MemoryKvBackend::new());
    assert!(service
        .update_settings(&object(json!({"staleSessionDays": 100_000_000})))
        .is_err());
    assert_eq!(service.settings().stale_session_days, 30);

    let snapshot: ImportSnapshot =
        serde_json::from_value(json!({"settings": {"staleSessionDays": 100_000_000}})).unwrap();
    assert!(service.import(snapshot));
    service.save_session("s1", object(json!({"mode": "learning"})));
    assert_eq!(service.evict_stale_sessions(), 0);
    assert_eq!(service.sessions().len(), 1);
}

#[test]
fn quota_eviction_during_tree_save_prunes_held_sessions() {
    let mut backend = MemoryKvBackend::with_capacity(2_000);
    backend
        .set(
            SESSIONS_KEY,
            &json!({"old": {"updatedAt": "2020-01-01T00:00:00.000Z", "notes": "s".repeat(1_200)}})
                .to_string(),
        )
        .unwrap();
    let mut service = open(backend);
    assert_eq!(service.sessions().len(), 1);

    let added = service.add_child(ROOT_NODE_ID, NewNode::titled("t").content("t".repeat(600)));
    assert!(added.persisted);
    assert!(service.sessions().is_empty());
    assert!(service.export_all().sessions.is_empty());

    assert!(service.save_session("fresh", object(json!({"mode": "learning"}))).persisted);
    let service = reopen(service);
    assert_eq!(
        service.sessions().keys().collect::<Vec<_>>(),
        vec!["fresh"]
    );
}
