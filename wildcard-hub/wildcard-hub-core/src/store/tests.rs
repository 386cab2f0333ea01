#[cfg(test)]
mod tests {
    use crate::bootstrap::JsonFileBootstrap;
    use crate::config::StoreConfig;
    use crate::document::{self, ENTRIES, ID, INSTRUCTION, PINNED, TREE};
    use crate::events::ChangeEvent;
    use crate::observe::Operation;
    use crate::storage::{KeyValueBackend, MemoryBackend};
    use crate::store::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn store() -> WildcardStore {
        WildcardStore::in_memory(StoreConfig::default())
    }

    fn entries(store: &WildcardStore, path: &str) -> Value {
        store
            .get_by_path(&format!("{}/{}", path, ENTRIES))
            .cloned()
            .unwrap_or(Value::Null)
    }

    #[test]
    fn test_push_keeps_entries_sorted() {
        let mut store = store();
        store.create_category("colors");
        for word in ["red", "Blue", "amber", "red"] {
            store.add_wildcard("colors", word);
        }
        assert_eq!(entries(&store, "colors"), json!(["Blue", "amber", "red"]));
    }

    #[test]
    fn test_element_edit_resorts_list() {
        let mut store = store();
        store.create_category("colors");
        store.add_wildcard("colors", "a");
        store.add_wildcard("colors", "m");
        {
            let root = store.root();
            let mut list = root
                .descend_path(&"wildcards/colors/wildcards".into())
                .unwrap();
            assert!(list.set("0", json!("z")));
        }
        assert_eq!(entries(&store, "colors"), json!(["m", "z"]));
    }

    #[test]
    fn test_written_category_gets_id_and_sorted_entries() {
        let mut store = store();
        {
            let mut tree = store.tree_view().unwrap();
            assert!(tree.set(
                "animals",
                json!({ INSTRUCTION: "", "cats": { ENTRIES: ["tabby", "siamese"] } })
            ));
        }
        assert!(store.node_id_by_path("animals").is_some());
        let cats_id = store.node_id_by_path("animals/cats").unwrap();
        assert_eq!(store.path_by_node_id(&cats_id).as_deref(), Some("animals/cats"));
        assert_eq!(entries(&store, "animals/cats"), json!(["siamese", "tabby"]));
    }

    #[test]
    fn test_structural_version_tracks_topology_only() {
        let mut store = store();
        let v0 = store.structural_version();
        assert!(store.create_category("A"));
        let v1 = store.structural_version();
        assert!(v1 > v0);

        assert!(store.set_instruction("A", "only nouns"));
        assert!(store.add_wildcard("A", "x"));
        assert_eq!(store.remove_wildcards("A", &["x"]), 1);
        assert_eq!(store.structural_version(), v1);

        assert!(store.delete_category("A"));
        assert!(store.structural_version() > v1);
    }

    #[test]
    fn test_mutation_events_carry_path_and_operation() {
        let mut store = store();
        store.create_category("A");
        let mut rx = store.subscribe_changes();
        store.set_instruction("A", "hi");
        store.delete_category("A");

        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::Mutation {
                path: "wildcards/A/instruction".into(),
                value: Some(json!("hi")),
                operation: Operation::Set,
            }
        );
        match rx.try_recv().unwrap() {
            ChangeEvent::Mutation { path, value, operation } => {
                assert_eq!(path.to_string(), "wildcards/A");
                assert_eq!(value, None);
                assert_eq!(operation, Operation::Delete);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let backend = MemoryBackend::new();
        let mut store = WildcardStore::open(
            StoreConfig::default(),
            backend.clone(),
            &crate::bootstrap::EmptyBootstrap,
        );
        store.create_category("A");
        store.add_wildcard("A", "x");

        let saved: Value =
            serde_json::from_str(&backend.get("wildcards.document").unwrap().unwrap()).unwrap();
        assert_eq!(&saved, store.document());
        let version = backend.get("wildcards.structure_version").unwrap().unwrap();
        assert_eq!(version, store.structural_version().to_string());
    }

    #[test]
    fn test_document_quota_failure_keeps_memory_copy() {
        let backend = MemoryBackend::new();
        let mut store =
            WildcardStore::open(StoreConfig::default(), backend.clone(), &crate::bootstrap::EmptyBootstrap);
        backend.set_quota(Some(backend.used_bytes()));
        assert!(store.create_category("big"));
        assert!(store.get_by_path("big").is_some());
    }

    #[test]
    fn test_frozen_container_rejects_writes() {
        let mut store = store();
        store.create_category("A");
        let before = store.document().clone();
        assert!(store.freeze("wildcards/A"));
        assert!(store.is_frozen("wildcards/A"));

        assert!(!store.set_instruction("A", "nope"));
        assert!(!store.create_category("A/B"));
        assert_eq!(store.document(), &before);

        // Shallow: the entry list inside is its own container.
        assert!(store.add_wildcard("A", "still fine"));

        assert!(store.thaw("wildcards/A"));
        assert!(store.set_instruction("A", "now ok"));
        assert!(!store.freeze("wildcards/A/instruction"));
    }

    #[test]
    fn test_batch_is_one_undo_step() {
        let mut store = store();
        let start = store.history_len();
        store.batch(|store| {
            store.create_category("A");
            store.add_wildcard("A", "x");
            store.add_wildcard("A", "y");
        });
        assert_eq!(store.history_len(), start + 1);
        assert!(store.undo());
        assert!(store.get_by_path("A").is_none());
    }

    #[test]
    fn test_create_nested_and_collisions() {
        let mut store = store();
        assert!(store.create_category("animals/cats"));
        assert!(store.get_by_path("animals").unwrap().is_object());
        assert!(!store.create_category("animals/cats"));
        assert!(!store.create_category(""));
        assert!(!store.create_category("animals/instruction"));
        assert_ne!(
            store.node_id_by_path("animals"),
            store.node_id_by_path("animals/cats")
        );
    }

    #[test]
    fn test_rename_preserves_id_and_pins() {
        let mut store = store();
        store.create_category("animals/cats");
        store.create_category("animals/dogs");
        store.pin("animals/cats");
        let id = store.node_id_by_path("animals").unwrap();

        assert!(!store.rename_category("animals/cats", "dogs"));
        assert!(!store.rename_category("animals/cats", "a/b"));
        assert!(!store.rename_category("animals/cats", ID));
        assert!(store.rename_category("animals", "fauna"));

        assert_eq!(store.node_id_by_path("fauna").as_deref(), Some(id.as_str()));
        assert_eq!(store.path_by_node_id(&id).as_deref(), Some("fauna"));
        assert_eq!(store.pinned_paths(), vec!["fauna/cats"]);
        assert!(store.get_by_path("animals").is_none());
    }

    #[test]
    fn test_move_category() {
        let mut store = store();
        store.create_category("a/b");
        store.create_category("c");
        let id = store.node_id_by_path("a/b").unwrap();

        assert!(!store.move_category("a", "a/b"));
        assert!(!store.move_category("a/b", "missing"));
        assert!(store.move_category("a/b", "c"));
        assert_eq!(store.path_by_node_id(&id).as_deref(), Some("c/b"));
        assert!(store.move_category("c/b", ""));
        assert_eq!(store.path_by_node_id(&id).as_deref(), Some("b"));
    }

    #[test]
    fn test_delete_drops_nested_pins() {
        let mut store = store();
        store.create_category("a/b");
        store.create_category("keep");
        assert!(store.pin("a/b"));
        assert!(store.pin("keep"));
        assert!(!store.pin("keep"));
        assert!(!store.pin("missing"));

        assert!(store.delete_category("a"));
        assert_eq!(store.pinned_paths(), vec!["keep"]);
        assert!(!store.delete_category("a"));

        assert!(store.unpin("keep"));
        assert!(!store.unpin("keep"));
        assert_eq!(store.document()[PINNED], json!([]));
    }

    #[test]
    fn test_add_wildcard_creates_list_on_container() {
        let mut store = store();
        {
            let mut tree = store.tree_view().unwrap();
            tree.set("bare", json!({ INSTRUCTION: "" }));
        }
        assert!(store.add_wildcard("bare", "  word  "));
        assert!(!store.add_wildcard("bare", "word"));
        assert!(!store.add_wildcard("bare", "   "));
        assert_eq!(entries(&store, "bare"), json!(["word"]));
    }

    #[test]
    fn test_listing_and_search() {
        let mut store = store();
        store.create_category("Animals/Cats");
        store.create_category("Animals/Dogs");
        store.create_category("colors");

        assert_eq!(
            store.entry_paths(),
            vec!["Animals", "Animals/Cats", "Animals/Dogs", "colors"]
        );
        assert_eq!(store.search_paths("cat"), vec!["Animals/Cats"]);
        assert_eq!(store.sibling_names("Animals/Cats"), vec!["Cats", "Dogs"]);
        assert_eq!(store.sibling_names("colors"), vec!["Animals", "colors"]);
        assert_eq!(store.sibling_names(""), vec!["Animals", "colors"]);
    }

    #[test]
    fn test_parent_lookup_is_tree_relative() {
        let mut store = store();
        store.create_category("a/b");
        assert_eq!(store.get_parent_by_path("a"), Some(store.tree()));
        assert_eq!(store.get_parent_by_path("a/b"), store.get_by_path("a"));
    }

    #[test]
    fn test_open_reloads_persisted_state() {
        let backend = MemoryBackend::new();
        let id = {
            let mut store = WildcardStore::open(
                StoreConfig::default(),
                backend.clone(),
                &crate::bootstrap::EmptyBootstrap,
            );
            store.create_category("A");
            store.add_wildcard("A", "x");
            store.node_id_by_path("A").unwrap()
        };

        let mut store = WildcardStore::open(
            StoreConfig::default(),
            backend,
            &JsonFileBootstrap::new("/nonexistent/seed.json"),
        );
        assert_eq!(store.node_id_by_path("A").as_deref(), Some(id.as_str()));
        assert_eq!(entries(&store, "A"), json!(["x"]));
        assert!(store.structural_version() > 0);
        assert!(store.undo());
        assert_eq!(entries(&store, "A"), json!([]));
    }

    #[test]
    fn test_blank_persisted_document_bootstraps() {
        let backend = MemoryBackend::new();
        backend.put("wildcards.document", "{}").unwrap();
        let store = WildcardStore::with_document(StoreConfig::default(), json!({ "seed": ["x"] }));
        assert_eq!(store.entry_paths(), vec!["seed"]);

        let store = WildcardStore::open(StoreConfig::default(), backend, &crate::bootstrap::EmptyBootstrap);
        assert_eq!(store.document(), &document::empty_document());
    }

    proptest! {
        #[test]
        fn test_entry_lists_stay_sorted(words in prop::collection::vec("[a-zA-Z]{1,5}", 1..20)) {
            let mut store = WildcardStore::in_memory(StoreConfig::default());
            store.create_category("A");
            for word in &words {
                store.add_wildcard("A", word);
            }
            let list = store.get_by_path("A/wildcards").and_then(Value::as_array).cloned().unwrap();
            prop_assert!(document::entries_sorted(&list));
        }
    }

    #[test]
    fn test_root_fields_untouched_by_tree_edits() {
        let mut store = store();
        store.root().set(document::SYSTEM_PROMPT, json!("prompt"));
        let version = store.structural_version();
        assert_eq!(store.document()[TREE], json!({}));
        assert_eq!(store.structural_version(), version);
    }

    #[test]
    fn test_move_out_of_frozen_parent_changes_nothing() {
        let mut store = store();
        store.create_category("a/b");
        store.create_category("c");
        let id = store.node_id_by_path("a/b").unwrap();
        let before = store.document().clone();
        let history = store.history_len();

        assert!(store.freeze("wildcards/a"));
        assert!(!store.move_category("a/b", "c"));
        assert!(!store.rename_category("a/b", "d"));
        assert!(store.get_by_path("c/b").is_none());
        assert_eq!(store.path_by_node_id(&id).as_deref(), Some("a/b"));
        assert_eq!(store.document(), &before);
        assert_eq!(store.history_len(), history);

        assert!(store.freeze("wildcards/c"));
        assert!(!store.move_category("c", "a"));
        assert!(store.thaw("wildcards/a"));
        assert!(!store.move_category("a/b", "c"));
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_loose_seed_document_becomes_categories() {
        let store = WildcardStore::with_document(
            StoreConfig::default(),
            json!({ "colors": ["red", "Blue"], "shapes": { "round": "circle" } }),
        );
        assert_eq!(store.entry_paths(), vec!["colors", "shapes/round"]);
        assert_eq!(entries(&store, "shapes/round"), json!(["circle"]));
        assert_eq!(entries(&store, "colors"), json!(["Blue", "red"]));
        assert!(store.document().get("colors").is_none());
        assert!(store.node_id_by_path("shapes/round").is_some());
    }

    #[test]
    fn test_unpin_skips_non_string_pins() {
        let mut store = store();
        store.create_category("a");
        store.create_category("b");
        assert!(store.root().set(PINNED, json!([7, "a", "b"])));

        assert!(store.unpin("b"));
        assert_eq!(store.document()[PINNED], json!([7, "a"]));
        assert!(store.unpin("a"));
        assert_eq!(store.document()[PINNED], json!([7]));
        assert!(!store.unpin("a"));
    }
}
