use proptest::prelude::*;
use schemapath_ingest::{ParseOptions, ParserConfig, SchemaParser, SchemaTreeNode, SourceDocument, SourceFormat};
use schemapath_storage::MemoryStore;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const NAMES: &[&str] = &["id", "title", "creator", "name", "note", "record"];

fn json_schema_node() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(json!({ "type": "string" })),
        Just(json!({ "type": "integer" })),
        Just(json!({ "type": "string", "enum": ["a", "b"] })),
        Just(json!({ "type": "string", "pattern": "^[0-9]+$" })),
    ];

    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec((prop::sample::select(NAMES), inner.clone()), 0..5).prop_map(
                |children| {
                    let mut properties = Map::new();
                    for (name, child) in children {
                        properties.insert(name.to_string(), child);
                    }
                    json!({ "type": "object", "properties": properties })
                }
            ),
            inner.prop_map(|items| json!({ "type": "array", "items": items })),
        ]
    })
}

fn document() -> impl Strategy<Value = SourceDocument> {
    prop::collection::vec((prop::sample::select(NAMES), json_schema_node()), 1..5).prop_map(
        |children| {
            let mut properties = Map::new();
            for (name, child) in children {
                properties.insert(name.to_string(), child);
            }
            let root = json!({ "type": "object", "properties": properties });
            SourceDocument::Tree(SchemaTreeNode::from_json(&root))
        },
    )
}

fn parser(include_record_tag: bool) -> SchemaParser {
    let config = ParserConfig {
        include_record_tag,
        ..ParserConfig::default()
    };
    SchemaParser::new(SourceFormat::JsonSchema, config)
}

fn options(record_tag: Option<&str>) -> ParseOptions {
    let options = ParseOptions::new().with_schema_uuid("Schema-prop");
    match record_tag {
        Some(tag) => options.with_record_tag(tag),
        None => options,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn derivation_is_deterministic(doc in document(), tag in prop::option::of(prop::sample::select(NAMES))) {
        let parser = parser(false);
        let first = parser.derive_paths(&doc, &options(tag));
        let second = parser.derive_paths(&doc, &options(tag));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn derived_paths_are_unique_and_non_empty(
        doc in document(),
        tag in prop::option::of(prop::sample::select(NAMES)),
        include_record_tag in any::<bool>(),
    ) {
        let Some(paths) = parser(include_record_tag).derive_paths(&doc, &options(tag)) else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for path in &paths {
            prop_assert!(!path.is_empty());
            prop_assert!(seen.insert(path.key().to_string()));
            prop_assert_eq!(path.uris().count(), path.len());
        }
    }

    #[test]
    fn excluded_prefixes_never_survive(doc in document(), pick in any::<prop::sample::Index>()) {
        let parser = parser(false);
        let Some(all) = parser.derive_paths(&doc, &options(None)) else {
            return Ok(());
        };
        let keys: Vec<String> = all.keys().map(str::to_string).collect();
        prop_assume!(!keys.is_empty());
        let excluded = keys[pick.index(keys.len())].clone();

        let filtered = parser
            .derive_paths(&doc, &options(None).with_excluded_prefix(excluded.clone()))
            .unwrap();
        prop_assert!(filtered.keys().all(|k| !k.starts_with(&excluded)));
        prop_assert!(filtered.keys().all(|k| all.contains_key(k)));
        let kept = keys.iter().filter(|k| !k.starts_with(&excluded)).count();
        prop_assert_eq!(filtered.len(), kept);
    }

    #[test]
    fn assembled_schema_holds_every_derived_path(doc in document()) {
        let parser = parser(false);
        let derived = parser.derive_paths(&doc, &options(None)).unwrap();

        let mut store = MemoryStore::new();
        let schema = parser.parse_document(&doc, &options(None), &mut store).unwrap().unwrap();

        let attached: Vec<String> = schema.attribute_path_keys();
        let expected: Vec<String> = derived.keys().map(str::to_string).collect();
        prop_assert_eq!(attached, expected);
        for sapi in &schema.attribute_paths {
            let path = derived.get(&sapi.attribute_path.to_attribute_path()).unwrap();
            prop_assert_eq!(sapi.multivalue, path.multivalue());
            prop_assert_eq!(sapi.required, None);
        }
    }

    #[test]
    fn record_tag_paths_come_from_the_whole_document(doc in document(), tag in prop::sample::select(NAMES)) {
        let parser = parser(true);
        let Some(narrowed) = parser.derive_paths(&doc, &options(Some(tag))) else {
            return Ok(());
        };
        // With the record tag kept, every record path starts at a tagged node.
        let tag_uri = format!("http://data.slub-dresden.de/schemas/Schema-prop/{tag}");
        prop_assert!(narrowed
            .iter()
            .all(|p| p.uris().next() == Some(tag_uri.as_str())));
    }
}
