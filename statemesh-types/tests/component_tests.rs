use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;
use statemesh_types::{Component, ComponentRecord, EntityId, TypeTag};

fn tag(s: &str) -> TypeTag {
    TypeTag::new(s).unwrap()
}

fn make_record(entity_id: EntityId) -> ComponentRecord {
    ComponentRecord::new(entity_id, tag("position"), json!({"x": 1.0, "y": 2.0}))
}

// ── Construction & versioning ────────────────────────────────────

#[test]
fn new_record_starts_at_version_zero() {
    let record = make_record(EntityId::new());
    assert_eq!(record.version, 0);
}

#[test]
fn next_increments_version() {
    let record = make_record(EntityId::new());
    let next = record.next(json!({"x": 3.0, "y": 4.0}));
    assert_eq!(next.version, 1);
    assert_eq!(next.entity_id, record.entity_id);
    assert_eq!(next.type_tag, record.type_tag);
    assert_eq!(next.next(json!(null)).version, 2);
}

#[test]
fn next_takes_fresh_data() {
    let record = make_record(EntityId::new());
    let next = record.next(json!({"x": 9.0}));
    assert_eq!(next.data, json!({"x": 9.0}));
}

#[test]
fn supersedes_is_strict() {
    let record = make_record(EntityId::new());
    let v1 = record.next(json!(1));
    assert!(v1.supersedes(0));
    assert!(!v1.supersedes(1));
    assert!(!v1.supersedes(2));
    assert!(!record.supersedes(0));
}

#[test]
fn record_routing_key_is_entity_key() {
    let id = EntityId::new();
    let record = make_record(id);
    assert_eq!(record.routing_key(), id.routing_key());
}

// ── Wire format ──────────────────────────────────────────────────

#[test]
fn record_wire_fields() {
    let record = make_record(EntityId::new());
    let value = serde_json::to_value(&record).unwrap();
    let obj = value.as_object().unwrap();
    for field in ["entity_id", "type_tag", "data", "version", "timestamp"] {
        assert!(obj.contains_key(field), "missing wire field {field}");
    }
}

#[test]
fn record_json_roundtrip() {
    let record = make_record(EntityId::new());
    let json = serde_json::to_string(&record).unwrap();
    let back: ComponentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

// ── Typed view ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f64,
    y: f64,
}

#[test]
fn typed_component_encode_decode() {
    let component = Component::new(
        EntityId::new(),
        tag("position"),
        Position { x: 1.0, y: 2.0 },
    );
    let record = component.encode().unwrap();
    assert_eq!(record.version, 0);

    let decoded: Component<Position> = Component::decode(record).unwrap();
    assert_eq!(decoded.data, component.data);
    assert_eq!(decoded.entity_id, component.entity_id);
}

#[test]
fn typed_component_next_increments() {
    let component = Component::new(
        EntityId::new(),
        tag("position"),
        Position { x: 0.0, y: 0.0 },
    );
    let next = component.next(Position { x: 5.0, y: 5.0 });
    assert_eq!(next.version, 1);
}

#[test]
fn decode_rejects_mismatched_payload() {
    let record = ComponentRecord::new(EntityId::new(), tag("position"), json!("not a struct"));
    let decoded: Result<Component<Position>, _> = Component::decode(record);
    assert!(decoded.is_err());
}
