use statemesh_types::{EntityId, EntityState, TypeTag};

fn tag(s: &str) -> TypeTag {
    TypeTag::new(s).unwrap()
}

#[test]
fn new_state_is_empty_and_untombstoned() {
    let state = EntityState::new(EntityId::new());
    assert!(state.attached.is_empty());
    assert_eq!(state.aggregate_version, 0);
    assert!(!state.tombstoned);
    assert!(!state.is_live());
}

#[test]
fn attach_bumps_version_once_per_tag() {
    let mut state = EntityState::new(EntityId::new());
    assert!(state.attach(tag("position")));
    assert_eq!(state.aggregate_version, 1);

    // Re-attaching the same tag is a no-op
    assert!(!state.attach(tag("position")));
    assert_eq!(state.aggregate_version, 1);

    assert!(state.attach(tag("velocity")));
    assert_eq!(state.aggregate_version, 2);
    assert!(state.is_live());
}

#[test]
fn detach_last_component_tombstones() {
    let mut state = EntityState::new(EntityId::new());
    state.attach(tag("position"));
    state.attach(tag("velocity"));

    assert!(state.detach(&tag("position")));
    assert!(!state.tombstoned);
    assert!(state.is_live());

    assert!(state.detach(&tag("velocity")));
    assert!(state.tombstoned);
    assert!(!state.is_live());
    assert_eq!(state.aggregate_version, 4);
}

#[test]
fn detach_unattached_is_noop() {
    let mut state = EntityState::new(EntityId::new());
    state.attach(tag("position"));
    assert!(!state.detach(&tag("velocity")));
    assert_eq!(state.aggregate_version, 1);
    assert!(!state.tombstoned);
}

#[test]
fn attach_revives_tombstoned_entity() {
    let mut state = EntityState::new(EntityId::new());
    state.attach(tag("position"));
    state.detach(&tag("position"));
    assert!(state.tombstoned);

    assert!(state.attach(tag("velocity")));
    assert!(!state.tombstoned);
    assert!(state.is_live());
}

#[test]
fn has_all_checks_conjunction() {
    let mut state = EntityState::new(EntityId::new());
    state.attach(tag("position"));
    state.attach(tag("velocity"));

    let pos = tag("position");
    let vel = tag("velocity");
    let health = tag("health");

    assert!(state.has_all([&pos, &vel]));
    assert!(!state.has_all([&pos, &health]));
    assert!(state.has_all(std::iter::empty::<&TypeTag>()));
}
