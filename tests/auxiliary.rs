// Auxiliary registry integration tests.
//
// Each test installs a small set of kinds, drives the map-wide operations
// the way an entity lifecycle would (create, copy, save, load, destroy) and
// checks what survives. Failures in one kind must never leak into another.
use mudkit::{
    AuxError, AuxiliaryData, AuxiliaryKind, AuxiliaryRegistry, EntityKinds, ForeignArg,
    ForeignError, ForeignObject, ForeignOp, ForeignProtocol, ForeignValue, NativeAuxiliary,
    StorageSet,
};
use std::cell::RefCell;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Score {
    v: i32,
}

fn score_kind() -> AuxiliaryKind {
    AuxiliaryKind::native(
        NativeAuxiliary::cloneable(Score::default)
            .with_store(|s| {
                let mut set = StorageSet::new();
                set.store_int("v", s.v);
                set
            })
            .with_read(|set| Score { v: set.read_int("v") }),
    )
}

// Foreign class whose instances hold a list of strings; `copy` raises
// whenever the instance holds "cursed".
struct Notes;

type NoteList = RefCell<Vec<String>>;

fn notes(obj: &ForeignObject) -> Vec<String> {
    obj.downcast_ref::<NoteList>().map(|n| n.borrow().clone()).unwrap_or_default()
}

impl ForeignProtocol for Notes {
    fn invoke(
        &self,
        op: ForeignOp,
        receiver: Option<&ForeignObject>,
        arg: ForeignArg<'_>,
    ) -> Result<ForeignValue, ForeignError> {
        match (op, receiver, arg) {
            (ForeignOp::New, None, _) => {
                Ok(ForeignValue::Instance(ForeignObject::new(NoteList::default())))
            }
            (ForeignOp::Read, None, ForeignArg::Document(doc)) => {
                let lines: Vec<String> = doc.read_string("notes").lines().map(str::to_owned).collect();
                Ok(ForeignValue::Instance(ForeignObject::new(RefCell::new(lines))))
            }
            (ForeignOp::Copy, Some(me), _) => {
                let held = notes(me);
                if held.iter().any(|n| n == "cursed") {
                    return Err(ForeignError::Raised {
                        op,
                        message: "ValueError: cursed notes cannot be copied".into(),
                    });
                }
                Ok(ForeignValue::Instance(ForeignObject::new(RefCell::new(held))))
            }
            (ForeignOp::Store, Some(me), _) => {
                let held = notes(me);
                if held.is_empty() {
                    return Ok(ForeignValue::None);
                }
                let mut set = StorageSet::new();
                set.store_string("notes", &(held.join("\n") + "\n"));
                Ok(ForeignValue::Document(set))
            }
            (op, ..) => Err(ForeignError::Raised {
                op,
                message: "AttributeError".into(),
            }),
        }
    }
}

fn registry() -> AuxiliaryRegistry {
    let mut reg = AuxiliaryRegistry::new();
    reg.register("score", EntityKinds::CHARACTER | EntityKinds::OBJECT, score_kind())
        .expect("register score");
    reg.register("notes", EntityKinds::CHARACTER, AuxiliaryKind::foreign(Notes))
        .expect("register notes");
    reg
}

fn push_note(reg: &AuxiliaryRegistry, data: &mut AuxiliaryData, note: &str) {
    push_note_to(reg, data, "notes", note);
}

fn push_note_to(reg: &AuxiliaryRegistry, data: &mut AuxiliaryData, name: &str, note: &str) {
    let obj = reg.fetch::<ForeignObject>(data, name).expect("notes blob");
    obj.downcast_ref::<NoteList>().expect("note list").borrow_mut().push(note.to_owned());
}

// Test: a native value stored on one entity reads back on a fresh one.
// Verifies: the stored document nests the blob under its name.
#[test]
fn native_value_survives_store_and_read() {
    init_tracing();
    let reg = registry();
    let mut data = reg.instantiate(EntityKinds::CHARACTER);
    reg.fetch::<Score>(&mut data, "score").expect("score").v = 42;

    let doc = reg.store(&data);
    assert_eq!(doc.get_set("score").map(|s| s.read_int("v")), Some(42));
    assert_eq!(mudkit::encode(&doc), "score:-\n  v: 42\n  -\n-\n");

    let mut back = reg.read(&mudkit::decode(&mudkit::encode(&doc)), EntityKinds::CHARACTER);
    assert_eq!(reg.fetch::<Score>(&mut back, "score"), Some(&mut Score { v: 42 }));
    // nothing stored for notes, so it came from `new`
    assert!(back.contains("notes"));
}

// Test: a foreign copy that raises is logged and skipped; every other kind
// is still copied.
#[test]
fn failing_foreign_copy_is_contained() {
    init_tracing();
    let reg = registry();
    let mut data = reg.instantiate(EntityKinds::CHARACTER);
    reg.fetch::<Score>(&mut data, "score").expect("score").v = 7;
    push_note(&reg, &mut data, "cursed");

    let copy = reg.copy(&data);
    assert_eq!(copy.get::<Score>("score"), Some(&Score { v: 7 }));
    assert!(!copy.contains("notes"));
    assert!(data.contains("notes"), "source is untouched");
}

// Test: copy_into keeps going after a failing foreign copy.
// Verifies: "memo" is alone in the first bucket, so every native kind is
// copied after it fails, and the destination's old blobs are replaced.
#[test]
fn copy_into_continues_past_failing_foreign_copy() {
    init_tracing();
    let natives = ["karma", "gold", "hp", "mana"];
    let mut reg = AuxiliaryRegistry::new();
    reg.register("memo", EntityKinds::CHARACTER, AuxiliaryKind::foreign(Notes))
        .expect("register memo");
    for name in natives {
        let kind = AuxiliaryKind::native(NativeAuxiliary::cloneable(i32::default));
        reg.register(name, EntityKinds::CHARACTER, kind).expect("register native");
    }

    let mut from = reg.instantiate(EntityKinds::CHARACTER);
    for (n, name) in (1..).zip(natives) {
        *reg.fetch::<i32>(&mut from, name).expect("native blob") = n;
    }
    push_note_to(&reg, &mut from, "memo", "cursed");

    let mut to = reg.instantiate(EntityKinds::CHARACTER);
    *reg.fetch::<i32>(&mut to, "gold").expect("gold") = 99;

    reg.copy_into(&from, &mut to);
    assert!(!to.contains("memo"));
    for (n, name) in (1..).zip(natives) {
        assert_eq!(to.get::<i32>(name), Some(&n), "{name} copied");
    }
    assert_eq!(to.len(), natives.len());
}

// Test: foreign instances round-trip through a document, and copies are
// independent of their source.
#[test]
fn foreign_value_round_trip_and_copy() {
    init_tracing();
    let reg = registry();
    let mut data = reg.instantiate(EntityKinds::CHARACTER);
    push_note(&reg, &mut data, "met the mayor");
    push_note(&reg, &mut data, "owes 5 gold");

    let doc = reg.store(&data);
    let back = reg.read(&doc, EntityKinds::CHARACTER);
    let obj = back.get::<ForeignObject>("notes").expect("notes");
    assert_eq!(notes(obj), vec!["met the mayor", "owes 5 gold"]);

    let mut copy = reg.copy(&data);
    push_note(&reg, &mut copy, "copy only");
    let original = data.get::<ForeignObject>("notes").expect("notes");
    assert_eq!(notes(original).len(), 2);
}

// Test: a foreign store answering nothing leaves an empty nested set, which
// the writer omits.
#[test]
fn empty_foreign_store_writes_nothing() {
    let reg = registry();
    let mut data = reg.instantiate(EntityKinds::CHARACTER);
    reg.fetch::<Score>(&mut data, "score").expect("score").v = 1;
    let doc = reg.store(&data);
    assert_eq!(doc.get_set("notes").map(StorageSet::len), Some(0));
    assert_eq!(mudkit::encode(&doc), "score:-\n  v: 1\n  -\n-\n");
}

// Test: kinds attach only to the entity kinds they target.
#[test]
fn targets_filter_instantiation() {
    let reg = registry();
    let obj = reg.instantiate(EntityKinds::OBJECT);
    assert_eq!(obj.names(), vec!["score"]);
    let room = reg.instantiate(EntityKinds::ROOM);
    assert!(room.is_empty());
}

// Test: copy_into replaces the destination's blobs wholesale.
#[test]
fn copy_into_replaces_destination() {
    let reg = registry();
    let mut from = reg.instantiate(EntityKinds::OBJECT);
    reg.fetch::<Score>(&mut from, "score").expect("score").v = 3;
    let mut to = reg.instantiate(EntityKinds::CHARACTER);
    push_note(&reg, &mut to, "stale");

    reg.copy_into(&from, &mut to);
    assert_eq!(to.names(), vec!["score"]);
    assert_eq!(to.targets(), EntityKinds::OBJECT);
    assert_eq!(to.get::<Score>("score"), Some(&Score { v: 3 }));
}

// Test: registry errors are reported, not panicked.
#[test]
fn registry_errors() {
    let mut reg = registry();
    assert!(matches!(
        reg.register("score", EntityKinds::ROOM, score_kind()),
        Err(AuxError::DuplicateName(name)) if name == "score"
    ));
    assert!(matches!(reg.unregister("nope"), Err(AuxError::UnknownName(_))));

    let from = reg.instantiate(EntityKinds::CHARACTER);
    let mut to = reg.instantiate(EntityKinds::CHARACTER);
    assert!(matches!(
        reg.copy_entry_into("nope", &from, &mut to),
        Err(AuxError::UnknownName(_))
    ));

    reg.seal();
    assert!(matches!(
        reg.register("late", EntityKinds::ROOM, score_kind()),
        Err(AuxError::Sealed)
    ));
}

// Test: installation lists parse into entity kinds, ignoring unknown names.
#[test]
fn entity_kinds_from_names() {
    assert_eq!(
        EntityKinds::from_names("character, room object"),
        EntityKinds::CHARACTER | EntityKinds::ROOM | EntityKinds::OBJECT
    );
    assert_eq!(EntityKinds::from_names("widget"), EntityKinds::empty());
}
