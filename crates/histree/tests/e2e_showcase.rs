#![forbid(unsafe_code)]

//! End-to-end walkthroughs of the host protocol.
//!
//! Each scenario builds a small "manager" the way an application would:
//! do-functions push a record and hold a [`PushScope`]; undo-functions hold
//! a [`PopScope`] and run the reverse operations; mementos carry whatever
//! the reverse operations need. The scenarios cover the trivial round trip,
//! by-value parameter capture, memento-backed removal, branching undo
//! semantics, a nested three-record merge, and the abort protocol.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use histree::{gate, Context, PopScope, PushScope, Record};

static WORLD: Mutex<()> = Mutex::new(());

/// Serializes scenarios around the process-wide gate and active context.
fn world() -> MutexGuard<'static, ()> {
    let guard = WORLD.lock().unwrap_or_else(PoisonError::into_inner);
    gate::enable();
    gate::set_context(None);
    guard
}

fn install_root() -> Arc<Context> {
    let root = Context::new();
    gate::set_context(Some(Arc::clone(&root)));
    root
}

/// The record whose body is currently executing: after a scope's descent
/// the active context is that record's sub-context, so the record itself is
/// the parent's present.
fn current_record() -> Arc<Record> {
    let ctx = gate::context().expect("active context");
    let owner = ctx.parent().expect("inside an operation scope");
    owner.present().expect("gate enabled")
}

// ============================================================================
// Scenario 1: trivial add/undo/redo
// ============================================================================

mod list_ops {
    use super::*;

    pub type List = Arc<Mutex<Vec<i32>>>;

    pub fn add_new_object(objects: &List) -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "AddNewObject",
            {
                let objects = Arc::clone(objects);
                move || add_new_object(&objects)
            },
            {
                let objects = Arc::clone(objects);
                move || add_new_object_undo(&objects)
            },
        );
        let _scope = PushScope::new();
        objects.lock().unwrap().push(0);
        true
    }

    pub fn add_new_object_undo(objects: &List) -> bool {
        let _scope = PopScope::new();
        objects.lock().unwrap().pop();
        true
    }
}

#[test]
fn trivial_add_undo_redo() {
    let _world = world();
    let root = install_root();
    let objects: list_ops::List = Arc::new(Mutex::new(Vec::new()));

    assert!(list_ops::add_new_object(&objects));
    assert_eq!(*objects.lock().unwrap(), vec![0]);
    assert_eq!(root.present_index(), 1);

    assert!(root.undo());
    assert!(objects.lock().unwrap().is_empty());
    assert_eq!(root.present_index(), 0);

    assert!(root.redo());
    assert_eq!(*objects.lock().unwrap(), vec![0]);
    assert_eq!(root.present_index(), 1);
}

// ============================================================================
// Scenarios 2 & 3: parameter capture and memento-backed removal
// ============================================================================

mod registry {
    use super::*;

    pub type Map = Arc<Mutex<BTreeMap<String, i32>>>;

    pub fn add_object(objects: &Map, key: &str, value: i32) -> bool {
        if objects.lock().unwrap().contains_key(key) {
            return false;
        }
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "AddObject",
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || add_object(&objects, &key, value)
            },
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || add_object_undo(&objects, &key, value)
            },
        );
        let _scope = PushScope::new();
        objects.lock().unwrap().insert(key.to_string(), value);
        true
    }

    pub fn add_object_undo(objects: &Map, key: &str, _value: i32) -> bool {
        let _scope = PopScope::new();
        objects.lock().unwrap().remove(key);
        true
    }

    pub fn remove_object(objects: &Map, key: &str) -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "RemoveObject",
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || remove_object(&objects, &key)
            },
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || remove_object_undo(&objects, &key)
            },
        );
        let _scope = PushScope::new();
        let old_value = objects.lock().unwrap().get(key).copied().unwrap_or_default();
        current_record().save("hOldValue<-RemoveObject", old_value);
        objects.lock().unwrap().remove(key);
        true
    }

    pub fn remove_object_undo(objects: &Map, key: &str) -> bool {
        let _scope = PopScope::new();
        let old_value = current_record()
            .load::<i32>("hOldValue<-RemoveObject_Undo")
            .expect("saved during first execution");
        add_object(objects, key, old_value);
        true
    }
}

#[test]
fn parameter_capture() {
    let _world = world();
    let root = install_root();
    let objects: registry::Map = Arc::new(Mutex::new(BTreeMap::new()));

    assert!(registry::add_object(&objects, "foo", 11));
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));

    assert!(root.undo());
    assert!(objects.lock().unwrap().is_empty());

    assert!(root.redo());
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));
    assert_eq!(objects.lock().unwrap().len(), 1);
}

#[test]
fn duplicate_add_records_nothing() {
    let _world = world();
    let root = install_root();
    let objects: registry::Map = Arc::new(Mutex::new(BTreeMap::new()));

    assert!(registry::add_object(&objects, "foo", 11));
    assert!(!registry::add_object(&objects, "foo", 99));

    assert_eq!(root.present_index(), 1);
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));
}

#[test]
fn memento_for_remove() {
    let _world = world();
    let root = install_root();
    let objects: registry::Map = Arc::new(Mutex::new(BTreeMap::new()));

    assert!(registry::add_object(&objects, "foo", 11));
    assert!(registry::remove_object(&objects, "foo"));
    assert!(objects.lock().unwrap().is_empty());

    assert!(root.undo());
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));
    assert_eq!(objects.lock().unwrap().len(), 1);

    assert!(root.redo());
    assert!(objects.lock().unwrap().is_empty());
}

// ============================================================================
// Scenarios 4 & 5: branching undo semantics and the nested merge
// ============================================================================

mod merge_ops {
    use super::*;

    pub type SetMap = Arc<Mutex<BTreeMap<String, BTreeSet<i32>>>>;

    pub fn set_object(objects: &SetMap, key: &str, values: &BTreeSet<i32>) -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "SetObject",
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                let values = values.clone();
                move || set_object(&objects, &key, &values)
            },
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                let values = values.clone();
                move || set_object_undo(&objects, &key, &values)
            },
        );
        let _scope = PushScope::new();
        // Preserve old values only on the modification path.
        if let Some(old_values) = objects.lock().unwrap().get(key).cloned() {
            current_record().save("hOldValues", old_values);
        }
        objects.lock().unwrap().insert(key.to_string(), values.clone());
        true
    }

    pub fn set_object_undo(objects: &SetMap, key: &str, _values: &BTreeSet<i32>) -> bool {
        let _scope = PopScope::new();
        match current_record().load::<BTreeSet<i32>>("hOldValues_Undo") {
            // Loaded old values: undo a modification.
            Some(old_values) => set_object(objects, key, &old_values),
            // Nothing saved: undo an addition.
            None => remove_object(objects, key),
        }
    }

    pub fn remove_object(objects: &SetMap, key: &str) -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "RemoveObject",
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || remove_object(&objects, &key)
            },
            {
                let objects = Arc::clone(objects);
                let key = key.to_string();
                move || remove_object_undo(&objects, &key)
            },
        );
        let _scope = PushScope::new();
        let old_value = objects.lock().unwrap().get(key).cloned().unwrap_or_default();
        current_record().save("hOldValue", old_value);
        objects.lock().unwrap().remove(key);
        true
    }

    pub fn remove_object_undo(objects: &SetMap, key: &str) -> bool {
        let _scope = PopScope::new();
        let old_value = current_record()
            .load::<BTreeSet<i32>>("hOldValue_Undo")
            .unwrap_or_default();
        set_object(objects, key, &old_value)
    }

    pub fn merge_objects(objects: &SetMap, keys: &BTreeSet<String>, new_key: &str) -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push(
            "MergeObjects",
            {
                let objects = Arc::clone(objects);
                let keys = keys.clone();
                let new_key = new_key.to_string();
                move || merge_objects(&objects, &keys, &new_key)
            },
            {
                let objects = Arc::clone(objects);
                let keys = keys.clone();
                let new_key = new_key.to_string();
                move || merge_objects_undo(&objects, &keys, &new_key)
            },
        );
        let _scope = PushScope::new();

        // Natural first execution computes and stores the merged state; a
        // redo loads it back instead of recomputing.
        let new_values = match current_record().load::<BTreeSet<i32>>("hNewValues") {
            Some(values) => values,
            None => {
                let mut union = BTreeSet::new();
                for key in keys {
                    union.extend(objects.lock().unwrap().get(key).cloned().unwrap_or_default());
                }
                current_record().save("hNewValues", union.clone());
                union
            }
        };

        // Step 1: remove the source values.
        for key in keys {
            remove_object(objects, key);
        }
        // Step 2: insert the merged value.
        set_object(objects, new_key, &new_values);
        true
    }

    pub fn merge_objects_undo(objects: &SetMap, keys: &BTreeSet<String>, new_key: &str) -> bool {
        let _scope = PopScope::new();

        // Stack unwinding: reverse step order.
        set_object_undo(objects, new_key, &BTreeSet::new());
        for key in keys.iter().rev() {
            remove_object_undo(objects, key);
        }
        true
    }
}

fn set_of(values: &[i32]) -> BTreeSet<i32> {
    values.iter().copied().collect()
}

#[test]
fn branching_semantics_of_set_object() {
    let _world = world();
    let root = install_root();
    let objects: merge_ops::SetMap = Arc::new(Mutex::new(BTreeMap::new()));

    // Insertion path: nothing saved.
    assert!(merge_ops::set_object(&objects, "k", &set_of(&[1, 2, 3])));
    assert_eq!(objects.lock().unwrap().get("k"), Some(&set_of(&[1, 2, 3])));

    // Failed load means "undo an addition": remove.
    assert!(root.undo());
    assert!(objects.lock().unwrap().is_empty());

    assert!(root.redo());
    assert_eq!(objects.lock().unwrap().get("k"), Some(&set_of(&[1, 2, 3])));

    // Modification path: old values saved.
    assert!(merge_ops::set_object(&objects, "k", &set_of(&[9])));
    assert_eq!(objects.lock().unwrap().get("k"), Some(&set_of(&[9])));

    // Successful load restores them.
    assert!(root.undo());
    assert_eq!(objects.lock().unwrap().get("k"), Some(&set_of(&[1, 2, 3])));

    assert!(root.redo());
    assert_eq!(objects.lock().unwrap().get("k"), Some(&set_of(&[9])));
}

#[test]
fn nested_merge() {
    let _world = world();
    let root = install_root();
    let objects: merge_ops::SetMap = Arc::new(Mutex::new(BTreeMap::new()));

    assert!(merge_ops::set_object(&objects, "foo", &set_of(&[11, 23, 49])));
    assert!(merge_ops::set_object(&objects, "bar", &set_of(&[7, 8, 23])));

    let keys: BTreeSet<String> = ["foo", "bar"].iter().map(|k| k.to_string()).collect();
    assert!(merge_ops::merge_objects(&objects, &keys, "foobar"));

    let merged = set_of(&[7, 8, 11, 23, 49]);
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("foobar"), Some(&merged));
    }

    // Three sub-records landed in the merge record's sub-context.
    assert_eq!(root.present_index(), 3);
    let merge_sub = root.present().unwrap().sub_context();
    assert_eq!(merge_sub.stack_view().len(), 4);
    assert_eq!(merge_sub.present_index(), 3);

    assert!(root.undo());
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("foo"), Some(&set_of(&[11, 23, 49])));
        assert_eq!(state.get("bar"), Some(&set_of(&[7, 8, 23])));
    }
    assert_eq!(root.present_index(), 2);
    // The unwound child cursor rests at 1 so a redo can descend through it.
    assert_eq!(merge_sub.present_index(), 1);

    assert!(root.redo());
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("foobar"), Some(&merged));
    }
    assert_eq!(root.present_index(), 3);
    assert_eq!(merge_sub.present_index(), 3);
}

#[test]
fn dump_renders_the_merge_tree() {
    let _world = world();
    let root = install_root();
    let objects: merge_ops::SetMap = Arc::new(Mutex::new(BTreeMap::new()));

    merge_ops::set_object(&objects, "foo", &set_of(&[1]));
    merge_ops::set_object(&objects, "bar", &set_of(&[2]));
    let keys: BTreeSet<String> = ["foo", "bar"].iter().map(|k| k.to_string()).collect();
    merge_ops::merge_objects(&objects, &keys, "foobar");

    let rendered = root.dump(0);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "MergeObjects <<<");
    assert_eq!(lines[1], "\tSetObject <<<");
    assert_eq!(lines[2], "\tRemoveObject");
    assert_eq!(lines[3], "\tRemoveObject");
    assert_eq!(lines[4], "SetObject");
    assert_eq!(lines[5], "SetObject");
}

// ============================================================================
// Scenario 6: abort
// ============================================================================

#[test]
fn abort_push_unwinds_completely() {
    let _world = world();
    let root = install_root();
    let objects: list_ops::List = Arc::new(Mutex::new(Vec::new()));

    assert!(list_ops::add_new_object(&objects));

    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    root.bind_on_stack_changed(move |present| sink.lock().unwrap().push(present));

    // A do-body that decides nothing observable happened.
    let doomed = |_objects: &list_ops::List| -> bool {
        let ctx = gate::context().expect("history context installed");
        ctx.push("Doomed", || true, || true);
        let scope = PushScope::new();
        scope.abort();
        gate::context().expect("ascended").abort_push();
        false
    };
    assert!(!doomed(&objects));

    assert_eq!(root.present_index(), 1);
    assert_eq!(root.stack_view().len(), 2);
    assert!(fired.lock().unwrap().is_empty());

    // History is still fully usable afterwards.
    assert!(root.undo());
    assert!(objects.lock().unwrap().is_empty());
}
