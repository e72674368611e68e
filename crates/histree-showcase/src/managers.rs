#![forbid(unsafe_code)]

//! Walkthrough managers: four small hosts driving the framework the way an
//! application would, from the trivial round trip up to a nested merge.
//!
//! Each walkthrough installs its own root context, performs a few
//! operations, and exercises undo/redo, asserting the observable state at
//! every step.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use histree::{gate, Context, PopScope, PushScope, Record};

fn install_root() -> Arc<Context> {
    let root = Context::new();
    gate::set_context(Some(Arc::clone(&root)));
    root
}

/// The record whose body is currently executing: after a scope's descent
/// the active context is that record's sub-context.
fn current_record() -> Arc<Record> {
    let ctx = gate::context().expect("active context");
    let owner = ctx.parent().expect("inside an operation scope");
    owner.present().expect("gate enabled")
}

// ============================================================================
// Basics: trivial registration
// ============================================================================

type List = Arc<Mutex<Vec<i32>>>;

fn add_new_object(objects: &List) -> bool {
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

fn add_new_object_undo(objects: &List) -> bool {
    let _scope = PopScope::new();
    objects.lock().unwrap().pop();
    true
}

pub fn run_basics() {
    let root = install_root();
    let objects: List = Arc::new(Mutex::new(Vec::new()));

    add_new_object(&objects);
    assert_eq!(objects.lock().unwrap().len(), 1);

    root.undo();
    assert!(objects.lock().unwrap().is_empty());

    root.redo();
    assert_eq!(objects.lock().unwrap().len(), 1);

    println!("basics\n{}", root.dump(1));
}

// ============================================================================
// Inline params: by-value argument capture
// ============================================================================

type Map = Arc<Mutex<BTreeMap<String, i32>>>;

fn add_object(objects: &Map, key: &str, value: i32) -> bool {
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

fn add_object_undo(objects: &Map, key: &str, _value: i32) -> bool {
    let _scope = PopScope::new();
    objects.lock().unwrap().remove(key);
    true
}

pub fn run_inline_params() {
    let root = install_root();
    let objects: Map = Arc::new(Mutex::new(BTreeMap::new()));

    add_object(&objects, "foo", 11);
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));

    root.undo();
    assert!(objects.lock().unwrap().is_empty());

    root.redo();
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));

    println!("inline params\n{}", root.dump(1));
}

// ============================================================================
// User params: mementos carry what the reverse operation needs
// ============================================================================

fn remove_object(objects: &Map, key: &str) -> bool {
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
    current_record().save("hOldValue", old_value);
    objects.lock().unwrap().remove(key);
    true
}

fn remove_object_undo(objects: &Map, key: &str) -> bool {
    let _scope = PopScope::new();
    let old_value = current_record()
        .load::<i32>("hOldValue_Undo")
        .expect("saved during first execution");
    add_object(objects, key, old_value);
    true
}

pub fn run_user_params() {
    let root = install_root();
    let objects: Map = Arc::new(Mutex::new(BTreeMap::new()));

    add_object(&objects, "foo", 11);
    remove_object(&objects, "foo");
    assert!(objects.lock().unwrap().is_empty());

    root.undo();
    assert_eq!(objects.lock().unwrap().get("foo"), Some(&11));

    root.redo();
    assert!(objects.lock().unwrap().is_empty());

    println!("user params\n{}", root.dump(1));
}

// ============================================================================
// Advanced: branching undo paths and a nested three-record merge
// ============================================================================

type SetMap = Arc<Mutex<BTreeMap<String, BTreeSet<i32>>>>;

fn set_values(objects: &SetMap, key: &str, values: &BTreeSet<i32>) -> bool {
    let ctx = gate::context().expect("history context installed");
    ctx.push(
        "SetObject",
        {
            let objects = Arc::clone(objects);
            let key = key.to_string();
            let values = values.clone();
            move || set_values(&objects, &key, &values)
        },
        {
            let objects = Arc::clone(objects);
            let key = key.to_string();
            let values = values.clone();
            move || set_values_undo(&objects, &key, &values)
        },
    );
    let _scope = PushScope::new();
    if let Some(old_values) = objects.lock().unwrap().get(key).cloned() {
        current_record().save("hOldValues", old_values);
    }
    objects.lock().unwrap().insert(key.to_string(), values.clone());
    true
}

fn set_values_undo(objects: &SetMap, key: &str, _values: &BTreeSet<i32>) -> bool {
    let _scope = PopScope::new();
    match current_record().load::<BTreeSet<i32>>("hOldValues_Undo") {
        // Loaded old values: undo a modification.
        Some(old_values) => set_values(objects, key, &old_values),
        // Nothing saved: undo an addition.
        None => remove_values(objects, key),
    }
}

fn remove_values(objects: &SetMap, key: &str) -> bool {
    let ctx = gate::context().expect("history context installed");
    ctx.push(
        "RemoveObject",
        {
            let objects = Arc::clone(objects);
            let key = key.to_string();
            move || remove_values(&objects, &key)
        },
        {
            let objects = Arc::clone(objects);
            let key = key.to_string();
            move || remove_values_undo(&objects, &key)
        },
    );
    let _scope = PushScope::new();
    let old_value = objects.lock().unwrap().get(key).cloned().unwrap_or_default();
    current_record().save("hOldValue", old_value);
    objects.lock().unwrap().remove(key);
    true
}

fn remove_values_undo(objects: &SetMap, key: &str) -> bool {
    let _scope = PopScope::new();
    let old_value = current_record()
        .load::<BTreeSet<i32>>("hOldValue_Undo")
        .unwrap_or_default();
    set_values(objects, key, &old_value)
}

fn merge_objects(objects: &SetMap, keys: &BTreeSet<String>, new_key: &str) -> bool {
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

    // First execution computes and stores the merged state; a redo loads it.
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
        remove_values(objects, key);
    }
    // Step 2: insert the merged value.
    set_values(objects, new_key, &new_values);
    true
}

fn merge_objects_undo(objects: &SetMap, keys: &BTreeSet<String>, new_key: &str) -> bool {
    let _scope = PopScope::new();

    // Stack unwinding: reverse step order.
    set_values_undo(objects, new_key, &BTreeSet::new());
    for key in keys.iter().rev() {
        remove_values_undo(objects, key);
    }
    true
}

pub fn run_advanced() {
    let root = install_root();
    let objects: SetMap = Arc::new(Mutex::new(BTreeMap::new()));

    set_values(&objects, "foo", &[11, 23, 49].into_iter().collect());
    set_values(&objects, "bar", &[7, 8, 23].into_iter().collect());

    let keys: BTreeSet<String> = ["foo", "bar"].iter().map(|k| k.to_string()).collect();
    merge_objects(&objects, &keys, "foobar");

    let merged: BTreeSet<i32> = [7, 8, 11, 23, 49].into_iter().collect();
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("foobar"), Some(&merged));
    }
    println!("advanced, merged\n{}", root.dump(1));

    root.undo();
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(
            state.get("foo"),
            Some(&[11, 23, 49].into_iter().collect::<BTreeSet<i32>>())
        );
        assert_eq!(
            state.get("bar"),
            Some(&[7, 8, 23].into_iter().collect::<BTreeSet<i32>>())
        );
    }
    println!("advanced, after undo\n{}", root.dump(1));

    root.redo();
    {
        let state = objects.lock().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("foobar"), Some(&merged));
    }
    println!("advanced, after redo\n{}", root.dump(1));
}
