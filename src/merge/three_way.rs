// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Three-way JSON merge of live, desired and last-applied payloads.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Merge `desired` into `live`, using `previous` (the last applied payload) to
/// tell fields the operator dropped apart from fields the server populated.
///
/// - values present in desired win
/// - fields only in live are kept, unless they were in `previous` (the operator
///   set them before and no longer wants them)
/// - arrays whose elements all carry a unique `name` merge element by element;
///   any other array is replaced by the desired one
pub fn three_way(live: &Value, desired: &Value, previous: Option<&Value>) -> Value {
    match (live, desired) {
        (Value::Object(live_map), Value::Object(desired_map)) => {
            Value::Object(merge_objects(live_map, desired_map, previous.and_then(Value::as_object)))
        }
        (Value::Array(live_items), Value::Array(desired_items)) => {
            match (named(live_items), named(desired_items)) {
                (Some(_), Some(_)) => Value::Array(merge_named(
                    live_items,
                    desired_items,
                    previous.and_then(Value::as_array),
                )),
                _ => desired.clone(),
            }
        }
        _ => desired.clone(),
    }
}

fn merge_objects(
    live: &Map<String, Value>,
    desired: &Map<String, Value>,
    previous: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, live_value) in live {
        if desired.contains_key(key) {
            continue;
        }
        if previous.is_some_and(|p| p.contains_key(key)) {
            continue;
        }
        merged.insert(key.clone(), live_value.clone());
    }

    for (key, desired_value) in desired {
        let value = match live.get(key) {
            Some(live_value) => three_way(
                live_value,
                desired_value,
                previous.and_then(|p| p.get(key)),
            ),
            None => desired_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}

fn merge_named(live: &[Value], desired: &[Value], previous: Option<&Vec<Value>>) -> Vec<Value> {
    desired
        .iter()
        .map(|item| {
            let name = item_name(item);
            match find_named(live, name) {
                Some(live_item) => three_way(
                    live_item,
                    item,
                    previous.and_then(|p| find_named(p, name)),
                ),
                None => item.clone(),
            }
        })
        .collect()
}

fn item_name(item: &Value) -> Option<&str> {
    item.get("name").and_then(Value::as_str)
}

fn find_named<'a>(items: &'a [Value], name: Option<&str>) -> Option<&'a Value> {
    let name = name?;
    items.iter().find(|item| item_name(item) == Some(name))
}

/// Names of the elements, when every element is an object with a distinct `name`
fn named(items: &[Value]) -> Option<HashSet<&str>> {
    let mut names = HashSet::with_capacity(items.len());
    for item in items {
        if !names.insert(item_name(item)?) {
            return None;
        }
    }
    Some(names)
}
