use crate::types::{AttributeRecord, Value};

/// Separator between parent and child keys in a flattened path
pub const PATH_SEPARATOR: &str = "_";

/// One leaf of a flattened record: the joined key path and its value
pub type FlatPair<'a> = (String, &'a Value);

/// Flatten a nested record into `(path, value)` leaves.
///
/// Sibling keys are sorted at every level, so the output order depends only
/// on the record's content and never on map iteration order. Nested records
/// are spliced in place with their keys prefixed by `parent_`; every other
/// value, arrays included, is emitted as a leaf.
pub fn flatten(record: &AttributeRecord) -> Vec<FlatPair<'_>> {
    let mut pairs = Vec::new();
    flatten_into(record, "", &mut pairs);
    pairs
}

fn flatten_into<'a>(record: &'a AttributeRecord, parent: &str, pairs: &mut Vec<FlatPair<'a>>) {
    let mut keys: Vec<&String> = record.keys().collect();
    keys.sort();

    for key in keys {
        let name = format!("{}{}", parent, key);
        match &record[key] {
            Value::Map(nested) => {
                flatten_into(nested, &format!("{}{}", name, PATH_SEPARATOR), pairs);
            }
            value => pairs.push((name, value)),
        }
    }
}
