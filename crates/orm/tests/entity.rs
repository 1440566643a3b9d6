//! Integration tests for entity mapping.

#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;

use common::{Child, Friend, Parent};
use serde_json::json;
use strata_orm::{
    Column, DataType, Entity, Error, Field, Fields, Hooks, Json, Row, Value, entity, flatten,
    from_map, from_row, inflate, to_map, to_record,
};

entity! {
    table = "docs",
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Doc {
        #[column("doc_id", primary)]
        pub id: i64,
        #[column("tags")]
        pub tags: Option<Json<Vec<String>>>,
    }
}

entity! {
    table = "audited",
    hooks = custom,
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Audited {
        #[column("audited_id", primary)]
        pub id: i64,
        #[column("state")]
        pub state: String,
    }
}

impl Hooks for Audited {
    fn hydrate(self, _fields: &Fields) -> anyhow::Result<Self> {
        if self.state == "locked" {
            anyhow::bail!("row {} is locked", self.id);
        }
        Ok(self)
    }
}

fn parent() -> Parent {
    Parent {
        id: 7,
        name: Some("Parent 7".to_string()),
        status: "active".to_string(),
        data: Json(BTreeMap::from([("role".to_string(), "owner".to_string())])),
        no_field: String::new(),
    }
}

#[test]
fn declared_metadata() {
    assert_eq!(Parent::TABLE, "parents");
    let names: Vec<_> = Child::columns().iter().map(|c| c.name).collect();
    assert_eq!(names, ["parent_id", "child_id", "child_name"]);
    assert_eq!(Child::columns()[0].foreign, Some("parents"));
    assert!(Child::columns()[1].primary);
}

#[test]
fn map_round_trip() {
    let original = parent();
    let map = to_map(&original);
    assert_eq!(map.get("parent_data"), Some(&json!({"role": "owner"})));
    assert!(!map.contains_key("no_field"));

    let restored: Parent = from_map(&map).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn nested_maps() {
    let child = Child {
        parent: parent(),
        id: 3,
        name: "Child 3".to_string(),
    };
    let map = to_map(&child);
    assert_eq!(map.get("parent_id").and_then(|p| p.get("parent_name")), Some(&json!("Parent 7")));

    let restored: Child = from_map(&map).unwrap();
    assert_eq!(restored, child);

    // a bare key hydrates the related entity's primary key
    let restored: Child = from_map(json!({"parent_id": 9, "child_id": 1}).as_object().unwrap()).unwrap();
    assert_eq!(restored.parent.id, 9);
}

#[test]
fn records_are_shallow() {
    let child = Child {
        parent: parent(),
        id: 3,
        name: String::new(),
    };

    let record = to_record(&child, true);
    assert_eq!(record.get("parent_id"), Some(&Value::Int(7)));
    assert_eq!(record.get("child_id"), Some(&Value::Int(3)));
    assert!(!record.contains_key("child_name"));

    let record = to_record(&child, false);
    assert_eq!(record.get("child_name"), Some(&Value::String(String::new())));
}

#[test]
fn rows_hydrate_related_entities() {
    let cells = [
        ("child_id", DataType::Int64(Some(1))),
        ("parent_id", DataType::Int64(Some(7))),
        ("child_name", DataType::Str(Some("Child 1".to_string()))),
        ("parent_id", DataType::Int64(Some(8))),
        ("parent_name", DataType::Str(Some("Parent 7".to_string()))),
        ("parent_data", DataType::Str(Some(r#"{"role":"owner"}"#.to_string()))),
    ];
    let row = Row {
        index: 0,
        fields: cells
            .iter()
            .map(|(name, value)| Field {
                name: (*name).to_string(),
                value: value.clone(),
            })
            .collect(),
    };
    let columns: Vec<_> = cells.iter().map(|(name, _)| Column::new(*name)).collect();

    let child: Child = from_row(&row, &columns).unwrap();
    assert_eq!(child.id, 1);
    assert_eq!(child.parent.id, 7);
    assert_eq!(child.parent.name.as_deref(), Some("Parent 7"));
    assert_eq!(child.parent.data.0.get("role").map(String::as_str), Some("owner"));
}

#[test]
fn unconvertible_values_fail() {
    let row = Row {
        index: 0,
        fields: vec![Field {
            name: "friend_id".to_string(),
            value: DataType::Str(Some("seven".to_string())),
        }],
    };
    let err = from_row::<Friend>(&row, &[Column::new("friend_id")]).unwrap_err();
    assert!(matches!(err, Error::Convert { ref column, .. } if column == "friend_id"));
    assert!(!err.is_fatal());
}

#[test]
fn flatten_and_inflate() {
    let friends = vec![
        Friend {
            id: 1,
            name: "a".to_string(),
        },
        Friend {
            id: 2,
            name: "b".to_string(),
        },
    ];
    let maps = flatten(&friends);
    assert_eq!(maps[1].get("friend_name"), Some(&json!("b")));
    assert_eq!(inflate::<Friend>(&maps).unwrap(), friends);
}

#[test]
fn optional_documents_take_whole_arrays() {
    let doc: Doc = from_map(json!({"doc_id": 1, "tags": ["a", "b"]}).as_object().unwrap()).unwrap();
    assert_eq!(doc.tags, Some(Json(vec!["a".to_string(), "b".to_string()])));

    let doc: Doc = from_map(json!({"doc_id": 2, "tags": []}).as_object().unwrap()).unwrap();
    assert_eq!(doc.tags, Some(Json(Vec::new())));

    let doc: Doc = from_map(json!({"doc_id": 3, "tags": null}).as_object().unwrap()).unwrap();
    assert_eq!(doc.tags, None);
}

#[test]
fn hydrate_hook_can_reject_rows() {
    let row = Row {
        index: 0,
        fields: vec![
            Field {
                name: "audited_id".to_string(),
                value: DataType::Int64(Some(4)),
            },
            Field {
                name: "state".to_string(),
                value: DataType::Str(Some("locked".to_string())),
            },
        ],
    };
    let columns = [Column::new("audited_id"), Column::new("state")];
    let err = from_row::<Audited>(&row, &columns).unwrap_err();
    assert!(matches!(err, Error::Hydrate { table: "audited", .. }));
    assert!(!err.is_fatal());

    let err = from_map::<Audited>(json!({"audited_id": 5, "state": "locked"}).as_object().unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Hydrate { table: "audited", .. }));

    let open: Audited =
        from_map(json!({"audited_id": 6, "state": "open"}).as_object().unwrap()).unwrap();
    assert_eq!(open.state, "open");
}
