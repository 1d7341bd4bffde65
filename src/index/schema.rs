//! The static mapping of repository documents.
//!
//! This table mirrors the JSON shape of [`crate::repository::RepositorySnapshot`] and must be
//! kept in step with it by hand.

use serde_json::{Map, Value, json};

/// Analyzer used for free-form prose
const ENGLISH: &str = "english";

/// How a document field is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Keyword,
    Text { analyzer: Option<&'static str> },
    Long,
    Boolean,
    Date,

    /// A single embedded object, or an array of objects queried independently of each other
    Object(&'static [Field]),

    /// An array of objects whose fields must match together
    Nested(&'static [Field]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(name: &'static str, field_type: FieldType) -> Field {
    Field { name, field_type }
}

const PROSE: FieldType = FieldType::Text { analyzer: Some(ENGLISH) };

const TICKETS: &[Field] = &[
    field("open", FieldType::Long),
    field("closed", FieldType::Long),
    field("url", FieldType::Keyword),
];

const ABOUT: &[Field] = &[field("content", PROSE), field("content_type", FieldType::Keyword)];

const DECLARATION: &[Field] = &[
    field("name", FieldType::Keyword),
    field("doc", PROSE),
    field("file", FieldType::Keyword),
];

const NOTE: &[Field] = &[
    field("kind", FieldType::Keyword),
    field("uid", FieldType::Keyword),
    field("body", PROSE),
];

const PACKAGE: &[Field] = &[
    field("name", FieldType::Keyword),
    field("import_path", FieldType::Keyword),
    field("synopsis", FieldType::Text { analyzer: None }),
    field("doc", PROSE),
    field("browse_url", FieldType::Keyword),
    field("errors", FieldType::Keyword),
    field("is_command", FieldType::Boolean),
    field("files", FieldType::Keyword),
    field("test_files", FieldType::Keyword),
    field("x_test_files", FieldType::Keyword),
    field("imports", FieldType::Keyword),
    field("test_imports", FieldType::Keyword),
    field("x_test_imports", FieldType::Keyword),
    field("consts", FieldType::Object(DECLARATION)),
    field("vars", FieldType::Object(DECLARATION)),
    field("funcs", FieldType::Object(DECLARATION)),
    field("types", FieldType::Object(DECLARATION)),
    field("examples", FieldType::Object(DECLARATION)),
    field("notes", FieldType::Object(NOTE)),
];

const REF: &[Field] = &[
    field("name", FieldType::Keyword),
    field("ref_type", FieldType::Keyword),
    field("is_default_branch", FieldType::Boolean),
    field("last_seen_commit", FieldType::Keyword),
    field("last_updated", FieldType::Date),
    field("packages", FieldType::Nested(PACKAGE)),
];

/// Every top-level field of a repository document
pub const SCHEMA: &[Field] = &[
    field("id", FieldType::Keyword),
    field("name", FieldType::Keyword),
    field("full_name", FieldType::Keyword),
    field("description", PROSE),
    field("owner", FieldType::Keyword),
    field("vcs", FieldType::Keyword),
    field("primary_url", FieldType::Keyword),
    field("issues", FieldType::Object(TICKETS)),
    field("pull_requests", FieldType::Object(TICKETS)),
    field("created", FieldType::Date),
    field("last_updated", FieldType::Date),
    field("last_crawled", FieldType::Date),
    field("stars", FieldType::Long),
    field("forks", FieldType::Long),
    field("is_fork", FieldType::Boolean),
    field("status", FieldType::Keyword),
    field("about", FieldType::Object(ABOUT)),
    field("refs", FieldType::Nested(REF)),
];

/// Render the index mapping body for [`SCHEMA`]
#[must_use]
pub fn mapping_json() -> Value {
    json!({ "properties": properties(SCHEMA) })
}

fn properties(fields: &[Field]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), field_mapping(f.field_type)))
        .collect();
    Value::Object(map)
}

fn field_mapping(field_type: FieldType) -> Value {
    match field_type {
        FieldType::Keyword => json!({ "type": "keyword" }),
        FieldType::Text { analyzer: Some(analyzer) } => json!({ "type": "text", "analyzer": analyzer }),
        FieldType::Text { analyzer: None } => json!({ "type": "text" }),
        FieldType::Long => json!({ "type": "long" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "date" }),
        FieldType::Object(fields) => json!({ "type": "object", "properties": properties(fields) }),
        FieldType::Nested(fields) => json!({ "type": "nested", "properties": properties(fields) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{About, ActivityStatus, Package, Ref, RefType, RepoId, RepositorySnapshot, Tickets};
    use chrono::DateTime;

    fn sample_snapshot() -> RepositorySnapshot {
        let when = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        RepositorySnapshot {
            id: RepoId::from_url_str("github.com/acme/widgets").unwrap(),
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            description: "Widgets".into(),
            owner: "acme".into(),
            vcs: "git".into(),
            primary_url: "https://github.com/acme/widgets".into(),
            issues: Tickets::default(),
            pull_requests: Tickets::default(),
            created: when,
            last_updated: when,
            last_crawled: when,
            stars: 1,
            forks: 2,
            is_fork: false,
            status: ActivityStatus::Active,
            about: Some(About {
                content: "# Widgets".into(),
                content_type: "text/markdown".into(),
            }),
            refs: vec![Ref {
                name: "main".into(),
                ref_type: RefType::Branch,
                is_default_branch: true,
                last_seen_commit: "abc".into(),
                last_updated: when,
                packages: vec![Package {
                    name: "widgets".into(),
                    import_path: "github.com/acme/widgets".into(),
                    ..Package::default()
                }],
            }],
        }
    }

    /// Every key of `doc` must be declared in `fields`, recursively
    fn assert_covered(doc: &Value, fields: &[Field], path: &str) {
        let Value::Object(map) = doc else {
            return;
        };

        for (key, value) in map {
            let field = fields
                .iter()
                .find(|f| f.name == key)
                .unwrap_or_else(|| panic!("'{path}{key}' missing from schema"));

            match field.field_type {
                FieldType::Object(children) | FieldType::Nested(children) => match value {
                    Value::Array(items) => items.iter().for_each(|item| assert_covered(item, children, &format!("{path}{key}."))),
                    other => assert_covered(other, children, &format!("{path}{key}.")),
                },
                _ => {}
            }
        }
    }

    #[test]
    fn test_schema_covers_document() {
        let doc = serde_json::to_value(sample_snapshot()).unwrap();
        assert_covered(&doc, SCHEMA, "");
    }

    #[test]
    fn test_mapping_json_shape() {
        let mapping = mapping_json();
        assert_eq!(mapping["properties"]["id"]["type"], "keyword");
        assert_eq!(mapping["properties"]["refs"]["type"], "nested");
        assert_eq!(mapping["properties"]["refs"]["properties"]["packages"]["type"], "nested");
        assert_eq!(
            mapping["properties"]["refs"]["properties"]["packages"]["properties"]["import_path"]["type"],
            "keyword"
        );
        assert_eq!(mapping["properties"]["about"]["properties"]["content"]["analyzer"], "english");
        assert!(mapping["properties"]["refs"]["properties"]["packages"]["properties"]["synopsis"]
            .get("analyzer")
            .is_none());
    }

    #[test]
    fn test_no_duplicate_fields() {
        fn check(fields: &[Field]) {
            let mut names: Vec<_> = fields.iter().map(|f| f.name).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len());

            for f in fields {
                if let FieldType::Object(children) | FieldType::Nested(children) = f.field_type {
                    check(children);
                }
            }
        }

        check(SCHEMA);
    }
}
