/// Arrow schema definitions for the exported dataset tables.
pub mod tables {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const WORKS: &str = "works";
    pub const TEXT_UNITS: &str = "text_units";
    pub const RELATIONS: &str = "relations";

    /// Table names in dependency order (parents first).
    pub const ALL: [&str; 3] = [WORKS, TEXT_UNITS, RELATIONS];

    /// Schema for the `works` table. `full_text_html` is only present in
    /// exports that ask for the raw body.
    pub fn works_schema(include_full_text: bool) -> Schema {
        let mut fields = vec![
            Field::new("celex_id", DataType::Utf8, false),
            Field::new("document_type", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("date_adopted", DataType::Date32, true),
            Field::new("language", DataType::Utf8, false),
        ];
        if include_full_text {
            fields.push(Field::new("full_text_html", DataType::Utf8, true));
        }
        Schema::new(fields)
    }

    /// Schema for the `text_units` table.
    pub fn text_units_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("celex_id", DataType::Utf8, false),
            Field::new("type", DataType::Utf8, false),
            Field::new("number", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
        ])
    }

    /// Schema for the `relations` table.
    pub fn relations_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("celex_source", DataType::Utf8, false),
            Field::new("celex_target", DataType::Utf8, false),
            Field::new("relation_type", DataType::Utf8, false),
        ])
    }

    /// Export schema for a table by name.
    pub fn schema_for(table: &str, include_full_text: bool) -> Option<Schema> {
        match table {
            WORKS => Some(works_schema(include_full_text)),
            TEXT_UNITS => Some(text_units_schema()),
            RELATIONS => Some(relations_schema()),
            _ => None,
        }
    }
}
