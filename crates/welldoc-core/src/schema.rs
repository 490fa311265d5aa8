/// Arrow schema mapping for normalised tables.
pub mod arrow_types {
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::blueprint::ValueType;
    use crate::table::Column;

    /// Arrow type used to store a blueprint value type.
    pub fn data_type(value_type: ValueType) -> DataType {
        match value_type {
            ValueType::String => DataType::Utf8,
            ValueType::Number => DataType::Float64,
            ValueType::Boolean => DataType::Boolean,
            ValueType::Date => DataType::Date32,
        }
    }

    /// Schema for a table; every column is nullable because any value may be absent.
    pub fn table_schema(columns: &[Column]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|c| Field::new(&c.name, data_type(c.value_type), true))
                .collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::arrow_types;
    use crate::blueprint::ValueType;
    use crate::table::Column;
    use arrow::datatypes::DataType;

    #[test]
    fn table_schema_has_expected_fields() {
        let columns = vec![
            Column::new("Size", ValueType::String),
            Column::new("Weight", ValueType::Number),
            Column::new("Date", ValueType::Date),
            Column::new("Horizontal", ValueType::Boolean),
        ];
        let schema = arrow_types::table_schema(&columns);
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(
            schema.field_with_name("Weight").unwrap().data_type(),
            &DataType::Float64
        );
        assert_eq!(
            schema.field_with_name("Date").unwrap().data_type(),
            &DataType::Date32
        );
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
    }
}
