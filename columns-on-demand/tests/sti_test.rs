#[path = "helpers.rs"] mod helpers;

use columns_on_demand::*;
use sea_orm::{DbBackend, Value};
use std::sync::Arc;

struct ItemTypes {
    item: Arc<RecordType>,
    special: Arc<RecordType>,
    plain: Arc<RecordType>,
}

fn item_types(schema: ColumnSet) -> ItemTypes {
    let item = RecordType::builder("Item", DbBackend::Sqlite)
        .table("items")
        .schema(schema)
        .columns_on_demand(Vec::<String>::new())
        .build()
        .unwrap();
    let special = RecordType::builder("SpecialItem", DbBackend::Sqlite)
        .inherits(&item, Sti::new("type", "SpecialItem"))
        .columns_on_demand(["a_int"])
        .build()
        .unwrap();
    let plain = RecordType::builder("PlainItem", DbBackend::Sqlite)
        .inherits(&item, Sti::new("type", "PlainItem"))
        .build()
        .unwrap();
    ItemTypes { item, special, plain }
}

mod sti_tests {
    use super::*;
    use crate::helpers::*;

    #[tokio::test]
    async fn test_subtypes_keep_their_own_deferred_columns() {
        let db = setup_test_db().await;
        let types = item_types(setup_items(&db).await);

        assert_eq!(types.item.columns_to_load_on_demand(), ["shared_text"]);
        assert_eq!(types.item.default_select(false), "id, type, a_int, b_int");
        assert_eq!(types.special.columns_to_load_on_demand(), ["a_int"]);
        assert_eq!(types.special.default_select(false), "id, type, shared_text, b_int");
        assert_eq!(types.plain.columns_to_load_on_demand(), ["shared_text"]);
        assert_eq!(types.plain.default_select(false), "id, type, a_int, b_int");
    }

    #[tokio::test]
    async fn test_subtype_query_filters_and_defers() {
        let db = setup_test_db().await;
        let log = QueryLog::new(db.clone());
        let types = item_types(setup_items(&db).await);

        let mut specials = types.special.find(log.clone()).exec().await.unwrap();
        assert_eq!(specials.len(), 2);
        assert!(log
            .last()
            .unwrap()
            .ends_with(r#"WHERE "items"."type" = 'SpecialItem'"#));

        let first = &mut specials[0];
        assert!(first.column_loaded("shared_text"));
        assert!(!first.column_loaded("a_int"));

        log.clear();
        assert_eq!(first.read_attribute("a_int").await.unwrap(), &Value::BigInt(Some(3)));
        assert_eq!(
            log.statements(),
            vec![r#"SELECT "a_int" FROM "items" WHERE "id" = 2"#.to_string()]
        );

        let second = &mut specials[1];
        assert_eq!(second.read_attribute("shared_text").await.unwrap(), &Value::String(None));
        assert_eq!(log.count(), 1);
    }

    #[tokio::test]
    async fn test_base_type_sees_every_row() {
        let db = setup_test_db().await;
        let types = item_types(setup_items(&db).await);

        let mut items = types.item.find(db.clone()).exec().await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(!items[0].column_loaded("shared_text"));
        assert_eq!(
            items[0].read_attribute("shared_text").await.unwrap(),
            &Value::String(Some(Box::new("base".to_string())))
        );
    }

    #[tokio::test]
    async fn test_subtype_caches_reset_through_registry() {
        let db = setup_test_db().await;
        let schema = setup_items(&db).await;
        let types = item_types(schema.clone());
        let registry = Registry::new();
        registry.register(Arc::clone(&types.item));
        registry.register(Arc::clone(&types.special));
        registry.register(Arc::clone(&types.plain));

        assert_eq!(types.special.default_select(false), "id, type, shared_text, b_int");
        let mut columns = schema.columns();
        columns.push(ColumnInfo::new("c_int", sea_orm::ColumnType::Integer));
        schema.replace(columns);

        assert_eq!(registry.reset_column_information("items"), 3);
        assert_eq!(
            types.special.default_select(false),
            "id, type, shared_text, b_int, c_int"
        );
        assert_eq!(types.item.default_select(false), "id, type, a_int, b_int, c_int");
    }
}
