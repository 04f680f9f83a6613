// ==========================================
// 导入会话集成测试
// ==========================================
// 测试目标: 从 CSV 文件到对象存储的完整会话
// 覆盖: 新建/更新/无变化、确认与回滚、行区间、模型顺序、集合字段、跳过
// ==========================================

mod test_helpers;

use serde_json::json;
use sheet_importer::importer::{ImportError, ModelOrder};
use sheet_importer::logging;
use test_helpers::{
    count_objects, count_sessions, create_test_store, find_by, import_csv, request, seed,
    write_csv, ScriptedConfirmation,
};

const BOOK_FIELDS: &[&str] = &[
    "+example.Book.title:A",
    r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
];

#[test]
fn test_book_with_existing_publisher_is_created() {
    logging::init_test();
    let (_db, store) = create_test_store().unwrap();
    let ace = seed(&store, "example.Publisher", &[("name", json!("Ace"))]);
    let csv = write_csv("Dune,Ace\n").unwrap();

    let confirm = ScriptedConfirmation::accept();
    let (result, report) = import_csv(&store, &csv, &request(&[], BOOK_FIELDS), &confirm);
    let summary = result.unwrap();

    let book = find_by(&store, "example.Book", "title", json!("Dune")).unwrap();
    assert_eq!(book.fields["publisher"], json!(ace.id));

    let stats = summary.stats_for("example.Book").unwrap();
    assert_eq!((stats.processed, stats.created), (1, 1));
    assert_eq!(confirm.asked(), 1);
    assert_eq!(count_sessions(&store), 1);
    assert!(report.contains(&book.label()));
}

#[test]
fn test_second_import_reports_updated_and_unchanged() {
    let (_db, store) = create_test_store().unwrap();
    let fields = ["+example.Book.title:A", "example.Book.price:B"];

    let first = write_csv("Dune,10\nEmma,7\n").unwrap();
    let (result, _) = import_csv(
        &store,
        &first,
        &request(&[], &fields),
        &ScriptedConfirmation::accept(),
    );
    result.unwrap();

    let second = write_csv("Dune,12\nEmma,7\n").unwrap();
    let (result, report) = import_csv(
        &store,
        &second,
        &request(&[], &fields),
        &ScriptedConfirmation::accept(),
    );
    let stats = result.unwrap().stats_for("example.Book").cloned().unwrap();

    assert_eq!((stats.created, stats.updated, stats.unchanged), (0, 1, 1));
    assert_eq!(count_objects(&store, "example.Book"), 2);
    assert!(report.contains(r#"{"price":12}"#));

    let dune = find_by(&store, "example.Book", "title", json!("Dune")).unwrap();
    assert_eq!(dune.fields["price"], json!(12));
}

#[test]
fn test_declined_confirmation_rolls_back_everything() {
    let (_db, store) = create_test_store().unwrap();
    seed(&store, "example.Publisher", &[("name", json!("Ace"))]);
    let csv = write_csv("Dune,Ace\nEmma,Ace\n").unwrap();

    let confirm = ScriptedConfirmation::decline();
    let (result, report) = import_csv(&store, &csv, &request(&[], BOOK_FIELDS), &confirm);

    assert!(matches!(result, Err(ImportError::UserCancelled)));
    assert_eq!(confirm.asked(), 1);
    // 报告已输出，但没有任何对象被保存
    assert!(report.contains("example.Book#"));
    assert_eq!(count_objects(&store, "example.Book"), 0);
    assert_eq!(count_objects(&store, "example.Publisher"), 1);
    assert_eq!(count_sessions(&store), 0);
}

#[test]
fn test_expression_error_aborts_session() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune,10\nEmma,seven\nIliad,3\n").unwrap();

    let confirm = ScriptedConfirmation::accept();
    let (result, _) = import_csv(
        &store,
        &csv,
        &request(&[], &["+example.Book.title:A", "example.Book.price:B * 2 - 1"]),
        &confirm,
    );

    match result {
        Err(ImportError::ExpressionError { row, model, field, .. }) => {
            assert_eq!(row, 2);
            assert_eq!(model, "example.Book");
            assert_eq!(field, "price");
        }
        other => panic!("expected expression error, got {:?}", other),
    }
    assert_eq!(confirm.asked(), 0);
    assert_eq!(count_objects(&store, "example.Book"), 0);
}

#[test]
fn test_row_ranges_are_merged_and_resolved() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("title\nA1\nA2\nA3\nA4\nA5\nA6\n").unwrap();

    // 2:3 与 3:4 合并；-1 表示去掉最后一行
    let (result, _) = import_csv(
        &store,
        &csv,
        &request(&["3:4", "2:3", "6:-1"], &["example.Book.title:A"]),
        &ScriptedConfirmation::accept(),
    );
    let summary = result.unwrap();

    assert_eq!(summary.rows_processed, 4);
    for title in ["A1", "A2", "A3", "A5"] {
        assert!(find_by(&store, "example.Book", "title", json!(title)).is_some());
    }
    assert!(find_by(&store, "example.Book", "title", json!("title")).is_none());
    assert!(find_by(&store, "example.Book", "title", json!("A4")).is_none());
    assert!(find_by(&store, "example.Book", "title", json!("A6")).is_none());
}

#[test]
fn test_declaration_order_does_not_see_later_models() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune,Ace\n").unwrap();
    let fields = [
        "+example.Book.title:A",
        r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
        "example.Publisher.name:B",
    ];

    let (result, _) = import_csv(
        &store,
        &csv,
        &request(&[], &fields),
        &ScriptedConfirmation::accept(),
    );
    result.unwrap();

    let book = find_by(&store, "example.Book", "title", json!("Dune")).unwrap();
    assert_eq!(book.fields["publisher"], json!(null));
    assert_eq!(count_objects(&store, "example.Publisher"), 1);
}

#[test]
fn test_dependency_order_resolves_same_row_reference() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune,Ace\n").unwrap();
    let mut request = request(
        &[],
        &[
            "+example.Book.title:A",
            r#"example.Book.publisher:ref("example.Publisher", name=B)"#,
            "example.Publisher.name:B",
        ],
    );
    request.order = ModelOrder::Dependency;

    let (result, _) = import_csv(&store, &csv, &request, &ScriptedConfirmation::accept());
    let summary = result.unwrap();

    let ace = find_by(&store, "example.Publisher", "name", json!("Ace")).unwrap();
    let book = find_by(&store, "example.Book", "title", json!("Dune")).unwrap();
    assert_eq!(book.fields["publisher"], json!(ace.id));
    assert_eq!(summary.models[0].model_key, "example.Publisher");
}

#[test]
fn test_collection_fields_link_and_create_children() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune,frank@example.com,Frank,Book One\n").unwrap();
    let fields = [
        "+example.Author.email:B",
        "example.Author.first_name:C",
        "+example.Book.title:A",
        r#"example.Book.authors:[ref("example.Author", email=B)]"#,
        r#"example.Book.chapters:[{"name": D}]"#,
    ];

    for _ in 0..2 {
        let (result, _) = import_csv(
            &store,
            &csv,
            &request(&[], &fields),
            &ScriptedConfirmation::accept(),
        );
        result.unwrap();
    }

    let author = find_by(&store, "example.Author", "email", json!("frank@example.com")).unwrap();
    let book = find_by(&store, "example.Book", "title", json!("Dune")).unwrap();
    let chapter = find_by(&store, "example.Chapter", "name", json!("Book One")).unwrap();

    let linked: i64 = store
        .connection()
        .query_row(
            "SELECT child_id FROM object_relation WHERE model = 'example.Book' AND field = 'authors' AND parent_id = ?1",
            [book.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(linked, author.id);
    assert_eq!(chapter.fields["book"], json!(book.id));
    // 重复导入不产生重复的子对象
    assert_eq!(count_objects(&store, "example.Chapter"), 1);
}

#[test]
fn test_empty_key_and_noempty_skip_objects() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune,Ace\n,Penguin\nEmma,\n").unwrap();
    let fields = [
        "+example.Book.title:A",
        "+example.Publisher.name:noempty(B)",
        "example.Publisher.country:'UK'",
    ];

    let (result, _) = import_csv(
        &store,
        &csv,
        &request(&[], &fields),
        &ScriptedConfirmation::accept(),
    );
    let summary = result.unwrap();

    let books = summary.stats_for("example.Book").unwrap();
    assert_eq!((books.created, books.skipped), (2, 1));
    let publishers = summary.stats_for("example.Publisher").unwrap();
    assert_eq!((publishers.created, publishers.skipped), (2, 1));
    assert!(find_by(&store, "example.Publisher", "name", json!("Penguin")).is_some());
}

#[test]
fn test_unknown_model_fails_before_any_write() {
    let (_db, store) = create_test_store().unwrap();
    let csv = write_csv("Dune\n").unwrap();

    let confirm = ScriptedConfirmation::accept();
    let (result, _) = import_csv(
        &store,
        &csv,
        &request(&[], &["example.Magazine.title:A"]),
        &confirm,
    );

    assert!(matches!(result, Err(ImportError::UnknownModel { .. })));
    assert_eq!(confirm.asked(), 0);
    assert_eq!(count_sessions(&store), 0);
}
