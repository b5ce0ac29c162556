use todopage::db::{self, DbPool};
use todopage::error::AppError;
use todopage::models::{CreateTodo, FilterBy, RetrieveTodosRequest, TodoItem, UpdateTodo};
use todopage::query::{
    decode_cursor, retrieve_todos, sort_page_by_name, FilterField, QueryDescriptor,
    SortDirection, SortField,
};

fn item(owner_id: &str, seq: u32, name: &str) -> TodoItem {
    TodoItem {
        owner_id: owner_id.to_string(),
        todo_id: format!("todo-{seq:03}"),
        name: name.to_string(),
        due_date: "2026-11-01".to_string(),
        done: false,
        created_at: format!("2026-10-19T12:00:{seq:02}.000000Z"),
        attachment_url: None,
    }
}

fn seeded(owner_id: &str, names: &[&str]) -> DbPool {
    let pool = db::open_in_memory().expect("in-memory database");
    for (seq, name) in names.iter().enumerate() {
        db::insert_todo(&pool, &item(owner_id, seq as u32, name)).expect("insert");
    }
    pool
}

fn names(items: &[TodoItem]) -> Vec<&str> {
    items.iter().map(|t| t.name.as_str()).collect()
}

fn collect_all(pool: &DbPool, owner_id: &str, mut descriptor: QueryDescriptor) -> Vec<String> {
    let mut seen = Vec::new();
    loop {
        let page = retrieve_todos(pool, owner_id, &descriptor).expect("retrieve");
        assert!(page.items.len() <= descriptor.page_size);
        seen.extend(page.items.into_iter().map(|t| t.todo_id));
        match page.last_item_key {
            Some(cursor) => descriptor.cursor = Some(cursor),
            None => break,
        }
    }
    seen
}

#[test]
fn test_page_size_caps_results() {
    let pool = seeded("alice", &["a", "b", "c", "d", "e"]);

    for size in 1..=6 {
        let page = retrieve_todos(&pool, "alice", &QueryDescriptor::new(size)).unwrap();
        assert_eq!(page.items.len(), size.min(5));
    }
}

#[test]
fn test_cursor_chain_visits_each_item_once_ascending() {
    let pool = seeded("alice", &["a", "b", "c", "d", "e", "f", "g"]);

    let seen = collect_all(&pool, "alice", QueryDescriptor::new(3));
    let expected: Vec<String> = (0..7).map(|i| format!("todo-{i:03}")).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_cursor_chain_visits_each_item_once_descending() {
    let pool = seeded("alice", &["a", "b", "c", "d", "e", "f", "g"]);

    let mut descriptor = QueryDescriptor::new(2);
    descriptor.direction = SortDirection::Desc;
    let seen = collect_all(&pool, "alice", descriptor);
    let expected: Vec<String> = (0..7).rev().map(|i| format!("todo-{i:03}")).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_cursor_chain_with_equal_timestamps() {
    let pool = db::open_in_memory().unwrap();
    for seq in 0..5 {
        let mut todo = item("alice", seq, "same second");
        todo.created_at = "2026-10-19T12:00:00.000000Z".to_string();
        db::insert_todo(&pool, &todo).unwrap();
    }

    let seen = collect_all(&pool, "alice", QueryDescriptor::new(2));
    assert_eq!(seen.len(), 5);
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
}

#[test]
fn test_exact_multiple_of_page_size_has_no_trailing_cursor() {
    let pool = seeded("alice", &["a", "b", "c", "d"]);

    let first = retrieve_todos(&pool, "alice", &QueryDescriptor::new(2)).unwrap();
    let cursor = first.last_item_key.expect("more items follow");

    let mut descriptor = QueryDescriptor::new(2);
    descriptor.cursor = Some(cursor);
    let second = retrieve_todos(&pool, "alice", &descriptor).unwrap();
    assert_eq!(names(&second.items), vec!["c", "d"]);
    assert!(second.last_item_key.is_none());
}

#[test]
fn test_filter_by_name_example() {
    let pool = seeded("alice", &["Buy milk", "Buy eggs", "Clean house"]);

    let mut descriptor = QueryDescriptor::new(2);
    descriptor.filter_field = Some(FilterField::Name);
    descriptor.filter_value = "Buy".to_string();

    let page = retrieve_todos(&pool, "alice", &descriptor).unwrap();
    assert_eq!(names(&page.items), vec!["Buy milk", "Buy eggs"]);

    let cursor = page.last_item_key.expect("cursor after the second item");
    let position = decode_cursor("alice", &cursor).unwrap();
    assert_eq!(position.todo_id, "todo-001");

    descriptor.cursor = Some(cursor);
    let rest = retrieve_todos(&pool, "alice", &descriptor).unwrap();
    assert!(rest.items.is_empty());
    assert!(rest.last_item_key.is_none());
}

#[test]
fn test_filter_never_returns_non_matching_items() {
    let pool = seeded(
        "alice",
        &["write report", "read", "Write tests", "rewrite", "call", "overwrite"],
    );

    let mut descriptor = QueryDescriptor::new(2);
    descriptor.filter_field = Some(FilterField::Name);
    descriptor.filter_value = "write".to_string();

    let mut found = Vec::new();
    loop {
        let page = retrieve_todos(&pool, "alice", &descriptor).unwrap();
        for todo in &page.items {
            assert!(todo.name.contains("write"), "{} slipped through", todo.name);
        }
        found.extend(page.items.into_iter().map(|t| t.name));
        match page.last_item_key {
            Some(cursor) => descriptor.cursor = Some(cursor),
            None => break,
        }
    }
    // Containment is case-sensitive.
    assert_eq!(found, vec!["write report", "rewrite", "overwrite"]);
}

#[test]
fn test_filter_with_descending_cursor_chain() {
    let pool = seeded(
        "alice",
        &["Buy milk", "call mom", "Buy eggs", "Buy bread", "clean", "Buy tea"],
    );

    let mut descriptor = QueryDescriptor::new(2);
    descriptor.direction = SortDirection::Desc;
    descriptor.filter_field = Some(FilterField::Name);
    descriptor.filter_value = "Buy".to_string();

    let mut pages = Vec::new();
    loop {
        let page = retrieve_todos(&pool, "alice", &descriptor).unwrap();
        assert!(page.items.len() <= 2);
        pages.push(names(&page.items).join(", "));
        match page.last_item_key {
            Some(cursor) => descriptor.cursor = Some(cursor),
            None => break,
        }
    }
    assert_eq!(pages, vec!["Buy tea, Buy bread", "Buy eggs, Buy milk"]);
}

#[test]
fn test_name_sort_uses_locale_collation() {
    let mut items: Vec<TodoItem> = ["zebra", "éclair", "Apple", "apple", "Éclair", "eclair"]
        .iter()
        .enumerate()
        .map(|(seq, name)| item("alice", seq as u32, name))
        .collect();

    sort_page_by_name(&mut items).unwrap();
    assert_eq!(
        names(&items),
        vec!["apple", "Apple", "eclair", "éclair", "Éclair", "zebra"]
    );
}

#[test]
fn test_name_sort_is_page_local() {
    let pool = seeded("alice", &["delta", "Bravo", "charlie", "alpha"]);

    let mut descriptor = QueryDescriptor::new(3);
    descriptor.sort_field = Some(SortField::Name);

    let page = retrieve_todos(&pool, "alice", &descriptor).unwrap();
    assert_eq!(names(&page.items), vec!["Bravo", "charlie", "delta"]);

    // The cursor still follows creation order, not the re-sorted page.
    let position = decode_cursor("alice", page.last_item_key.as_deref().unwrap()).unwrap();
    assert_eq!(position.todo_id, "todo-002");

    descriptor.cursor = page.last_item_key;
    let rest = retrieve_todos(&pool, "alice", &descriptor).unwrap();
    assert_eq!(names(&rest.items), vec!["alpha"]);
}

#[test]
fn test_owners_are_isolated() {
    let pool = seeded("alice", &["alice 1", "alice 2"]);
    db::insert_todo(&pool, &item("bob", 10, "bob 1")).unwrap();

    let page = retrieve_todos(&pool, "bob", &QueryDescriptor::new(10)).unwrap();
    assert_eq!(names(&page.items), vec!["bob 1"]);

    let first = retrieve_todos(&pool, "alice", &QueryDescriptor::new(1)).unwrap();
    let mut descriptor = QueryDescriptor::new(1);
    descriptor.cursor = first.last_item_key;
    let err = retrieve_todos(&pool, "bob", &descriptor).unwrap_err();
    assert!(matches!(err, AppError::InvalidDescriptor(_)));
}

#[test]
fn test_malformed_cursor_is_rejected() {
    let pool = seeded("alice", &["a"]);

    let mut descriptor = QueryDescriptor::new(1);
    descriptor.cursor = Some("not a cursor!".to_string());
    let err = retrieve_todos(&pool, "alice", &descriptor).unwrap_err();
    assert!(matches!(err, AppError::InvalidDescriptor(_)));
}

#[test]
fn test_descriptor_from_request() {
    let req = RetrieveTodosRequest {
        page_size: 3,
        last_item_key: Some(String::new()),
        order_by: Some("DESC".to_string()),
        sort_by: Some("name".to_string()),
        filter_by: Some(FilterBy {
            key: "Name".to_string(),
            value: "milk".to_string(),
        }),
    };
    let descriptor = QueryDescriptor::try_from(req).unwrap();
    assert_eq!(descriptor.page_size, 3);
    assert_eq!(descriptor.cursor, None);
    assert_eq!(descriptor.direction, SortDirection::Desc);
    assert_eq!(descriptor.sort_field, Some(SortField::Name));
    assert_eq!(descriptor.filter_field, Some(FilterField::Name));
    assert_eq!(descriptor.filter_value, "milk");

    let lax = RetrieveTodosRequest {
        page_size: 1,
        order_by: Some("sideways".to_string()),
        sort_by: Some("dueDate".to_string()),
        filter_by: Some(FilterBy {
            key: "dueDate".to_string(),
            value: "2026".to_string(),
        }),
        ..Default::default()
    };
    let descriptor = QueryDescriptor::try_from(lax).unwrap();
    assert_eq!(descriptor.direction, SortDirection::Asc);
    assert_eq!(descriptor.sort_field, None);
    assert_eq!(descriptor.filter_field, None);
}

#[test]
fn test_non_positive_page_size_is_rejected() {
    for page_size in [0, -1] {
        let req = RetrieveTodosRequest {
            page_size,
            ..Default::default()
        };
        let err = QueryDescriptor::try_from(req).unwrap_err();
        assert!(matches!(err, AppError::InvalidDescriptor(_)));
    }

    let pool = seeded("alice", &["a"]);
    let err = retrieve_todos(&pool, "alice", &QueryDescriptor::new(0)).unwrap_err();
    assert!(matches!(err, AppError::InvalidDescriptor(_)));
}

#[test]
fn test_update_reflected_and_missing_item_reported() {
    let pool = seeded("alice", &["old name"]);

    let update = UpdateTodo {
        name: "new name".to_string(),
        due_date: "2027-01-31".to_string(),
        done: true,
    };
    let updated = db::update_todo(&pool, "alice", "todo-000", &update)
        .unwrap()
        .expect("item exists");
    assert_eq!(updated.name, "new name");
    assert_eq!(updated.due_date, "2027-01-31");
    assert!(updated.done);

    let stored = db::get_todo(&pool, "alice", "todo-000").unwrap().unwrap();
    assert_eq!(stored.name, "new name");
    assert_eq!(stored.due_date, "2027-01-31");
    assert!(stored.done);

    assert!(db::update_todo(&pool, "alice", "missing", &update)
        .unwrap()
        .is_none());
    // Another owner cannot reach the item.
    assert!(db::update_todo(&pool, "bob", "todo-000", &update)
        .unwrap()
        .is_none());
}

#[test]
fn test_created_at_never_goes_backwards() {
    let pool = db::open_in_memory().unwrap();
    let mut future = item("alice", 0, "from a fast clock");
    future.created_at = "2999-12-31T23:59:59.999999Z".to_string();
    db::insert_todo(&pool, &future).unwrap();

    let req = CreateTodo {
        name: "created now".to_string(),
        due_date: "2026-11-01".to_string(),
    };
    let first = db::create_todo(&pool, "alice", &req).unwrap();
    let second = db::create_todo(&pool, "alice", &req).unwrap();
    assert_eq!(first.created_at, "3000-01-01T00:00:00.000000Z");
    assert_eq!(second.created_at, "3000-01-01T00:00:00.000001Z");

    let ids: Vec<String> = db::list_todos(&pool, "alice")
        .unwrap()
        .into_iter()
        .map(|t| t.todo_id)
        .collect();
    assert_eq!(ids, vec![future.todo_id, first.todo_id, second.todo_id]);

    // Other owners keep using the wall clock.
    let other = db::create_todo(&pool, "bob", &req).unwrap();
    assert!(other.created_at < future.created_at);
}

#[test]
fn test_delete_is_idempotent() {
    let pool = seeded("alice", &["gone soon"]);

    assert!(db::delete_todo(&pool, "alice", "todo-000").unwrap());
    assert!(db::get_todo(&pool, "alice", "todo-000").unwrap().is_none());
    assert!(!db::delete_todo(&pool, "alice", "todo-000").unwrap());
}

#[test]
fn test_storage_failure_surfaces_as_unavailable() {
    let pool = seeded("alice", &["a"]);
    pool.lock()
        .unwrap()
        .execute_batch("DROP TABLE todos")
        .unwrap();

    let err = retrieve_todos(&pool, "alice", &QueryDescriptor::new(1)).unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable(_)));
}

#[test]
fn test_database_file_persists_items() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.db");

    {
        let pool = db::init_db(&path).unwrap();
        db::insert_todo(&pool, &item("alice", 0, "survives restart")).unwrap();
    }

    let pool = db::init_db(&path).unwrap();
    let todos = db::list_todos(&pool, "alice").unwrap();
    assert_eq!(names(&todos), vec!["survives restart"]);
}
