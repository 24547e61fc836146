//! Entity lifecycle walkthrough.
//!
//! Declares a `Student` entity, stores a few rows in an in-memory database,
//! and runs the typed query, update, and removal operations against them.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p rowmap-demos --example students
//! ```

use rowmap_core::{
    Condition, Entity, EntityDescriptor, EntityState, FieldDescriptor, FieldType, Value,
    WriteOutcome,
};
use rowmap_sqlite::EntityStore;

#[derive(Debug, Default)]
struct Student {
    id: String,
    name: String,
    age: i32,
    score: f64,
    state: EntityState,
}

impl Student {
    fn new(id: &str, name: &str, age: i32, score: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            age,
            score,
            state: EntityState::New,
        }
    }
}

impl Entity for Student {
    fn describe() -> EntityDescriptor {
        EntityDescriptor::of::<Student>()
            .field(FieldDescriptor::new("id", FieldType::Text).primary_key())
            .field(FieldDescriptor::new("name", FieldType::Text).not_null())
            .field(FieldDescriptor::new("age", FieldType::I32))
            .field(FieldDescriptor::new("score", FieldType::F64).default_value("0"))
    }

    fn state(&self) -> EntityState {
        self.state
    }

    fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    fn value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(self.age.into()),
            "score" => Some(self.score.into()),
            _ => None,
        }
    }

    fn set_value(&mut self, field: &str, value: Value) {
        match field {
            "id" => self.id = value.into_text().unwrap_or_default(),
            "name" => self.name = value.into_text().unwrap_or_default(),
            "age" => self.age = value.as_i64().unwrap_or_default() as i32,
            "score" => self.score = value.as_f64().unwrap_or_default(),
            _ => {}
        }
    }

    fn on_after_write(&mut self, outcome: WriteOutcome) {
        println!("  wrote {} ({outcome:?})", self.id);
    }
}

fn main() {
    let mut store = EntityStore::open_in_memory().unwrap();

    // === Step 1: Insert ===
    println!("=== Insert ===");
    let mut students = vec![
        Student::new("s1", "Ann", 20, 3.5),
        Student::new("s2", "Bob", 17, 2.0),
        Student::new("s3", "Cid", 22, 4.0),
    ];
    store
        .in_transaction(|store| {
            for student in &mut students {
                store.insert_new(student)?;
            }
            Ok(())
        })
        .unwrap();
    println!("Rows: {}", store.query_count::<Student>(None).unwrap());

    // === Step 2: Query ===
    println!("\n=== Query ===");
    let adults = store
        .query_by_condition::<Student>(Some(&Condition::ge("age", 18)), Some("ORDER BY age DESC"))
        .unwrap();
    for student in &adults {
        println!("  {} ({}) score={}", student.name, student.age, student.score);
    }

    let first = store.query_by_position::<Student>(0).unwrap();
    println!("First row: {:?}", first.map(|s| s.name));

    let total = store.query_sum::<Student>("score", None).unwrap();
    println!("Total score: {total}");

    // === Step 3: Update ===
    println!("\n=== Update ===");
    let mut bob = store.query_by_primary::<Student>("s2").unwrap().unwrap();
    bob.score = 3.0;
    store.update(&mut bob).unwrap();
    let raised = store.update_fields::<Student>("age = age + 1").unwrap();
    println!("Aged {raised} students by one year");

    // === Step 4: Remove ===
    println!("\n=== Remove ===");
    let removed = store
        .remove_where::<Student>(Some(&Condition::lt("score", 3.5)))
        .unwrap();
    println!("Removed {removed} students below 3.5");
    println!(
        "Remaining keys: {:?}",
        store.query_primary_keys::<Student>(None, None).unwrap()
    );

    // === Step 5: Raw SQL ===
    println!("\n=== Raw SQL ===");
    let rows = store
        .raw_query("SELECT name, age FROM Student ORDER BY name")
        .unwrap();
    println!("{}", serde_json::to_string_pretty(&rows).unwrap());

    store.close().unwrap();
    println!("\nClosed: {}", store.is_closed());
}
