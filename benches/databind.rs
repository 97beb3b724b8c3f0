use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsonbind::{bind_class, Dynamic, Engine};

#[derive(Clone, Default)]
struct User {
    id: i64,
    name: String,
    email: String,
    active: bool,
    tags: Vec<String>,
}

bind_class!(User {
    id: i64,
    name: String,
    email: String,
    active: bool,
    tags: Vec<String>,
});

fn sample_user() -> User {
    User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
        tags: vec!["admin".to_string(), "developer".to_string()],
    }
}

fn benchmark_serialize_struct(c: &mut Criterion) {
    let engine = Engine::builder().register::<User>().build();
    let user = sample_user();
    // Warm the converter cache so the loop measures conversion, not
    // resolution.
    let _ = engine.to_string(&user);

    c.bench_function("serialize_struct", |b| {
        b.iter(|| engine.to_string(black_box(&user)))
    });
}

fn benchmark_deserialize_struct(c: &mut Criterion) {
    let engine = Engine::builder().register::<User>().build();
    let json = engine.to_string(&sample_user()).unwrap();

    c.bench_function("deserialize_struct", |b| {
        b.iter(|| engine.from_str::<User>(black_box(&json)))
    });
}

fn benchmark_deserialize_dynamic(c: &mut Criterion) {
    let engine = Engine::default();
    let mut rows = String::from("[");
    for i in 0..100 {
        if i > 0 {
            rows.push(',');
        }
        rows.push_str(&format!(r#"{{"id":{i},"name":"user-{i}","scores":[1,2,3]}}"#));
    }
    rows.push(']');

    c.bench_function("deserialize_dynamic_100_rows", |b| {
        b.iter(|| engine.from_str::<Dynamic>(black_box(&rows)))
    });
}

fn benchmark_large_array(c: &mut Criterion) {
    let engine = Engine::default();
    let numbers: Vec<i64> = (0..10_000).collect();
    let json = engine.to_string(&numbers).unwrap();

    c.bench_function("serialize_array_10k", |b| {
        b.iter(|| engine.to_string(black_box(&numbers)))
    });
    c.bench_function("deserialize_array_10k", |b| {
        b.iter(|| engine.from_str::<Vec<i64>>(black_box(&json)))
    });
}

criterion_group!(
    benches,
    benchmark_serialize_struct,
    benchmark_deserialize_struct,
    benchmark_deserialize_dynamic,
    benchmark_large_array
);
criterion_main!(benches);
