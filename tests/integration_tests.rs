use chrono::{DateTime, TimeZone, Utc};
use jsonbind::{
    bind_class, ClassId, ClassModel, Dynamic, Engine, EngineOptions, Error, FieldModel, TypeRef,
};
use num_bigint::BigInt;
use std::sync::Arc;

#[derive(Clone, Default, PartialEq, Debug)]
struct User {
    id: i64,
    name: String,
    active: bool,
    tags: Vec<String>,
}

bind_class!(User {
    id: i64,
    name: String,
    active: bool,
    tags: Vec<String>,
});

#[derive(Clone, Default, PartialEq, Debug)]
struct Order {
    order_id: i64,
    customer: User,
    total: f64,
    note: Option<String>,
}

bind_class!(Order {
    order_id: i64,
    customer: User,
    total: f64,
    note: Option<String>,
});

#[test]
fn test_simple_struct_round_trip() {
    let engine = Engine::builder().register::<User>().build();
    let user = User {
        id: 123,
        name: "Alice".to_string(),
        active: true,
        tags: vec!["admin".to_string(), "developer".to_string()],
    };

    let json = engine.to_string(&user).unwrap();
    assert_eq!(
        json,
        r#"{"id":123,"name":"Alice","active":true,"tags":["admin","developer"]}"#
    );

    let back: User = engine.from_str(&json).unwrap();
    assert_eq!(back, user);
}

#[test]
fn test_nested_struct_round_trip() {
    let engine = Engine::builder()
        .register::<User>()
        .register::<Order>()
        .build();
    let order = Order {
        order_id: 7,
        customer: User {
            id: 1,
            name: "Bob".to_string(),
            active: false,
            tags: vec![],
        },
        total: 29.99,
        note: Some("gift".to_string()),
    };

    let json = engine.to_string(&order).unwrap();
    let back: Order = engine.from_str(&json).unwrap();
    assert_eq!(back, order);
}

#[test]
fn test_dynamic_document_re_encodes_byte_identically() {
    let json = r#"{"a":1,"b":[1,2,3],"c":{"d":null,"e":"x"},"f":true}"#;
    let value: Dynamic = jsonbind::from_str(json).unwrap();
    assert_eq!(jsonbind::to_string(&value).unwrap(), json);
}

#[test]
fn test_null_into_primitive_slot_defaults_to_zero() {
    let engine = Engine::builder().register::<User>().build();
    let back: User = engine
        .from_str(r#"{"id":null,"name":null,"active":null,"tags":null}"#)
        .unwrap();
    assert_eq!(back.id, 0);
    assert!(!back.active);
    // Nullable slots keep null, which binds to the field's default.
    assert_eq!(back.name, "");
    assert!(back.tags.is_empty());
}

#[test]
fn test_null_into_optional_slot_stays_none() {
    let engine = Engine::builder()
        .register::<User>()
        .register::<Order>()
        .build();
    let back: Order = engine
        .from_str(r#"{"order_id":1,"customer":{"id":1},"total":0.5,"note":null}"#)
        .unwrap();
    assert_eq!(back.note, None);
}

#[test]
fn test_skip_null_omits_optional_members() {
    let engine = Engine::builder()
        .register::<User>()
        .register::<Order>()
        .with_options(EngineOptions::default().with_skip_null(true))
        .build();
    let order = Order {
        order_id: 1,
        customer: User::default(),
        total: 1.0,
        note: None,
    };
    let json = engine.to_string(&order).unwrap();
    assert!(!json.contains("note"));
}

// Polymorphism: an abstract base dispatched by runtime type on write and by
// the @class member on read.

#[derive(Clone, Copy, Default)]
struct Shape;

#[derive(Clone, Default, PartialEq, Debug)]
struct Circle {
    radius: f64,
}

bind_class!(Circle extends Shape { radius: f64 });

#[derive(Clone, Default, PartialEq, Debug)]
struct Rect {
    w: f64,
    h: f64,
}

bind_class!(Rect extends Shape { w: f64, h: f64 });

#[derive(Clone, Default, Debug)]
struct Drawing {
    name: String,
    shape: Dynamic,
}

bind_class!(Drawing {
    name: String,
    shape: Dynamic { declared: TypeRef::Class(ClassId::of::<Shape>()), },
});

fn shape_engine() -> Engine {
    Engine::builder()
        .register_model(ClassModel::abstract_class::<Shape>())
        .register::<Circle>()
        .register::<Rect>()
        .register::<Drawing>()
        .alias::<Circle>("circle")
        .alias::<Rect>("rect")
        .with_options(EngineOptions::default().with_class_metadata(true))
        .build()
}

#[test]
fn test_class_metadata_written_before_ordinary_members() {
    let engine = shape_engine();
    let json = engine.to_string(&Circle { radius: 2.0 }).unwrap();
    assert_eq!(json, r#"{"@class":"circle","radius":2.0}"#);
}

#[test]
fn test_polymorphic_field_round_trip() {
    let engine = shape_engine();
    let drawing = Drawing {
        name: "blueprint".to_string(),
        shape: Dynamic::new(Rect { w: 3.0, h: 4.0 }),
    };

    let json = engine.to_string(&drawing).unwrap();
    assert!(json.contains(r#""@class":"rect""#));

    let back: Drawing = engine.from_str(&json).unwrap();
    assert_eq!(
        back.shape.downcast_ref::<Rect>(),
        Some(&Rect { w: 3.0, h: 4.0 })
    );
}

#[test]
fn test_class_metadata_dispatch_from_untyped_read() {
    let engine = shape_engine();
    let value: Dynamic = engine
        .from_str(r#"{"@class":"circle","radius":1.5}"#)
        .unwrap();
    assert_eq!(
        value.downcast_ref::<Circle>(),
        Some(&Circle { radius: 1.5 })
    );
}

#[test]
fn test_custom_metadata_prefix() {
    let engine = Engine::builder()
        .register_model(ClassModel::abstract_class::<Shape>())
        .register::<Circle>()
        .alias::<Circle>("circle")
        .with_options(
            EngineOptions::default()
                .with_class_metadata(true)
                .with_metadata_prefix('#'),
        )
        .build();
    let json = engine.to_string(&Circle { radius: 1.0 }).unwrap();
    assert_eq!(json, r##"{"#class":"circle","radius":1.0}"##);
    let back: Circle = engine.from_str(&json).unwrap();
    assert_eq!(back, Circle { radius: 1.0 });
}

// Runtime-type substitution without metadata.

#[derive(Clone, Default, PartialEq, Debug)]
struct Animal {
    name: String,
}

bind_class!(Animal { name: String });

#[derive(Clone, Default, PartialEq, Debug)]
struct Dog {
    name: String,
    breed: String,
}

bind_class!(Dog extends Animal { name: String, breed: String });

#[test]
fn test_runtime_type_substitution_on_write() {
    let engine = Engine::builder()
        .register::<Animal>()
        .register::<Dog>()
        .with_options(EngineOptions::default().with_use_runtime_type(true))
        .build();
    let dog = Dynamic::new(Dog {
        name: "Rex".to_string(),
        breed: "Border Collie".to_string(),
    });

    let mut out = Vec::new();
    engine
        .serialize_dynamic(&dog, &TypeRef::Class(ClassId::of::<Animal>()), &mut out)
        .unwrap();
    let json = String::from_utf8(out).unwrap();
    assert_eq!(json, r#"{"name":"Rex","breed":"Border Collie"}"#);
}

// Strict unknown-property mode.

#[test]
fn test_fail_on_unknown_properties() {
    let engine = Engine::builder()
        .register::<User>()
        .with_options(EngineOptions::default().with_fail_on_unknown_properties(true))
        .build();
    let err = engine
        .from_str::<User>(r#"{"id":1,"nickname":"Al"}"#)
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedProperty { .. }));
}

// View overlays.

#[test]
fn test_view_overlay_reshapes_output() {
    fn name_only(value: &Dynamic) -> Result<Dynamic, Error> {
        let user = value
            .downcast_ref::<User>()
            .ok_or_else(|| Error::bind("User", value.type_name()))?;
        Ok(Dynamic::new(user.name.clone()))
    }

    let public = ClassModel::new::<User>()
        .with_field(FieldModel::new("name", TypeRef::Str, name_only));
    let engine = Engine::builder()
        .register::<User>()
        .view::<User>("public", public)
        .with_options(EngineOptions::default().with_view("public"))
        .build();

    let user = User {
        id: 9,
        name: "Carol".to_string(),
        active: true,
        tags: vec!["internal".to_string()],
    };
    assert_eq!(engine.to_string(&user).unwrap(), r#"{"name":"Carol"}"#);
}

// Contextual per-field date representations.

#[derive(Clone, PartialEq, Debug)]
struct Event {
    title: String,
    at: DateTime<Utc>,
    seen: DateTime<Utc>,
}

impl Default for Event {
    fn default() -> Self {
        Event {
            title: String::new(),
            at: DateTime::<Utc>::UNIX_EPOCH,
            seen: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

bind_class!(Event {
    title: String,
    at: DateTime<Utc> { "format": "%Y-%m-%d %H:%M:%S" },
    seen: DateTime<Utc> { "unit": "seconds" },
});

#[test]
fn test_contextual_date_formats() {
    let engine = Engine::builder().register::<Event>().build();
    let event = Event {
        title: "launch".to_string(),
        at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        seen: Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
    };

    let json = engine.to_string(&event).unwrap();
    assert!(json.contains(r#""at":"2024-03-01 12:30:00""#));
    assert!(json.contains(r#""seen":1709337600"#));

    let back: Event = engine.from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_default_date_representation_is_rfc3339() {
    let engine = Engine::default();
    let stamp = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let json = engine.to_string(&stamp).unwrap();
    assert_eq!(json, r#""2024-01-02T03:04:05Z""#);
    let back: DateTime<Utc> = engine.from_str(&json).unwrap();
    assert_eq!(back, stamp);
}

// Mutually recursive types resolve through the construction guard.

#[derive(Clone, Default, PartialEq, Debug)]
struct Author {
    name: String,
    books: Vec<Book>,
}

#[derive(Clone, Default, PartialEq, Debug)]
struct Book {
    title: String,
    author: Option<Box<Author>>,
}

bind_class!(Author {
    name: String,
    books: Vec<Book>,
});

bind_class!(Book {
    title: String,
    author: Option<Box<Author>>,
});

#[test]
fn test_mutually_recursive_types_round_trip() {
    let engine = Engine::builder()
        .register::<Author>()
        .register::<Book>()
        .build();
    let author = Author {
        name: "Ursula".to_string(),
        books: vec![Book {
            title: "Dispossessed".to_string(),
            author: Some(Box::new(Author {
                name: "Ursula".to_string(),
                books: vec![],
            })),
        }],
    };

    let json = engine.to_string(&author).unwrap();
    let back: Author = engine.from_str(&json).unwrap();
    assert_eq!(back, author);
}

#[test]
fn test_recursive_resolution_is_cached() {
    let engine = Engine::builder()
        .register::<Author>()
        .register::<Book>()
        .build();
    let first = engine.converter_for(&TypeRef::Class(ClassId::of::<Author>()));
    let second = engine.converter_for(&TypeRef::Class(ClassId::of::<Author>()));
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

// Wire renames and big integers.

#[derive(Clone, Default, PartialEq, Debug)]
struct Account {
    user_name: String,
    balance: BigInt,
}

bind_class!(Account {
    user_name: String as "userName",
    balance: BigInt,
});

#[test]
fn test_wire_rename() {
    let engine = Engine::builder().register::<Account>().build();
    let account = Account {
        user_name: "dana".to_string(),
        balance: BigInt::from(10).pow(30),
    };

    let json = engine.to_string(&account).unwrap();
    assert_eq!(
        json,
        r#"{"userName":"dana","balance":1000000000000000000000000000000}"#
    );
    let back: Account = engine.from_str(&json).unwrap();
    assert_eq!(back, account);
}

#[test]
fn test_html_safe_engine_output() {
    let engine = Engine::builder()
        .with_options(EngineOptions::default().with_html_safe(true))
        .build();
    let json = engine.to_string(&"<script>".to_string()).unwrap();
    assert!(!json.contains('<'));
    assert!(json.contains("\\u003c"));
}

#[test]
fn test_from_slice_handles_utf16_document() {
    let engine = Engine::builder().register::<User>().build();
    let text = r#"{"id":5,"name":"Ada"}"#;
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let back: User = engine.from_slice(&bytes).unwrap();
    assert_eq!(back.id, 5);
    assert_eq!(back.name, "Ada");
}
