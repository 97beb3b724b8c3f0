//! The [`bind_class!`] model-generation macro.

/// Generates [`Bind`](crate::Bind) and [`ClassBinding`](crate::ClassBinding)
/// implementations for a plain struct, so it can be registered with an
/// engine and serialized by its field table.
///
/// The struct must be `Clone` and `Default`. A property absent from the
/// document leaves its field at the default value; an explicit `null` does
/// the same unless the field type accepts null (`Option`, `Dynamic`).
///
/// Each field entry accepts optional clauses:
///
/// - `as "wireName"` renames the property on the wire
/// - a trailing brace block with `declared: <TypeRef expression>,` to
///   override the declared type (e.g. a field held as
///   [`Dynamic`](crate::Dynamic) declaring an abstract base) and/or
///   `"key": "value"` attribute pairs for contextual factories
///
/// A supertype is declared with `extends`:
///
/// ```rust
/// use jsonbind::{bind_class, Engine};
///
/// #[derive(Clone, Default, PartialEq, Debug)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// bind_class!(Point { x: i64, y: i64 });
///
/// let engine = Engine::builder().register::<Point>().build();
/// let json = engine.to_string(&Point { x: 1, y: 2 }).unwrap();
/// assert_eq!(json, r#"{"x":1,"y":2}"#);
/// assert_eq!(engine.from_str::<Point>(&json).unwrap(), Point { x: 1, y: 2 });
/// ```
///
/// With clauses:
///
/// ```rust
/// use jsonbind::bind_class;
///
/// #[derive(Clone, Default, PartialEq, Debug)]
/// struct Account {
///     user_name: String,
///     opened: Option<String>,
/// }
///
/// bind_class!(Account {
///     user_name: String as "userName",
///     opened: Option<String> { "format": "%Y-%m-%d" },
/// });
/// ```
#[macro_export]
macro_rules! bind_class {
    (
        $ty:ident $(extends $super:ty)? {
            $(
                $field:ident : $fty:ty
                    $(as $wire:literal)?
                    $({
                        $(declared: $decl:expr,)?
                        $($ak:literal : $av:literal),* $(,)?
                    })?
            ),* $(,)?
        }
    ) => {
        impl $crate::Bind for $ty {
            fn type_ref() -> $crate::TypeRef {
                $crate::TypeRef::Class($crate::ClassId::of::<$ty>())
            }

            fn to_dynamic(&self) -> $crate::Dynamic {
                $crate::Dynamic::new(self.clone())
            }

            fn from_dynamic(value: $crate::Dynamic) -> $crate::Result<Self> {
                value.downcast::<$ty>()
            }
        }

        impl $crate::ClassBinding for $ty {
            fn class_model() -> $crate::ClassModel {
                let model = $crate::ClassModel::new::<$ty>()$(.with_supertype::<$super>())?;
                $(
                    let field = $crate::FieldModel::new(
                        stringify!($field),
                        <$fty as $crate::Bind>::type_ref(),
                        |value: &$crate::Dynamic| {
                            let typed = value.downcast_ref::<$ty>().ok_or_else(|| {
                                $crate::Error::bind(stringify!($ty), value.type_name())
                            })?;
                            Ok($crate::Bind::to_dynamic(&typed.$field))
                        },
                    );
                    $(let field = field.with_wire_name($wire);)?
                    $(
                        $(let field = field.with_declared_type($decl);)?
                        $(let field = field.with_attr($ak, $av);)*
                    )?
                    let model = model.with_field(field);
                )*
                model.with_constructor(|slots| {
                    let mut out = <$ty as ::std::default::Default>::default();
                    let mut slots = slots.into_iter();
                    $(
                        if let Some(value) = slots.next().flatten() {
                            if value.is_null() {
                                // Null binds only where the field type can
                                // hold it; otherwise the default stands.
                                if let Ok(v) = $crate::Bind::from_dynamic(value) {
                                    out.$field = v;
                                }
                            } else {
                                out.$field = $crate::Bind::from_dynamic(value)?;
                            }
                        }
                    )*
                    Ok($crate::Dynamic::new(out))
                })
            }
        }
    };
}
