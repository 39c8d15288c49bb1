#![allow(unused_crate_dependencies)]
use std::sync::Arc;

use hyperion::types::{
    DELEGATE, EXCEPTION, FieldFlags, MEMBER_INFO, Primitive, SerializationContract, TypeInfo,
    TypeRef, TypeRegistry,
};
use hyperion::{
    Delegate, Error, Member, Object, ObjectData, Result, Serializer, SerializerOptions, Value,
};
use time::{Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

fn serializer(types: TypeRegistry) -> Serializer {
    Serializer::new(SerializerOptions::new(types)).expect("valid options")
}

fn round_trip(serializer: &Serializer, value: &Value) -> Value {
    let bytes = serializer.to_vec(value).expect("must serialize");
    serializer.from_slice(&bytes).expect("must deserialize")
}

fn field(value: &Value, name: &str) -> Value {
    let object = value.as_object().expect("must be an object");
    let field = object.read().get(name).cloned();
    field.expect("field must exist")
}

fn point_types() -> (TypeRegistry, TypeRef) {
    let mut types = TypeRegistry::new();
    let point = types.register(
        TypeInfo::structure("Point")
            .field("x", "i32")
            .field("y", "i32")
            .field("label", "string")
            .build(),
    );
    (types, point)
}

#[test]
fn primitives() {
    let (types, point) = point_types();
    let serializer = serializer(types);

    let offset = UtcOffset::from_hms(-5, 0, 0).expect("valid offset");
    let values = [
        Value::Bool(true),
        Value::U8(200),
        Value::I8(-5),
        Value::I16(-300),
        Value::U16(60_000),
        Value::I32(i32::MIN),
        Value::U32(u32::MAX),
        Value::I64(-1),
        Value::U64(u64::MAX),
        Value::I128(i128::MIN),
        Value::U128(u128::MAX),
        Value::F32(1.25),
        Value::F64(-0.0),
        Value::Char('é'),
        Value::string("héllo wörld"),
        Value::bytes(&[0, 1, 2, 255]),
        Value::DateTime(
            OffsetDateTime::from_unix_timestamp(1_234_567_890)
                .expect("valid timestamp")
                .to_offset(offset),
        ),
        Value::Duration(Duration::new(-5, -300)),
        Value::Guid(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)),
        Value::Type(point),
    ];

    for value in &values {
        assert_eq!(
            &round_trip(&serializer, value),
            value,
            "{} must round trip",
            value.type_name()
        );
    }
}

#[test]
fn exact_bytes() {
    let serializer = serializer(TypeRegistry::new());

    assert_eq!(serializer.to_vec(&Value::I32(123)).expect("ok"), [6, 123], "i32");
    assert_eq!(serializer.to_vec(&Value::Null).expect("ok"), [0], "null");
    assert_eq!(
        serializer.to_vec(&Value::string("hi")).expect("ok"),
        [15, 2, b'h', b'i'],
        "string"
    );
    assert_eq!(
        serializer.from_slice(&[6, 123]).expect("ok"),
        Value::I32(123),
        "i32 read back"
    );
}

#[test]
fn trailing_bytes() {
    let serializer = serializer(TypeRegistry::new());
    let err = serializer.from_slice(&[6, 1, 0]).expect_err("one byte too many");
    assert!(matches!(err, Error::TrailingBytes(1)), "unexpected error: {err:?}");
}

#[test]
fn struct_fields() {
    let (types, point) = point_types();
    let serializer = serializer(types);

    let value = Value::object(
        Object::with_fields(&point, [("x", Value::I32(1)), ("y", Value::I32(2))])
            .expect("fields exist"),
    );

    // fields are ordered by name; value type fields have no manifest
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert_eq!(
        bytes,
        [253, 5, b'P', b'o', b'i', b'n', b't', 0, 1, 2],
        "manifest, null label, then x and y"
    );

    let read = serializer.from_slice(&bytes).expect("must deserialize");
    assert_eq!(read, value, "must round trip");
}

#[test]
fn inherited_fields() {
    let mut types = TypeRegistry::new();
    let animal = types.register(TypeInfo::structure("Animal").field("name", "string").build());
    let dog = types.register(
        TypeInfo::structure("Dog")
            .base(&animal)
            .field("breed", "string")
            .field("name", "string")
            .build(),
    );
    let serializer = serializer(types);

    // the base field and its shadow are distinct slots
    let value = Value::object(Object::with_data(
        &dog,
        ObjectData::Fields(vec!["base".into(), "lab".into(), "rex".into()]),
    ));

    let read = round_trip(&serializer, &value);
    assert_eq!(read, value, "both name fields must survive");
    assert_eq!(field(&read, "name"), Value::from("rex"), "lookup finds the shadow");
}

#[test]
fn polymorphic_field() {
    let (mut types, point) = point_types();
    let holder = types.register(TypeInfo::structure("Holder").field("item", "object").build());
    let serializer = serializer(types);

    let item = Object::with_fields(&point, [("x", Value::I32(7))]).expect("field exists");
    let value = Value::object(
        Object::with_fields(&holder, [("item", Value::object(item))]).expect("field exists"),
    );

    let read = round_trip(&serializer, &value);
    assert_eq!(read, value, "must round trip");
    assert_eq!(field(&read, "item").type_name(), "Point", "runtime type is kept");
}

#[test]
fn excluded_fields() {
    let mut types = TypeRegistry::new();
    let resource = types.register(
        TypeInfo::structure("Resource")
            .field("name", "string")
            .field_with("cache", "string", FieldFlags::NON_SERIALIZED)
            .field_with("handle", "u64", FieldFlags::HANDLE)
            .field("sync_root", "object")
            .build(),
    );
    let serializer = serializer(types);

    let value = Value::object(
        Object::with_fields(
            &resource,
            [
                ("name", "db".into()),
                ("cache", "stale".into()),
                ("handle", Value::U64(0xDEAD)),
                ("sync_root", "lock".into()),
            ],
        )
        .expect("fields exist"),
    );

    let read = round_trip(&serializer, &value);
    assert_eq!(field(&read, "name"), Value::from("db"), "serialized");
    assert_eq!(field(&read, "cache"), Value::Null, "non-serialized");
    assert_eq!(field(&read, "handle"), Value::U64(0), "handle");
    assert_eq!(field(&read, "sync_root"), Value::Null, "lock handle");
}

#[test]
fn arrays() {
    let (types, point) = point_types();
    let ints = types.resolve("i32[]").expect("array of primitive");
    let strings = types.resolve("string[]").expect("array of primitive");
    let points = types.resolve("Point[]").expect("array of struct");
    let serializer = serializer(types);

    let value = Value::object(Object::with_elements(
        &ints,
        vec![Value::I32(1), Value::I32(2), Value::I32(3)],
    ));
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert_eq!(bytes, [251, 6, 3, 1, 2, 3], "consistent array of i32");
    assert_eq!(serializer.from_slice(&bytes).expect("ok"), value, "must round trip");

    let value = Value::object(Object::with_elements(
        &strings,
        vec!["a".into(), Value::Null, "c".into()],
    ));
    assert_eq!(round_trip(&serializer, &value), value, "strings with null");

    let origin = Object::with_fields(&point, [("label", "origin".into())]).expect("field");
    let value = Value::object(Object::with_elements(
        &points,
        vec![Value::object(origin), Value::Null],
    ));
    assert_eq!(round_trip(&serializer, &value), value, "structs with null");
}

#[test]
fn dictionaries() {
    let mut types = TypeRegistry::new();
    let string = Arc::clone(types.primitive(Primitive::String));
    let int = Arc::clone(types.primitive(Primitive::I32));
    let scores = types.register(TypeInfo::dictionary("Scores", &string, &int));
    let serializer = serializer(types);

    let value = Value::object(Object::with_entries(
        &scores,
        vec![
            ("alice".into(), Value::I32(10)),
            ("bob".into(), Value::I32(-3)),
        ],
    ));
    assert_eq!(round_trip(&serializer, &value), value, "must round trip in order");
}

#[test]
fn collections() {
    let mut types = TypeRegistry::new();
    let object = Arc::clone(types.object());
    let int = Arc::clone(types.primitive(Primitive::I32));
    let list = types.register(TypeInfo::collection("List", &object));
    let frozen = types.register(TypeInfo::immutable_collection("FrozenList", &int));
    let serializer = serializer(types);

    let inner = Value::object(Object::with_elements(&frozen, vec![Value::I32(4), Value::I32(5)]));
    let value = Value::object(Object::with_elements(
        &list,
        vec!["text".into(), Value::F64(2.5), inner],
    ));
    assert_eq!(round_trip(&serializer, &value), value, "mixed collections");
}

#[test]
fn exceptions() {
    let mut types = TypeRegistry::new();
    let base = types.resolve(EXCEPTION).expect("built in");
    let io = types.register(
        TypeInfo::structure("IoException")
            .base(&base)
            .field("path", "string")
            .build(),
    );
    let serializer = serializer(types);

    let inner = Object::with_fields(&base, [("message", "disk full".into())]).expect("field");
    let value = Value::object(
        Object::with_fields(
            &io,
            [
                ("message", "write failed".into()),
                ("inner_exception", Value::object(inner)),
                ("stack_trace", "at main".into()),
                ("hresult", Value::I32(-5)),
                ("path", "/tmp/out".into()),
            ],
        )
        .expect("fields exist"),
    );

    let read = round_trip(&serializer, &value);
    assert_eq!(field(&read, "message"), Value::from("write failed"), "message");
    assert_eq!(field(&read, "path"), Value::from("/tmp/out"), "derived field");
    assert_eq!(
        field(&field(&read, "inner_exception"), "message"),
        Value::from("disk full"),
        "inner exception"
    );
    assert_eq!(field(&read, "stack_trace"), Value::Null, "stack trace is dropped");
    assert_eq!(field(&read, "hresult"), Value::I32(0), "hresult is dropped");
}

fn add(target: &Value, args: &[Value]) -> Result<Value> {
    let count = target.as_object().and_then(|o| o.read().get("count").cloned());
    match (count, args) {
        (Some(Value::I32(count)), [Value::I32(n)]) => Ok(Value::I32(count + n)),
        _ => Err(Error::custom("expected one i32 argument")),
    }
}

#[test]
fn delegates() {
    let mut types = TypeRegistry::new();
    let counter = types.register(
        TypeInfo::structure("Counter")
            .field("count", "i32")
            .method("add", &["i32"], add)
            .build(),
    );
    let delegate = types.resolve(DELEGATE).expect("built in");
    let serializer = serializer(types);

    let method = counter
        .as_struct()
        .and_then(|s| s.method("add", &["i32".to_owned()]))
        .cloned()
        .expect("method declared");
    let target = Object::with_fields(&counter, [("count", Value::I32(40))]).expect("field");
    let value = Value::object(Object::with_data(
        &delegate,
        ObjectData::Delegate(Delegate {
            target: Value::object(target),
            method,
        }),
    ));

    let read = round_trip(&serializer, &value);
    assert_eq!(read, value, "must round trip");

    let object = read.as_object().expect("delegate object");
    let delegate = object.read().delegate().cloned().expect("delegate data");
    let res = delegate.invoke(&[Value::I32(2)]).expect("must be callable");
    assert_eq!(res, Value::I32(42), "bound to the deserialized target");
}

#[test]
fn members() {
    let (mut types, point) = point_types();
    let member = types.resolve(MEMBER_INFO).expect("built in");
    types.register(
        TypeInfo::structure("Counter")
            .field("count", "i32")
            .method("add", &["i32"], add)
            .build(),
    );
    let serializer = serializer(types);

    let field_handle = Value::object(Object::with_data(
        &member,
        ObjectData::Member(Member::Field {
            declaring: Arc::clone(&point),
            name: "x".into(),
        }),
    ));
    assert_eq!(round_trip(&serializer, &field_handle), field_handle, "field handle");

    let counter = serializer.types().resolve("Counter").expect("registered");
    let method = counter
        .as_struct()
        .and_then(|s| s.method("add", &["i32".to_owned()]))
        .cloned()
        .expect("method declared");
    let method_handle = Value::object(Object::with_data(
        &member,
        ObjectData::Member(Member::Method(method)),
    ));
    assert_eq!(round_trip(&serializer, &method_handle), method_handle, "method handle");

    let missing = Value::object(Object::with_data(
        &member,
        ObjectData::Member(Member::Field {
            declaring: point,
            name: "z".into(),
        }),
    ));
    let bytes = serializer.to_vec(&missing).expect("written by name");
    let err = serializer.from_slice(&bytes).expect_err("no such field");
    assert!(
        matches!(&err, Error::UnknownMember { member, .. } if member == "z"),
        "unexpected error: {err:?}"
    );
}

/// Writes the temperature with its unit so the reader can validate it.
struct CelsiusContract;

impl SerializationContract for CelsiusContract {
    fn write_entries(&self, object: &Object) -> Result<Vec<(String, Value)>> {
        let celsius = object.get("celsius").cloned().unwrap_or_default();
        Ok(vec![
            ("degrees".to_owned(), celsius),
            ("unit".to_owned(), "C".into()),
        ])
    }

    fn read_entries(&self, ty: &TypeRef, entries: Vec<(String, Value)>) -> Result<Object> {
        let mut degrees = None;
        for (name, value) in entries {
            match name.as_str() {
                "degrees" => degrees = Some(value),
                "unit" if value.as_str() == Some("C") => {},
                _ => return Err(Error::custom(format_args!("unexpected entry `{name}`"))),
            }
        }

        let degrees = degrees.ok_or_else(|| Error::custom("missing degrees"))?;
        Object::with_fields(ty, [("celsius", degrees)])
    }
}

#[test]
fn custom_contracts() {
    let mut types = TypeRegistry::new();
    types.register(
        TypeInfo::structure("Temperature")
            .field("celsius", "f64")
            .contract(CelsiusContract)
            .build(),
    );
    let temperature = types.resolve("Temperature").expect("registered");
    let value = Value::object(
        Object::with_fields(&temperature, [("celsius", Value::F64(21.5))]).expect("field"),
    );

    let contained =
        |haystack: &[u8], needle: &[u8]| haystack.windows(needle.len()).any(|w| w == needle);

    let serializer = serializer(types.clone());
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert!(contained(&bytes, b"degrees"), "entries are named");
    assert_eq!(serializer.from_slice(&bytes).expect("ok"), value, "contract round trip");

    let options = SerializerOptions::new(types).with_ignore_custom_serialization_contracts(true);
    let serializer = Serializer::new(options).expect("valid options");
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert!(!contained(&bytes, b"degrees"), "written by fields instead");
    assert_eq!(serializer.from_slice(&bytes).expect("ok"), value, "field round trip");
}

#[test]
fn multiple_values_per_session() {
    let (types, point) = point_types();
    let serializer = serializer(types);

    let values: Vec<Value> = (0..3)
        .map(|i| {
            let point = Object::with_fields(&point, [("x", Value::I32(i))]).expect("field");
            Value::object(point)
        })
        .collect();

    let mut buf = Vec::new();
    let mut session = serializer.serializer_session();
    for value in &values {
        session.serialize(&mut buf, value).expect("must serialize");
    }
    drop(session);

    let mut reader = buf.as_slice();
    let mut session = serializer.deserializer_session();
    for value in &values {
        let read = session.deserialize(&mut reader).expect("must deserialize");
        assert_eq!(&read, value, "values come back in order");
    }
    assert!(reader.is_empty(), "stream fully consumed");
}
