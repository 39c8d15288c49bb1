#![allow(unused_crate_dependencies)]
use std::io;
use std::sync::Arc;

use hyperion::factories::SerializerFactory;
use hyperion::serializers::ValueSerializer;
use hyperion::serializers::manifest::{self, write_type_manifest};
use hyperion::stream::{ReadExt as _, WriteExt as _};
use hyperion::types::{TypeInfo, TypeRef, TypeRegistry};
use hyperion::{
    DeserializerSession, Error, Object, Result, Serializer, SerializerConfig, SerializerOptions,
    SerializerSession, Value,
};

fn point_types() -> (TypeRegistry, TypeRef) {
    let mut types = TypeRegistry::new();
    let point = types.register(
        TypeInfo::structure("Point")
            .field("x", "i32")
            .field("y", "i32")
            .build(),
    );
    (types, point)
}

fn point(ty: &TypeRef, x: i32, y: i32) -> Value {
    let point = Object::with_fields(ty, [("x", Value::I32(x)), ("y", Value::I32(y))]);
    Value::object(point.expect("fields exist"))
}

fn field(value: &Value, name: &str) -> Value {
    let object = value.as_object().expect("must be an object");
    let field = object.read().get(name).cloned();
    field.expect("field must exist")
}

#[test]
fn repeated_type_is_indexed() {
    let (types, ty) = point_types();
    let serializer = Serializer::new(SerializerOptions::new(types)).expect("valid options");

    let values: Vec<Value> = (0..100).map(|i| point(&ty, i, -i)).collect();
    let mut chunks = Vec::new();
    let mut session = serializer.serializer_session();
    for value in &values {
        let mut chunk = Vec::new();
        session.serialize(&mut chunk, value).expect("must serialize");
        chunks.push(chunk);
    }
    drop(session);

    assert_eq!(chunks[0][0], manifest::FULL, "first occurrence names the type");
    for chunk in &chunks[1..] {
        assert_eq!(chunk[..3], [manifest::INDEXED, 0, 0], "later ones use the index");
        assert_eq!(chunk.len(), chunks[1].len(), "indexed values have a fixed size");
    }
    assert!(chunks[1].len() < chunks[0].len(), "indexed manifest is smaller");

    let data = chunks.concat();
    let mut reader = data.as_slice();
    let mut session = serializer.deserializer_session();
    for value in &values {
        let read = session.deserialize(&mut reader).expect("must deserialize");
        assert_eq!(&read, value, "values come back in order");
    }
}

#[test]
fn known_types_are_always_indexed() {
    let (types, ty) = point_types();
    let options = SerializerOptions::new(types.clone()).with_known_types(vec![Arc::clone(&ty)]);
    let serializer = Serializer::new(options).expect("valid options");

    let value = point(&ty, 1, 2);
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert_eq!(bytes, [manifest::INDEXED, 0, 0, 1, 2], "no type name on the wire");
    assert_eq!(serializer.from_slice(&bytes).expect("ok"), value, "must round trip");

    let other = Serializer::new(SerializerOptions::new(types)).expect("valid options");
    let err = other.from_slice(&bytes).expect_err("reader lacks the known type");
    assert!(
        matches!(err, Error::UnknownTypeIndex(0)),
        "unexpected error: {err:?}"
    );
}

#[test]
fn unknown_manifests() {
    let serializer = Serializer::new(SerializerOptions::default()).expect("valid options");

    let err = serializer.from_slice(&[100]).expect_err("unassigned byte");
    assert!(matches!(err, Error::UnknownManifest(100)), "unexpected error: {err:?}");

    let err = serializer
        .from_slice(&[manifest::CONSISTENT_ARRAY, 15, 0])
        .expect_err("strings are not value types");
    assert!(matches!(err, Error::UnknownManifest(15)), "unexpected error: {err:?}");

    let mut bytes = vec![manifest::FULL];
    bytes.write_length_prefixed(b"Missing").expect("vec write");
    let err = serializer.from_slice(&bytes).expect_err("not registered");
    assert!(
        matches!(&err, Error::UnknownType(name) if name == "Missing"),
        "unexpected error: {err:?}"
    );
}

fn person_types(extra: &str) -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register(
        TypeInfo::structure("Person")
            .field("name", "string")
            .field("age", "i32")
            .field(extra, "string")
            .build(),
    );
    types
}

fn tolerant(types: TypeRegistry) -> Serializer {
    let options = SerializerOptions::new(types).with_version_tolerance(true);
    Serializer::new(options).expect("valid options")
}

#[test]
fn version_tolerance() {
    let writer = tolerant(person_types("email"));
    let reader = tolerant(person_types("nickname"));

    let person = writer.types().resolve("Person").expect("registered");
    let value = Value::object(
        Object::with_fields(
            &person,
            [
                ("name", "Ada".into()),
                ("age", Value::I32(36)),
                ("email", "ada@example.com".into()),
            ],
        )
        .expect("fields exist"),
    );

    let bytes = writer.to_vec(&value).expect("must serialize");
    assert_eq!(bytes[0], manifest::VERSION, "field names are announced");

    let read = reader.from_slice(&bytes).expect("layout differs but is compatible");
    assert_eq!(field(&read, "name"), Value::from("Ada"), "shared field");
    assert_eq!(field(&read, "age"), Value::I32(36), "shared field");
    assert_eq!(field(&read, "nickname"), Value::Null, "missing field keeps its default");

    let read = writer.from_slice(&bytes).expect("same layout");
    assert_eq!(read, value, "must round trip");
}

#[test]
fn version_manifest_needs_field_layout() {
    let serializer = tolerant(TypeRegistry::new());

    let mut bytes = vec![manifest::VERSION];
    bytes.write_length_prefixed(b"string[]").expect("vec write");
    bytes.write_varint(0usize).expect("vec write");
    bytes.write_varint(0usize).expect("vec write");

    let err = serializer.from_slice(&bytes).expect_err("arrays have no fields");
    assert!(
        matches!(&err, Error::ManifestMismatch(name) if name == "string[]"),
        "unexpected error: {err:?}"
    );
}

#[test]
fn unsupported_type_fails_the_same_way() {
    let mut types = TypeRegistry::new();
    let socket = types.register(TypeInfo::opaque("Socket"));
    let serializer = Serializer::new(SerializerOptions::new(types)).expect("valid options");

    let first = serializer.serializer_for(&socket);
    let second = serializer.serializer_for(&socket);
    assert!(Arc::ptr_eq(&first, &second), "the placeholder is cached");

    let value = Value::object(Object::native(&socket, 7u8));
    let a = serializer.to_vec(&value).expect_err("no surrogate");
    let b = serializer.to_vec(&value).expect_err("still no surrogate");
    assert!(
        matches!(&a, Error::UnsupportedType { type_name, .. } if type_name == "Socket"),
        "unexpected error: {a:?}"
    );
    assert_eq!(a.to_string(), b.to_string(), "same diagnostic every time");
}

#[test]
fn registration_is_frozen_after_first_use() {
    let (types, ty) = point_types();
    let serializer = Serializer::new(SerializerOptions::new(types)).expect("valid options");
    serializer
        .register_factory(PointAsText)
        .expect("not used yet");

    serializer.to_vec(&point(&ty, 1, 2)).expect("must serialize");
    let err = serializer
        .register_factory(PointAsText)
        .expect_err("already used");
    assert!(matches!(err, Error::Frozen), "unexpected error: {err:?}");
}

/// Writes points as `"x,y"` text.
struct PointAsText;

struct PointAsTextSerializer {
    ty: TypeRef,
}

impl SerializerFactory for PointAsText {
    fn can_serialize(&self, _serializer: &Serializer, ty: &TypeRef) -> bool {
        ty.name() == "Point"
    }

    fn build(&self, _serializer: &Serializer, ty: &TypeRef) -> Result<Arc<dyn ValueSerializer>> {
        Ok(Arc::new(PointAsTextSerializer { ty: Arc::clone(ty) }))
    }
}

impl ValueSerializer for PointAsTextSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_type_manifest(writer, &self.ty, session)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let text = format!("{:?},{:?}", field(value, "x"), field(value, "y"));
        writer.write_length_prefixed(text.as_bytes())
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let text = reader.read_name()?;
        let parse = |s: Option<&str>| -> Result<Value> {
            let s = s
                .and_then(|s| s.strip_prefix("I32("))
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| Error::custom("malformed point"))?;
            Ok(Value::I32(s.parse().map_err(Error::custom)?))
        };

        let mut parts = text.split(',');
        let x = parse(parts.next())?;
        let y = parse(parts.next())?;
        let value = Value::object(Object::with_fields(&self.ty, [("x", x), ("y", y)])?);
        session.register(&value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}

#[test]
fn user_factory_takes_precedence() {
    let (types, ty) = point_types();
    let options = SerializerOptions::new(types).with_factory(PointAsText);
    let serializer = Serializer::new(options).expect("valid options");

    let value = point(&ty, 3, -4);
    let bytes = serializer.to_vec(&value).expect("must serialize");
    assert!(
        bytes.windows(13).any(|w| w == b"I32(3),I32(-4"),
        "written by the user factory"
    );
    assert_eq!(serializer.from_slice(&bytes).expect("ok"), value, "must round trip");
}

#[test]
fn options_from_config() {
    let config = SerializerConfig::from_toml(
        r#"
        preserve_object_references = true
        known_types = ["Point"]
        max_depth = 64
        "#,
    )
    .expect("valid config");

    let (types, ty) = point_types();
    let options = SerializerOptions::from_config(&config, types).expect("types exist");
    let serializer = Serializer::new(options).expect("valid options");
    assert!(serializer.options().preserve_object_references(), "from config");
    assert_eq!(serializer.options().max_depth(), 64, "from config");

    let bytes = serializer.to_vec(&point(&ty, 5, 6)).expect("must serialize");
    assert_eq!(bytes[..3], [manifest::INDEXED, 0, 0], "known type from config");
}

#[test]
fn depth_limit() {
    let mut types = TypeRegistry::new();
    let node = types.register(
        TypeInfo::structure("Node")
            .field("value", "i32")
            .field("next", "Node")
            .build(),
    );

    let mut value = Value::Null;
    for i in 0..20 {
        let next = Object::with_fields(&node, [("value", Value::I32(i)), ("next", value)]);
        value = Value::object(next.expect("fields exist"));
    }

    let shallow = Serializer::new(SerializerOptions::new(types.clone()).with_max_depth(10))
        .expect("valid options");
    let err = shallow.to_vec(&value).expect_err("too deep to write");
    assert!(matches!(err, Error::DepthLimitExceeded(10)), "unexpected error: {err:?}");

    let deep = Serializer::new(SerializerOptions::new(types)).expect("valid options");
    let bytes = deep.to_vec(&value).expect("within the default limit");
    let err = shallow.from_slice(&bytes).expect_err("too deep to read");
    assert!(matches!(err, Error::DepthLimitExceeded(10)), "unexpected error: {err:?}");
}

#[test]
fn default_depth_reads_on_a_test_thread() {
    let mut types = TypeRegistry::new();
    let node = types.register(
        TypeInfo::structure("Node")
            .field("value", "i32")
            .field("next", "Node")
            .build(),
    );
    let serializer = Serializer::new(SerializerOptions::new(types)).expect("valid options");
    let depth = serializer.options().max_depth();

    let mut value = Value::Null;
    for i in 0..depth - 1 {
        let i = i32::try_from(i).expect("small depth");
        let next = Object::with_fields(&node, [("value", Value::I32(i)), ("next", value)]);
        value = Value::object(next.expect("fields exist"));
    }

    let bytes = serializer.to_vec(&value).expect("within the limit");
    let read = serializer.from_slice(&bytes).expect("reads without exhausting the stack");
    assert_eq!(read, value, "must round trip");
}
