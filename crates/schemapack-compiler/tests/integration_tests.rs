//! Integration tests for the SchemaPack compiler

use once_cell::sync::Lazy;
use regex::Regex;
use schemapack::{BufferBuilder, BufferReader, Error, PrimitiveType, Value};
use schemapack_compiler::{
    compile, compile_with_options, parse, CompileOptions, CompilerError, CustomTypes,
    LookupVariant, SchemaNode,
};

fn prim(ty: PrimitiveType) -> SchemaNode {
    SchemaNode::from(ty)
}

fn roundtrip(schema: &SchemaNode, value: &Value) -> Vec<u8> {
    let codec = compile(schema, &CustomTypes::new()).unwrap();
    let data = codec.encode(value).unwrap();
    assert_eq!(data.len(), codec.size(value).unwrap());
    assert_eq!(&codec.decode(&data).unwrap(), value);
    data
}

const KITCHEN_SINK: &str = r#"{
    "message": "string",
    "items": {
        "flag": "array-uint8",
        "elements": {
            "flag": "type-lookup",
            "elements": {
                "run": {
                    "duration": "uint16",
                    "direction": {"flag": "bitmask", "up": 0, "down": 1, "left": 2, "right": 3}
                },
                "weapon": {
                    "weapon": {"flag": "enum", "laser": 0, "sword": 1},
                    "strength": "float32"
                }
            }
        }
    }
}"#;

fn weapon(name: &str, strength: f32) -> Value {
    Value::object([
        ("type", Value::from("weapon")),
        ("weapon", Value::from(name)),
        ("strength", Value::F32(strength)),
    ])
}

#[test]
fn test_kitchen_sink() {
    let codec = compile(&parse(KITCHEN_SINK).unwrap(), &CustomTypes::new()).unwrap();

    let direction = Value::object([
        ("up", Value::Bool(false)),
        ("down", Value::Bool(true)),
        ("left", Value::Bool(false)),
        ("right", Value::Bool(true)),
    ]);
    let value = Value::object([
        ("message", Value::from("The game is on!")),
        (
            "items",
            Value::Array(vec![
                weapon("sword", 12.0),
                weapon("laser", 34.0),
                Value::object([
                    ("type", Value::from("run")),
                    ("duration", Value::U16(45)),
                    ("direction", direction),
                ]),
            ]),
        ),
    ]);

    let data = codec.encode(&value).unwrap();
    assert_eq!(data.len(), 49);
    assert_eq!(codec.decode(&data).unwrap(), value);
}

#[test]
fn test_kitchen_sink_lenient_input() {
    let codec = compile(&parse(KITCHEN_SINK).unwrap(), &CustomTypes::new()).unwrap();

    // Integers for floats, fields in any order, discriminant anywhere
    let loose = Value::object([
        (
            "items",
            Value::Array(vec![Value::object([
                ("strength", Value::I32(12)),
                ("weapon", Value::from("sword")),
                ("type", Value::from("weapon")),
            ])]),
        ),
        ("message", Value::from("go")),
    ]);
    let data = codec.encode(&loose).unwrap();
    assert_eq!(data.len(), 2 + 4 + 1 + 6);

    let decoded = codec.decode(&data).unwrap();
    assert_eq!(decoded.get("items").unwrap().as_array().unwrap()[0], weapon("sword", 12.0));
    let keys: Vec<_> = decoded.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["message", "items"]);
}

static HEX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-?\d+)-(-?\d+)$").unwrap());

fn hex_types() -> CustomTypes {
    let mut types = CustomTypes::new();
    types.register_fn(
        "hexId",
        |reader| {
            let x = reader.read_i16()?;
            let y = reader.read_i16()?;
            Ok(Value::String(format!("{}-{}", x, y)))
        },
        |value, builder| {
            let text = value
                .as_str()
                .ok_or_else(|| Error::InvalidValue("hexId must be a string".into()))?;
            let caps = HEX_ID
                .captures(text)
                .ok_or_else(|| Error::InvalidValue(format!("malformed hexId '{}'", text)))?;
            for part in [&caps[1], &caps[2]] {
                let n: i16 = part
                    .parse()
                    .map_err(|_| Error::InvalidValue(format!("hexId part '{}' out of range", part)))?;
                builder.write_i16(n);
            }
            Ok(())
        },
        |_| Ok(4),
    );
    types
}

#[test]
fn test_custom_type() {
    let schema = SchemaNode::object([("testId", SchemaNode::custom("hexId"))]);
    let codec = compile(&schema, &hex_types()).unwrap();

    let value = Value::object([("testId", Value::from("12345-12344"))]);
    let data = codec.encode(&value).unwrap();
    assert_eq!(data, vec![0x30, 0x39, 0x30, 0x38]);
    assert_eq!(codec.decode(&data).unwrap(), value);

    let bad = Value::object([("testId", Value::from("nope"))]);
    assert!(matches!(codec.encode(&bad), Err(Error::InvalidValue(ref m)) if m.starts_with("testId: ")));
}

const GAME_STATE: &str = r#"{
    "gameId": "string",
    "generation": "uint32",
    "entities": {
        "flag": "optional",
        "element": {
            "flag": "array-uint16",
            "elements": {
                "x": "int16",
                "y": "int16",
                "id": "uint32",
                "entityType": {"flag": "enum", "factory": 1, "infantry": 2, "plane": 3, "tank": 4},
                "busy": {
                    "flag": "optional",
                    "element": {
                        "action": {"flag": "enum", "attack": 4, "mine": 5, "move": 6},
                        "hexId": "hexId",
                        "ticks": "uint32"
                    }
                }
            }
        }
    },
    "scores": {"flag": "array-uint8", "elements": "int32"}
}"#;

#[test]
fn test_game_state() {
    let codec = compile(&parse(GAME_STATE).unwrap(), &hex_types()).unwrap();
    assert_eq!(codec.custom_types().names().collect::<Vec<_>>(), vec!["hexId"]);

    let value = Value::object([
        ("gameId", Value::from("game-1")),
        ("generation", Value::U32(12)),
        (
            "entities",
            Value::Array(vec![
                Value::object([
                    ("x", Value::I16(-3)),
                    ("y", Value::I16(4)),
                    ("id", Value::U32(1001)),
                    ("entityType", Value::from("tank")),
                    (
                        "busy",
                        Value::object([
                            ("action", Value::from("move")),
                            ("hexId", Value::from("-3-5")),
                            ("ticks", Value::U32(2)),
                        ]),
                    ),
                ]),
                Value::object([
                    ("x", Value::I16(0)),
                    ("y", Value::I16(0)),
                    ("id", Value::U32(1002)),
                    ("entityType", Value::from("factory")),
                    ("busy", Value::Null),
                ]),
            ]),
        ),
        ("scores", Value::Array(vec![Value::I32(-7), Value::I32(300)])),
    ]);

    let data = codec.encode(&value).unwrap();
    // gameId 14, generation 4, entities 32, scores 9
    assert_eq!(data.len(), 14 + 4 + 32 + 9);
    assert_eq!(codec.decode(&data).unwrap(), value);
}

#[test]
fn test_omitted_optional_field() {
    let schema = SchemaNode::object([
        ("name", prim(PrimitiveType::String)),
        ("count", SchemaNode::optional(prim(PrimitiveType::U8))),
    ]);
    let codec = compile(&schema, &CustomTypes::new()).unwrap();
    let data = codec.encode(&Value::object([("name", Value::from("a"))])).unwrap();
    assert_eq!(data, vec![0, 1, 0, b'a', 0]);
    assert_eq!(
        codec.decode(&data).unwrap(),
        Value::object([("name", Value::from("a")), ("count", Value::Null)])
    );
}

#[test]
fn test_optional_sizes() {
    let schema = SchemaNode::optional(prim(PrimitiveType::U8));
    assert_eq!(roundtrip(&schema, &Value::U8(12)).len(), 2);
    assert_eq!(roundtrip(&schema, &Value::Null).len(), 1);
}

#[test]
fn test_array_prefix_widths() {
    let value = Value::Array(vec![Value::U32(1), Value::U32(2)]);
    assert_eq!(roundtrip(&SchemaNode::array_u8(prim(PrimitiveType::U32)), &value).len(), 9);
    assert_eq!(roundtrip(&SchemaNode::array_u16(prim(PrimitiveType::U32)), &value).len(), 10);
    assert_eq!(
        roundtrip(&SchemaNode::array_u8(prim(PrimitiveType::U32)), &Value::Array(vec![])),
        vec![0]
    );
}

#[test]
fn test_array_of_objects() {
    let schema = SchemaNode::array_u8(SchemaNode::object([
        ("count", prim(PrimitiveType::U8)),
        ("shoes", prim(PrimitiveType::Bool)),
    ]));
    let value = Value::Array(vec![
        Value::object([("count", Value::U8(12)), ("shoes", Value::Bool(true))]),
        Value::object([("count", Value::U8(34)), ("shoes", Value::Bool(false))]),
    ]);
    assert_eq!(roundtrip(&schema, &value), vec![2, 12, 1, 34, 0]);
}

#[test]
fn test_strings() {
    let schema = prim(PrimitiveType::String);
    assert_eq!(roundtrip(&schema, &Value::from("Hi, how are you?")).len(), 2 + 16 * 2);
    assert_eq!(roundtrip(&schema, &Value::from("")).len(), 2);
    // Surrogate pair counts as two units
    assert_eq!(roundtrip(&schema, &Value::from("héllo 🎲")).len(), 2 + 8 * 2);
}

#[test]
fn test_scalar_roundtrips() {
    for (ty, value) in [
        (PrimitiveType::U8, Value::U8(255)),
        (PrimitiveType::U16, Value::U16(65535)),
        (PrimitiveType::U32, Value::U32(u32::MAX)),
        (PrimitiveType::I8, Value::I8(-128)),
        (PrimitiveType::I16, Value::I16(-32768)),
        (PrimitiveType::I32, Value::I32(i32::MIN)),
        (PrimitiveType::F32, Value::F32(1.5)),
        (PrimitiveType::F64, Value::F64(-2.25e100)),
        (PrimitiveType::Bool, Value::Bool(false)),
    ] {
        let data = roundtrip(&prim(ty), &value);
        assert_eq!(Some(data.len()), ty.size());
    }
}

#[test]
fn test_big_endian_layout() {
    let schema = SchemaNode::object([
        ("a", prim(PrimitiveType::U16)),
        ("b", prim(PrimitiveType::I32)),
    ]);
    let value = Value::object([("a", Value::U16(0x0102)), ("b", Value::I32(-2))]);
    assert_eq!(roundtrip(&schema, &value), vec![0x01, 0x02, 0xff, 0xff, 0xff, 0xfe]);
}

#[test]
fn test_bitmask() {
    let schema = SchemaNode::bitmask([("up", 0), ("down", 1), ("left", 2), ("right", 3)]);
    let value = Value::object([
        ("up", Value::Bool(true)),
        ("down", Value::Bool(true)),
        ("left", Value::Bool(false)),
        ("right", Value::Bool(true)),
    ]);
    assert_eq!(roundtrip(&schema, &value), vec![0b1_1101]);
}

#[test]
fn test_type_lookup() {
    let schema = SchemaNode::type_lookup([
        LookupVariant::new("ping", [("id", prim(PrimitiveType::U8))]),
        LookupVariant::new("pong", [("shoes", prim(PrimitiveType::F32))]),
    ]);
    let value = Value::object([("type", Value::from("pong")), ("shoes", Value::F32(12.0))]);
    assert_eq!(roundtrip(&schema, &value).len(), 5);

    let codec = compile(&schema, &CustomTypes::new()).unwrap();
    assert!(codec.decode(&[2, 0]).unwrap_err().is_type_not_found());
    assert!(codec
        .encode(&Value::object([("type", Value::from("pang"))]))
        .unwrap_err()
        .is_type_not_found());
}

#[test]
fn test_custom_discriminant() {
    let schema = SchemaNode::type_lookup([
        LookupVariant::new("on", Vec::<(&str, SchemaNode)>::new()),
        LookupVariant::new("off", [("type", prim(PrimitiveType::U8))]),
    ]);
    assert!(matches!(
        compile(&schema, &CustomTypes::new()),
        Err(CompilerError::Validation(_))
    ));

    let options = CompileOptions::default().with_discriminant("kind");
    let codec = compile_with_options(&schema, &CustomTypes::new(), &options).unwrap();
    let value = Value::object([("kind", Value::from("off")), ("type", Value::U8(9))]);
    let data = codec.encode(&value).unwrap();
    assert_eq!(data, vec![1, 9]);
    assert_eq!(codec.decode(&data).unwrap(), value);
}

#[test]
fn test_number_enum() {
    let schema = SchemaNode::number_enum([(1, 0), (2, 1), (3, 2)]);
    assert_eq!(roundtrip(&schema, &Value::I32(3)), vec![2]);

    let codec = compile(&schema, &CustomTypes::new()).unwrap();
    assert!(codec.encode(&Value::I32(4)).unwrap_err().is_type_not_found());
    assert!(codec.decode(&[3]).unwrap_err().is_type_not_found());
}

#[test]
fn test_json_integral_floats() {
    let schema = parse(r#"{"level": "uint8", "hp": "int16", "tier": {"flag": "number-enum", "5": 0}}"#)
        .unwrap();
    let codec = compile(&schema, &CustomTypes::new()).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(r#"{"level": 12.0, "hp": -3.0, "tier": 5.0}"#).unwrap();
    assert_eq!(codec.encode(&Value::from(json)).unwrap(), vec![12, 0xff, 0xfd, 0]);

    let json: serde_json::Value =
        serde_json::from_str(r#"{"level": 12.5, "hp": 0, "tier": 5}"#).unwrap();
    assert!(matches!(
        codec.encode(&Value::from(json)),
        Err(Error::InvalidValue(_))
    ));
}

#[test]
fn test_size_checks_shape_not_leaves() {
    let codec = compile(
        &SchemaNode::array_u8(prim(PrimitiveType::U8)),
        &CustomTypes::new(),
    )
    .unwrap();
    let value = Value::Array(vec![Value::from("x")]);
    assert_eq!(codec.size(&value).unwrap(), 2);
    assert!(matches!(codec.encode(&value), Err(Error::InvalidValue(_))));
    // A non-array is still rejected
    assert!(codec.size(&Value::U8(1)).is_err());
}

#[test]
fn test_registry_precedence() {
    // A custom "string" replaces the built-in encoding
    let mut types = CustomTypes::new();
    types.register_fn(
        "string",
        |reader| Ok(Value::String(String::from_utf8_lossy(reader.read_bytes(1)?).into_owned())),
        |value, builder| {
            let text = value.as_str().unwrap_or("?");
            builder.write_bytes(&text.as_bytes()[..1]);
            Ok(())
        },
        |_| Ok(1),
    );
    let codec = compile(&parse(r#"{"name": "string"}"#).unwrap(), &types).unwrap();
    let value = Value::object([("name", Value::from("x"))]);
    assert_eq!(codec.encode(&value).unwrap(), vec![b'x']);
}

#[test]
fn test_decode_errors() {
    let schema = SchemaNode::object([("a", prim(PrimitiveType::U32))]);
    let codec = compile(&schema, &CustomTypes::new()).unwrap();

    let err = codec.decode(&[0, 0]).unwrap_err();
    assert!(err.is_format_error());
    assert!(matches!(err, Error::OutOfBounds { needed: 4, available: 2 }));

    assert!(matches!(
        codec.decode(&[0, 0, 0, 1, 9]),
        Err(Error::TrailingBytes { position: 4, len: 5 })
    ));
}

#[test]
fn test_invalid_utf16() {
    let codec = compile(&prim(PrimitiveType::String), &CustomTypes::new()).unwrap();
    // One lone high surrogate
    assert_eq!(codec.decode(&[0, 1, 0xd8, 0x00]), Err(Error::InvalidUtf16));
}

#[test]
fn test_encode_shape_errors() {
    let schema = SchemaNode::object([("a", prim(PrimitiveType::U8))]);
    let codec = compile(&schema, &CustomTypes::new()).unwrap();

    assert!(matches!(codec.encode(&Value::U8(1)), Err(Error::InvalidValue(_))));
    assert!(matches!(
        codec.encode(&Value::object([("a", Value::U16(256))])),
        Err(Error::InvalidValue(_))
    ));
    // Required field missing
    assert!(matches!(
        codec.encode(&Value::object(Vec::<(&str, Value)>::new())),
        Err(Error::InvalidValue(ref m)) if m == "a: expected uint8, found null"
    ));
}

#[test]
fn test_compile_errors() {
    let unknown = SchemaNode::object([("pos", SchemaNode::custom("hexId"))]);
    assert!(matches!(
        compile(&unknown, &CustomTypes::new()),
        Err(CompilerError::UnknownCustomType(_))
    ));

    let flags: Vec<_> = (0..8).map(|i| (format!("f{}", i), i as i64)).collect();
    assert!(matches!(
        compile(&SchemaNode::bitmask(flags), &CustomTypes::new()),
        Err(CompilerError::Validation(_))
    ));

    assert!(matches!(
        parse(r#"{"flag": "array-uint32", "elements": "uint8"}"#),
        Err(CompilerError::Parse(_))
    ));
}

#[test]
fn test_codecs_are_independent() {
    let a = compile(&prim(PrimitiveType::U8), &CustomTypes::new()).unwrap();
    let b = compile(&prim(PrimitiveType::U16), &CustomTypes::new()).unwrap();
    assert_eq!(a.encode(&Value::U8(1)).unwrap().len(), 1);
    assert_eq!(b.encode(&Value::U8(1)).unwrap().len(), 2);
    assert_eq!(a.fixed_size(), Some(1));
}

#[test]
fn test_shared_across_threads() {
    let codec = std::sync::Arc::new(compile(&parse(KITCHEN_SINK).unwrap(), &CustomTypes::new()).unwrap());
    let handles: Vec<_> = (0..4u16)
        .map(|i| {
            let codec = codec.clone();
            std::thread::spawn(move || {
                let value = Value::object([
                    ("message", Value::from(format!("worker {}", i).as_str())),
                    ("items", Value::Array(vec![])),
                ]);
                let data = codec.encode(&value).unwrap();
                assert_eq!(codec.decode(&data).unwrap(), value);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_messages_back_to_back() {
    let codec = compile(&parse(KITCHEN_SINK).unwrap(), &CustomTypes::new()).unwrap();
    let first = Value::object([("message", Value::from("a")), ("items", Value::Array(vec![]))]);
    let second = Value::object([("message", Value::from("bc")), ("items", Value::Array(vec![]))]);

    let mut builder = BufferBuilder::new();
    codec.encode_into(&mut builder, &first).unwrap();
    codec.encode_into(&mut builder, &second).unwrap();
    let data = builder.finish();

    let mut reader = BufferReader::new(&data);
    assert_eq!(codec.decode_from(&mut reader).unwrap(), first);
    assert_eq!(codec.decode_from(&mut reader).unwrap(), second);
    reader.assert_fully_consumed().unwrap();
}
