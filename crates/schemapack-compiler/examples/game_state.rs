//! Schema-based usage example for SchemaPack
//! Compiles a JSON schema with a custom leaf type and round-trips a message

use schemapack::{Error, Value};
use schemapack_compiler::{compile, parse, CustomTypes};

const SCHEMA: &str = r#"{
    "gameId": "string",
    "units": {
        "flag": "array-uint16",
        "elements": {
            "kind": {"flag": "enum", "infantry": 0, "tank": 1},
            "at": "hexId",
            "order": {
                "flag": "optional",
                "element": {
                    "flag": "type-lookup",
                    "elements": {
                        "move": {"to": "hexId"},
                        "attack": {"target": "uint32"}
                    }
                }
            }
        }
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("SchemaPack Game State Example");
    println!("=============================");

    // Grid coordinates travel as two int16 values
    let mut types = CustomTypes::new();
    types.register_fn(
        "hexId",
        |reader| {
            let x = reader.read_i16()?;
            let y = reader.read_i16()?;
            Ok(Value::from(vec![Value::I16(x), Value::I16(y)]))
        },
        |value, builder| match value.as_array() {
            Some([x, y]) => {
                for part in [x, y] {
                    let n = part
                        .as_i64()
                        .and_then(|n| i16::try_from(n).ok())
                        .ok_or_else(|| Error::InvalidValue("hexId part must fit int16".into()))?;
                    builder.write_i16(n);
                }
                Ok(())
            }
            _ => Err(Error::InvalidValue("hexId must be a pair".into())),
        },
        |_| Ok(4),
    );

    let schema = parse(SCHEMA)?;
    println!("\nSchema:\n{}", schema);

    let codec = compile(&schema, &types)?;

    let hex = |x: i16, y: i16| Value::from(vec![Value::I16(x), Value::I16(y)]);
    let state = Value::object([
        ("gameId", Value::from("skirmish-7")),
        (
            "units",
            Value::Array(vec![
                Value::object([
                    ("kind", Value::from("tank")),
                    ("at", hex(3, -2)),
                    (
                        "order",
                        Value::object([("type", Value::from("move")), ("to", hex(4, -2))]),
                    ),
                ]),
                Value::object([("kind", Value::from("infantry")), ("at", hex(0, 0))]),
            ]),
        ),
    ]);

    let bytes = codec.encode(&state)?;
    println!("Encoded {} bytes: {:02x?}", bytes.len(), bytes);

    let decoded = codec.decode(&bytes)?;
    println!("Decoded: {:?}", decoded);

    Ok(())
}
