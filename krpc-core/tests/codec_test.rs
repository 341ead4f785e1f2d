use krpc_core::codec::{self, CodecError, decode_guid};
use krpc_core::schema;
use krpc_core::types::{Enumeration, EnumerationMember, TypeRegistry};
use krpc_core::value::{EnumValue, Message, Value};

fn encode_hex(registry: &TypeRegistry, value: impl Into<Value>, descriptor: &str) -> String {
    let ty = registry.resolve(descriptor).unwrap();
    hex::encode(codec::encode(&value.into(), &ty).unwrap())
}

fn decode_hex(registry: &TypeRegistry, data: &str, descriptor: &str) -> Result<Value, CodecError> {
    let ty = registry.resolve(descriptor).unwrap();
    codec::decode(registry, &hex::decode(data).unwrap(), &ty)
}

/// Checks the encoding of `value` and that it decodes back to the same value.
fn assert_wire(value: impl Into<Value>, descriptor: &str, expected: &str) {
    let registry = TypeRegistry::new();
    let value = value.into();

    assert_eq!(
        encode_hex(&registry, value.clone(), descriptor),
        expected,
        "encoding {value:?} as {descriptor}"
    );
    assert_eq!(decode_hex(&registry, expected, descriptor).unwrap(), value);
}

#[test]
fn test_sint32() {
    assert_wire(0, "sint32", "00");
    assert_wire(1, "sint32", "02");
    assert_wire(42, "sint32", "54");
    assert_wire(300, "sint32", "d804");
    assert_wire(-33, "sint32", "41");
    assert_wire(i32::MAX, "sint32", "feffffff0f");
    assert_wire(i32::MIN, "sint32", "ffffffff0f");
}

#[test]
fn test_sint64() {
    assert_wire(0i64, "sint64", "00");
    assert_wire(1i64, "sint64", "02");
    assert_wire(1234567890000i64, "sint64", "a091d89fee47");
    assert_wire(-33i64, "sint64", "41");
}

#[test]
fn test_unsigned() {
    assert_wire(0u32, "uint32", "00");
    assert_wire(300u32, "uint32", "ac02");
    assert_wire(0u64, "uint64", "00");
    assert_wire(1234567890000u64, "uint64", "d088ec8ff723");
}

#[test]
fn test_bool() {
    assert_wire(true, "bool", "01");
    assert_wire(false, "bool", "00");
}

#[test]
fn test_double() {
    assert_wire(0.0, "double", "0000000000000000");
    assert_wire(-1.0, "double", "000000000000f0bf");
    assert_wire(3.14159265359, "double", "ea2e4454fb210940");
    assert_wire(f64::INFINITY, "double", "000000000000f07f");
    assert_wire(f64::NEG_INFINITY, "double", "000000000000f0ff");

    let registry = TypeRegistry::new();
    assert_eq!(encode_hex(&registry, f64::NAN, "double"), "000000000000f87f");
    let Value::Double(nan) = decode_hex(&registry, "000000000000f87f", "double").unwrap() else {
        panic!("expected a double");
    };
    assert!(nan.is_nan());
}

#[test]
fn test_float() {
    assert_wire(3.14159265359f32, "float", "db0f4940");
    assert_wire(-1.0f32, "float", "000080bf");
    assert_wire(f32::INFINITY, "float", "0000807f");
    assert_wire(f32::NEG_INFINITY, "float", "000080ff");

    let registry = TypeRegistry::new();
    assert_eq!(encode_hex(&registry, f32::NAN, "float"), "0000c07f");
    let Value::Float(nan) = decode_hex(&registry, "0000c07f", "float").unwrap() else {
        panic!("expected a float");
    };
    assert!(nan.is_nan());
}

#[test]
fn test_string_and_bytes() {
    assert_wire("", "string", "00");
    assert_wire("testing", "string", "0774657374696e67");
    assert_wire("™", "string", "03e284a2");
    assert_wire(vec![0xba, 0xda, 0x55], "bytes", "03bada55");
    assert_wire(Vec::<u8>::new(), "bytes", "00");
}

#[test]
fn test_tuple() {
    assert_wire(Value::Tuple(vec![1u32.into()]), "Tuple(uint32)", "0a0101");
    assert_wire(
        Value::Tuple(vec![1u32.into(), "jeb".into(), false.into()]),
        "Tuple(uint32,string,bool)",
        "0a01010a04036a65620a0100",
    );
}

#[test]
fn test_list() {
    assert_wire(Value::List(vec![]), "List(uint32)", "");
    assert_wire(Value::List(vec![1u32.into()]), "List(uint32)", "0a0101");
    assert_wire(
        Value::List(vec![1u32.into(), 2u32.into(), 3u32.into(), 4u32.into()]),
        "List(uint32)",
        "0a01010a01020a01030a0104",
    );
}

#[test]
fn test_set() {
    assert_wire(Value::Set(vec![]), "Set(uint32)", "");
    assert_wire(
        Value::Set(vec![1u32.into(), 2u32.into(), 3u32.into(), 4u32.into()]),
        "Set(uint32)",
        "0a01010a01020a01030a0104",
    );
}

#[test]
fn test_set_removes_duplicates() {
    let registry = TypeRegistry::new();
    let value = decode_hex(&registry, "0a01010a01020a0101", "Set(uint32)").unwrap();
    assert_eq!(value, Value::Set(vec![1u32.into(), 2u32.into()]));

    assert_eq!(
        encode_hex(
            &registry,
            Value::Set(vec![1u32.into(), 1u32.into(), 2u32.into()]),
            "Set(uint32)"
        ),
        "0a01010a0102"
    );
}

#[test]
fn test_dictionary() {
    assert_wire(Value::Dictionary(vec![]), "Dictionary(string,uint32)", "");
    assert_wire(
        Value::Dictionary(vec![("".into(), 0u32.into())]),
        "Dictionary(string,uint32)",
        "0a060a0100120100",
    );
}

#[test]
fn test_dictionary_entries_are_sorted() {
    let registry = TypeRegistry::new();
    let value = Value::Dictionary(vec![
        ("foo".into(), 42u32.into()),
        ("bar".into(), 365u32.into()),
        ("baz".into(), 3u32.into()),
    ]);

    let encoded = encode_hex(&registry, value, "Dictionary(string,uint32)");
    assert_eq!(
        encoded,
        "0a0a0a04036261721202ed020a090a040362617a1201030a090a0403666f6f12012a"
    );

    let decoded = decode_hex(&registry, &encoded, "Dictionary(string,uint32)").unwrap();
    assert_eq!(
        decoded,
        Value::Dictionary(vec![
            ("bar".into(), 365u32.into()),
            ("baz".into(), 3u32.into()),
            ("foo".into(), 42u32.into()),
        ])
    );
}

#[test]
fn test_nested_collections() {
    assert_wire(
        Value::List(vec![
            Value::List(vec![1u32.into()]),
            Value::List(vec![]),
        ]),
        "List(List(uint32))",
        "0a030a01010a00",
    );
}

#[test]
fn test_absent_collection() {
    let registry = TypeRegistry::new();

    assert_eq!(encode_hex(&registry, Value::Null, "List(sint32)"), "00");
    assert_eq!(
        decode_hex(&registry, "00", "List(sint32)").unwrap(),
        Value::List(vec![])
    );
    assert_eq!(
        decode_hex(&registry, "00", "Set(sint32)").unwrap(),
        Value::Set(vec![])
    );
    assert_eq!(
        decode_hex(&registry, "00", "Dictionary(string,sint32)").unwrap(),
        Value::Dictionary(vec![])
    );
    assert_eq!(
        decode_hex(&registry, "00", "Tuple(sint32,bool)").unwrap(),
        Value::Null
    );
}

#[test]
fn test_class() {
    let registry = TypeRegistry::new();
    let descriptor = "Class(ServiceName.ClassName)";

    let value = decode_hex(&registry, "ac02", descriptor).unwrap();
    let Value::Object(obj) = &value else {
        panic!("expected a remote object, got {value:?}");
    };
    assert_eq!(obj.id(), 300);
    assert_eq!(obj.service(), "ServiceName");
    assert_eq!(obj.class(), "ClassName");
    assert_eq!(obj.registry(), registry.id());

    assert_eq!(encode_hex(&registry, value.clone(), descriptor), "ac02");
    assert_eq!(decode_hex(&registry, "00", descriptor).unwrap(), Value::Null);
    assert_eq!(encode_hex(&registry, Value::Null, descriptor), "00");
}

#[test]
fn test_enum() {
    let registry = TypeRegistry::new();
    let enumeration = registry.register_enumeration(Enumeration {
        service: "ServiceName".to_string(),
        name: "EnumName".to_string(),
        documentation: String::new(),
        members: [("a", 0), ("b", 42), ("c", 100)]
            .into_iter()
            .map(|(name, value)| EnumerationMember {
                name: name.to_string(),
                value,
                documentation: String::new(),
            })
            .collect(),
    });
    let descriptor = "Enum(ServiceName.EnumName)";

    let b = enumeration.value("b").unwrap();
    assert_eq!(encode_hex(&registry, b.clone(), descriptor), "54");
    assert_eq!(decode_hex(&registry, "54", descriptor).unwrap(), Value::Enum(b));

    assert!(matches!(
        decode_hex(&registry, "02", descriptor),
        Err(CodecError::InvalidEnumValue(err)) if err.value == 1
    ));
}

#[test]
fn test_enum_without_table() {
    let registry = TypeRegistry::new();

    assert!(matches!(
        decode_hex(&registry, "00", "Enum(ServiceName.Missing)"),
        Err(CodecError::UnknownEnumeration(_))
    ));
}

#[test]
fn test_message() {
    let registry = TypeRegistry::new();
    let request = schema::Request {
        service: "ServiceName".to_string(),
        procedure: "ProcedureName".to_string(),
        arguments: vec![schema::Argument {
            position: 0,
            value: vec![0x54],
        }],
    };
    let ty = registry.resolve("KRPC.Request").unwrap();

    let value = Value::Message(Message::Request(request.clone()));
    let encoded = codec::encode(&value, &ty).unwrap();
    assert_eq!(codec::decode(&registry, &encoded, &ty).unwrap(), value);

    use krpc_core::prost::Message as _;
    assert_eq!(encoded, request.encode_to_vec());
}

#[test]
fn test_delimited() {
    let status = schema::Status {
        version: "0.5.4".to_string(),
        ..Default::default()
    };

    let framed = codec::encode_delimited(&status);
    assert_eq!(framed[0] as usize, framed.len() - 1);
    assert_eq!(codec::decode_delimited::<schema::Status>(&framed).unwrap(), status);

    assert!(codec::decode_delimited::<schema::Status>(&framed[..framed.len() - 1]).is_err());
}

#[test]
fn test_decode_errors() {
    let registry = TypeRegistry::new();

    assert!(matches!(
        decode_hex(&registry, "", "sint32"),
        Err(CodecError::Truncated)
    ));
    assert!(matches!(
        decode_hex(&registry, "ac", "uint32"),
        Err(CodecError::Truncated)
    ));
    assert!(matches!(
        decode_hex(&registry, "0100", "uint32"),
        Err(CodecError::TrailingBytes(1))
    ));
    assert!(matches!(
        decode_hex(&registry, "0000f87f", "double"),
        Err(CodecError::Truncated)
    ));
    assert!(matches!(
        decode_hex(&registry, "0a6869", "string"),
        Err(CodecError::SizeExceedsBuffer {
            size: 10,
            remaining: 2
        })
    ));
    assert!(matches!(
        decode_hex(&registry, "80808080808080808001", "uint32"),
        Err(CodecError::Overflow { .. })
    ));
    assert!(matches!(
        decode_hex(&registry, "02c328", "string"),
        Err(CodecError::InvalidUtf8(_))
    ));
    assert!(matches!(
        decode_hex(&registry, "0a0101", "Tuple(uint32,uint32)"),
        Err(CodecError::TupleArity {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_encode_type_mismatch() {
    let registry = TypeRegistry::new();

    for (value, descriptor) in [
        (Value::from("42"), "sint32"),
        (Value::from(1i64), "sint32"),
        (Value::from(true), "uint32"),
        (Value::from(1u32), "List(uint32)"),
        (Value::Null, "string"),
    ] {
        let ty = registry.resolve(descriptor).unwrap();
        assert!(
            matches!(
                codec::encode(&value, &ty),
                Err(CodecError::TypeMismatch { .. })
            ),
            "{value:?} should not encode as {descriptor}"
        );
    }

    let ty = registry.resolve("Tuple(uint32,uint32)").unwrap();
    assert!(matches!(
        codec::encode(&Value::Tuple(vec![1u32.into()]), &ty),
        Err(CodecError::TupleArity { .. })
    ));
}

#[test]
fn test_encode_wrong_class_or_enumeration() {
    let registry = TypeRegistry::new();

    let foo = registry.remote_object("Svc", "Foo", 7).unwrap();
    let ty = registry.resolve("Class(Svc.Foo)").unwrap();
    assert_eq!(codec::encode(&Value::Object(foo.clone()), &ty).unwrap(), [7]);

    let ty = registry.resolve("Class(Svc.Bar)").unwrap();
    assert!(matches!(
        codec::encode(&Value::Object(foo), &ty),
        Err(CodecError::TypeMismatch { .. })
    ));

    let member = |service: &str, enumeration: &str| {
        Value::Enum(EnumValue {
            service: service.to_string(),
            enumeration: enumeration.to_string(),
            name: "X".to_string(),
            value: 99,
        })
    };
    let ty = registry.resolve("Enum(Svc.E)").unwrap();
    assert_eq!(hex::encode(codec::encode(&member("Svc", "E"), &ty).unwrap()), "c601");

    for value in [member("Other", "E"), member("Svc", "X"), Value::SInt32(99)] {
        assert!(
            matches!(
                codec::encode(&value, &ty),
                Err(CodecError::TypeMismatch { .. })
            ),
            "{value:?} should not encode as Enum(Svc.E)"
        );
    }
}

#[test]
fn test_guid() {
    let bytes = hex::decode("1ad1c5b2cf3e8b4aa3bcde7f1c0a6d2e").unwrap();
    assert_eq!(
        decode_guid(&bytes).unwrap(),
        "b2c5d11a-3ecf-4a8b-a3bc-de7f1c0a6d2e"
    );
}
