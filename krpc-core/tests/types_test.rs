use krpc_core::types::{DescriptorError, MessageKind, Type, TypeRegistry, ValueKind};
use std::sync::Arc;

#[test]
fn test_value_types() {
    let registry = TypeRegistry::new();

    for kind in ValueKind::ALL {
        let ty = registry.resolve(kind.keyword()).unwrap();
        assert_eq!(*ty, Type::Value(kind));
        assert_eq!(ty.to_string(), kind.keyword());
    }
}

#[test]
fn test_int32_alias_is_rejected() {
    let registry = TypeRegistry::new();

    assert!(registry.resolve("int32").is_err());
    assert!(registry.resolve("int64").is_err());
}

#[test]
fn test_class_and_enum_types() {
    let registry = TypeRegistry::new();

    let class = registry.resolve("Class(SpaceCenter.Vessel)").unwrap();
    assert_eq!(
        *class,
        Type::Class {
            service: "SpaceCenter".to_string(),
            name: "Vessel".to_string()
        }
    );

    let enumeration = registry.resolve("Enum(SpaceCenter.VesselSituation)").unwrap();
    assert_eq!(
        *enumeration,
        Type::Enum {
            service: "SpaceCenter".to_string(),
            name: "VesselSituation".to_string()
        }
    );
}

#[test]
fn test_message_types() {
    let registry = TypeRegistry::new();

    for kind in MessageKind::ALL {
        let ty = registry.resolve(kind.full_name()).unwrap();
        assert_eq!(*ty, Type::Message(kind));
    }

    assert!(matches!(
        registry.resolve("KRPC.Unknown"),
        Err(DescriptorError::UnknownMessage(_))
    ));
}

#[test]
fn test_nested_collections() {
    let registry = TypeRegistry::new();

    let ty = registry
        .resolve("Dictionary(string,List(Tuple(double,Class(SpaceCenter.Part))))")
        .unwrap();

    let Type::Dictionary(key, value) = &*ty else {
        panic!("expected a dictionary, got {ty}");
    };
    assert_eq!(**key, Type::Value(ValueKind::String));

    let Type::List(elem) = &**value else {
        panic!("expected a list, got {value}");
    };
    let Type::Tuple(elems) = &**elem else {
        panic!("expected a tuple, got {elem}");
    };
    assert_eq!(elems.len(), 2);
    assert_eq!(*elems[0], Type::Value(ValueKind::Double));
    assert!(matches!(&*elems[1], Type::Class { name, .. } if name == "Part"));

    // Children share the canonical instances.
    let list = registry
        .resolve("List(Tuple(double,Class(SpaceCenter.Part)))")
        .unwrap();
    assert!(Arc::ptr_eq(value, &list));
}

#[test]
fn test_display_round_trips_descriptor() {
    let registry = TypeRegistry::new();

    for descriptor in [
        "Set(Enum(A.B))",
        "Tuple(sint32,string,bool)",
        "Dictionary(uint64,Set(bytes))",
        "List(KRPC.Status)",
    ] {
        assert_eq!(registry.resolve(descriptor).unwrap().to_string(), descriptor);
    }
}

#[test]
fn test_resolution_is_idempotent() {
    let registry = TypeRegistry::new();

    let a = registry.resolve("List(sint32)").unwrap();
    let b = registry.resolve("List(sint32)").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let before = registry.cached_types();
    registry.resolve("List(sint32)").unwrap();
    assert_eq!(registry.cached_types(), before);
}

#[test]
fn test_registries_do_not_share_instances() {
    let a = TypeRegistry::new();
    let b = TypeRegistry::new();

    let x = a.resolve("List(string)").unwrap();
    let y = b.resolve("List(string)").unwrap();
    assert_eq!(x, y);
    assert!(!Arc::ptr_eq(&x, &y));
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_invalid_descriptors() {
    let registry = TypeRegistry::new();

    for descriptor in [
        "",
        "List(",
        "List()",
        "List(sint32",
        "List(sint32,string)",
        "Dictionary(string)",
        "Dictionary(string,sint32,bool)",
        "Tuple(sint32,)",
        "Tuple(List(sint32),string))",
        "Class(Vessel)",
        "Class(A.B.C)",
        "Enum()",
        "Map(string,string)",
        "sint33",
        "List(unknown)",
    ] {
        assert!(
            registry.resolve(descriptor).is_err(),
            "'{descriptor}' should not resolve"
        );
    }

    assert!(matches!(registry.resolve(""), Err(DescriptorError::Empty)));
    assert!(matches!(
        registry.resolve("Map(string,string)"),
        Err(DescriptorError::UnknownKeyword(_))
    ));
    // Failures are not cached.
    assert_eq!(registry.cached_types(), 0);
}

#[test]
fn test_type_overrides() {
    let registry = TypeRegistry::new();
    let attributes = vec![
        "ParameterType(0).Class(SpaceCenter.Part)".to_string(),
        "ParameterType(2).Class(SpaceCenter.Vessel)".to_string(),
        "ReturnType.List(Class(SpaceCenter.Part))".to_string(),
    ];

    let first = registry.parameter_type(0, "uint64", &attributes).unwrap();
    assert_eq!(first.to_string(), "Class(SpaceCenter.Part)");

    let second = registry.parameter_type(1, "string", &attributes).unwrap();
    assert_eq!(*second, Type::Value(ValueKind::String));

    let third = registry.parameter_type(2, "uint64", &attributes).unwrap();
    assert_eq!(third.to_string(), "Class(SpaceCenter.Vessel)");

    let ret = registry.return_type("List(uint64)", &attributes).unwrap();
    assert_eq!(ret.to_string(), "List(Class(SpaceCenter.Part))");
}

#[test]
fn test_unparseable_override_falls_back() {
    let registry = TypeRegistry::new();
    let attributes = vec![
        "ReturnType.Class(Broken".to_string(),
        "ReturnType.Class(SpaceCenter.Part)".to_string(),
    ];

    let ret = registry.return_type("uint64", &attributes).unwrap();
    assert_eq!(ret.to_string(), "Class(SpaceCenter.Part)");

    let ret = registry.return_type("uint64", &[]).unwrap();
    assert_eq!(*ret, Type::Value(ValueKind::UInt64));
}

#[test]
fn test_concurrent_resolution() {
    let registry = TypeRegistry::new();
    let descriptors = [
        "List(sint32)",
        "Dictionary(string,List(sint32))",
        "Tuple(double,double,double)",
        "Set(Class(SpaceCenter.Part))",
    ];

    let resolved: Vec<Vec<Arc<Type>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    descriptors
                        .iter()
                        .map(|d| registry.resolve(d).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for run in &resolved[1..] {
        for (a, b) in run.iter().zip(&resolved[0]) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
}
