use fake_server::{FakeServer, test_services};
use krpc_core::binder::CallError;
use krpc_core::client::Client;
use krpc_core::prost::Message;
use krpc_core::transport::{Invocation, NotConnected, RpcError, Transport, unwrap_response};
use krpc_core::value::Value;
use krpc_core::{BoxError, schema};
use std::sync::Arc;


fn connect() -> (Client, Arc<FakeServer>) {
    let server = Arc::new(FakeServer::default());
    let client = Client::connect(server.clone()).unwrap();
    (client, server)
}

#[test]
fn test_connect_binds_services() {
    let (client, server) = connect();

    let names: Vec<_> = client.services().map(|s| s.name()).collect();
    assert_eq!(names, ["TestService"]);

    let call = server.last_call();
    assert_eq!(call.service, "KRPC");
    assert_eq!(call.procedure, "GetServices");
    assert!(call.arguments.is_empty());
}

#[test]
fn test_int32_to_string() {
    let (client, server) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap();

    let result = procedure.call([42]).unwrap();
    assert_eq!(result, Value::from("42"));

    let call = server.last_call();
    assert_eq!(call.procedure, "Int32ToString");
    assert_eq!(call.arguments.len(), 1);
    assert_eq!(call.arguments[0].position, 0);
    assert_eq!(hex::encode(&call.arguments[0].value), "54");
    assert_eq!(call.param_types[0].to_string(), "sint32");
    assert_eq!(call.return_type.as_ref().unwrap().to_string(), "string");
}

#[test]
fn test_int32_to_string_with_scripted_transport() {
    let transport = |call: &Invocation| -> Result<Vec<u8>, BoxError> {
        match call.procedure.as_str() {
            "GetServices" => Ok(test_services().encode_to_vec()),
            "Int32ToString" => {
                assert_eq!(hex::encode(call.argument(0).unwrap()), "54");
                Ok(hex::decode("023432")?)
            }
            other => panic!("unexpected call to {other}"),
        }
    };

    let client = Client::connect(Arc::new(transport)).unwrap();
    let result = client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap()
        .call([42])
        .unwrap();

    assert_eq!(result, Value::from("42"));
}

#[test]
fn test_arguments_are_coerced() {
    let (client, _) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap();

    assert_eq!(procedure.call([7u64]).unwrap(), Value::from("7"));
}

#[test]
fn test_coercion_errors_never_reach_the_transport() {
    let (client, server) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap();
    let calls_before = server.calls().len();

    assert!(matches!(
        procedure.call([true]),
        Err(CallError::Coercion(_))
    ));
    assert!(matches!(
        procedure.call([Value::from("42")]),
        Err(CallError::Coercion(_))
    ));
    assert!(matches!(
        procedure.call(Vec::<Value>::new()),
        Err(CallError::MissingArgument { .. })
    ));
    assert!(matches!(
        procedure.call([1, 2]),
        Err(CallError::TooManyArguments {
            expected: 1,
            actual: 2,
            ..
        })
    ));

    assert_eq!(server.calls().len(), calls_before);
}

#[test]
fn test_optional_arguments() {
    let (client, server) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("OptionalArguments")
        .unwrap();

    assert_eq!(procedure.call(["x"]).unwrap(), Value::from("xfoobar"));
    assert_eq!(server.last_call().arguments.len(), 1);

    assert_eq!(procedure.call(["x", "y"]).unwrap(), Value::from("xybar"));
    assert_eq!(
        procedure.call(["x", "y", "z"]).unwrap(),
        Value::from("xyz")
    );

    // Skip the middle parameter and leave it to the server.
    let result = procedure
        .invoke(vec![Some("x".into()), None, Some("z".into())])
        .unwrap();
    assert_eq!(result, Value::from("xfooz"));

    let positions: Vec<_> = server
        .last_call()
        .arguments
        .iter()
        .map(|arg| arg.position)
        .collect();
    assert_eq!(positions, [0, 2]);
}

#[test]
fn test_named_arguments() {
    let (client, server) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("OptionalArguments")
        .unwrap();

    let result = procedure
        .invoke_named(vec![Some("x".into())], [("z", Value::from("z"))])
        .unwrap();
    assert_eq!(result, Value::from("xfooz"));
    let positions: Vec<_> = server
        .last_call()
        .arguments
        .iter()
        .map(|arg| arg.position)
        .collect();
    assert_eq!(positions, [0, 2]);

    let result = procedure
        .invoke_named(Vec::new(), [("y", Value::from("y")), ("x", Value::from("x"))])
        .unwrap();
    assert_eq!(result, Value::from("xybar"));
}

#[test]
fn test_named_argument_errors_never_reach_the_transport() {
    let (client, server) = connect();
    let service = client.service("TestService").unwrap();
    let procedure = service.procedure("OptionalArguments").unwrap();
    let calls_before = server.calls().len();

    assert!(matches!(
        procedure.invoke_named(Vec::new(), [("y", Value::from("y"))]),
        Err(CallError::MissingArgument { parameter, .. }) if parameter == "x"
    ));
    assert!(matches!(
        procedure.invoke_named(Vec::new(), [("w", Value::from("w"))]),
        Err(CallError::UnknownArgument { parameter, .. }) if parameter == "w"
    ));
    assert!(matches!(
        procedure.invoke_named(vec![Some("x".into())], [("x", Value::from("x"))]),
        Err(CallError::DuplicateArgument { parameter, .. }) if parameter == "x"
    ));
    assert!(matches!(
        procedure.invoke_named(
            vec![Some("x".into()), None, None, Some("w".into())],
            [("z", Value::from("z"))]
        ),
        Err(CallError::TooManyArguments {
            expected: 3,
            actual: 4,
            ..
        })
    ));
    assert!(matches!(
        procedure.invoke_named(Vec::new(), [("x", Value::from(1))]),
        Err(CallError::Coercion(_))
    ));

    assert_eq!(server.calls().len(), calls_before);
}

#[test]
fn test_named_method_arguments() {
    let (client, server) = connect();
    let class = client
        .service("TestService")
        .unwrap()
        .class("TestClass")
        .unwrap();
    let Value::Object(object) = class.static_method("Create").unwrap().call([5]).unwrap() else {
        panic!("expected a remote object");
    };

    let setter = class.property("IntProperty").unwrap().setter().unwrap();
    setter
        .invoke_named(&object, Vec::new(), [("value", Value::from(9))])
        .unwrap();
    assert_eq!(
        class.property("IntProperty").unwrap().get(&object).unwrap(),
        Value::SInt32(9)
    );

    // The receiver is always passed positionally.
    let calls_before = server.calls().len();
    assert!(matches!(
        setter.invoke_named(&object, Vec::new(), [("this", Value::Object(object.clone()))]),
        Err(CallError::DuplicateArgument { .. })
    ));
    assert_eq!(server.calls().len(), calls_before);
}

#[test]
fn test_properties() {
    let (client, _) = connect();
    let service = client.service("TestService").unwrap();

    let property = service.property("StringProperty").unwrap();
    property.set("jeb").unwrap();
    assert_eq!(property.get().unwrap(), Value::from("jeb"));

    let read_only = service.property("ReadOnlyProperty").unwrap();
    assert_eq!(read_only.get().unwrap(), Value::from("read only"));
    assert!(matches!(
        read_only.set("nope"),
        Err(CallError::NotWritable(name)) if name == "ReadOnlyProperty"
    ));
}

#[test]
fn test_class_members() {
    let (client, _) = connect();
    let class = client
        .service("TestService")
        .unwrap()
        .class("TestClass")
        .unwrap();

    let created = class.static_method("Create").unwrap().call([7]).unwrap();
    let Value::Object(object) = created else {
        panic!("expected a remote object, got {created:?}");
    };
    assert_eq!(object.class(), "TestClass");
    assert_eq!(object.registry(), client.registry().id());

    let get_value = class.method("GetValue").unwrap();
    assert_eq!(
        get_value.call(&object, Vec::<Value>::new()).unwrap(),
        Value::from("value=7")
    );

    let property = class.property("IntProperty").unwrap();
    assert_eq!(property.get(&object).unwrap(), Value::SInt32(7));
    property.set(&object, 12).unwrap();
    assert_eq!(property.get(&object).unwrap(), Value::SInt32(12));
}

#[test]
fn test_objects_from_another_connection() {
    let (a, _) = connect();
    let (b, _) = connect();

    let create = |client: &Client| {
        let class = client.service("TestService").unwrap().class("TestClass").unwrap();
        match class.static_method("Create").unwrap().call([3]).unwrap() {
            Value::Object(object) => object,
            other => panic!("expected a remote object, got {other:?}"),
        }
    };

    let from_b = create(&b);
    let get_value = a
        .service("TestService")
        .unwrap()
        .class("TestClass")
        .unwrap()
        .method("GetValue")
        .unwrap();

    // Both fake servers hand out id 1 first, so the coerced handle resolves on `a`.
    create(&a);
    assert_eq!(
        get_value.call(&from_b, Vec::<Value>::new()).unwrap(),
        Value::from("value=3")
    );
}

#[test]
fn test_enum_return() {
    let (client, _) = connect();
    let service = client.service("TestService").unwrap();

    let value = service.procedure("EnumReturn").unwrap().call(Vec::<Value>::new()).unwrap();
    let expected = service.enumeration("TestEnum").unwrap().value("ValueB").unwrap();
    assert_eq!(value, Value::Enum(expected));
}

#[test]
fn test_void_procedure_returns_null() {
    let (client, _) = connect();
    let property = client
        .service("TestService")
        .unwrap()
        .property("StringProperty")
        .unwrap();

    let result = property.setter().unwrap().call(["value"]).unwrap();
    assert_eq!(result, Value::Null);
}

#[test]
fn test_transport_errors_pass_through() {
    let (client, _) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("ThrowError")
        .unwrap();

    let err = procedure.call(Vec::<Value>::new()).unwrap_err();
    assert_eq!(err.to_string(), "Server error: Invalid operation");
    let source = err.into_transport().unwrap();
    let rpc = source.downcast_ref::<RpcError>().unwrap();
    assert_eq!(rpc.0, "Invalid operation");
}

#[test]
fn test_get_status() {
    let (client, _) = connect();

    let status = client.get_status().unwrap();
    assert_eq!(status.version, "0.5.4");
    assert_eq!(status.rpcs_executed, 2);
}

#[test]
fn test_offline_client() {
    let listing = test_services().encode_to_vec();
    let client = Client::offline(&listing).unwrap();
    assert!(client.is_offline());

    let service = client.service("TestService").unwrap();
    assert!(service.class("TestClass").is_some());

    let err = service
        .procedure("Int32ToString")
        .unwrap()
        .call([1])
        .unwrap_err();
    assert!(err.into_transport().unwrap().is::<NotConnected>());

    assert!(Client::offline(&[0xff]).is_err());
}

#[test]
fn test_connect_failure() {
    let transport = |_: &Invocation| -> Result<Vec<u8>, BoxError> {
        Err(Box::new(RpcError("connection refused".to_string())))
    };
    assert!(Client::connect(Arc::new(transport)).is_err());
}

#[test]
fn test_requests_and_responses() {
    let (client, server) = connect();
    client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap()
        .call([42])
        .unwrap();

    let request = server.last_call().to_request();
    assert_eq!(request.service, "TestService");
    assert_eq!(request.procedure, "Int32ToString");
    assert_eq!(request.arguments[0].value, [0x54]);

    let ok = schema::Response {
        has_return_value: true,
        return_value: vec![0x02, 0x34, 0x32],
        ..Default::default()
    };
    assert_eq!(unwrap_response(ok).unwrap(), [0x02, 0x34, 0x32]);

    let failed = schema::Response {
        has_error: true,
        error: "Procedure not found".to_string(),
        ..Default::default()
    };
    assert_eq!(
        unwrap_response(failed).unwrap_err(),
        RpcError("Procedure not found".to_string())
    );
}

#[test]
fn test_concurrent_calls() {
    let (client, server) = connect();
    let procedure = client
        .service("TestService")
        .unwrap()
        .procedure("Int32ToString")
        .unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            scope.spawn(move || {
                for j in 0..25 {
                    let n = i * 100 + j;
                    assert_eq!(procedure.call([n]).unwrap(), Value::from(n.to_string()));
                }
            });
        }
    });

    // GetServices plus every call above.
    assert_eq!(server.calls().len(), 1 + 8 * 25);
}

fn assert_transport<T: Transport>(_: &T) {}

#[test]
fn test_fake_server_is_a_transport() {
    assert_transport(&FakeServer::default());
}
