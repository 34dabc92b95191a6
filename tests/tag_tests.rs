use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_edn::{from_str, from_value, to_string, Deserializer, Error, Tag, Value};

#[test]
fn read_tag_raw() {
    let tag: Tag = from_str("#foo bar").unwrap();
    assert_eq!(tag.tag, "foo");
    assert_eq!(tag.value, serde_edn::sym!("bar"));
}

#[test]
fn read_nested_tag_raw() {
    let tag: Tag = from_str("#foo #bar baz").unwrap();
    assert_eq!(tag.tag, "foo");
    match tag.value {
        Value::Tagged(inner, value) => {
            assert_eq!(inner, "bar");
            assert_eq!(*value, serde_edn::sym!("baz"));
        }
        other => panic!("expected nested tag, got {other:?}"),
    }
}

#[test]
fn tag_chain_into_value() {
    let v: Value = from_str("#a #b 1").unwrap();
    assert_eq!(
        v,
        Value::Tagged("a".into(), Box::new(Value::Tagged("b".into(), Box::new(Value::Int(1)))))
    );
}

#[test]
fn struct_fields_of_type_tag_skip_dispatch() {
    #[derive(Deserialize, Debug)]
    struct T {
        created: Tag,
        uuid: Tag,
    }
    let input = r#"{:created #inst "2015-08-29T21:28:34.311-00:00"
                 :uuid    #uuid "5c2d088b-bc77-47ec-8721-7fb78555ebaf"}"#;
    let val: T = from_str(input).unwrap();
    assert_eq!(val.created.tag, "inst");
    assert_eq!(
        val.created.value,
        Value::String("2015-08-29T21:28:34.311-00:00".to_string())
    );
    assert_eq!(val.uuid.tag, "uuid");
    assert_eq!(
        val.uuid.value,
        Value::String("5c2d088b-bc77-47ec-8721-7fb78555ebaf".to_string())
    );
}

#[test]
fn read_inst_into_value() {
    let v: Value = from_str(r#"#inst "2015-08-29T21:28:34.311-00:00""#).unwrap();
    let expected: DateTime<Utc> = DateTime::parse_from_rfc3339("2015-08-29T21:28:34.311-00:00")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(v, Value::Inst(expected));
}

#[test]
fn read_inst_into_datetime() {
    let dt: DateTime<Utc> = from_str(r#"#inst "2015-08-29T21:28:34.311-00:00""#).unwrap();
    assert_eq!(dt.timestamp_millis(), 1_440_883_714_311);
}

#[test]
fn write_inst() {
    let dt: DateTime<Utc> = DateTime::parse_from_rfc3339("2015-08-29T21:28:34.311Z")
        .unwrap()
        .with_timezone(&Utc);
    let out = to_string(&Value::Inst(dt)).unwrap();
    assert_eq!(out, r#"#inst"2015-08-29T21:28:34.311Z""#);
}

#[test]
fn instance_tag_fn_applies_per_value() {
    let mut de = Deserializer::from_str("#inc 1 #inc #inc 1");
    de.add_tag_fn("inc", |v| match v {
        Value::Int(n) => Ok(Value::Int(n + 1)),
        other => Err(format!("#inc expects an integer, got {}", other)),
    });
    assert_eq!(de.decode::<i64>().unwrap(), 2);
    assert_eq!(de.decode::<i64>().unwrap(), 3);
}

#[test]
fn unknown_tag_into_concrete_target_fails() {
    let err = from_str::<i64>("#mystery 1").unwrap_err();
    assert!(matches!(err, Error::UnknownTag(ref name) if name == "mystery"), "got {err:?}");
}

#[test]
fn unknown_tag_into_value_wraps() {
    let v: Value = from_str("#unknown ???").unwrap();
    assert_eq!(
        v,
        Value::Tagged("unknown".into(), Box::new(serde_edn::sym!("???")))
    );
}

#[test]
fn handler_error_is_wrapped_with_tag_name() {
    let mut de = Deserializer::from_str(r#"#com.myapp/duration "1moment""#);
    de.add_tag_fn("com.myapp/duration", |v| match v {
        Value::String(s) if s.ends_with('h') => Ok(Value::Int(1)),
        _ => Err("unknown unit".to_string()),
    });
    let err = de.decode::<Value>().unwrap_err();
    match err {
        Error::TagHandler { tag, message } => {
            assert_eq!(tag, "com.myapp/duration");
            assert!(message.contains("unknown unit"));
        }
        other => panic!("expected tag handler error, got {other:?}"),
    }
}

#[test]
fn tag_handlers_nest_through_collections() {
    #[derive(Deserialize, Debug, PartialEq)]
    struct Rgb {
        r: u8,
        g: u8,
        b: u8,
    }
    let input = "[#myapp/rgb {:r 98 :g 218 :b 255} #myapp/rgb {:r 0 :g 2 :b 3}]";
    let mut de = Deserializer::from_str(input);
    // the identity handler leaves the map in place; the binder then
    // assigns it to the target struct
    de.add_tag_fn("myapp/rgb", Ok);
    let colours: Vec<Rgb> = de.decode().unwrap();
    assert_eq!(
        colours,
        vec![Rgb { r: 98, g: 218, b: 255 }, Rgb { r: 0, g: 2, b: 3 }]
    );
}

#[test]
fn handler_may_rebind_through_from_value() {
    let mut de = Deserializer::from_str("#temp 21.5");
    de.add_tag_fn("temp", |v| {
        let c: f64 = from_value(v).map_err(|e| e.to_string())?;
        Ok(Value::Float(c * 2.0))
    });
    let doubled: f64 = de.decode().unwrap();
    assert_eq!(doubled, 43.0);
}

#[test]
fn global_tag_fn_is_visible_everywhere() {
    serde_edn::add_tag_fn("tag-tests/double", |v| match v {
        Value::Int(n) => Ok(Value::Int(n * 2)),
        other => Err(format!("expected integer, got {other}")),
    });
    let n: i64 = from_str("#tag-tests/double 21").unwrap();
    assert_eq!(n, 42);
}

#[test]
fn nested_tag_handlers_inside_structures() {
    // handlers apply at any depth, and to tag payloads themselves
    let mut de = Deserializer::from_str("{:temps [#inc 1 #inc #inc 10]}");
    de.add_tag_fn("inc", |v| match v {
        Value::Int(n) => Ok(Value::Int(n + 1)),
        other => Err(format!("expected integer, got {}", other)),
    });
    let v: Value = de.decode().unwrap();
    let map = v.as_map().unwrap();
    let temps = map.get(&serde_edn::kw!("temps")).unwrap();
    assert_eq!(
        temps.as_seq().unwrap(),
        &[Value::Int(2), Value::Int(12)]
    );
}

#[test]
fn decode_base64_into_value() {
    let v: Value = from_str(r#"#base64 "SGVsbG8sIEVETiBmcmllbmRz""#).unwrap();
    assert_eq!(v, Value::Bytes(b"Hello, EDN friends".to_vec()));
}

#[test]
fn encode_byteslice() {
    let out = to_string(&Value::Bytes(vec![0, 6, 7, 8, 9, 128])).unwrap();
    assert_eq!(out, r#"#base64"AAYHCAmA""#);
}

#[test]
fn base64_roundtrip() {
    for bytes in [vec![], vec![0u8], vec![1, 2, 3, 255], (0u8..=255).collect::<Vec<_>>()] {
        let encoded = to_string(&Value::Bytes(bytes.clone())).unwrap();
        let back: Value = from_str(&encoded).unwrap();
        assert_eq!(back, Value::Bytes(bytes));
    }
}

#[test]
fn emit_tag_with_map_payload_fuses() {
    #[derive(serde::Serialize)]
    struct Payload {
        x: i32,
    }
    let tag = Tag::new("some/tag", serde_edn::to_value(&Payload { x: 1 }).unwrap());
    assert_eq!(to_string(&tag).unwrap(), "#some/tag{:x 1}");
}

#[test]
fn emit_tag_with_bare_payload_gets_a_space() {
    let tag = Tag::new("foo", serde_edn::sym!("bar"));
    assert_eq!(to_string(&tag).unwrap(), "#foo bar");
}

#[test]
fn tag_roundtrips_through_value() {
    let v: Value = from_str("#point [1 2]").unwrap();
    let text = to_string(&v).unwrap();
    assert_eq!(text, "#point[1 2]");
    let back: Value = from_str(&text).unwrap();
    assert_eq!(v, back);
}
