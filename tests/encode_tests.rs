use serde::{Deserialize, Serialize};
use serde_edn::{from_str, kw, sym, to_string, EdnMap, EdnSet, Keyword, RawEdn, Symbol, Value};

fn assert_encodes<T: Serialize>(value: &T, expected: &str) {
    assert_eq!(to_string(value).unwrap(), expected);
}

#[test]
fn scalars() {
    assert_encodes(&Keyword::from("foo"), ":foo");
    assert_encodes(&Symbol::from("foo"), "foo");
    assert_encodes(&"foo", "\"foo\"");
    assert_encodes(&1, "1");
    assert_encodes(&-1.2, "-1.2");
    assert_encodes(&3.0, "3.0");
    assert_encodes(&true, "true");
    assert_encodes(&Value::Nil, "nil");
}

#[test]
fn renamed_struct_field() {
    #[derive(Serialize)]
    struct S {
        #[serde(rename = "quux")]
        foo: i32,
    }
    assert_encodes(&S { foo: 10 }, "{:quux 10}");
}

#[test]
fn string_keys_fuse_with_string_values() {
    let mut map = EdnMap::new();
    map.insert(Value::from("comp"), Value::from("ressed"));
    assert_encodes(&Value::Map(map), "{\"comp\"\"ressed\"}");
}

#[test]
fn symbol_keys_and_set_values() {
    let mut map = EdnMap::new();
    map.insert(
        sym!("the-set"),
        Value::Set([Value::Int(3), Value::Int(4)].into_iter().collect::<EdnSet>()),
    );
    map.insert(
        kw!("slice"),
        Value::Set(
            [Value::from("foo"), Value::from("bar")]
                .into_iter()
                .collect::<EdnSet>(),
        ),
    );
    assert_encodes(
        &Value::Map(map),
        "{the-set #{3 4}:slice #{\"foo\"\"bar\"}}",
    );
}

#[test]
fn lists_and_vectors() {
    assert_encodes(
        &Value::List(vec![Value::Int(3), Value::Int(4)]),
        "(3 4)",
    );
    assert_encodes(
        &Value::Vector(vec![Value::Int(3), Value::Int(4)]),
        "[3 4]",
    );
}

#[test]
fn omitted_fields() {
    #[derive(Serialize)]
    struct S {
        a: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        b: Option<i32>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        c: Vec<i32>,
    }
    assert_encodes(
        &S {
            a: 1,
            b: None,
            c: vec![],
        },
        "{:a 1}",
    );
    assert_encodes(
        &S {
            a: 1,
            b: Some(2),
            c: vec![3],
        },
        "{:a 1 :b 2 :c[3]}",
    );
}

#[test]
fn chars_in_structs() {
    #[derive(Serialize)]
    struct F {
        value: char,
    }
    assert_encodes(&F { value: ' ' }, "{:value \\space}");
    assert_encodes(&F { value: '\'' }, "{:value \\'}");
}

#[test]
fn char_vector_uses_named_and_unicode_forms() {
    let runes: Vec<Value> = "abc, \n".chars().map(Value::Char).collect();
    assert_encodes(
        &Value::Vector(runes),
        "[\\a \\b \\c \\u002c \\space \\newline]",
    );
}

#[test]
fn big_integers_keep_their_marker() {
    use num_bigint::BigInt;
    let v = Value::BigInt("123456789123456789123456789".parse::<BigInt>().unwrap());
    assert_encodes(&v, "123456789123456789123456789N");
    let back: Value = from_str("123456789123456789123456789N").unwrap();
    assert_eq!(back, v);
}

#[test]
fn raw_edn_is_spliced_verbatim() {
    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Foo {
        #[serde(rename = "some-val")]
        some_val: String,
        leftovers: RawEdn,
        #[serde(rename = "other-val")]
        other_val: String,
    }

    let f = Foo {
        some_val: "egg".to_string(),
        leftovers: RawEdn::new(r#"[\space #foo bar :baz 100{#{} 1.0 "zap" nil}]"#),
        other_val: "spam".to_string(),
    };
    let out = to_string(&f).unwrap();
    assert_eq!(
        out,
        r#"{:some-val"egg":leftovers [\space #foo bar :baz 100{#{} 1.0 "zap" nil}] :other-val"spam"}"#
    );

    let back: Foo = from_str(&out).unwrap();
    assert_eq!(back, f);
}

#[test]
fn raw_edn_capture_preserves_interior_whitespace() {
    #[derive(Deserialize)]
    struct Foo {
        leftovers: RawEdn,
    }
    let input = "{\n  :leftovers [\\space #foo bar :baz 100{#{} 1.0 \"zap\" nil}]\n}";
    let f: Foo = from_str(input).unwrap();
    assert_eq!(
        f.leftovers.as_str(),
        "[\\space #foo bar :baz 100{#{} 1.0 \"zap\" nil}]"
    );
}

#[test]
fn string_escapes() {
    assert_encodes(&"a\"b\\c\nd\te\rf\u{0008}g\u{000C}h", "\"a\\\"b\\\\c\\nd\\te\\rf\\bg\\fh\"");
    // non-ASCII scalars are emitted literally
    assert_encodes(&"日本語", "\"日本語\"");
}

#[test]
fn keyword_map_keys() {
    use std::collections::BTreeMap;
    let mut m = BTreeMap::new();
    m.insert(Keyword::from("a"), 1);
    assert_encodes(&m, "{:a 1}");
}

#[test]
fn enums() {
    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: f64, h: f64 },
    }
    assert_encodes(&Shape::Dot, ":Dot");
    assert_encodes(&Shape::Circle(1.5), "{:Circle 1.5}");
    assert_encodes(&Shape::Rect { w: 1.0, h: 2.0 }, "{:Rect{:w 1.0 :h 2.0}}");

    for shape in [Shape::Dot, Shape::Circle(1.5), Shape::Rect { w: 1.0, h: 2.0 }] {
        let text = to_string(&shape).unwrap();
        assert_eq!(from_str::<Shape>(&text).unwrap(), shape, "roundtrip {text}");
    }
}

#[test]
fn nested_value_roundtrip() {
    let input = r#"{:a "foo" :b [1 2.5 nil] :c #{true} :d {:e (1 2)}}"#;
    let v: Value = from_str(input).unwrap();
    let text = to_string(&v).unwrap();
    let back: Value = from_str(&text).unwrap();
    assert_eq!(v, back);
}
