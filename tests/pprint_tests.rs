use serde_edn::{compact, from_str, indent, pprint, PPrintOpts, Value};

fn check_compact(input: &str, expected: &str) {
    let out = compact(input.as_bytes()).unwrap_or_else(|e| panic!("compact {input:?}: {e}"));
    assert_eq!(out, expected, "compacting {input:?}");
}

#[test]
fn compact_conversions() {
    check_compact("foo bar baz", "foo bar baz");
    check_compact("a,b\nc\td", "a,b\nc\td");
    check_compact("a                         b", "a b");
    check_compact(r#"{:a "foo", :b zing ,:c 12.3e3}"#, r#"{:a"foo":b zing,:c 12.3e3}"#);
    check_compact("#_=> nil", "#_=> nil");
    check_compact("; just a comment, I am ignored", "");
    check_compact("foo;; bar\nbaz", "foo\nbaz");
    check_compact("f(x)", "f(x)");
    check_compact("#a[1]", "#a[1]");
    check_compact("#a #b[1]", "#a #b[1]");
    check_compact("#a #b{:x 1}", "#a #b{:x 1}");
    check_compact("#tag/a{:x 1}", "#tag/a{:x 1}");
}

#[test]
fn compact_is_idempotent() {
    let inputs = [
        "foo bar baz",
        "a,b\nc\td",
        r#"{:a "foo", :b zing ,:c 12.3e3}"#,
        "#_=> nil",
        "#a #b{:x 1}",
        r#"[\space #foo bar :baz 100 {#{} 1.0 "zap" nil}]"#,
    ];
    for input in inputs {
        let once = compact(input.as_bytes()).unwrap();
        let twice = compact(once.as_bytes()).unwrap();
        assert_eq!(once, twice, "compacting {input:?} twice");
    }
}

#[test]
fn compact_preserves_value() {
    let inputs = [
        r#"{:a "foo", :b zing ,:c 12.3e3}"#,
        "#_ {:dead 1} [1 2 3]",
        r#"[\space "two" :three four 5.0]"#,
    ];
    for input in inputs {
        let compacted = compact(input.as_bytes()).unwrap();
        let a: Value = from_str(input).unwrap();
        let b: Value = from_str(&compacted).unwrap();
        assert_eq!(a, b, "compacting {input:?}");
    }
}

#[test]
fn pprint_expectations() {
    let cases = [
        ("{}", "{}"),
        ("[]", "[]"),
        ("{:a 42}", "{:a 42}"),
        ("{:a 1 :b 2}", "{:a 1,\n :b 2}"),
    ];
    for (input, expected) in cases {
        let out = pprint(input.as_bytes(), &PPrintOpts::default()).unwrap();
        assert_eq!(out, expected, "pprinting {input:?}");
    }
}

#[test]
fn pprint_preserves_value() {
    let inputs = [
        "{:a 1 :b 2}",
        "{:a {:b [1 2 3]} :c #{x}}",
        "[[1 2] [3 4] {:k v}]",
        "#inst \"2015-08-29T21:28:34.311-00:00\"",
        "#_ ignored {:kept true}",
    ];
    for input in inputs {
        let pretty = pprint(input.as_bytes(), &PPrintOpts::default()).unwrap();
        let a: Value = from_str(input).unwrap();
        let b: Value = from_str(&pretty).unwrap();
        assert_eq!(a, b, "pprinting {input:?} gave {pretty:?}");
    }
}

#[test]
fn indent_preserves_value() {
    let inputs = [
        "{:a 1 :b 2}",
        "{:a {:b [1 2 3]} :c #{x}}",
        "[[] [3 4] {:k v} #{}]",
        "#_ ignored {:kept true}",
    ];
    for input in inputs {
        let indented = indent(input.as_bytes(), "", "  ").unwrap();
        let a: Value = from_str(input).unwrap();
        let b: Value = from_str(&indented).unwrap();
        assert_eq!(a, b, "indenting {input:?} gave {indented:?}");
    }
}

#[test]
fn indent_shapes() {
    assert_eq!(indent(b"{}", "", "  ").unwrap(), "{}");
    assert_eq!(indent(b"[1]", ";", "  ").unwrap(), "[\n;  1\n;]");
    assert_eq!(
        indent(b"{:a 1 :b 2}", "", "  ").unwrap(),
        "{\n  :a 1,\n  :b 2\n}"
    );
}

#[test]
fn indent_drops_discards_and_comments() {
    assert_eq!(
        indent(b"[1 #_ 2 3] ; done", "", " ").unwrap(),
        "[\n 1\n 3\n]"
    );
}

#[test]
fn pprint_aligns_nested_collections() {
    // second collection starts on a new line at the column where the
    // previous one began
    let out = pprint(b"[[1 2] [3]]", &PPrintOpts::default()).unwrap();
    let a: Value = from_str("[[1 2] [3]]").unwrap();
    let b: Value = from_str(&out).unwrap();
    assert_eq!(a, b);
    assert!(out.contains('\n'), "expected a line break in {out:?}");
}

#[test]
fn reserializers_reject_malformed_input() {
    assert!(compact(b"[1 2").is_err());
    assert!(indent(b"{:a", "", "  ").is_err());
    assert!(pprint(b"(]", &PPrintOpts::default()).is_err());
}
