use serde_edn::{from_str, kw, sym, to_string, Keyword, Symbol, Value};

#[test]
fn kw_builds_keyword_values() {
    assert_eq!(kw!("a"), Value::Keyword(Keyword::from("a")));
    assert_eq!(kw!("ns/a"), Value::Keyword(Keyword::from("ns/a")));
    assert_eq!(to_string(&kw!("a")).unwrap(), ":a");
}

#[test]
fn sym_builds_symbol_values() {
    assert_eq!(sym!("foo"), Value::Symbol(Symbol::from("foo")));
    assert_eq!(to_string(&sym!("my.ns/foo")).unwrap(), "my.ns/foo");
}

#[test]
fn macros_match_decoded_values() {
    assert_eq!(from_str::<Value>(":a").unwrap(), kw!("a"));
    assert_eq!(from_str::<Value>("foo").unwrap(), sym!("foo"));
}

#[test]
fn macros_accept_owned_strings() {
    let name = String::from("dynamic");
    assert_eq!(kw!(name.clone()), kw!("dynamic"));
    assert_eq!(sym!(name), sym!("dynamic"));
}
