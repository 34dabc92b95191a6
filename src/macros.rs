/// Builds a [`Value::Keyword`](crate::Value::Keyword).
///
/// ```rust
/// use serde_edn::{kw, Value};
///
/// let k = kw!("show-email");
/// assert_eq!(k.to_string(), ":show-email");
/// let v = kw!("ns/name");
/// assert_eq!(v, Value::Keyword("ns/name".into()));
/// ```
#[macro_export]
macro_rules! kw {
    ($text:expr) => {
        $crate::Value::Keyword($crate::Keyword::from($text))
    };
}

/// Builds a [`Value::Symbol`](crate::Value::Symbol).
///
/// ```rust
/// use serde_edn::sym;
///
/// assert_eq!(sym!("foo/bar").to_string(), "foo/bar");
/// ```
#[macro_export]
macro_rules! sym {
    ($text:expr) => {
        $crate::Value::Symbol($crate::Symbol::from($text))
    };
}
