//! Literal constructors for rows and payloads.

/// Builds a [`Row`](crate::Row) from `column => value` pairs.
///
/// ```
/// use fastgear::{row, Value};
///
/// let row = row! { "id" => 1i64, "name" => "a" };
/// assert_eq!(row.value("id"), &Value::Int(1));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::Row::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::Row::new()$(.with($column, $value))+
    };
}

/// Builds a [`Payload`](crate::repository::Payload) from `column => value`
/// pairs; every listed field is set.
///
/// ```
/// use fastgear::payload;
///
/// let payload = payload! { "name" => "renamed" };
/// assert!(!payload.is_empty());
/// ```
#[macro_export]
macro_rules! payload {
    () => {
        $crate::repository::Payload::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::repository::Payload::new()$(.set($column, $value))+
    };
}
