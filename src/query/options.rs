//! Options records and criteria.
//!
//! [`FindOptions`], [`UpdateOptions`] and [`DeleteOptions`] are the typed
//! records; [`OptionsMap`] is the string-keyed form accepted wherever a
//! record is, with unknown keys rejected when it is converted.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{FastgearError, Result};
use crate::pagination::Pagination;
use crate::query::predicate::Predicate;
use crate::query::statement::{DeleteStatement, SelectStatement};
use crate::repository::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: Order,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: Order::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: Order::Desc,
        }
    }
}

/// Options for selects.
///
/// `skip` is an absolute row offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filters: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub relations: Vec<String>,
    pub select: Vec<String>,
    pub with_deleted: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub filters: Vec<Predicate>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub filters: Vec<Predicate>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }
}

/// A value in an [`OptionsMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Predicate(Predicate),
    Predicates(Vec<Predicate>),
    Order(OrderBy),
    Orders(Vec<OrderBy>),
    Count(u64),
    Names(Vec<String>),
    Flag(bool),
}

impl From<Predicate> for OptionValue {
    fn from(p: Predicate) -> Self {
        OptionValue::Predicate(p)
    }
}

impl From<Vec<Predicate>> for OptionValue {
    fn from(p: Vec<Predicate>) -> Self {
        OptionValue::Predicates(p)
    }
}

impl From<OrderBy> for OptionValue {
    fn from(o: OrderBy) -> Self {
        OptionValue::Order(o)
    }
}

impl From<Vec<OrderBy>> for OptionValue {
    fn from(o: Vec<OrderBy>) -> Self {
        OptionValue::Orders(o)
    }
}

impl From<u64> for OptionValue {
    fn from(n: u64) -> Self {
        OptionValue::Count(n)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Flag(b)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(names: Vec<&str>) -> Self {
        OptionValue::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(names: Vec<String>) -> Self {
        OptionValue::Names(names)
    }
}

/// String-keyed options, in insertion order.
///
/// ```
/// use fastgear::query::{col, FindOptions, OptionsMap};
///
/// let map = OptionsMap::new().with("where", col("id").eq(1i64)).with("take", 5u64);
/// let options = FindOptions::try_from(map).unwrap();
/// assert_eq!(options.take, Some(5));
///
/// let bad = OptionsMap::new().with("bad_key", 1u64);
/// assert!(FindOptions::try_from(bad).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsMap {
    entries: Vec<(String, OptionValue)>,
}

impl OptionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for OptionsMap {
    type Item = (String, OptionValue);
    type IntoIter = std::vec::IntoIter<(String, OptionValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn invalid(key: String, options: &'static str, expected: &'static str) -> FastgearError {
    FastgearError::InvalidOptionValue {
        key,
        options,
        expected,
    }
}

fn into_predicates(key: String, value: OptionValue, options: &'static str) -> Result<Vec<Predicate>> {
    match value {
        OptionValue::Predicate(p) => Ok(vec![p]),
        OptionValue::Predicates(ps) => Ok(ps),
        _ => Err(invalid(key, options, "a predicate or a list of predicates")),
    }
}

impl TryFrom<OptionsMap> for FindOptions {
    type Error = FastgearError;

    fn try_from(map: OptionsMap) -> Result<Self> {
        const NAME: &str = "FindOptions";
        let mut options = FindOptions::default();
        for (key, value) in map {
            match key.as_str() {
                "where" => options.filters.extend(into_predicates(key, value, NAME)?),
                "order_by" => match value {
                    OptionValue::Order(o) => options.order_by.push(o),
                    OptionValue::Orders(os) => options.order_by.extend(os),
                    _ => return Err(invalid(key, NAME, "an ordering or a list of orderings")),
                },
                "skip" => match value {
                    OptionValue::Count(n) => options.skip = Some(n),
                    _ => return Err(invalid(key, NAME, "a row count")),
                },
                "take" => match value {
                    OptionValue::Count(n) => options.take = Some(n),
                    _ => return Err(invalid(key, NAME, "a row count")),
                },
                "relations" => match value {
                    OptionValue::Names(names) => options.relations.extend(names),
                    _ => return Err(invalid(key, NAME, "a list of relation names")),
                },
                "select" => match value {
                    OptionValue::Names(names) => options.select.extend(names),
                    _ => return Err(invalid(key, NAME, "a list of column names")),
                },
                "with_deleted" => match value {
                    OptionValue::Flag(flag) => options.with_deleted = flag,
                    _ => return Err(invalid(key, NAME, "a boolean")),
                },
                _ => return Err(FastgearError::unknown_option(key, NAME)),
            }
        }
        Ok(options)
    }
}

fn where_only(map: OptionsMap, options: &'static str) -> Result<Vec<Predicate>> {
    let mut filters = Vec::new();
    for (key, value) in map {
        if key != "where" {
            return Err(FastgearError::unknown_option(key, options));
        }
        filters.extend(into_predicates(key, value, options)?);
    }
    Ok(filters)
}

impl TryFrom<OptionsMap> for UpdateOptions {
    type Error = FastgearError;

    fn try_from(map: OptionsMap) -> Result<Self> {
        Ok(UpdateOptions {
            filters: where_only(map, "UpdateOptions")?,
        })
    }
}

impl TryFrom<OptionsMap> for DeleteOptions {
    type Error = FastgearError;

    fn try_from(map: OptionsMap) -> Result<Self> {
        Ok(DeleteOptions {
            filters: where_only(map, "DeleteOptions")?,
        })
    }
}

/// What a statement should match.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria<O> {
    /// Every row.
    All,
    /// The row whose primary key equals the identifier.
    ById(String),
    Options(O),
    Map(OptionsMap),
}

impl<O> Default for Criteria<O> {
    fn default() -> Self {
        Criteria::All
    }
}

impl<O> From<&str> for Criteria<O> {
    fn from(id: &str) -> Self {
        Criteria::ById(id.to_string())
    }
}

impl<O> From<String> for Criteria<O> {
    fn from(id: String) -> Self {
        Criteria::ById(id)
    }
}

impl<O> From<i64> for Criteria<O> {
    fn from(id: i64) -> Self {
        Criteria::ById(id.to_string())
    }
}

impl<O> From<uuid::Uuid> for Criteria<O> {
    fn from(id: uuid::Uuid) -> Self {
        Criteria::ById(id.to_string())
    }
}

impl<O> From<OptionsMap> for Criteria<O> {
    fn from(map: OptionsMap) -> Self {
        Criteria::Map(map)
    }
}

impl<O> From<Option<O>> for Criteria<O> {
    fn from(options: Option<O>) -> Self {
        options.map_or(Criteria::All, Criteria::Options)
    }
}

macro_rules! criteria_from_options {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Criteria<$ty> {
                fn from(options: $ty) -> Self {
                    Criteria::Options(options)
                }
            }
        )*
    };
}

criteria_from_options!(FindOptions, UpdateOptions, DeleteOptions);

/// Input of `find`, `count` and `find_and_count`.
#[derive(Debug, Clone)]
pub enum FindQuery {
    Criteria(Criteria<FindOptions>),
    Pagination(Pagination),
    Statement(SelectStatement),
}

impl Default for FindQuery {
    fn default() -> Self {
        FindQuery::Criteria(Criteria::All)
    }
}

impl From<Criteria<FindOptions>> for FindQuery {
    fn from(c: Criteria<FindOptions>) -> Self {
        FindQuery::Criteria(c)
    }
}

impl From<FindOptions> for FindQuery {
    fn from(o: FindOptions) -> Self {
        FindQuery::Criteria(Criteria::Options(o))
    }
}

impl From<OptionsMap> for FindQuery {
    fn from(m: OptionsMap) -> Self {
        FindQuery::Criteria(Criteria::Map(m))
    }
}

impl From<Pagination> for FindQuery {
    fn from(p: Pagination) -> Self {
        FindQuery::Pagination(p)
    }
}

impl From<SelectStatement> for FindQuery {
    fn from(s: SelectStatement) -> Self {
        FindQuery::Statement(s)
    }
}

/// Input of `delete`: a prepared statement, or criteria locating one row.
#[derive(Debug, Clone)]
pub enum DeleteQuery {
    Criteria(Criteria<FindOptions>),
    Statement(DeleteStatement),
}

impl From<Criteria<FindOptions>> for DeleteQuery {
    fn from(c: Criteria<FindOptions>) -> Self {
        DeleteQuery::Criteria(c)
    }
}

impl From<&str> for DeleteQuery {
    fn from(id: &str) -> Self {
        DeleteQuery::Criteria(Criteria::ById(id.to_string()))
    }
}

impl From<i64> for DeleteQuery {
    fn from(id: i64) -> Self {
        DeleteQuery::Criteria(Criteria::ById(id.to_string()))
    }
}

impl From<FindOptions> for DeleteQuery {
    fn from(o: FindOptions) -> Self {
        DeleteQuery::Criteria(Criteria::Options(o))
    }
}

impl From<DeleteStatement> for DeleteQuery {
    fn from(s: DeleteStatement) -> Self {
        DeleteQuery::Statement(s)
    }
}

/// Input of `create`: a full entity or a partial payload.
#[derive(Debug, Clone)]
pub enum NewRecord<E> {
    Entity(E),
    Partial(Payload),
}

impl<E: Entity> From<E> for NewRecord<E> {
    fn from(e: E) -> Self {
        NewRecord::Entity(e)
    }
}

impl<E: Entity> From<Payload> for NewRecord<E> {
    fn from(p: Payload) -> Self {
        NewRecord::Partial(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::col;

    #[test]
    fn map_normalizes_single_values() {
        let map = OptionsMap::new()
            .with("where", col("id").eq(1i64))
            .with("order_by", OrderBy::desc("id"))
            .with("skip", 20u64)
            .with("relations", vec!["children"])
            .with("with_deleted", true);
        let options = FindOptions::try_from(map).unwrap();
        assert_eq!(options.filters.len(), 1);
        assert_eq!(options.order_by, vec![OrderBy::desc("id")]);
        assert_eq!(options.skip, Some(20));
        assert_eq!(options.relations, vec!["children".to_string()]);
        assert!(options.with_deleted);
    }

    #[test]
    fn unknown_key_names_key_and_options_type() {
        let err = UpdateOptions::try_from(OptionsMap::new().with("take", 1u64)).unwrap_err();
        assert_eq!(err.to_string(), "Unknown option: take in UpdateOptions");
        let err = DeleteOptions::try_from(OptionsMap::new().with("bad_key", 1u64)).unwrap_err();
        assert!(err.to_string().contains("bad_key in DeleteOptions"));
    }

    #[test]
    fn wrong_value_kind_is_rejected() {
        let err = FindOptions::try_from(OptionsMap::new().with("take", true)).unwrap_err();
        assert!(matches!(err, FastgearError::InvalidOptionValue { ref key, .. } if key == "take"));
        assert!(err.is_configuration());
    }

    #[test]
    fn criteria_conversions() {
        assert_eq!(Criteria::<FindOptions>::from("42"), Criteria::ById("42".into()));
        assert_eq!(Criteria::<FindOptions>::from(None), Criteria::All);
        assert!(matches!(
            Criteria::from(FindOptions::new().take(1)),
            Criteria::Options(FindOptions { take: Some(1), .. })
        ));
    }
}
