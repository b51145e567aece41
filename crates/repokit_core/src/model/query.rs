//! Filter, ordering and window parameters.
//!
//! # Responsibility
//! - Express declarative listing parameters as immutable value objects.
//! - Reject unknown fields, unsupported operators and negative bounds before
//!   any statement is built.
//!
//! # Invariants
//! - `QueryParams<E>` and `PaginationParams<E>` are only obtainable through
//!   their builders, which validate against `E::FIELDS`.
//! - Top-level filters combine conjunctively; `Filter::any` is the only way to
//!   express a disjunction.

use crate::error::ParamError;
use crate::model::entity::Entity;
use crate::model::field::FieldRegistry;
use rusqlite::types::Value;
use serde::Deserialize;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

/// Page size used when a pagination builder is not given a limit.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Comparison operator of a single-field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Value(Value),
    List(Vec<Value>),
}

/// Filter expression over entity fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition {
        field: String,
        op: FilterOp,
        operand: Operand,
    },
    /// Matches when any member matches. Empty groups match nothing.
    Any(Vec<Filter>),
    /// Matches when every member matches. Empty groups match everything.
    All(Vec<Filter>),
}

impl Filter {
    fn compare(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::Condition {
            field: field.into(),
            op,
            operand: Operand::Value(value.into()),
        }
    }

    fn list<V: Into<Value>>(
        field: impl Into<String>,
        op: FilterOp,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Condition {
            field: field.into(),
            op,
            operand: Operand::List(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, FilterOp::Ge, value)
    }

    /// SQL `LIKE` with `%`/`_` wildcards.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, FilterOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::list(field, FilterOp::In, values)
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::list(field, FilterOp::NotIn, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::Condition {
            field: field.into(),
            op: FilterOp::IsNull,
            operand: Operand::None,
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::Condition {
            field: field.into(),
            op: FilterOp::IsNotNull,
            operand: Operand::None,
        }
    }

    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Any(filters.into_iter().collect())
    }

    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::All(filters.into_iter().collect())
    }

    /// Checks field names, operator support and operand types.
    pub fn validate(&self, registry: &FieldRegistry) -> Result<(), ParamError> {
        let (field, op, operand) = match self {
            Self::Any(members) | Self::All(members) => {
                return members
                    .iter()
                    .try_for_each(|member| member.validate(registry));
            }
            Self::Condition { field, op, operand } => (field, *op, operand),
        };

        let def = registry.require(field)?;
        if !def.ty.supports(op) {
            return Err(ParamError::UnsupportedOperator {
                field: field.clone(),
                op,
                ty: def.ty,
            });
        }

        let mismatch = || ParamError::TypeMismatch {
            field: field.clone(),
            expected: def.ty,
        };
        match (op, operand) {
            (FilterOp::IsNull | FilterOp::IsNotNull, Operand::None) => Ok(()),
            (FilterOp::In | FilterOp::NotIn, Operand::List(values)) => {
                if values.iter().all(|value| def.ty.accepts(value)) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (
                FilterOp::Eq
                | FilterOp::Ne
                | FilterOp::Lt
                | FilterOp::Le
                | FilterOp::Gt
                | FilterOp::Ge
                | FilterOp::Like,
                Operand::Value(value),
            ) if def.ty.accepts(value) => Ok(()),
            _ => Err(mismatch()),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Row cap requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    /// Use the repository's `default_limit`.
    #[default]
    Default,
    Bounded(u64),
    /// Explicitly no cap, overriding `default_limit`.
    Unbounded,
}

/// Validated filters, ordering and limit for one entity type.
pub struct QueryParams<E> {
    filters: Vec<Filter>,
    ordering: Vec<OrderBy>,
    limit: Limit,
    include_deleted: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> QueryParams<E> {
    pub fn builder() -> QueryParamsBuilder<E> {
        QueryParamsBuilder::new()
    }
}

impl<E> QueryParams<E> {
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    pub fn include_deleted(&self) -> bool {
        self.include_deleted
    }
}

impl<E> Clone for QueryParams<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            include_deleted: self.include_deleted,
            _entity: PhantomData,
        }
    }
}

impl<E> Debug for QueryParams<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParams")
            .field("filters", &self.filters)
            .field("ordering", &self.ordering)
            .field("limit", &self.limit)
            .field("include_deleted", &self.include_deleted)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum RequestedLimit {
    Default,
    Signed(i64),
    Unbounded,
}

/// Collects raw listing inputs; `build` validates them.
pub struct QueryParamsBuilder<E> {
    filters: Vec<Filter>,
    ordering: Vec<OrderBy>,
    limit: RequestedLimit,
    include_deleted: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> QueryParamsBuilder<E> {
    fn new() -> Self {
        Self {
            filters: Vec::new(),
            ordering: Vec::new(),
            limit: RequestedLimit::Default,
            include_deleted: false,
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.ordering.push(order);
        self
    }

    pub fn ordering(mut self, ordering: impl IntoIterator<Item = OrderBy>) -> Self {
        self.ordering.extend(ordering);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = RequestedLimit::Signed(limit);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.limit = RequestedLimit::Unbounded;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn build(self) -> Result<QueryParams<E>, ParamError> {
        validate_expressions::<E>(&self.filters, &self.ordering)?;
        let limit = match self.limit {
            RequestedLimit::Default => Limit::Default,
            RequestedLimit::Unbounded => Limit::Unbounded,
            RequestedLimit::Signed(value) => Limit::Bounded(non_negative(value, true)?),
        };

        Ok(QueryParams {
            filters: self.filters,
            ordering: self.ordering,
            limit,
            include_deleted: self.include_deleted,
            _entity: PhantomData,
        })
    }
}

/// Validated parameters for one page window.
pub struct PaginationParams<E> {
    query: QueryParams<E>,
    limit: u64,
    offset: u64,
}

impl<E: Entity> PaginationParams<E> {
    pub fn builder() -> PaginationParamsBuilder<E> {
        PaginationParamsBuilder {
            inner: QueryParamsBuilder::new(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl<E> PaginationParams<E> {
    /// Filters, ordering and the page size as a bounded query.
    pub fn query(&self) -> &QueryParams<E> {
        &self.query
    }

    pub fn filters(&self) -> &[Filter] {
        self.query.filters()
    }

    pub fn ordering(&self) -> &[OrderBy] {
        self.query.ordering()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn include_deleted(&self) -> bool {
        self.query.include_deleted()
    }
}

impl<E> Clone for PaginationParams<E> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl<E> Debug for PaginationParams<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationParams")
            .field("filters", &self.query.filters)
            .field("ordering", &self.query.ordering)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("include_deleted", &self.query.include_deleted)
            .finish()
    }
}

pub struct PaginationParamsBuilder<E> {
    inner: QueryParamsBuilder<E>,
    limit: i64,
    offset: i64,
}

impl<E: Entity> PaginationParamsBuilder<E> {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.inner = self.inner.filter(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.inner = self.inner.filters(filters);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.inner = self.inner.order_by(order);
        self
    }

    pub fn ordering(mut self, ordering: impl IntoIterator<Item = OrderBy>) -> Self {
        self.inner = self.inner.ordering(ordering);
        self
    }

    /// Page size.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.inner = self.inner.include_deleted(include);
        self
    }

    pub fn build(self) -> Result<PaginationParams<E>, ParamError> {
        let limit = non_negative(self.limit, true)?;
        let offset = non_negative(self.offset, false)?;
        let query = self.inner.limit(self.limit).build()?;
        Ok(PaginationParams {
            query,
            limit,
            offset,
        })
    }
}

/// Validates filter and ordering expressions against `E`'s registry.
pub(crate) fn validate_expressions<E: Entity>(
    filters: &[Filter],
    ordering: &[OrderBy],
) -> Result<(), ParamError> {
    let registry = E::registry();
    for filter in filters {
        filter.validate(&registry)?;
    }
    for order in ordering {
        registry.require(&order.field)?;
    }
    Ok(())
}

fn non_negative(value: i64, is_limit: bool) -> Result<u64, ParamError> {
    u64::try_from(value).map_err(|_| {
        if is_limit {
            ParamError::NegativeLimit(value)
        } else {
            ParamError::NegativeOffset(value)
        }
    })
}
