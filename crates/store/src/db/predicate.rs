//! WHERE-clause builder for cart queries.
//!
//! Conditions are stored as (column, value) pairs and rendered straight into
//! a `sqlx::QueryBuilder`, so every `$n` placeholder is pushed together with
//! its bind. Column names are static strings; values are always bound.

use sqlx::{Postgres, QueryBuilder};

use shopping_cart_core::{Identity, SpecFilter};

/// A value bound to a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindValue {
    Int(i32),
    Text(String),
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Eq(&'static str, BindValue),
    IsNull(&'static str),
}

/// Conjunction of column conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `column = value`.
    pub(crate) fn eq(mut self, column: &'static str, value: impl Into<BindValue>) -> Self {
        self.conditions.push(Condition::Eq(column, value.into()));
        self
    }

    /// `column = value` when a value is present, nothing otherwise.
    pub(crate) fn eq_opt<V: Into<BindValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// `column = value` when present, `column IS NULL` otherwise.
    pub(crate) fn eq_or_null<V: Into<BindValue>>(
        mut self,
        column: &'static str,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => {
                self.conditions.push(Condition::IsNull(column));
                self
            }
        }
    }

    /// The exclusive owner clause: `member_id` for members, `visitor_id` otherwise.
    pub(crate) fn identity(self, identity: &Identity) -> Self {
        match identity {
            Identity::Member(id) => self.eq("member_id", id.as_i32()),
            Identity::Visitor(id) => self.eq("visitor_id", id.as_str()),
        }
    }

    /// Spec dimensions used as a filter; absent dimensions are not constrained.
    pub(crate) fn specs(self, specs: SpecFilter) -> Self {
        self.eq_opt("main_spec_id", specs.main.map(|s| s.as_i32()))
            .eq_opt("sub_spec_id", specs.sub.map(|s| s.as_i32()))
    }

    /// Spec dimensions as part of an exact line key; absent means `IS NULL`.
    pub(crate) fn exact_specs(self, specs: SpecFilter) -> Self {
        self.eq_or_null("main_spec_id", specs.main.map(|s| s.as_i32()))
            .eq_or_null("sub_spec_id", specs.sub.map(|s| s.as_i32()))
    }

    /// Columns constrained by this predicate, in order.
    #[cfg(test)]
    pub(crate) fn columns(&self) -> Vec<&'static str> {
        self.conditions
            .iter()
            .map(|c| match c {
                Condition::Eq(column, _) | Condition::IsNull(column) => *column,
            })
            .collect()
    }

    /// Values bound by this predicate, in placeholder order.
    #[cfg(test)]
    pub(crate) fn binds(&self) -> Vec<&BindValue> {
        self.conditions
            .iter()
            .filter_map(|c| match c {
                Condition::Eq(_, value) => Some(value),
                Condition::IsNull(_) => None,
            })
            .collect()
    }

    /// Append ` WHERE ...` to the query; appends nothing for an empty predicate.
    pub(crate) fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, condition) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Eq(column, value) => {
                    qb.push(*column).push(" = ");
                    match value {
                        BindValue::Int(v) => {
                            qb.push_bind(*v);
                        }
                        BindValue::Text(s) => {
                            qb.push_bind(s.clone());
                        }
                    }
                }
                Condition::IsNull(column) => {
                    qb.push(*column).push(" IS NULL");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopping_cart_core::{MemberId, SpecId, VisitorId};

    use super::*;

    fn render(prefix: &str, predicate: &Predicate) -> String {
        let mut qb = QueryBuilder::<Postgres>::new(prefix);
        predicate.push_where(&mut qb);
        qb.sql().to_owned()
    }

    fn visitor() -> Identity {
        Identity::Visitor(VisitorId::parse("v1").unwrap())
    }

    #[test]
    fn test_empty_predicate_renders_nothing() {
        assert_eq!(render("SELECT 1", &Predicate::new()), "SELECT 1");
    }

    #[test]
    fn test_mandatory_clauses() {
        let predicate = Predicate::new()
            .eq("site_id", 1)
            .identity(&Identity::Member(MemberId::new(9)))
            .eq("product_id", 42)
            .eq("suffix", "red");

        assert_eq!(
            render("DELETE FROM member_shopping_cart", &predicate),
            "DELETE FROM member_shopping_cart WHERE site_id = $1 AND member_id = $2 \
             AND product_id = $3 AND suffix = $4"
        );
        assert_eq!(
            predicate.binds(),
            vec![
                &BindValue::Int(1),
                &BindValue::Int(9),
                &BindValue::Int(42),
                &BindValue::Text("red".to_owned()),
            ]
        );
    }

    #[test]
    fn test_member_identity_never_filters_visitor() {
        let columns = Predicate::new()
            .identity(&Identity::Member(MemberId::new(7)))
            .columns();
        assert_eq!(columns, vec!["member_id"]);
    }

    #[test]
    fn test_visitor_identity_never_filters_member() {
        let predicate = Predicate::new().identity(&visitor());
        assert_eq!(predicate.columns(), vec!["visitor_id"]);
        assert_eq!(predicate.binds(), vec![&BindValue::Text("v1".to_owned())]);
    }

    #[test]
    fn test_sub_spec_only() {
        let predicate = Predicate::new()
            .eq("site_id", 1)
            .specs(SpecFilter::new(None, Some(SpecId::new(5))));

        assert_eq!(predicate.columns(), vec!["site_id", "sub_spec_id"]);
        assert_eq!(
            render("SELECT * FROM member_shopping_cart", &predicate),
            "SELECT * FROM member_shopping_cart WHERE site_id = $1 AND sub_spec_id = $2"
        );
    }

    #[test]
    fn test_no_specs_adds_no_clauses() {
        let predicate = Predicate::new().eq("site_id", 1).specs(SpecFilter::NONE);
        assert_eq!(predicate.columns(), vec!["site_id"]);
        assert_eq!(predicate.binds().len(), 1);
    }

    #[test]
    fn test_exact_specs_use_is_null() {
        let predicate = Predicate::new()
            .eq("product_id", 42)
            .exact_specs(SpecFilter::new(Some(SpecId::new(3)), None));

        assert_eq!(
            render("SELECT id FROM member_shopping_cart", &predicate),
            "SELECT id FROM member_shopping_cart WHERE product_id = $1 \
             AND main_spec_id = $2 AND sub_spec_id IS NULL"
        );
        assert_eq!(predicate.binds().len(), 2);
    }

    #[test]
    fn test_placeholders_continue_after_prefix_binds() {
        let predicate = Predicate::new().eq("visitor_id", "v1");
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE visitor_shopping_cart SET quantity = ");
        qb.push_bind(3);
        predicate.push_where(&mut qb);

        assert_eq!(
            qb.sql(),
            "UPDATE visitor_shopping_cart SET quantity = $1 WHERE visitor_id = $2"
        );
    }

    #[test]
    fn test_bind_count_matches_placeholders() {
        let predicate = Predicate::new()
            .eq("site_id", 2)
            .identity(&visitor())
            .eq("product_id", 1)
            .eq("suffix", "")
            .specs(SpecFilter::new(Some(SpecId::new(1)), Some(SpecId::new(2))));

        let sql = render("SELECT * FROM member_shopping_cart", &predicate);
        let placeholders = sql.matches('$').count();
        assert_eq!(placeholders, predicate.binds().len());
        assert_eq!(placeholders, 6);
    }
}
