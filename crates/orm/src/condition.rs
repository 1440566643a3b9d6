//! Condition trees: negatable, `AND`/`OR` combined sets of predicates.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::value::{IntoList, Operand, Value};

/// How the members of a [`ConditionSet`] are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Conj {
    /// All members must hold.
    #[default]
    And,
    /// At least one member must hold.
    Or,
}

impl Conj {
    /// SQL keyword for the conjunction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for Conj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Conj {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(Error::Conjunction(s.to_string())),
        }
    }
}

/// A two-operand predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    /// Left operand.
    pub left: Value,
    /// Right operand.
    pub right: Value,
    /// Negates the predicate.
    pub not: bool,
}

/// A single-operand predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    /// Operand.
    pub value: Value,
    /// Negates the predicate.
    pub not: bool,
}

/// One member of a [`ConditionSet`].
///
/// Negation is carried by each predicate so that transcription can emit the
/// complementary operator (`!=`, `<=`, `NOT IN`, ...) instead of wrapping the
/// predicate in `NOT (...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `left = right` (`!=` when negated).
    Eq(Binary),
    /// `left > right` (`<=` when negated).
    Gt(Binary),
    /// `left >= right` (`<` when negated).
    GtEq(Binary),
    /// `left < right` (`>=` when negated).
    Lt(Binary),
    /// `left <= right` (`>` when negated).
    LtEq(Binary),
    /// `left IN (right)`.
    In(Binary),
    /// `left LIKE right`.
    Like(Binary),
    /// `value IS NULL`.
    IsNull(Unary),
    /// `value IS TRUE`.
    IsTrue(Unary),
    /// `value IS FALSE`.
    IsFalse(Unary),
    /// Parenthesized nested set.
    Set(ConditionSet),
}

/// An ordered, negatable collection of conditions joined by one conjunction.
///
/// An empty set is the identity of its conjunction chain: it transcribes to
/// `TRUE`, or `FALSE` when negated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    /// Negates the whole set.
    pub not: bool,
    /// Conjunction joining the members.
    pub conj: Conj,
    /// Members in insertion order.
    pub conditions: Vec<Condition>,
}

/// An empty `AND` set.
#[must_use]
pub fn and() -> ConditionSet {
    ConditionSet::new(Conj::And)
}

/// An empty `OR` set.
#[must_use]
pub fn or() -> ConditionSet {
    ConditionSet::new(Conj::Or)
}

fn binary(left: impl Operand, right: impl Into<Value>, not: bool) -> Binary {
    Binary {
        left: left.into_left(),
        right: right.into(),
        not,
    }
}

fn unary(value: impl Operand, not: bool) -> Unary {
    Unary {
        value: value.into_left(),
        not,
    }
}

impl ConditionSet {
    /// An empty set with the given conjunction.
    #[must_use]
    pub const fn new(conj: Conj) -> Self {
        Self {
            not: false,
            conj,
            conditions: Vec::new(),
        }
    }

    /// Whether the set has no members.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Flip the negation of the whole set.
    #[must_use]
    pub const fn not(mut self) -> Self {
        self.not = !self.not;
        self
    }

    /// Append a predicate.
    #[must_use]
    pub fn push(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append a nested set as one parenthesized member.
    #[must_use]
    pub fn condition(self, subset: Self) -> Self {
        self.push(Condition::Set(subset))
    }

    /// `left = right`
    #[must_use]
    pub fn eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Eq(binary(left, right, false)))
    }

    /// `left != right`
    #[must_use]
    pub fn not_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Eq(binary(left, right, true)))
    }

    /// `left > right`
    #[must_use]
    pub fn gt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Gt(binary(left, right, false)))
    }

    /// `left >= right`
    #[must_use]
    pub fn gt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::GtEq(binary(left, right, false)))
    }

    /// `left < right`
    #[must_use]
    pub fn lt(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Lt(binary(left, right, false)))
    }

    /// `left <= right`
    #[must_use]
    pub fn lt_eq(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::LtEq(binary(left, right, false)))
    }

    /// `left IN (right)`
    #[must_use]
    pub fn r#in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.push(Condition::In(Binary {
            left: left.into_left(),
            right: right.into_list(),
            not: false,
        }))
    }

    /// `left NOT IN (right)`
    #[must_use]
    pub fn not_in(self, left: impl Operand, right: impl IntoList) -> Self {
        self.push(Condition::In(Binary {
            left: left.into_left(),
            right: right.into_list(),
            not: true,
        }))
    }

    /// `value IS NULL`
    #[must_use]
    pub fn is_null(self, value: impl Operand) -> Self {
        self.push(Condition::IsNull(unary(value, false)))
    }

    /// `value IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, value: impl Operand) -> Self {
        self.push(Condition::IsNull(unary(value, true)))
    }

    /// `value IS TRUE`
    #[must_use]
    pub fn is_true(self, value: impl Operand) -> Self {
        self.push(Condition::IsTrue(unary(value, false)))
    }

    /// `value IS NOT TRUE`
    #[must_use]
    pub fn is_not_true(self, value: impl Operand) -> Self {
        self.push(Condition::IsTrue(unary(value, true)))
    }

    /// `value IS FALSE`
    #[must_use]
    pub fn is_false(self, value: impl Operand) -> Self {
        self.push(Condition::IsFalse(unary(value, false)))
    }

    /// `value IS NOT FALSE`
    #[must_use]
    pub fn is_not_false(self, value: impl Operand) -> Self {
        self.push(Condition::IsFalse(unary(value, true)))
    }

    /// `left LIKE right`
    #[must_use]
    pub fn like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Like(binary(left, right, false)))
    }

    /// `left NOT LIKE right`
    #[must_use]
    pub fn not_like(self, left: impl Operand, right: impl Into<Value>) -> Self {
        self.push(Condition::Like(binary(left, right, true)))
    }

    pub(crate) fn append(&mut self, other: Self) {
        self.conditions.extend(other.conditions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_coerce_operands() {
        let set = and().eq("age", 17).not_in("id", vec![1, 2]).is_not_null("name");

        assert_eq!(set.conditions.len(), 3);
        assert_eq!(
            set.conditions[0],
            Condition::Eq(Binary {
                left: Value::Ident("age".to_string()),
                right: Value::Int(17),
                not: false,
            })
        );
        assert!(matches!(&set.conditions[1], Condition::In(b) if b.not));
        assert!(matches!(&set.conditions[2], Condition::IsNull(u) if u.not));
    }

    #[test]
    fn nested_sets_and_negation() {
        let set = and().condition(or().eq("a", 1).eq("a", 2).not());
        let Condition::Set(inner) = &set.conditions[0] else {
            panic!("expected nested set");
        };
        assert!(inner.not);
        assert_eq!(inner.conj, Conj::Or);
        assert!(!and().not().not().not);
    }

    #[test]
    fn conjunction_parsing() {
        assert_eq!("and".parse::<Conj>().unwrap(), Conj::And);
        assert_eq!(" OR ".parse::<Conj>().unwrap(), Conj::Or);
        let err = "XOR".parse::<Conj>().unwrap_err();
        assert!(matches!(err, Error::Conjunction(ref c) if c == "XOR"));
    }
}
