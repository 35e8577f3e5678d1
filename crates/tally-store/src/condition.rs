//! Predicates over entry metadata.
//!
//! A [`Condition`] is a small expression tree evaluated against an
//! [`EntryKey`]. Leaves test the path, the name, the value type, the layout
//! or the export flag; [`Condition::and`], [`Condition::or`] and
//! [`Condition::negate`] (also `&`, `|` and `!`) build new trees and leave
//! their operands untouched.
//! Regex leaves are anchored, so `name_matches("hit.*")` must match the
//! whole name.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use regex::Regex;
use tally_types::{normalize_path, EntryKey, LayoutKind, TypeTag};

use crate::aggregate::Aggregate;
use crate::error::StoreResult;

#[derive(Clone, Debug)]
pub enum Condition {
    All,
    Nothing,
    NameEquals(String),
    NameMatches(Regex),
    PathEquals(String),
    PathMatches(Regex),
    TypeEquals(TypeTag),
    LayoutEquals(LayoutKind),
    StoreOnExit,
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

fn anchored(pattern: &str) -> StoreResult<Regex> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

impl Condition {
    /// Matches every entry.
    pub fn all() -> Self {
        Self::All
    }

    /// Matches no entry.
    pub fn none() -> Self {
        Self::Nothing
    }

    pub fn name_equals(name: impl Into<String>) -> Self {
        Self::NameEquals(name.into())
    }

    pub fn name_matches(pattern: &str) -> StoreResult<Self> {
        Ok(Self::NameMatches(anchored(pattern)?))
    }

    /// Exact path match. The path is canonicalized first, so `/m` and `/m/`
    /// are equivalent.
    pub fn path_equals(path: &str) -> Self {
        Self::PathEquals(normalize_path(path).unwrap_or_else(|_| path.to_string()))
    }

    pub fn path_matches(pattern: &str) -> StoreResult<Self> {
        Ok(Self::PathMatches(anchored(pattern)?))
    }

    pub fn type_equals(tag: TypeTag) -> Self {
        Self::TypeEquals(tag)
    }

    /// Entries holding values of type `V`.
    pub fn type_is<V: Aggregate>() -> Self {
        Self::TypeEquals(TypeTag::of::<V>())
    }

    pub fn layout_equals(kind: LayoutKind) -> Self {
        Self::LayoutEquals(kind)
    }

    /// Entries flagged for export at the end of the run.
    pub fn store_on_exit() -> Self {
        Self::StoreOnExit
    }

    pub fn and(&self, other: &Condition) -> Self {
        Self::And(Box::new(self.clone()), Box::new(other.clone()))
    }

    pub fn or(&self, other: &Condition) -> Self {
        Self::Or(Box::new(self.clone()), Box::new(other.clone()))
    }

    /// Logical NOT. The `!` operator does the same.
    pub fn negate(&self) -> Self {
        Self::Not(Box::new(self.clone()))
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        match self {
            Self::All => true,
            Self::Nothing => false,
            Self::NameEquals(name) => key.name == *name,
            Self::NameMatches(re) => re.is_match(&key.name),
            Self::PathEquals(path) => key.path == *path,
            Self::PathMatches(re) => re.is_match(&key.path),
            Self::TypeEquals(tag) => key.type_tag == *tag,
            Self::LayoutEquals(kind) => key.layout == *kind,
            Self::StoreOnExit => key.store_on_exit,
            Self::And(lhs, rhs) => lhs.matches(key) && rhs.matches(key),
            Self::Or(lhs, rhs) => lhs.matches(key) || rhs.matches(key),
            Self::Not(inner) => !inner.matches(key),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::All
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Nothing => f.write_str("nothing"),
            Self::NameEquals(name) => write!(f, "name == {name:?}"),
            Self::NameMatches(re) => write!(f, "name ~ /{}/", re.as_str()),
            Self::PathEquals(path) => write!(f, "path == {path:?}"),
            Self::PathMatches(re) => write!(f, "path ~ /{}/", re.as_str()),
            Self::TypeEquals(tag) => write!(f, "type == {}", tag.short_name()),
            Self::LayoutEquals(kind) => write!(f, "layout == {kind}"),
            Self::StoreOnExit => f.write_str("store_on_exit"),
            Self::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Self::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
            Self::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl BitAnd for &Condition {
    type Output = Condition;

    fn bitand(self, rhs: &Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for &Condition {
    type Output = Condition;

    fn bitor(self, rhs: &Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for &Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}

/// Field-by-field construction of a conjunctive condition.
///
/// For the name and the path, an exact value takes precedence over a regex
/// set on the same field. Fields left unset match everything.
#[derive(Clone, Debug, Default)]
pub struct ConditionBuilder {
    name: Option<String>,
    name_regex: Option<String>,
    path: Option<String>,
    path_regex: Option<String>,
    type_tag: Option<TypeTag>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name_regex(mut self, pattern: impl Into<String>) -> Self {
        self.name_regex = Some(pattern.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path_regex(mut self, pattern: impl Into<String>) -> Self {
        self.path_regex = Some(pattern.into());
        self
    }

    pub fn type_tag(mut self, tag: TypeTag) -> Self {
        self.type_tag = Some(tag);
        self
    }

    pub fn build(&self) -> StoreResult<Condition> {
        let name = match (&self.name, &self.name_regex) {
            (Some(name), _) => Some(Condition::name_equals(name.clone())),
            (None, Some(re)) => Some(Condition::name_matches(re)?),
            (None, None) => None,
        };
        let path = match (&self.path, &self.path_regex) {
            (Some(path), _) => Some(Condition::path_equals(path)),
            (None, Some(re)) => Some(Condition::path_matches(re)?),
            (None, None) => None,
        };
        let type_tag = self.type_tag.map(Condition::type_equals);

        Ok([name, path, type_tag]
            .into_iter()
            .flatten()
            .reduce(|acc, c| acc & c)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::EntryId;

    fn key(path: &str, name: &str) -> EntryKey {
        EntryKey {
            path: path.into(),
            name: name.into(),
            type_tag: TypeTag::of::<i64>(),
            layout: LayoutKind::Single,
            instance_count: 1,
            store_on_exit: false,
            id: EntryId::new(0, 0),
        }
    }

    #[test]
    fn exact_leaves() {
        let k = key("/det/", "hits");
        assert!(Condition::name_equals("hits").matches(&k));
        assert!(!Condition::name_equals("hit").matches(&k));
        assert!(Condition::path_equals("/det").matches(&k));
        assert!(Condition::type_is::<i64>().matches(&k));
        assert!(!Condition::type_is::<u64>().matches(&k));
        assert!(Condition::layout_equals(LayoutKind::Single).matches(&k));
        assert!(!Condition::store_on_exit().matches(&k));
    }

    #[test]
    fn regex_leaves_are_anchored() {
        let k = key("/det/tracks/", "hit_energy");
        assert!(Condition::name_matches("hit.*").unwrap().matches(&k));
        assert!(!Condition::name_matches("energy").unwrap().matches(&k));
        assert!(Condition::path_matches("/det/.*").unwrap().matches(&k));
    }

    #[test]
    fn invalid_regex_is_reported() {
        assert!(Condition::name_matches("(").is_err());
    }

    #[test]
    fn combinators_leave_operands_untouched() {
        let a = Condition::name_equals("x");
        let b = Condition::path_equals("/p/");
        let both = a.and(&b);
        let either = a.or(&b);
        let not_a = a.negate();

        let k = key("/p/", "y");
        assert!(!both.matches(&k));
        assert!(either.matches(&k));
        assert!(not_a.matches(&k));
        assert!(!a.matches(&k));
        assert!(b.matches(&k));
    }

    #[test]
    fn operators_mirror_methods() {
        let k = key("/p/", "x");
        let c = Condition::name_equals("x") & !Condition::path_equals("/q/");
        assert!(c.matches(&k));
        let d = Condition::none() | Condition::all();
        assert!(d.matches(&k));
        let e = &c & &!&d;
        assert!(!e.matches(&k));
    }

    #[test]
    fn display_is_readable() {
        let c = Condition::name_equals("x").and(&Condition::layout_equals(LayoutKind::SharedBuffered));
        assert_eq!(c.to_string(), "(name == \"x\" && layout == shared)");
    }

    #[test]
    fn builder_prefers_exact_over_regex() {
        let cond = ConditionBuilder::new()
            .name("hits")
            .name_regex("nothing-matches-this")
            .build()
            .unwrap();
        assert!(cond.matches(&key("/a/", "hits")));
    }

    #[test]
    fn builder_defaults_to_match_everything() {
        let cond = ConditionBuilder::new().build().unwrap();
        assert!(cond.matches(&key("/any/", "thing")));
    }

    #[test]
    fn builder_conjoins_fields() {
        let cond = ConditionBuilder::new()
            .path_regex("/det/.*")
            .type_tag(TypeTag::of::<i64>())
            .build()
            .unwrap();
        assert!(cond.matches(&key("/det/x/", "n")));
        assert!(!cond.matches(&key("/other/", "n")));
    }
}
