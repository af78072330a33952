//! Define common types used by various components of traffic-sender

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Target transactions per second.
///
/// A `Tps` can hold any `f64` as read from the outside world. Only a *usable* rate, finite
/// and greater than zero, is ever turned into a delay; see [`Tps::or`] and [`Tps::delay`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tps(f64);

impl Tps {
    pub const fn new(value: f64) -> Self {
        Tps(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_usable(&self) -> bool {
        self.0.is_finite() && self.0 > 0f64
    }

    /// Returns `self` if usable, `fallback` otherwise
    pub fn or(self, fallback: Tps) -> Tps {
        if self.is_usable() {
            self
        } else {
            fallback
        }
    }

    /// Interval between two requests, `1 / tps`.
    ///
    /// `None` if the rate is not usable or the interval doesn't fit in a [`Duration`]
    /// (i.e. absurdly small rates).
    pub fn delay(&self) -> Option<Duration> {
        if !self.is_usable() {
            return None;
        }
        Duration::try_from_secs_f64(1f64 / self.0).ok()
    }
}

impl Display for Tps {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub const ALL: [Operator; 4] = [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div];

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One synthetic calculation, sent to the worker as `"<lhs> <op> <rhs>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadItem {
    pub lhs: i64,
    pub operator: Operator,
    pub rhs: i64,
}

impl WorkloadItem {
    pub fn equation(&self) -> String {
        self.to_string()
    }
}

impl Display for WorkloadItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.operator, self.rhs)
    }
}
