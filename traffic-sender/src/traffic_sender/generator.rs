use common_types::{Operator, WorkloadItem};
use std::ops::RangeInclusive;

pub const DEFAULT_OPERAND_RANGE: RangeInclusive<i64> = 1..=100;

#[derive(Debug, thiserror::Error)]
#[error("operand range {start}..={end} is empty")]
pub struct EmptyOperandRange {
    start: i64,
    end: i64,
}

/// Generates one random calculation per call. Calls are independent of each other.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    operands: RangeInclusive<i64>,
}

impl Default for WorkloadGenerator {
    fn default() -> Self {
        WorkloadGenerator {
            operands: DEFAULT_OPERAND_RANGE,
        }
    }
}

impl WorkloadGenerator {
    pub fn new(operands: RangeInclusive<i64>) -> Result<Self, EmptyOperandRange> {
        if operands.is_empty() {
            return Err(EmptyOperandRange {
                start: *operands.start(),
                end: *operands.end(),
            });
        }
        Ok(WorkloadGenerator { operands })
    }

    pub fn generate(&self) -> WorkloadItem {
        let lhs = fastrand::i64(self.operands.clone());
        let mut rhs = fastrand::i64(self.operands.clone());
        let operator = Operator::ALL[fastrand::usize(..Operator::ALL.len())];
        if operator == Operator::Div && rhs == 0 {
            rhs = 1;
        }
        WorkloadItem { lhs, operator, rhs }
    }
}
