pub mod assembler;
pub mod period;

pub use assembler::{
    build_schedule, AccountValue, AssembledSchedule, OpeningPeriod, ScheduleInputs, ScheduleRow,
};
pub use period::{amortization_per_period, next_payment_date, number_of_payments};
