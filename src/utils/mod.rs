pub mod clock;
pub mod time_fmt;
