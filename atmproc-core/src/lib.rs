//! Field exchange and process lifecycle framework for atmosphere physics.
//!
//! Physics parameterizations ("processes") declare the fields they read and
//! write, are bound to shared [`field::Field`]s by a driver and then step
//! through `initialize -> run(dt)* -> finalize`. Outputs are validated by
//! [`property_check`]s after every step.

pub mod buffer;
pub mod comm;
pub mod driver;
pub mod errors;
pub mod field;
pub mod field_manager;
pub mod grid;
pub mod io;
pub mod parameters;
pub mod process;
pub mod property_check;
pub mod time;
pub mod units;
