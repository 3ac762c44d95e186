//! Job state machine
//!
//! A pure reducer over [`JobSnapshot`](crate::domain::JobSnapshot): the
//! owner feeds it one [`Msg`] at a time and executes the returned
//! [`Effect`]s. It performs no I/O and never computes progress itself;
//! progress values are relayed from the producer as-is.

mod effect;
mod msg;
mod update;

pub use effect::Effect;
pub use msg::Msg;
pub use update::update;
