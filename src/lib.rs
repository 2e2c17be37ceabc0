#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod types;
mod struct_accessors;
pub mod ondisk;
pub mod acpi;
pub mod nfit;
pub mod pcat;
pub mod pmtt;
pub mod interleave;
pub mod clock;
pub mod mailbox;
pub mod passthru;
pub mod long_op;
#[cfg(test)]
mod mock;
pub use acpi::SubTable;
pub use clock::{Clock, ClockTimer, ManualClock, Timer};
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use long_op::{get_long_operation_status, poll_long_operation, LongOpOptions};
pub use mailbox::{Mailbox, MailboxLayout, RegisterAccess};
pub use nfit::ParsedFitHeader;
pub use passthru::{
    CommandState, Dimm, FwCommand, MailboxOptions, Opcode, OutputPayload,
    Response,
};
pub use pcat::ParsedPcatHeader;
pub use pmtt::ParsedPmttHeader;
pub use types::{Error, FwStatusCode, Result, StatusClass, TableError};
