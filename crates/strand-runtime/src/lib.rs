//! Strand runtime
//!
//! The C-callable helper surface that JIT-compiled Strand code links
//! against: strings with a process-wide intern pool, legacy and typed
//! arrays, object and static-property registries, console output, the
//! regex ABI, promises, timers, the goroutine scheduler, and the function
//! registries (by name and by 16-bit ID).
//!
//! Emitted code reaches every helper through the static name→pointer table
//! in [`abi`]; addresses handed out by the pools are stable for the process
//! lifetime.

pub mod abi;
pub mod array;
pub mod console;
pub mod object;
pub mod promise;
pub mod regexp;
pub mod registry;
pub mod scheduler;
pub mod string;
pub mod timer;
pub mod typecode;

pub use promise::Promise;
pub use string::StrandString;
