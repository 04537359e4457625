//! Front ends that feed command lines to a [`SimTerminal`](crate::SimTerminal).
//!
//! Both loops run one command to completion before reading the next, and
//! both stop when a command returns [`QUIT_SENTINEL`](crate::terminal::QUIT_SENTINEL).

pub mod console;
pub mod udp;

pub use console::ConsoleTransport;
pub use udp::{UdpTransport, MAX_LINE_LENGTH};

use crate::terminal::SimTerminal;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Run one command line from inside an async loop.
///
/// Bus links do blocking I/O, so on a multi-threaded runtime the worker is
/// handed over with `block_in_place` while the command runs. A
/// current-thread runtime has no other worker to hand off to and runs the
/// command inline.
pub(crate) fn process_blocking(terminal: &mut SimTerminal, line: &str) -> String {
    let multi_thread = Handle::try_current()
        .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
    if multi_thread {
        tokio::task::block_in_place(|| terminal.process_command(line))
    } else {
        terminal.process_command(line)
    }
}
