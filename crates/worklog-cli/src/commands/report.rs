use std::error::Error;
use std::io::{self, BufRead, Write};

use worklog_core::UserId;

use super::{open_router, print_messages};

/// Run the report dialog over stdin: print each prompt, read one line
/// per reply, stop when the dialog finishes or input runs out.
pub fn run(user: UserId) -> Result<(), Box<dyn Error>> {
    let router = open_router()?;
    print_messages(&router.on_begin_report(user).messages);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while router.dialog_active(user) {
        print!("> ");
        io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break, // EOF abandons the dialog
        };
        print_messages(&router.on_dialog_text_reply(user, &line).messages);
    }
    Ok(())
}
