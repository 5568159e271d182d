use crossbeam_channel::Sender;
use neurofb_experiment::ControlCommand;
use std::io::{self, BufRead};
use std::thread;

pub fn parse_command(line: &str) -> Option<ControlCommand> {
    match line.trim().to_ascii_uppercase().as_str() {
        "START" | "S" => Some(ControlCommand::Start),
        "QUIT" | "Q" | "EXIT" => Some(ControlCommand::Quit),
        _ => None,
    }
}

/// Forwards operator commands typed on stdin until EOF.
pub fn spawn_stdin_reader(tx: Sender<ControlCommand>) -> io::Result<()> {
    thread::Builder::new()
        .name("neurofb-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command '{}' (START or QUIT)", line.trim()),
                }
            }
            log::debug!("stdin closed");
        })?;
    Ok(())
}
