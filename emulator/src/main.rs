mod battery;
mod command;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use charger_core::profile::ProfileKind;
use session::Session;

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: charger-emulator [--profile <lead-acid|lifepo4>] | charger-emulator <lead-acid|lifepo4>"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(profile)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Charger emulator ready ({}, {} cells). Type `help` for commands or `exit` to quit.",
        session.profile(),
        session.controller().profile().num_cells
    )?;

    loop {
        line.clear();
        write!(writer, "{}> ", session.now())?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile() -> Result<ProfileKind, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(ProfileKind::LeadAcid);
    };

    let tag = if let Some(value) = arg.strip_prefix("--profile=") {
        value.to_string()
    } else if arg == "--profile" {
        args.next()
            .ok_or_else(|| "Expected value after --profile".to_string())?
    } else {
        arg
    };

    ProfileKind::from_tag(&tag).ok_or_else(|| format!("Unknown charging profile `{tag}`"))
}
