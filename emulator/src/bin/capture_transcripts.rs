use std::io;

#[allow(dead_code)]
#[path = "../battery.rs"]
mod battery;
#[allow(dead_code)]
#[path = "../command.rs"]
mod command;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use charger_core::profile::ProfileKind;
use session::Session;

fn main() -> io::Result<()> {
    for profile in ProfileKind::ALL {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: ProfileKind) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    match profile {
        ProfileKind::LeadAcid => record_lead_acid(&mut session),
        ProfileKind::LiFePo4 => record_lifepo4(&mut session),
    }
}

fn record_lead_acid(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("help")?;
    let _ = session.handle_command("tick 12.4 -2 60")?;
    let _ = session.handle_command("tick 14.45 18")?;
    let _ = session.handle_command("tick 14.4 1.5 7200")?;
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("tick 11.6 -2")?;
    let _ = session.handle_command("tick 12.4 -2")?;
    let _ = session.handle_command("tick 12.7 0")?;
    let _ = session.handle_command("fault overtemp")?;
    let _ = session.handle_command("tick 13.6 0.2")?;
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("fault none")?;
    let _ = session.handle_command("skip 30")?;
    let _ = session.handle_command("tick 13.6 0.2")?;
    let _ = session.handle_command("events")?;
    Ok(())
}

fn record_lifepo4(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("sim 600")?;
    let _ = session.handle_command("sim 3600")?;
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("fault overcurrent")?;
    let _ = session.handle_command("sim 10")?;
    let _ = session.handle_command("fault none")?;
    let _ = session.handle_command("sim 10")?;
    let _ = session.handle_command("help fault")?;
    let _ = session.handle_command("tick 13")?;
    let _ = session.handle_command("events")?;
    Ok(())
}
