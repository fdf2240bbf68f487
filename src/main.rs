mod duet;

use std::error::Error;

use duet::{Duet, DuetProgram, SoundProgram};
use log::{debug, warn};

type Answer = Result<String, Box<dyn Error>>;

fn day18(part: u8, input: &str) -> Answer {
    if part == 1 {
        let program = SoundProgram::parse(input)?;
        debug!("sound program of {} instructions", program.len());
        Ok(duet::recover(&program).ok_or("program ended before recovering a frequency")?.to_string())
    } else {
        let program = DuetProgram::parse(input)?;
        if program.is_empty() {warn!("empty duet program, both engines finish at once")}
        let mut duet = Duet::new(&program);
        duet.run();
        Ok(duet.engine(1).sent().to_string())
    }
}

fn solver(day: usize) -> Option<fn(u8, &str) -> Answer> {
    match day {
        18 => Some(day18),
        _ => None
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = std::env::args().collect::<Vec<_>>();
    let (day_arg, parts, fname) = match &args[..] {
        [_, day_arg] => (day_arg, vec!["1", "2"], format!("day{}.in", day_arg)),
        [_, day_arg, part_arg] => (day_arg, vec![&part_arg[..]], format!("day{}.in", day_arg)),
        [_, day_arg, test_arg, part_arg] =>
            (day_arg, vec![&part_arg[..]], format!("day{}test{}.in", day_arg, test_arg)),
        _ => {
            println!("one to three arguments expected - day number, optionally test number and 1/2 for part");
            std::process::exit(1);
        }
    };

    let day: usize = day_arg.parse()?;
    let Some(solve) = solver(day) else {
        println!("no solution for day {}", day);
        std::process::exit(1);
    };
    assert!(parts.iter().all(|&part| part == "1" || part == "2"));
    let input = std::fs::read_to_string(&fname).map_err(|e| format!("{}: {}", fname, e))?;
    let time = std::time::Instant::now();
    for part in parts {
        println!("{}", solve(part.parse()?, &input)?);
    }
    println!("{} seconds elapsed", time.elapsed().as_secs_f32());
    Ok(())
}
