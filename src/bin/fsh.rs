use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use tinyfs::{engine::Engine, shell::Command};

fn usage() -> ! {
    eprintln!("fsh [script]");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut script_path = None;
    let args = std::env::args().skip(1);
    for arg in args {
        if script_path.is_none() {
            script_path = Some(arg);
        } else {
            eprintln!("fsh: too many arguments");
            usage();
        }
    }

    let input: Box<dyn BufRead> = match &script_path {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("fsh: failed to open script {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let mut engine = Engine::new();
    let mut status = 0;
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("fsh: failed to read input: {}", e);
                std::process::exit(1);
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {}", e);
                status = libc::c_int::from(&e);
                continue;
            }
        };

        match command.execute(&mut engine) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                println!("error: {}", e);
                status = e.into();
            }
        }
    }

    std::process::exit(status);
}
