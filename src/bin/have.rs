use have::compiler;
use log::info;
use std::env;
use std::process;

fn main() {
    env_logger::init();
    info!("Checking package...");

    let command = compiler::Command::new();

    match command.run(env::args()) {
        Ok(output) => {
            print!("{}", output)
        }
        Err(compiler::CompilerError::Help(message)) => {
            println!("{}", message);
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
}
